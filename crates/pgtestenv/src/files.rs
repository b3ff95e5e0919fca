use std::fs::Permissions;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::Builder;

/// Replaces `target` with `payload` in a single rename.
///
/// The payload is staged in a private sibling file and fsync'd first, so a
/// reader sees either the previous contents or the complete new ones.
pub(crate) fn atomic_write(target: &Path, payload: &[u8]) -> io::Result<()> {
    let Some(parent) = target.parent() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record path has no parent directory",
        ));
    };
    let mut staged = Builder::new()
        .prefix(".pgtestenv-")
        .suffix(".tmp")
        .permissions(Permissions::from_mode(0o600))
        .tempfile_in(parent)?;
    staged.write_all(payload)?;
    staged.as_file().sync_all()?;
    staged.persist(target)?;
    Ok(())
}
