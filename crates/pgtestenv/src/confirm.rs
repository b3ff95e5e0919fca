//! Yes/no confirmation before an instance directory is deleted.

use std::io::{self, BufRead, Stdout, StdinLock, Write};
use std::path::Path;

/// Asks whether a directory may be deleted.
pub trait Confirmation {
    /// Returns `true` when deleting `path` was approved.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the answer cannot be obtained.
    fn confirm(&mut self, path: &Path) -> io::Result<bool>;
}

/// Prompts on an output stream and reads the answer from an input stream.
///
/// Only `y` or `Y` approve the deletion. Any other answer, including end of
/// input, declines it.
#[derive(Debug)]
pub struct StdinConfirmation<I = StdinLock<'static>, O = Stdout> {
    input: I,
    output: O,
}

impl StdinConfirmation {
    /// Prompts on the process's stdout and reads from its stdin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stdout(),
        }
    }
}

impl Default for StdinConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> StdinConfirmation<I, O>
where
    I: BufRead,
    O: Write,
{
    /// Uses the supplied streams instead of the process's stdio.
    #[must_use]
    pub const fn with_streams(input: I, output: O) -> Self {
        Self { input, output }
    }

    /// Releases the streams.
    #[must_use]
    pub fn into_streams(self) -> (I, O) {
        (self.input, self.output)
    }
}

impl<I, O> Confirmation for StdinConfirmation<I, O>
where
    I: BufRead,
    O: Write,
{
    fn confirm(&mut self, path: &Path) -> io::Result<bool> {
        write!(
            self.output,
            "Really delete the directory '{}'? (Y/N) ",
            path.display()
        )?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(answer.trim(), "y" | "Y"))
    }
}

/// Answers every prompt the same way without interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl Confirmation for FixedAnswer {
    fn confirm(&mut self, _path: &Path) -> io::Result<bool> {
        Ok(self.0)
    }
}
