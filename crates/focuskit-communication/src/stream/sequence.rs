//! Command sequence
//!
//! An ordered, indexable list of [`CommandLine`]s. The sequence is replaced
//! wholesale on load; afterwards entries only change by replacement at an
//! index.

use focuskit_core::{CommandLine, LineStatus, StreamError};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSequence {
    lines: Vec<CommandLine>,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from program text, one entry per line
    ///
    /// Line terminators are stripped; blank lines are kept so line numbers
    /// match the source file.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| CommandLine::new(i + 1, line))
            .collect();
        Self { lines }
    }

    /// Read a program file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| StreamError::FileError {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Ok(Self::from_text(&String::from_utf8_lossy(&bytes)))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entry at a zero-based index
    pub fn get(&self, index: usize) -> Option<&CommandLine> {
        self.lines.get(index)
    }

    /// Entry by 1-based line number
    pub fn line(&self, line_number: usize) -> Option<&CommandLine> {
        line_number.checked_sub(1).and_then(|i| self.lines.get(i))
    }

    /// Replace the entry at a zero-based index
    pub fn replace(&mut self, index: usize, line: CommandLine) -> Result<(), StreamError> {
        let len = self.lines.len();
        let slot = self
            .lines
            .get_mut(index)
            .ok_or(StreamError::LineOutOfRange { index, len })?;
        *slot = line;
        Ok(())
    }

    /// Mark every entry pending and clear responses
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.status = LineStatus::Pending;
            line.response.clear();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandLine> {
        self.lines.iter()
    }

    /// Count of entries with the given status
    pub fn count(&self, status: LineStatus) -> usize {
        self.lines.iter().filter(|l| l.status == status).count()
    }
}
