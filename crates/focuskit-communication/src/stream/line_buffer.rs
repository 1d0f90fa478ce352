//! Splits the inbound byte stream into response lines

/// Accumulates bytes until a `\n`; `\r` is dropped and empty lines are
/// skipped
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    partial: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect the lines it completes
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\r' => {}
                b'\n' => {
                    if !self.partial.is_empty() {
                        lines.push(String::from_utf8_lossy(&self.partial).into_owned());
                        self.partial.clear();
                    }
                }
                other => self.partial.push(other),
            }
        }
        lines
    }

    /// Drop any incomplete line
    pub fn clear(&mut self) {
        self.partial.clear();
    }

    /// Bytes of the incomplete line
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}
