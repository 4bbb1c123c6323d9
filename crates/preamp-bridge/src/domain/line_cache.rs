//! Last-known controller state, replayed to sessions as they join.

use preamp_core::LineKind;

/// Holds the most recent `STATE ...` and `SELECTOR_LABELS ...` lines.
///
/// Each slot is last-write-wins.  Nothing here survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCache {
    state: Option<String>,
    labels: Option<String>,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `line` in the slot for `kind`.  [`LineKind::Other`] is ignored.
    pub fn record(&mut self, kind: LineKind, line: &str) {
        match kind {
            LineKind::State => self.state = Some(line.to_string()),
            LineKind::Labels => self.labels = Some(line.to_string()),
            LineKind::Other => {}
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn labels(&self) -> Option<&str> {
        self.labels.as_deref()
    }

    /// Lines a new session should receive first: labels, then state.
    ///
    /// The browser needs the input names before it can render the selected
    /// input from the state line.
    pub fn replay(&self) -> Vec<String> {
        self.labels
            .iter()
            .chain(self.state.iter())
            .cloned()
            .collect()
    }
}
