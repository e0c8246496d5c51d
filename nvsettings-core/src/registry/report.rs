//! Batch outcome reporting

use crate::setting::SettingError;
use crate::store::StoreError;
use std::fmt;

/// Which batch produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Save,
    Load,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Save => write!(f, "save"),
            BatchKind::Load => write!(f, "load"),
        }
    }
}

/// Outcome of one save or load batch
///
/// Per-cell failures and commit failures never abort a batch; they are
/// collected here instead.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub kind: BatchKind,
    pub namespace: String,
    /// Live cells the batch visited
    pub visited: usize,
    /// Cells written to the session (save)
    pub written: usize,
    /// Cells whose value was replaced from storage (load)
    pub loaded: usize,
    /// Cells skipped because they were not dirty (save)
    pub clean: usize,
    /// Registered cells that had already been dropped
    pub expired: usize,
    pub failures: Vec<SettingError>,
    pub commit_error: Option<StoreError>,
}

impl BatchReport {
    pub(crate) fn new(kind: BatchKind, namespace: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            visited: 0,
            written: 0,
            loaded: 0,
            clean: 0,
            expired: 0,
            failures: Vec::new(),
            commit_error: None,
        }
    }

    /// True when no cell failed and the commit (if any) succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.commit_error.is_none()
    }

    /// Failures other than keys that were never written
    ///
    /// A missing key on load is the normal first-boot case.
    pub fn hard_failures(&self) -> impl Iterator<Item = &SettingError> {
        self.failures.iter().filter(|err| !err.is_not_found())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}': {} cells, {} written, {} loaded, {} clean, {} failed",
            self.kind,
            self.namespace,
            self.visited,
            self.written,
            self.loaded,
            self.clean,
            self.failures.len()
        )?;
        if let Some(err) = &self.commit_error {
            write!(f, ", commit failed: {}", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_completeness() {
        let mut report = BatchReport::new(BatchKind::Load, "Global");
        assert!(report.is_complete());

        report.failures.push(SettingError::Store {
            name: "volume".to_string(),
            source: StoreError::NotFound("volume".to_string()),
        });
        assert!(!report.is_complete());
        assert_eq!(report.hard_failures().count(), 0);
    }

    #[test]
    fn test_report_display() {
        let mut report = BatchReport::new(BatchKind::Save, "Global");
        report.visited = 3;
        report.written = 1;
        report.clean = 2;
        report.commit_error = Some(StoreError::Backend("flash busy".to_string()));

        assert_eq!(
            report.to_string(),
            "save 'Global': 3 cells, 1 written, 0 loaded, 2 clean, 0 failed, \
             commit failed: Backend error: flash busy"
        );
    }
}
