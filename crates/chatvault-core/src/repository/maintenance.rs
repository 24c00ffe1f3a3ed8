//! Whole-store maintenance operations.

use chatvault_types::error::RepositoryError;

/// Outcome of a store integrity check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Problems reported by the storage engine. Empty when healthy.
    pub problems: Vec<String>,
    /// Whether foreign-key enforcement is active on the writer.
    pub foreign_keys_enabled: bool,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty() && self.foreign_keys_enabled
    }
}

/// Repository trait for operations spanning every table.
pub trait MaintenanceRepository: Send + Sync {
    /// Delete every session and message, then reclaim free space.
    ///
    /// Space reclamation is best-effort: its failure is logged and does not
    /// fail the call once the deletes have committed.
    fn clear_all_tables(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Run the storage engine's consistency and foreign-key checks.
    fn integrity_check(
        &self,
    ) -> impl std::future::Future<Output = Result<IntegrityReport, RepositoryError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_requires_foreign_keys() {
        let report = IntegrityReport {
            problems: Vec::new(),
            foreign_keys_enabled: false,
        };
        assert!(!report.is_healthy());

        let report = IntegrityReport {
            problems: Vec::new(),
            foreign_keys_enabled: true,
        };
        assert!(report.is_healthy());
    }
}
