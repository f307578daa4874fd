//! Error and report types for reconciliation runs.

use srv6_locator::LocatorError;
use srv6_sidtable::SidTableError;
use srv6_types::{Ipv6Prefix, Sid};
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors surfaced by a reconciliation run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    Table(#[from] SidTableError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("speaker request failed: {0}")]
    Speaker(String),
}

impl ReconcileError {
    /// Returns true if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Table(e) => e.is_retryable(),
            ReconcileError::Locator(_) => false,
            ReconcileError::Speaker(_) => false,
        }
    }
}

/// The operation that failed for one desired binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedOp {
    /// Upsert of a binding into the table.
    Bind { sid: Sid },
    /// Delete of a binding from the table.
    Unbind { sid: Sid },
    /// SID allocation for a locally originated prefix.
    Allocate { prefix: Ipv6Prefix },
    /// Route advertisement to the speaker.
    Advertise { prefix: Ipv6Prefix },
    /// Route withdrawal from the speaker.
    Withdraw { prefix: Ipv6Prefix },
}

/// One desired binding that could not be applied this run.
///
/// Failures never abort the rest of the batch and are never rolled back;
/// the reconciler's tracked state omits them, so the next trigger retries
/// exactly the failed subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFailure {
    pub op: FailedOp,
    pub error: ReconcileError,
}

/// Outcome of one reconciliation pass.
///
/// A run with a non-empty `failures` list is the partial-failure case: it
/// completed, applied everything else, and left the failed keys eligible
/// for the next trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Bindings inserted or overwritten.
    pub upserted: usize,
    /// Bindings deleted.
    pub deleted: usize,
    /// Route advertisements emitted.
    pub advertised: usize,
    /// Route withdrawals emitted.
    pub withdrawn: usize,
    /// Per-binding failures.
    pub failures: Vec<BindingFailure>,
}

impl ReconcileReport {
    /// True if every desired operation applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of table mutations this run issued successfully.
    pub fn mutations(&self) -> usize {
        self.upserted + self.deleted
    }

    pub fn fail(&mut self, op: FailedOp, error: ReconcileError) {
        self.failures.push(BindingFailure { op, error });
    }

    /// Folds another report (e.g. the export half of a domain run) into
    /// this one.
    pub fn merge(&mut self, other: ReconcileReport) {
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.advertised += other.advertised;
        self.withdrawn += other.withdrawn;
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_merge() {
        let mut a = ReconcileReport {
            upserted: 1,
            deleted: 2,
            ..Default::default()
        };
        let mut b = ReconcileReport::default();
        b.fail(
            FailedOp::Bind {
                sid: "fd00::1".parse().unwrap(),
            },
            ReconcileError::Table(SidTableError::transient("store")),
        );

        a.merge(b);
        assert_eq!(a.mutations(), 3);
        assert!(!a.is_clean());
        assert_eq!(a.failures.len(), 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ReconcileError::Table(SidTableError::transient("store")).is_retryable());
        assert!(!ReconcileError::Table(SidTableError::NotFound).is_retryable());
        assert!(!ReconcileError::Speaker("session down".into()).is_retryable());
    }
}
