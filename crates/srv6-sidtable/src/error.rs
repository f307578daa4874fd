//! Error types for binding table operations.

use thiserror::Error;

/// Result type alias for binding table operations.
pub type SidTableResult<T> = Result<T, SidTableError>;

/// Errors that can occur while operating on the SID binding table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SidTableError {
    /// The requested SID has no entry in the table.
    #[error("SID not found in binding table")]
    NotFound,

    /// A new key was inserted while the table already held `capacity`
    /// entries. Overwrites of existing keys never hit this.
    #[error("binding table full ({capacity} entries)")]
    CapacityExceeded { capacity: u32 },

    /// The underlying store call failed transiently and may succeed on
    /// retry.
    #[error("transient store failure during {operation}")]
    Transient { operation: String },

    /// No table is registered under the given name; only valid before the
    /// first install. Fatal at startup.
    #[error("failed to attach to binding table '{name}': not registered")]
    Attach { name: String },

    /// The table could not be created. Fatal at startup.
    #[error("failed to create binding table '{name}': {reason}")]
    Create { name: String, reason: String },
}

impl SidTableError {
    pub fn transient(operation: impl Into<String>) -> Self {
        SidTableError::Transient {
            operation: operation.into(),
        }
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SidTableError::Transient { .. })
    }

    /// Returns true if this error must abort agent startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SidTableError::Attach { .. } | SidTableError::Create { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SidTableError::CapacityExceeded { capacity: 16384 };
        assert_eq!(err.to_string(), "binding table full (16384 entries)");
    }

    #[test]
    fn test_classification() {
        assert!(SidTableError::transient("update").is_retryable());
        assert!(!SidTableError::NotFound.is_retryable());

        assert!(SidTableError::Attach {
            name: "srv6_sid".into()
        }
        .is_fatal());
        assert!(!SidTableError::NotFound.is_fatal());
    }
}
