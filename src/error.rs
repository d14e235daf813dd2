//! Domain error types

use thiserror::Error;

/// Every constraint a patient input violated, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .violations.join(" | "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    /// Number of violated constraints
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}
