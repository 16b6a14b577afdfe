//! Shared runtime used by both the interpreter and VM backends.
//!
//! Operator semantics, builtins and I/O live here once so that the two
//! execution paths cannot drift apart.
pub mod builtins;
pub mod io;
pub mod ops;
pub mod value;

pub use builtins::BuiltinFunction;
pub use io::{InputStream, Io, Output};
pub use ops::OpError;
pub use value::{Number, Value};

/// Resource limits applied to a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub max_steps: Option<u64>,
}

impl ExecutionLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_steps(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }
}

/// Counts execution steps against an optional ceiling.
#[derive(Debug, Clone)]
pub(crate) struct StepBudget {
    limit: Option<u64>,
    taken: u64,
}

impl StepBudget {
    pub(crate) fn new(limits: ExecutionLimits) -> Self {
        Self {
            limit: limits.max_steps,
            taken: 0,
        }
    }

    /// Records one step; fails with the configured limit once it is exceeded.
    pub(crate) fn tick(&mut self) -> Result<(), u64> {
        self.taken += 1;
        match self.limit {
            Some(limit) if self.taken > limit => Err(limit),
            _ => Ok(()),
        }
    }

    pub(crate) fn taken(&self) -> u64 {
        self.taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_fails_after_limit() {
        let mut budget = StepBudget::new(ExecutionLimits::with_max_steps(2));
        assert_eq!(budget.tick(), Ok(()));
        assert_eq!(budget.tick(), Ok(()));
        assert_eq!(budget.tick(), Err(2));
        assert_eq!(budget.taken(), 3);
    }

    #[test]
    fn unlimited_budget_never_fails() {
        let mut budget = StepBudget::new(ExecutionLimits::unlimited());
        for _ in 0..10_000 {
            assert!(budget.tick().is_ok());
        }
    }
}
