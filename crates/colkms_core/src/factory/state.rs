//! Per-operation lifecycle.

use crate::error::{KmsError, KmsResult};
use std::fmt;

/// Where a file operation is in its key lifecycle.
///
/// ```text
/// Uninitialized -> PlanValidated -> KeysResolved -> Finalized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationState {
    /// Nothing has been checked yet.
    Uninitialized,
    /// The plan (or key metadata on read) has been validated.
    PlanValidated,
    /// Every role's data key is available.
    KeysResolved,
    /// The operation is complete. Terminal.
    Finalized,
}

impl OperationState {
    /// The state that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::PlanValidated),
            Self::PlanValidated => Some(Self::KeysResolved),
            Self::KeysResolved => Some(Self::Finalized),
            Self::Finalized => None,
        }
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::PlanValidated => "plan-validated",
            Self::KeysResolved => "keys-resolved",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Kind of file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Writing a file.
    Write,
    /// Reading a file.
    Read,
}

/// Tracks one file write or read through [`OperationState`].
///
/// Each transition checks the current state, so no step can be skipped
/// and a finalized operation cannot be reused.
#[derive(Debug)]
pub struct KeyOperation {
    kind: OperationKind,
    state: OperationState,
}

impl KeyOperation {
    /// Starts an operation in [`OperationState::Uninitialized`].
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            state: OperationState::Uninitialized,
        }
    }

    /// The operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Marks the plan as validated.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] unless the operation is uninitialized.
    pub fn plan_validated(&mut self) -> KmsResult<()> {
        self.advance(OperationState::Uninitialized)
    }

    /// Marks every role key as resolved.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] unless the plan has been validated.
    pub fn keys_resolved(&mut self) -> KmsResult<()> {
        self.advance(OperationState::PlanValidated)
    }

    /// Marks the operation as finished.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] unless the keys have been resolved.
    pub fn finalize(&mut self) -> KmsResult<()> {
        self.advance(OperationState::KeysResolved)
    }

    /// Fails unless the operation is in `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] on mismatch.
    pub fn ensure(&self, expected: OperationState) -> KmsResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(KmsError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn advance(&mut self, from: OperationState) -> KmsResult<()> {
        self.ensure(from)?;
        if let Some(next) = from.next() {
            self.state = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut op = KeyOperation::new(OperationKind::Write);
        assert_eq!(op.state(), OperationState::Uninitialized);

        op.plan_validated().unwrap();
        op.keys_resolved().unwrap();
        op.finalize().unwrap();
        assert!(op.state().is_terminal());
    }

    #[test]
    fn cannot_skip_validation() {
        let mut op = KeyOperation::new(OperationKind::Read);
        let err = op.keys_resolved().unwrap_err();
        assert!(matches!(
            err,
            KmsError::InvalidState {
                expected: OperationState::PlanValidated,
                actual: OperationState::Uninitialized,
            }
        ));
        assert_eq!(op.state(), OperationState::Uninitialized);
    }

    #[test]
    fn finalized_is_terminal() {
        let mut op = KeyOperation::new(OperationKind::Write);
        op.plan_validated().unwrap();
        op.keys_resolved().unwrap();
        op.finalize().unwrap();

        assert!(op.finalize().is_err());
        assert!(op.plan_validated().is_err());
        assert_eq!(op.state(), OperationState::Finalized);
    }
}
