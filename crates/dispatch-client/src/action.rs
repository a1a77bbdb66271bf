//! Lifecycle of one operator action.
//!
//! ```text
//! Idle ─▶ Submitting ─┬─▶ OptimisticApplied ─▶ Reconciling ─┬─▶ Settled
//!                     └─▶ Rejected ─────────────────────────┘
//! ```
//!
//! Every phase an action passes through is kept, so callers and tests can
//! see whether an action ever touched the mirror before its reload landed.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Scan,
    Unscan,
    Return,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Scan => "scan",
            ActionKind::Unscan => "unscan",
            ActionKind::Return => "return",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    OptimisticApplied,
    Reconciling,
    Rejected,
    Settled,
}

impl Phase {
    fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Submitting)
                | (Phase::Submitting, Phase::OptimisticApplied)
                | (Phase::Submitting, Phase::Rejected)
                | (Phase::OptimisticApplied, Phase::Reconciling)
                | (Phase::Reconciling, Phase::Settled)
                | (Phase::Rejected, Phase::Settled)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} action for {barcode:?} cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub kind: ActionKind,
    pub barcode: String,
    pub from: Phase,
    pub to: Phase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    kind: ActionKind,
    barcode: String,
    history: Vec<Phase>,
}

impl PendingAction {
    pub fn new(kind: ActionKind, barcode: &str) -> Self {
        Self {
            kind,
            barcode: barcode.to_string(),
            history: vec![Phase::Idle],
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn phase(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn submit(&mut self) -> Result<(), TransitionError> {
        self.advance(Phase::Submitting)
    }

    pub fn apply_optimistic(&mut self) -> Result<(), TransitionError> {
        self.advance(Phase::OptimisticApplied)
    }

    pub fn begin_reconcile(&mut self) -> Result<(), TransitionError> {
        self.advance(Phase::Reconciling)
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        self.advance(Phase::Rejected)
    }

    pub fn settle(&mut self) -> Result<(), TransitionError> {
        self.advance(Phase::Settled)
    }

    /// An illegal move leaves the phase unchanged.
    fn advance(&mut self, to: Phase) -> Result<(), TransitionError> {
        let from = self.phase();
        if !from.can_advance_to(to) {
            return Err(TransitionError {
                kind: self.kind,
                barcode: self.barcode.clone(),
                from,
                to,
            });
        }
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_path() {
        let mut action = PendingAction::new(ActionKind::Scan, "A100");
        action.submit().unwrap();
        action.apply_optimistic().unwrap();
        action.begin_reconcile().unwrap();
        action.settle().unwrap();
        assert_eq!(
            action.history(),
            &[
                Phase::Idle,
                Phase::Submitting,
                Phase::OptimisticApplied,
                Phase::Reconciling,
                Phase::Settled
            ]
        );
    }

    #[test]
    fn rejected_path_skips_reconcile() {
        let mut action = PendingAction::new(ActionKind::Unscan, "A100");
        action.submit().unwrap();
        action.reject().unwrap();
        action.settle().unwrap();
        assert_eq!(action.phase(), Phase::Settled);
        assert!(!action.history().contains(&Phase::Reconciling));
    }

    #[test]
    fn illegal_move_is_reported_and_ignored() {
        let mut action = PendingAction::new(ActionKind::Scan, "A100");
        let err = action.apply_optimistic().unwrap_err();
        assert_eq!(err.from, Phase::Idle);
        assert_eq!(err.to, Phase::OptimisticApplied);
        assert_eq!(action.phase(), Phase::Idle);

        action.submit().unwrap();
        action.reject().unwrap();
        assert!(action.begin_reconcile().is_err());
        assert!(action.submit().is_err());
        assert_eq!(action.phase(), Phase::Rejected);
    }

    #[test]
    fn settled_is_terminal() {
        let mut action = PendingAction::new(ActionKind::Return, "R1");
        action.submit().unwrap();
        action.reject().unwrap();
        action.settle().unwrap();
        for next in [
            Phase::Idle,
            Phase::Submitting,
            Phase::OptimisticApplied,
            Phase::Reconciling,
            Phase::Rejected,
            Phase::Settled,
        ] {
            assert!(!Phase::Settled.can_advance_to(next));
        }
    }

    #[test]
    fn error_message_names_the_action() {
        let mut action = PendingAction::new(ActionKind::Scan, "A100");
        let err = action.settle().unwrap_err();
        assert_eq!(
            err.to_string(),
            "scan action for \"A100\" cannot move from Idle to Settled"
        );
    }
}
