use crate::error::{IntakeError, Result};
use serde::Serialize;
use std::fmt;

/// Lifecycle of one submitted order.
///
/// `Received -> Validated -> AwaitingCapacity -> Processing -> Completed`,
/// with `Failed` reachable only from `Received` or `Validated`.
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Received,
    Validated,
    AwaitingCapacity,
    Processing,
    Completed,
    Failed,
}

impl SubmissionState {
    pub fn can_advance_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Failed)
                | (Validated, AwaitingCapacity)
                | (Validated, Failed)
                | (AwaitingCapacity, Processing)
                | (Processing, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionState::Completed | SubmissionState::Failed)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks the transitions a single order goes through.
#[derive(Debug, Clone)]
pub struct Submission {
    order_id: String,
    history: Vec<SubmissionState>,
}

impl Submission {
    pub fn received(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            history: vec![SubmissionState::Received],
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn state(&self) -> SubmissionState {
        // history always starts with Received
        self.history
            .last()
            .copied()
            .unwrap_or(SubmissionState::Received)
    }

    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    pub fn advance(&mut self, next: SubmissionState) -> Result<()> {
        let current = self.state();
        if !current.can_advance_to(next) {
            return Err(IntakeError::validation(format!(
                "order {}: illegal transition {current} -> {next}",
                self.order_id
            )));
        }
        tracing::debug!(order_id = %self.order_id, from = %current, to = %next, "Submission transition");
        self.history.push(next);
        Ok(())
    }
}
