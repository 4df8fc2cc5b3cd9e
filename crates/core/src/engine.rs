//! Flow execution state machine.
//!
//! Pure transition logic for flow executions: which status changes are
//! legal, what each transition stamps on the record, and the rule that a
//! terminal record carries exactly one of result or error. Persistence and
//! webhook traffic belong to the callers; nothing here performs I/O, so
//! every transition is deterministic and unit-testable.

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::execution::{ExecutionId, ExecutionStatus, FlowExecution, Intent};

/// Errors raised when a status change would break the state machine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: ExecutionStatus, to: ExecutionStatus },
}

/// Pure state machine for flow executions.
///
/// Legal transitions: `pending -> running` before an outbound call,
/// `running -> success | error` after it, `pending -> success` for intents
/// resolved locally, and `pending -> error` for dispatch defects. Terminal
/// records reject every further transition.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowEngine;

impl FlowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Mint a new execution in `pending` with a fresh identity.
    pub fn create_execution(
        &self,
        intent: Intent,
        params: Map<String, Value>,
        source_text: impl Into<String>,
    ) -> FlowExecution {
        let now = Utc::now();
        FlowExecution {
            id: ExecutionId(Uuid::new_v4().to_string()),
            intent,
            params,
            source_text: source_text.into(),
            status: ExecutionStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move `pending -> running`. Callers persist the record before the
    /// outbound call so a crash mid-call stays observable as `running`.
    pub fn begin(&self, mut execution: FlowExecution) -> Result<FlowExecution, TransitionError> {
        Self::validate_transition(&execution, ExecutionStatus::Running)?;

        execution.status = ExecutionStatus::Running;
        execution.updated_at = Utc::now();
        Ok(execution)
    }

    /// Terminal success. Stores the result and guarantees no stale error
    /// survives on the record.
    pub fn complete(
        &self,
        mut execution: FlowExecution,
        result: Value,
    ) -> Result<FlowExecution, TransitionError> {
        Self::validate_transition(&execution, ExecutionStatus::Success)?;

        execution.status = ExecutionStatus::Success;
        execution.result = Some(result);
        execution.error = None;
        execution.updated_at = Utc::now();
        Ok(execution)
    }

    /// Terminal failure with a caller-facing message.
    pub fn fail(
        &self,
        mut execution: FlowExecution,
        message: impl Into<String>,
    ) -> Result<FlowExecution, TransitionError> {
        Self::validate_transition(&execution, ExecutionStatus::Error)?;

        execution.status = ExecutionStatus::Error;
        execution.error = Some(message.into());
        execution.result = None;
        execution.updated_at = Utc::now();
        Ok(execution)
    }

    fn validate_transition(
        execution: &FlowExecution,
        to: ExecutionStatus,
    ) -> Result<(), TransitionError> {
        use ExecutionStatus::{Error, Pending, Running, Success};

        let legal = matches!(
            (execution.status, to),
            (Pending, Running)
                | (Pending, Success)
                | (Pending, Error)
                | (Running, Success)
                | (Running, Error)
        );

        if legal {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from: execution.status, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::{FlowEngine, TransitionError};
    use crate::domain::execution::{ExecutionStatus, Intent};

    fn engine() -> FlowEngine {
        FlowEngine::new()
    }

    fn note_params() -> Map<String, serde_json::Value> {
        let mut params = Map::new();
        params.insert("tekst".to_string(), json!("melk kopen"));
        params
    }

    #[test]
    fn create_execution_starts_pending_without_outcome() {
        let execution =
            engine().create_execution(Intent::Aantekening, note_params(), "melk kopen");

        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(execution.result.is_none());
        assert!(execution.error.is_none());
        assert!(!execution.id.0.is_empty());
        assert_eq!(execution.created_at, execution.updated_at);
    }

    #[test]
    fn create_execution_mints_distinct_identities() {
        let first = engine().create_execution(Intent::Aantekening, Map::new(), "a");
        let second = engine().create_execution(Intent::Aantekening, Map::new(), "b");

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn begin_moves_pending_to_running() {
        let execution = engine().create_execution(Intent::Whatsapp, Map::new(), "stuur een appje");

        let running = engine().begin(execution).expect("begin");

        assert_eq!(running.status, ExecutionStatus::Running);
        assert!(running.result.is_none());
        assert!(running.error.is_none());
    }

    #[test]
    fn complete_from_running_sets_result_only() {
        let execution = engine().create_execution(Intent::Whatsapp, Map::new(), "stuur een appje");
        let running = engine().begin(execution).expect("begin");

        let done = engine().complete(running, json!({"delivered": true})).expect("complete");

        assert_eq!(done.status, ExecutionStatus::Success);
        assert_eq!(done.result, Some(json!({"delivered": true})));
        assert!(done.error.is_none());
        assert!(done.updated_at >= done.created_at);
    }

    #[test]
    fn complete_from_pending_covers_local_intents() {
        let execution =
            engine().create_execution(Intent::Aantekening, note_params(), "melk kopen");

        let done = engine().complete(execution, json!({"saved": true})).expect("complete");

        assert_eq!(done.status, ExecutionStatus::Success);
        assert_eq!(done.result, Some(json!({"saved": true})));
        assert!(done.error.is_none());
    }

    #[test]
    fn fail_from_running_sets_error_only() {
        let execution = engine().create_execution(Intent::Artikel, Map::new(), "schrijf iets");
        let running = engine().begin(execution).expect("begin");

        let failed = engine().fail(running, "webhook onbereikbaar").expect("fail");

        assert_eq!(failed.status, ExecutionStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("webhook onbereikbaar"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn fail_from_pending_covers_dispatch_defects() {
        let execution = engine().create_execution(Intent::Artikel, Map::new(), "schrijf iets");

        let failed = engine().fail(execution, "configuratiefout").expect("fail");

        assert_eq!(failed.status, ExecutionStatus::Error);
        assert!(failed.result.is_none());
    }

    #[test]
    fn terminal_records_reject_every_transition() {
        let succeeded = engine()
            .complete(
                engine().create_execution(Intent::Aantekening, Map::new(), "klaar"),
                json!({"saved": true}),
            )
            .expect("complete");

        assert!(matches!(
            engine().begin(succeeded.clone()),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            engine().fail(succeeded.clone(), "te laat"),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            engine().complete(succeeded, json!({})),
            Err(TransitionError::InvalidTransition { .. })
        ));

        let failed = engine()
            .fail(engine().create_execution(Intent::Whatsapp, Map::new(), "mislukt"), "kapot")
            .expect("fail");

        assert!(matches!(
            engine().complete(failed, json!({})),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn running_cannot_restart() {
        let execution = engine().create_execution(Intent::Whatsapp, Map::new(), "nog een keer");
        let running = engine().begin(execution).expect("begin");

        let error = engine().begin(running).expect_err("second begin must fail");

        assert_eq!(
            error,
            TransitionError::InvalidTransition {
                from: ExecutionStatus::Running,
                to: ExecutionStatus::Running,
            }
        );
    }

    #[test]
    fn result_and_error_stay_mutually_exclusive() {
        let succeeded = engine()
            .complete(
                engine().create_execution(Intent::Aantekening, Map::new(), "notitie"),
                json!({"saved": true}),
            )
            .expect("complete");
        assert!(succeeded.result.is_some() && succeeded.error.is_none());

        let failed = engine()
            .fail(
                engine()
                    .begin(engine().create_execution(Intent::Whatsapp, Map::new(), "appje"))
                    .expect("begin"),
                "timeout",
            )
            .expect("fail");
        assert!(failed.error.is_some() && failed.result.is_none());
    }
}
