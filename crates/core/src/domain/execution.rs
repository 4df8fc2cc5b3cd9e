use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter key that always carries the transcript for catch-all notes.
pub const TEXT_PARAM: &str = "tekst";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of intents a transcript can resolve to.
///
/// Parameter contract per intent (keys inside the params object; the
/// automation backend owns semantic validation of its own payloads):
/// - `whatsapp`: `contact` (recipient name), `bericht` (message body).
/// - `artikel`: `onderwerp` (topic), optionally `brontekst` (source text).
/// - `aantekening`: `tekst` (the note itself). Catch-all for anything the
///   classifier cannot place with confidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Whatsapp,
    Artikel,
    Aantekening,
}

/// How an intent is carried out once its execution is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Resolved in-process with a trivial result, no outbound call.
    Local,
    /// Forwarded to the automation backend at the given webhook path.
    Webhook { path: &'static str },
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Artikel => "artikel",
            Self::Aantekening => "aantekening",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Some(Self::Whatsapp),
            "artikel" => Some(Self::Artikel),
            "aantekening" => Some(Self::Aantekening),
            _ => None,
        }
    }

    /// The safe default when classification is unreliable.
    pub fn catch_all() -> Self {
        Self::Aantekening
    }

    /// Exhaustive intent routing. Adding a variant without extending this
    /// match is a compile error, so an intent can never lack a route.
    pub fn dispatch(&self) -> Dispatch {
        match self {
            Self::Whatsapp => Dispatch::Webhook { path: "/webhook/flow-whatsapp" },
            Self::Artikel => Dispatch::Webhook { path: "/webhook/flow-artikel" },
            Self::Aantekening => Dispatch::Local,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// One persisted attempt to act on a classified intent.
///
/// `result` is set iff the status is `success`, `error` iff the status is
/// `error`; transitions in [`crate::engine::FlowEngine`] keep the two
/// mutually exclusive. Records are never deleted by this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowExecution {
    pub id: ExecutionId,
    pub intent: Intent,
    pub params: Map<String, Value>,
    pub source_text: String,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
