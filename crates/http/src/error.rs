use thiserror::Error;

/// Splits call failures into transient ones (worth retrying) and permanent
/// ones (surfaced to the caller on the first attempt).
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Outcome classification for one outbound HTTP call.
///
/// `Transport` covers everything that happens before a response is received:
/// timeouts, refused connections, DNS failures. `Status` carries the
/// upstream's own verdict, with the body preserved so callers can surface it.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

impl CallError {
    /// The upstream status code, when a response was received at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::Status { status, .. } => Some(*status),
        }
    }
}

impl Retryable for CallError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallError, Retryable};

    fn status_error(status: u16) -> CallError {
        CallError::Status {
            url: "http://n8n:5678/webhook/flow-whatsapp".to_string(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status_error(500).is_transient());
        assert!(status_error(503).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!status_error(400).is_transient());
        assert!(!status_error(404).is_transient());
        assert!(!status_error(499).is_transient());
    }

    #[test]
    fn status_accessor_reports_upstream_code() {
        assert_eq!(status_error(404).status(), Some(404));
    }
}
