//! Outbound-call primitives shared by every downstream dependency.
//!
//! Three pieces: [`CallError`] classifies a failed call as transient or
//! permanent, [`RetryPolicy`] wraps a unit of work with bounded exponential
//! backoff, and [`post_json`] issues a single classified JSON POST. The
//! retry policy carries no knowledge of which service it is calling; call
//! sites compose it explicitly.

pub mod error;
pub mod request;
pub mod retry;

pub use error::{CallError, Retryable};
pub use request::post_json;
pub use retry::RetryPolicy;
