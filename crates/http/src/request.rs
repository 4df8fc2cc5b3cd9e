use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::CallError;

/// Issue one JSON POST and classify the outcome into [`CallError`].
///
/// A successful response body is parsed as JSON; bodies that are not valid
/// JSON are preserved as a JSON string value instead of failing the call.
pub async fn post_json(
    client: &Client,
    url: &str,
    body: &Value,
    timeout: Duration,
) -> Result<Value, CallError> {
    let response = client
        .post(url)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|source| CallError::Transport { url: url.to_string(), source })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| CallError::Transport { url: url.to_string(), source })?;

    if !status.is_success() {
        return Err(CallError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
