use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::config::normalize_base_url;

pub(crate) fn build_http_client(timeout: Duration, headers: &[(&str, &str)]) -> Result<HttpClient> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        default_headers.insert(
            HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name}"))?,
            HeaderValue::from_str(value).with_context(|| format!("invalid header value for {name}"))?,
        );
    }
    HttpClient::builder()
        .timeout(timeout)
        .default_headers(default_headers)
        .build()
        .context("failed to build HTTP client")
}

pub(crate) fn endpoint(api_base: &str, path: &str) -> Result<String> {
    let base = normalize_base_url(api_base);
    if base.is_empty() {
        bail!("Please provide the backend API URL before starting.");
    }
    Ok(format!("{}/{}", base, path.trim_start_matches('/')))
}

/// Turns a response into JSON, or into an error whose message comes from the
/// body's `error_field`. Bodies that do not parse fall back to the status
/// reason; parsed bodies without the field fall back to `fallback`.
pub(crate) fn response_json_or_error(
    response: HttpResponse,
    error_field: &str,
    fallback: &str,
) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{fallback} (response body read failed)"))?;
    if !status.is_success() {
        let message = match serde_json::from_str::<Value>(&body) {
            Ok(parsed) => parsed
                .get(error_field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            Err(_) => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
        };
        bail!("{message}");
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).with_context(|| format!("{fallback} (invalid JSON payload)"))
}

pub(crate) fn required_str(payload: &Value, field: &str, fallback: &str) -> Result<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("{fallback} (response missing `{field}`)"))
}

/// Flattens an error chain into one line for an error slot.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Context};
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() -> Result<()> {
        assert_eq!(
            endpoint("https://abc.ngrok.app/", "/step4_get_suggestions")?,
            "https://abc.ngrok.app/step4_get_suggestions"
        );
        assert!(endpoint("   ", "step4_get_suggestions").is_err());
        Ok(())
    }

    #[test]
    fn required_str_reports_missing_field() {
        let err = required_str(&json!({"other": 1}), "story", "Failed to generate story.")
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "Failed to generate story. (response missing `story`)");
    }

    #[test]
    fn error_chain_text_joins_and_dedupes() {
        let err = Err::<(), _>(anyhow!("operation timed out"))
            .context("error sending request")
            .context("error sending request")
            .context("Failed to generate mask.")
            .err()
            .unwrap_or_else(|| anyhow!("unreachable"));
        assert_eq!(
            error_chain_text(&err, 512),
            "Failed to generate mask. | caused by: error sending request | caused by: operation timed out"
        );
        assert_eq!(error_chain_text(&err, 6), "Failed…");
    }
}
