//! Shared HTTP plumbing for the adapters.
//!
//! Everything that turns a `reqwest` outcome into one of the provider
//! `ErrorKind`s lives here, so the mapping is identical across backends.

use super::ProviderConfig;
use anoncodex_error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in error messages
const BODY_PREVIEW: usize = 512;

pub(crate) fn build_client(config: &ProviderConfig, operation: &'static str) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| {
            Error::config_invalid("failed to create HTTP client")
                .with_operation(operation)
                .set_source(e)
        })
}

/// Send a request and decode a JSON body of type `T`
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    operation: &'static str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, operation))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, operation))?;

    debug!(operation, status, bytes = body.len(), "provider response");

    if !(200..300).contains(&status) {
        return Err(status_error(status, &body).with_operation(operation));
    }

    serde_json::from_str(&body).map_err(|e| {
        Error::bad_response(format!("malformed response body: {}", e))
            .with_operation(operation)
            .with_context("body", preview(&body))
            .set_source(e)
    })
}

/// GET `url` and require a 2xx answer within `timeout`
pub(crate) async fn probe(
    client: &Client,
    url: &str,
    timeout: Duration,
    operation: &'static str,
) -> Result<()> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            Error::unreachable(format!("no response from {}: {}", url, e))
                .with_operation(operation)
                .with_context("url", url)
                .set_source(e)
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::unreachable(format!("probe {} returned {}", url, status))
            .with_operation(operation)
            .with_context("url", url));
    }
    Ok(())
}

/// Map a transport-level failure (nothing usable came back)
pub(crate) fn transport_error(err: reqwest::Error, operation: &'static str) -> Error {
    let error = if err.is_timeout() {
        Error::unreachable(format!("request timed out: {}", err))
    } else if err.is_connect() || err.is_request() {
        Error::unreachable(format!("connection failed: {}", err))
    } else if err.is_decode() || err.is_body() {
        Error::bad_response(format!("could not read response: {}", err))
    } else {
        Error::unknown(err.to_string())
    };
    error.with_operation(operation).set_source(err)
}

/// Map a non-2xx HTTP status to a provider error kind
pub(crate) fn status_error(status: u16, body: &str) -> Error {
    let detail = format!("HTTP {}: {}", status, preview(body));
    let error = match status {
        401 | 403 => Error::auth_failed(detail),
        // Gemini reports a bad key as a 400
        400 if body.contains("API_KEY_INVALID") => Error::auth_failed(detail),
        429 => Error::rate_limited(detail),
        408 | 500..=599 => Error::unreachable(detail),
        _ => Error::unknown(detail),
    };
    error.with_context("status", status.to_string())
}

/// Text fields are mandatory in every envelope; an empty string is fine
pub(crate) fn require_text(text: Option<String>, operation: &'static str) -> Result<String> {
    text.ok_or_else(|| {
        Error::bad_response("response carried no text content").with_operation(operation)
    })
}

fn preview(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_PREVIEW {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
