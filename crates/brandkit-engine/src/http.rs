use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

use crate::error::StudioError;

pub(crate) fn build_client(service: &str, timeout: Duration) -> Result<HttpClient, StudioError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| StudioError::transport(service, err))
}

pub(crate) fn response_json_or_error(
    service: &str,
    response: HttpResponse,
) -> Result<Value, StudioError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| StudioError::transport(service, err))?;
    if !status.is_success() {
        return Err(StudioError::Http {
            service: service.to_string(),
            code,
            body: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body)
        .map_err(|err| StudioError::invalid(service, format!("invalid JSON payload: {err}")))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
