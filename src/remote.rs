//! Client side of the remote effect service.
//!
//! The service takes the source as a multipart upload on
//! `POST /process-audio` and answers with paths to the processed audio.
//! Paths may be relative; [`resolve_url`] makes them absolute.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RemoteError;

/// One upload to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub audio: Arc<[u8]>,
    pub mime: String,
    /// Name of the multipart file field, e.g. `input.webm`.
    pub file_name: String,
    pub effect: &'static str,
    pub delay_seconds: f64,
    pub repeat: u32,
    pub noise_filter: bool,
}

/// Success body of `POST /process-audio`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub waveform_url: Option<String>,
    #[serde(default)]
    pub raw_audio_url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

#[async_trait(?Send)]
pub trait RemoteEffectService {
    async fn process(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

/// Prefix a service-relative path with the base URL. Absolute URLs pass
/// through unchanged.
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("blob:") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Build the error for a non-success response, preferring the message the
/// service put in its JSON body.
pub fn error_from_body(status: u16, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.detail))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    RemoteError::with_status(status, message)
}

#[cfg(feature = "remote")]
pub use http::HttpEffectService;

#[cfg(feature = "remote")]
mod http {
    use log::{debug, error, info};
    use reqwest::multipart::{Form, Part};

    use super::*;

    /// [`RemoteEffectService`] over HTTP.
    #[derive(Debug, Clone)]
    pub struct HttpEffectService {
        client: reqwest::Client,
        base_url: String,
    }

    impl HttpEffectService {
        pub fn new(base_url: impl Into<String>) -> Self {
            HttpEffectService {
                client: reqwest::Client::new(),
                base_url: base_url.into(),
            }
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        fn form(request: &RemoteRequest) -> Result<Form, RemoteError> {
            let file = Part::bytes(request.audio.to_vec())
                .file_name(request.file_name.clone())
                .mime_str(&request.mime)
                .map_err(|e| RemoteError::new(format!("Invalid mime type: {e}")))?;
            Ok(Form::new()
                .part("file", file)
                .text("effect", request.effect)
                .text("delay", request.delay_seconds.to_string())
                .text("repeat", request.repeat.to_string())
                .text("enable_filter", request.noise_filter.to_string()))
        }
    }

    #[async_trait(?Send)]
    impl RemoteEffectService for HttpEffectService {
        async fn process(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            let url = resolve_url(&self.base_url, "/process-audio");
            info!(
                "POST {url}: effect {}, {} bytes as {}",
                request.effect,
                request.audio.len(),
                request.file_name
            );

            let response = self
                .client
                .post(&url)
                .multipart(Self::form(request)?)
                .send()
                .await
                .map_err(|e| {
                    error!("request to {url} failed: {e}");
                    RemoteError::new(format!("Request failed: {e}"))
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| RemoteError::with_status(status.as_u16(), format!("Failed to read response: {e}")))?;
            debug!("response {status}: {}", body.chars().take(200).collect::<String>());

            if !status.is_success() {
                let err = error_from_body(status.as_u16(), &body);
                error!("{err}");
                return Err(err);
            }

            serde_json::from_str(&body)
                .map_err(|e| RemoteError::with_status(status.as_u16(), format!("Failed to parse JSON: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_get_the_base() {
        let base = "http://localhost:8000";
        assert_eq!(
            resolve_url(base, "/static/out.wav"),
            "http://localhost:8000/static/out.wav"
        );
        assert_eq!(
            resolve_url("http://localhost:8000/", "static/out.wav"),
            "http://localhost:8000/static/out.wav"
        );
        assert_eq!(
            resolve_url(base, "https://cdn.example.com/a.wav"),
            "https://cdn.example.com/a.wav"
        );
    }

    #[test]
    fn error_message_prefers_json_body() {
        let err = error_from_body(500, r#"{"error": "ffmpeg failed"}"#);
        assert_eq!(err.status, Some(500));
        assert_eq!(err.message, "ffmpeg failed");

        let err = error_from_body(422, r#"{"detail": "effect missing"}"#);
        assert_eq!(err.message, "effect missing");

        assert_eq!(error_from_body(502, "Bad Gateway").message, "Bad Gateway");
        assert_eq!(error_from_body(503, "").message, "HTTP 503");
    }

    #[test]
    fn response_fields_are_optional() {
        let resp: RemoteResponse = serde_json::from_str(r#"{"audio_url": "/static/a.wav"}"#).unwrap();
        assert_eq!(resp.audio_url, "/static/a.wav");
        assert!(resp.waveform_url.is_none());

        let resp: RemoteResponse = serde_json::from_str(
            r#"{"audio_url": "/a.wav", "waveform_url": "/w.png", "raw_audio_url": "/r.wav"}"#,
        )
        .unwrap();
        assert_eq!(resp.raw_audio_url.as_deref(), Some("/r.wav"));
    }
}
