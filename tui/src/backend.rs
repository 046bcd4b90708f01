//! Client side of the generation backend.
//!
//! [`GenerationBackend`] is the seam the session runtime talks to; [`HttpBackend`] is the
//! `reqwest` implementation used in production, and tests substitute canned outcomes.

use std::future::Future;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::multipart::Part;
use serde::de::DeserializeOwned;
use studio_protocol::ErrorResponse;
use studio_protocol::GENERATE_PATH;
use studio_protocol::GenerateResponse;
use studio_protocol::IMAGES_FIELD;
use studio_protocol::OPTIMIZE_PROMPT_PATH;
use studio_protocol::OptimizePromptRequest;
use studio_protocol::OptimizePromptResponse;
use studio_protocol::PROMPT_FIELD;

use crate::attachments::GenerateForm;
use crate::version::IMAGE_STUDIO_VERSION;

/// Result of a request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome<T> {
    Success(T),
    /// Non-2xx status. `message` is the server's `error` field, when it sent one.
    Failed { status: u16, message: Option<String> },
}

impl<T> HttpOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HttpOutcome<U> {
        match self {
            HttpOutcome::Success(value) => HttpOutcome::Success(f(value)),
            HttpOutcome::Failed { status, message } => HttpOutcome::Failed { status, message },
        }
    }
}

/// The request never produced a usable answer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type GenerateResult = Result<HttpOutcome<GenerateResponse>, BackendError>;
pub type OptimizeResult = Result<HttpOutcome<OptimizePromptResponse>, BackendError>;

pub trait GenerationBackend: Send + Sync + 'static {
    fn generate(&self, form: GenerateForm) -> impl Future<Output = GenerateResult> + Send;

    fn optimize_prompt(
        &self,
        request: OptimizePromptRequest,
    ) -> impl Future<Output = OptimizeResult> + Send;
}

/// Interpret a response body according to its status.
///
/// A 2xx body must decode as `T`. Any other status yields [`HttpOutcome::Failed`] carrying the
/// server message when the body is an error object.
pub fn decode_response<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<HttpOutcome<T>, BackendError> {
    if (200..300).contains(&status) {
        return Ok(HttpOutcome::Success(serde_json::from_slice(body)?));
    }
    Ok(HttpOutcome::Failed {
        status,
        message: ErrorResponse::message_from_body(body),
    })
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(server_url: &url::Url, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder =
            reqwest::Client::builder().user_agent(format!("image-studio/{IMAGE_STUDIO_VERSION}"));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: server_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<HttpOutcome<T>, BackendError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let outcome = decode_response(status, &body);
        if let Ok(HttpOutcome::Failed { status, message }) = &outcome {
            tracing::warn!("backend answered {status}: {message:?}");
        }
        outcome
    }
}

fn multipart_form(form: GenerateForm) -> Result<Form, reqwest::Error> {
    let mut multipart = Form::new().text(PROMPT_FIELD, form.prompt);
    for image in form.images {
        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.mime_type)?;
        multipart = multipart.part(IMAGES_FIELD, part);
    }
    Ok(multipart)
}

impl GenerationBackend for HttpBackend {
    async fn generate(&self, form: GenerateForm) -> GenerateResult {
        tracing::debug!(
            "POST {GENERATE_PATH} with {} image part(s)",
            form.images.len()
        );
        let response = self
            .client
            .post(self.endpoint(GENERATE_PATH))
            .multipart(multipart_form(form)?)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn optimize_prompt(&self, request: OptimizePromptRequest) -> OptimizeResult {
        tracing::debug!("POST {OPTIMIZE_PROMPT_PATH}");
        let response = self
            .client
            .post(self.endpoint(OPTIMIZE_PROMPT_PATH))
            .json(&request)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn success_body_decodes() -> anyhow::Result<()> {
        let outcome: HttpOutcome<OptimizePromptResponse> = decode_response(
            200,
            br#"{"original_prompt":"x","optimized_prompt":"a detailed prompt about x"}"#,
        )?;
        assert_eq!(
            outcome,
            HttpOutcome::Success(OptimizePromptResponse {
                original_prompt: "x".to_string(),
                optimized_prompt: "a detailed prompt about x".to_string(),
            })
        );
        Ok(())
    }

    #[test]
    fn failure_status_carries_server_message() -> anyhow::Result<()> {
        let outcome: HttpOutcome<GenerateResponse> =
            decode_response(500, br#"{"error":"quota exceeded"}"#)?;
        assert_eq!(
            outcome,
            HttpOutcome::Failed {
                status: 500,
                message: Some("quota exceeded".to_string()),
            }
        );
        Ok(())
    }

    #[test]
    fn failure_status_with_unreadable_body_has_no_message() -> anyhow::Result<()> {
        let outcome: HttpOutcome<GenerateResponse> = decode_response(502, b"Bad Gateway")?;
        assert_eq!(
            outcome,
            HttpOutcome::Failed {
                status: 502,
                message: None,
            }
        );
        Ok(())
    }

    #[test]
    fn undecodable_success_body_is_an_error() {
        let result: Result<HttpOutcome<GenerateResponse>, _> = decode_response(200, b"<html>");
        let Err(err) = result else {
            panic!("expected a decode error");
        };
        assert!(err.to_string().starts_with("invalid response body: "));
    }

    #[test]
    fn endpoints_are_joined_without_double_slashes() -> anyhow::Result<()> {
        let backend = HttpBackend::new(&url::Url::parse("http://127.0.0.1:5000/")?, None)?;
        assert_eq!(
            backend.endpoint(GENERATE_PATH),
            "http://127.0.0.1:5000/generate"
        );

        let nested = HttpBackend::new(&url::Url::parse("http://example.test/studio/")?, None)?;
        assert_eq!(
            nested.endpoint(OPTIMIZE_PROMPT_PATH),
            "http://example.test/studio/optimize_prompt"
        );
        Ok(())
    }
}
