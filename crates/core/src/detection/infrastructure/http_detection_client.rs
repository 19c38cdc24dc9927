use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::detection::domain::detection_service::{
    DetectionError, DetectionParams, DetectionService,
};
use crate::shared::captured_frame::CapturedFrame;
use crate::shared::client_config::ClientConfig;
use crate::shared::constants::{
    DETECT_AND_ANNOTATE_ENDPOINT, DETECT_ENDPOINT, HEALTH_ENDPOINT, UNKNOWN_ERROR_MESSAGE,
};
use crate::shared::detection_result::DetectionResult;
use crate::shared::server_status::ServerStatus;

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    error: Option<String>,
}

/// [`DetectionService`] over the service's REST API.
pub struct HttpDetectionClient {
    client: Client,
    config: ClientConfig,
}

impl HttpDetectionClient {
    pub fn new(config: ClientConfig) -> Result<Self, DetectionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DetectionError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn post(
        &self,
        endpoint: &str,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<Response, DetectionError> {
        let url = self.config.url(endpoint);
        log::debug!(
            "POST {url} ({} bytes, confidence {})",
            frame.data().len(),
            params.confidence
        );
        let response = self
            .client
            .post(&url)
            .multipart(build_form(frame, params)?)
            .send()
            .map_err(|e| DetectionError::Network(e.to_string()))?;
        check_status(response)
    }
}

fn build_form(frame: &CapturedFrame, params: &DetectionParams) -> Result<Form, DetectionError> {
    let image = Part::bytes(frame.data().to_vec())
        .file_name(frame.file_name().to_string())
        .mime_str(frame.mime_type())
        .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

    let mut form = Form::new()
        .part("image", image)
        .text("confidence", params.confidence.to_string());
    if params.emotions {
        form = form.text("emotions", "true");
    }
    if params.age {
        form = form.text("age", "true");
    }
    Ok(form)
}

fn check_status(response: Response) -> Result<Response, DetectionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().ok();
    Err(DetectionError::Service {
        status: status.as_u16(),
        message: error_message(status, body.as_deref()),
    })
}

/// Message for a failed response: the body's `error` field when present,
/// the status line when the body is JSON without one, and a generic message
/// when the body cannot be parsed at all.
fn error_message(status: StatusCode, body: Option<&[u8]>) -> String {
    match body.and_then(|b| serde_json::from_slice::<ApiError>(b).ok()) {
        None => UNKNOWN_ERROR_MESSAGE.to_string(),
        Some(ApiError {
            error: Some(message),
        }) if !message.is_empty() => message,
        Some(_) => format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ),
    }
}

impl DetectionService for HttpDetectionClient {
    fn detect(
        &self,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<DetectionResult, DetectionError> {
        let response = self.post(DETECT_ENDPOINT, frame, params)?;
        let result: DetectionResult = response
            .json()
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        for violation in result.violations() {
            log::warn!("Detection service returned inconsistent data: {violation}");
        }
        log::debug!(
            "Detected {} face(s) in {:.3}s",
            result.face_count,
            result.processing_time
        );
        Ok(result)
    }

    fn detect_and_annotate(
        &self,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<Vec<u8>, DetectionError> {
        let response = self.post(DETECT_AND_ANNOTATE_ENDPOINT, frame, params)?;
        let bytes = response
            .bytes()
            .map_err(|e| DetectionError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn health(&self) -> ServerStatus {
        let url = self.config.url(HEALTH_ENDPOINT);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Health check failed: {e}");
                return ServerStatus::unhealthy(e.to_string());
            }
        };
        let response = match check_status(response) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Health check failed: {e}");
                return ServerStatus::unhealthy(e.to_string());
            }
        };
        response.json::<ServerStatus>().unwrap_or_else(|e| {
            log::warn!("Unparseable health response: {e}");
            ServerStatus::unhealthy(format!("invalid health response: {e}"))
        })
    }
}
