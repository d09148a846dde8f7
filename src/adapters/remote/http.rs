//! HTTP client for the remote semantic detection service

use crate::config::{RemoteConfig, ResponseFormat, SecretString};
use crate::detection::annotation::spans_from_annotated;
use crate::detection::{Detector, DetectorKind, PiiCategory, PiiSpan};
use crate::domain::{DetectorError, MaskError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
struct DetectRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct DetectResponse {
    results: Vec<DetectResult>,
}

#[derive(Deserialize)]
struct DetectResult {
    #[serde(default)]
    spans: Option<Vec<WireSpan>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireSpan {
    category: String,
    start: usize,
    end: usize,
}

/// Remote semantic detector over HTTP
///
/// Sends one `POST` per chunk with body `{"texts": [...]}` and expects one
/// result per text, either as byte-offset spans or as annotated text
/// depending on [`ResponseFormat`]. Every failure is classified as
/// [`DetectorError::Transient`] or [`DetectorError::Permanent`].
pub struct HttpSemanticDetector {
    client: Client,
    endpoint: Url,
    api_key: Option<SecretString>,
    response_format: ResponseFormat,
}

impl HttpSemanticDetector {
    /// Create a new detector from the `[remote]` configuration section
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is missing or invalid, or
    /// if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            MaskError::Configuration("remote.endpoint is not configured".to_string())
        })?;
        let endpoint = Url::parse(endpoint).map_err(|e| {
            MaskError::Configuration(format!("Invalid remote.endpoint '{endpoint}': {e}"))
        })?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .build()
            .map_err(|e| MaskError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.expose_secret().is_empty()),
            response_format: config.response_format,
        })
    }

    /// Endpoint the detector posts to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn parse_response(
        &self,
        texts: &[String],
        body: &str,
    ) -> std::result::Result<Vec<Vec<PiiSpan>>, DetectorError> {
        let response: DetectResponse = serde_json::from_str(body)
            .map_err(|e| DetectorError::Transient(format!("malformed response body: {e}")))?;

        if response.results.len() != texts.len() {
            return Err(DetectorError::Transient(format!(
                "partial response: expected {} result(s), got {}",
                texts.len(),
                response.results.len()
            )));
        }

        response
            .results
            .into_iter()
            .zip(texts)
            .enumerate()
            .map(|(row_index, (result, text))| self.spans_for(row_index, text, result))
            .collect()
    }

    fn spans_for(
        &self,
        row_index: usize,
        text: &str,
        result: DetectResult,
    ) -> std::result::Result<Vec<PiiSpan>, DetectorError> {
        match self.response_format {
            ResponseFormat::Spans => spans_from_wire(row_index, text, result.spans),
            ResponseFormat::AnnotatedText => {
                let annotated = result.text.ok_or_else(|| {
                    DetectorError::Transient(format!("result {row_index} has no annotated text"))
                })?;
                spans_from_annotated(text, &annotated, row_index)
                    .map_err(|e| DetectorError::Transient(format!("result {row_index}: {e}")))
            }
        }
    }
}

fn spans_from_wire(
    row_index: usize,
    text: &str,
    spans: Option<Vec<WireSpan>>,
) -> std::result::Result<Vec<PiiSpan>, DetectorError> {
    let spans = spans.ok_or_else(|| {
        DetectorError::Transient(format!("result {row_index} has no spans"))
    })?;

    spans
        .into_iter()
        .map(|wire| {
            let category = PiiCategory::parse(&wire.category).unwrap_or(PiiCategory::Sensitive);
            let span = PiiSpan::new(row_index, category, wire.start, wire.end, DetectorKind::Remote);
            if span.is_empty() || !span.is_valid_for(text) {
                return Err(DetectorError::Transient(format!(
                    "result {row_index} has out-of-bounds span {}..{}",
                    wire.start, wire.end
                )));
            }
            Ok(span)
        })
        .collect()
}

/// Classifies a non-success HTTP status
///
/// Throttling, timeouts and server errors are transient; rejected requests
/// are permanent. Anything else is treated as transient.
pub fn classify_status(status: u16, body: &str) -> DetectorError {
    let message = format!("HTTP {status}: {}", truncate(body, 200));
    match status {
        408 | 429 | 500..=599 => DetectorError::Transient(message),
        400 | 401 | 403 | 404 | 413 | 415 | 422 => DetectorError::Permanent(message),
        _ => DetectorError::Transient(message),
    }
}

fn classify_transport(err: &reqwest::Error) -> DetectorError {
    if err.is_timeout() {
        DetectorError::Transient(format!("request timed out: {err}"))
    } else if err.is_connect() {
        DetectorError::Transient(format!("connection failed: {err}"))
    } else {
        DetectorError::Transient(format!("request failed: {err}"))
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Detector for HttpSemanticDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Remote
    }

    async fn detect(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<PiiSpan>>, DetectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(endpoint = %self.endpoint, batch_size = texts.len(), "Calling remote detector");

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&DetectRequest { texts });
        if let Some(key) = &self.api_key {
            let token: &str = key.expose_secret().as_ref();
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        self.parse_response(texts, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn detector(format: ResponseFormat) -> HttpSemanticDetector {
        let config = RemoteConfig {
            enabled: true,
            endpoint: Some("http://127.0.0.1:9/detect".to_string()),
            response_format: format,
            ..Default::default()
        };
        HttpSemanticDetector::new(&config).unwrap()
    }

    #[test_case(408, true ; "request timeout")]
    #[test_case(429, true ; "throttled")]
    #[test_case(500, true ; "internal error")]
    #[test_case(503, true ; "unavailable")]
    #[test_case(400, false ; "bad request")]
    #[test_case(401, false ; "unauthorized")]
    #[test_case(403, false ; "forbidden")]
    #[test_case(404, false ; "not found")]
    #[test_case(413, false ; "payload too large")]
    #[test_case(422, false ; "unprocessable")]
    #[test_case(409, true ; "unclassified conflict")]
    fn test_classify_status(status: u16, transient: bool) {
        assert_eq!(classify_status(status, "").is_transient(), transient);
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let config = RemoteConfig::default();
        assert!(matches!(
            HttpSemanticDetector::new(&config),
            Err(MaskError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_spans_response() {
        let d = detector(ResponseFormat::Spans);
        let texts = vec!["email: a@b.com".to_string(), "nothing".to_string()];
        let body = r#"{"results":[{"spans":[{"category":"EMAIL","start":7,"end":14}]},{"spans":[]}]}"#;

        let spans = d.parse_response(&texts, body).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0][0].category, PiiCategory::Email);
        assert_eq!(spans[0][0].source, DetectorKind::Remote);
        assert!(spans[1].is_empty());
    }

    #[test]
    fn test_count_mismatch_is_transient() {
        let d = detector(ResponseFormat::Spans);
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = d
            .parse_response(&texts, r#"{"results":[{"spans":[]}]}"#)
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_out_of_bounds_span_is_transient() {
        let d = detector(ResponseFormat::Spans);
        let texts = vec!["short".to_string()];
        let body = r#"{"results":[{"spans":[{"category":"NAME","start":2,"end":40}]}]}"#;
        assert!(d.parse_response(&texts, body).unwrap_err().is_transient());
    }

    #[test]
    fn test_parse_annotated_response() {
        let d = detector(ResponseFormat::AnnotatedText);
        let texts = vec!["card 4111111111111111".to_string()];
        let body = r#"{"results":[{"text":"card <PII_CREDIT_CARD>"}]}"#;

        let spans = d.parse_response(&texts, body).unwrap();
        assert_eq!(spans[0][0].category, PiiCategory::CreditCard);
        assert_eq!((spans[0][0].start, spans[0][0].end), (5, 21));
    }

    #[test]
    fn test_garbage_body_is_transient() {
        let d = detector(ResponseFormat::Spans);
        let texts = vec!["x".to_string()];
        assert!(d.parse_response(&texts, "<html>").unwrap_err().is_transient());
    }
}
