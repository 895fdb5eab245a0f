//! HTTP client for the remote transform and pattern services.
//!
//! The services own pattern inference and text substitution; this client
//! only speaks their wire contract:
//!
//! | Call                  | Endpoint                     | Returns               |
//! |-----------------------|------------------------------|-----------------------|
//! | [`TransformClient::get_results`]       | `POST /api/getResults/`      | [`ResponseEnvelope`]  |
//! | [`TransformClient::infer_pattern`]     | `POST /api/nlToRegex/`       | [`PatternDescriptor`] |
//! | [`TransformClient::preview_transform`] | `POST /api/previewTransform/`| [`PreviewResult`]     |
//!
//! Failures are reported once; retrying is up to the caller.

use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::{Settings, SIDE_CHANNEL_KEYS};
use crate::envelope::ResponseEnvelope;
use crate::error::{RemoteCallError, RemoteResult};
use crate::models::{PatternDescriptor, PreviewResult, Row};
use crate::parser::UploadedFile;

const GET_RESULTS: &str = "getResults";
const INFER_PATTERN: &str = "nlToRegex";
const PREVIEW_TRANSFORM: &str = "previewTransform";

/// Body of a pattern-inference request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRequest {
    pub prompt: String,
    /// Column ids of the uploaded table.
    pub schema: Vec<String>,
    /// A few rows as `column id -> value` objects.
    pub sample: Vec<Map<String, Value>>,
}

impl PatternRequest {
    pub fn new(prompt: impl Into<String>, schema: Vec<String>, rows: &[Row]) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            sample: rows.iter().map(row_to_object).collect(),
        }
    }
}

/// Body of a preview-transform request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub file_id: String,
    pub pattern: String,
    pub flags: String,
    pub replacement: String,
    pub target_columns: BTreeSet<String>,
}

impl PreviewRequest {
    pub fn new(file_id: impl Into<String>, descriptor: &PatternDescriptor) -> Self {
        Self {
            file_id: file_id.into(),
            pattern: descriptor.pattern.clone(),
            flags: descriptor.flags.clone(),
            replacement: descriptor.replacement.clone(),
            target_columns: descriptor.target_columns.clone(),
        }
    }
}

/// `{ "error": "..." }` body carried by non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Client for the remote transform service.
#[derive(Debug, Clone)]
pub struct TransformClient {
    http: reqwest::Client,
    api_base: String,
}

impl TransformClient {
    /// Create a client for `settings.api_base` with the configured timeout.
    pub fn new(settings: &Settings) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|source| RemoteCallError::Transport {
                operation: "client setup".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/api/{}/", self.api_base, operation)
    }

    /// Upload the original file with a prompt; returns the raw envelope.
    pub async fn get_results(&self, file: &UploadedFile, prompt: &str) -> RemoteResult<ResponseEnvelope> {
        tracing::info!(file = %file.name, bytes = file.bytes.len(), "requesting processed file");

        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let form = Form::new().part("file", part).text("prompt", prompt.to_string());

        let response = self
            .http
            .post(self.endpoint(GET_RESULTS))
            .multipart(form)
            .send()
            .await
            .map_err(|source| transport(GET_RESULTS, source))?;

        let response = ensure_success(GET_RESULTS, response).await?;
        envelope_from_response(response).await
    }

    /// Ask the inference service for a pattern over `schema`, showing it `sample`.
    pub async fn infer_pattern(
        &self,
        prompt: &str,
        schema: &[String],
        sample: &[Row],
    ) -> RemoteResult<PatternDescriptor> {
        let request = PatternRequest::new(prompt, schema.to_vec(), sample);
        self.send_pattern_request(&request).await
    }

    /// Same as [`infer_pattern`](Self::infer_pattern) with a prebuilt body.
    pub async fn send_pattern_request(&self, request: &PatternRequest) -> RemoteResult<PatternDescriptor> {
        tracing::info!(columns = request.schema.len(), sample = request.sample.len(), "requesting pattern");
        self.post_json(INFER_PATTERN, request).await
    }

    /// Ask for a transformed sample with per-column match counts.
    pub async fn preview_transform(
        &self,
        file_id: &str,
        descriptor: &PatternDescriptor,
    ) -> RemoteResult<PreviewResult> {
        let request = PreviewRequest::new(file_id, descriptor);
        tracing::info!(file_id = %request.file_id, "requesting preview");
        self.post_json(PREVIEW_TRANSFORM, &request).await
    }

    async fn post_json<B, T>(&self, operation: &str, body: &B) -> RemoteResult<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(operation))
            .json(body)
            .send()
            .await
            .map_err(|source| transport(operation, source))?;

        let response = ensure_success(operation, response).await?;
        let text = response.text().await.map_err(|source| transport(operation, source))?;

        serde_json::from_str(&text).map_err(|e| RemoteCallError::InvalidBody {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

fn transport(operation: &str, source: reqwest::Error) -> RemoteCallError {
    RemoteCallError::Transport {
        operation: operation.to_string(),
        source,
    }
}

/// Turn a non-success response into [`RemoteCallError::Status`].
async fn ensure_success(operation: &str, response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty());

    tracing::warn!(operation, status = status.as_u16(), ?message, "remote call failed");
    Err(RemoteCallError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

async fn envelope_from_response(response: Response) -> RemoteResult<ResponseEnvelope> {
    let headers = response.headers();
    // Values may carry non-ASCII JSON; read bytes rather than `to_str`.
    let header_text = |name: &str| {
        headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    };

    let content_disposition = header_text(CONTENT_DISPOSITION.as_str());
    let side_channel = SIDE_CHANNEL_KEYS
        .iter()
        .map(|key| (key.to_string(), header_text(key)))
        .collect();

    let payload = response
        .bytes()
        .await
        .map_err(|source| transport(GET_RESULTS, source))?
        .to_vec();

    Ok(ResponseEnvelope {
        payload,
        content_disposition,
        side_channel,
    })
}

fn row_to_object(row: &Row) -> Map<String, Value> {
    row.iter()
        .map(|(k, v)| (k.to_string(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MATCH_STATS_HEADER, REGEX_INFO_HEADER};
    use crate::models::CellValue;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_stub(router: Router) -> TransformClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let settings = Settings::default().with_api_base(&format!("http://{addr}"));
        TransformClient::new(&settings).unwrap()
    }

    async fn processed(mut multipart: Multipart) -> (StatusCode, [(&'static str, String); 4], Vec<u8>) {
        let mut prompt = String::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("prompt") {
                prompt = field.text().await.unwrap();
            }
        }
        (
            StatusCode::OK,
            [
                ("content-disposition", r#"attachment; filename="processed.csv""#.to_string()),
                ("x-regex-info", json!({"target_columns": ["Email"], "by_column": {}}).to_string()),
                ("x-match-stats", r#"{\n"Email":2}"#.to_string()),
                ("x-echo-prompt", prompt),
            ],
            b"Name,Email\nJohn,REDACTED\nJane,REDACTED\n".to_vec(),
        )
    }

    #[tokio::test]
    async fn test_get_results_builds_envelope() {
        let client = spawn_stub(Router::new().route("/api/getResults/", post(processed))).await;
        let file = UploadedFile::new("people.csv", b"Name,Email\nJohn,j@x.com\n".to_vec());

        let envelope = client.get_results(&file, "redact emails").await.unwrap();

        assert_eq!(
            envelope.content_disposition.as_deref(),
            Some(r#"attachment; filename="processed.csv""#)
        );
        assert!(envelope.side_channel[REGEX_INFO_HEADER].is_some());
        assert_eq!(
            envelope.side_channel[MATCH_STATS_HEADER].as_deref(),
            Some(r#"{\n"Email":2}"#)
        );
        assert!(envelope.payload.starts_with(b"Name,Email"));
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced_with_status() {
        let router = Router::new().route(
            "/api/getResults/",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": "No file uploaded"}))) }),
        );
        let client = spawn_stub(router).await;

        let err = client
            .get_results(&UploadedFile::new("a.csv", Vec::new()), "x")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "getResults failed (400): No file uploaded");
    }

    #[tokio::test]
    async fn test_error_without_json_body() {
        let router = Router::new().route(
            "/api/nlToRegex/",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = spawn_stub(router).await;

        let err = client.infer_pattern("x", &["Email".to_string()], &[]).await.unwrap_err();
        assert!(matches!(err, RemoteCallError::Status { status: 500, message: None, .. }));
    }

    #[tokio::test]
    async fn test_infer_pattern_roundtrip() {
        let router = Router::new().route(
            "/api/nlToRegex/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["schema"], json!(["Name", "Email"]));
                assert_eq!(body["sample"][0]["Email"], "john@x.com");
                Json(json!({
                    "targetColumns": ["Email"],
                    "pattern": "[^@]+@\\S+",
                    "flags": "i",
                    "replacement": "REDACTED",
                    "global": true
                }))
            }),
        );
        let client = spawn_stub(router).await;

        let row = Row::new(
            1,
            vec![
                ("Name".into(), CellValue::from("John")),
                ("Email".into(), CellValue::from("john@x.com")),
            ],
        );
        let schema = vec!["Name".to_string(), "Email".to_string()];
        let descriptor = client.infer_pattern("redact emails", &schema, &[row]).await.unwrap();

        assert_eq!(descriptor.replacement, "REDACTED");
        assert!(descriptor.apply_globally);
    }

    #[tokio::test]
    async fn test_preview_invalid_body() {
        let router = Router::new().route("/api/previewTransform/", post(|| async { "not json" }));
        let client = spawn_stub(router).await;

        let err = client
            .preview_transform("file-1", &PatternDescriptor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteCallError::InvalidBody { .. }));
    }

    #[test]
    fn test_preview_request_wire_names() {
        let descriptor = PatternDescriptor {
            target_columns: ["Email".to_string()].into_iter().collect(),
            pattern: "@".into(),
            ..PatternDescriptor::default()
        };
        let value = serde_json::to_value(PreviewRequest::new("f1", &descriptor)).unwrap();
        assert_eq!(value["fileId"], "f1");
        assert_eq!(value["targetColumns"], json!(["Email"]));
    }
}
