use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backends::{SettingsError, UnknownBackend};
use crate::utils::ManagerError;

#[derive(Debug, Deserialize)]
pub struct CreateContextRequest {
    pub name: String,
    #[serde(alias = "service")]
    pub backend: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Flat settings map; defaults when absent
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendPromptRequest {
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct CopyContextRequest {
    pub source_name: String,
    pub new_name: String,
    #[serde(default)]
    pub num_messages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleAutosaveRequest {
    /// Set explicitly instead of flipping
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    pub context_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GameTurnRequest {
    pub context_name: String,
    #[serde(default)]
    pub user_input: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(default, alias = "service")]
    pub backend: Option<String>,
}

/// Why a request did not produce a success body
#[derive(Debug)]
pub enum ApiFailure {
    /// The request itself was malformed
    BadRequest(String),
    /// The operation ran and was refused
    Operation(ManagerError),
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        match self {
            ApiFailure::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            // Operation outcomes are reported in the body, not the status
            ApiFailure::Operation(err) => (
                StatusCode::OK,
                Json(json!({
                    "success": false,
                    "message": err.to_string(),
                    "code": err.code(),
                })),
            )
                .into_response(),
        }
    }
}

impl From<ManagerError> for ApiFailure {
    fn from(err: ManagerError) -> Self {
        ApiFailure::Operation(err)
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        ApiFailure::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiFailure {
    fn from(rejection: QueryRejection) -> Self {
        ApiFailure::BadRequest(rejection.body_text())
    }
}

impl From<UnknownBackend> for ApiFailure {
    fn from(err: UnknownBackend) -> Self {
        ApiFailure::BadRequest(err.to_string())
    }
}

impl From<SettingsError> for ApiFailure {
    fn from(err: SettingsError) -> Self {
        ApiFailure::BadRequest(err.to_string())
    }
}

pub type ApiResult = Result<Json<Value>, ApiFailure>;

/// `{success: true, ...fields}` plus `warning` when one is set
pub fn success(fields: Value, warning: Option<String>) -> Json<Value> {
    let mut body = json!({ "success": true });
    if let (Value::Object(body), Value::Object(fields)) = (&mut body, fields) {
        body.extend(fields);
        if let Some(warning) = warning {
            body.insert("warning".to_string(), Value::String(warning));
        }
    }
    Json(body)
}
