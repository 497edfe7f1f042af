/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every error renders as the JSON envelope
///
/// ```json
/// { "success": false, "message": "Project not found" }
/// { "success": false, "errors": { "title": ["The title field is required."] } }
/// { "success": false, "message": "Failed to create task", "error": "<underlying fault>" }
/// ```
///
/// Visibility failures are reported as 404 so outsiders cannot probe for
/// existence. Server faults carry the underlying error text in `error`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use taskboard_shared::{
    auth::{jwt::JwtError, middleware::AuthError, password::PasswordError, scope::ScopeError},
    models::{preference::PreferenceError, task::ParseEnumError},
    transition::TransitionError,
};
use validator::{ValidationErrors, ValidationErrorsKind};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Field name to messages, rendered under `errors`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let field = wire_name(field);
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };

            match kind {
                ValidationErrorsKind::Field(list) => {
                    for err in list {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("The {} field is invalid.", field));
                        self.add(path.clone(), message);
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect(&path, inner),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.collect(&format!("{path}.{index}"), inner);
                    }
                }
            }
        }
    }
}

/// Request fields whose Rust name differs from the JSON key
const RENAMED_FIELDS: &[(&str, &str)] = &[("task_type", "type")];

/// The validator derive reports Rust field names; errors are keyed by what the client sent
fn wire_name(field: &str) -> &str {
    RENAMED_FIELDS
        .iter()
        .find(|&&(rust, _)| rust == field)
        .map_or(field, |&(_, wire)| wire)
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut fields = Self::new();
        fields.collect("", errors);
        fields
    }
}

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404, also used for resources outside the caller's scope
    NotFound(String),

    /// 409
    Conflict(String),

    /// 422
    Validation(FieldErrors),

    /// 500; `error` is the underlying fault text
    Internal { message: String, error: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }

    pub fn internal(message: impl Into<String>, error: impl fmt::Display) -> Self {
        ApiError::Internal {
            message: message.into(),
            error: error.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => write!(f, "{}", msg),
            ApiError::Validation(errors) => write!(f, "Validation failed: {} fields", errors.len()),
            ApiError::Internal { message, error } => write!(f, "{}: {}", message, error),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Validation(errors) => ErrorBody {
                success: false,
                message: None,
                errors: Some(errors),
                error: None,
            },
            ApiError::Internal { message, error } => {
                tracing::error!(%message, %error, "Request failed");
                ErrorBody {
                    success: false,
                    message: Some(message),
                    errors: None,
                    error: Some(error),
                }
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => ErrorBody {
                success: false,
                message: Some(msg),
                errors: None,
                error: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Replaces the message of a 500 with an operation-specific one
///
/// ```ignore
/// Task::create(&state.db, project.id, data).await.or_fail("Failed to create task")?;
/// ```
pub trait OrFail<T> {
    fn or_fail(self, message: &str) -> ApiResult<T>;
}

impl<T, E: Into<ApiError>> OrFail<T> for Result<T, E> {
    fn or_fail(self, message: &str) -> ApiResult<T> {
        self.map_err(|e| match e.into() {
            ApiError::Internal { error, .. } => ApiError::Internal {
                message: message.to_string(),
                error,
            },
            other => other,
        })
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(FieldErrors::from(&errors))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid("query", rejection.body_text())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                match db_err.constraint() {
                    Some(c) if c.contains("email") => {
                        ApiError::Conflict("The email has already been taken.".to_string())
                    }
                    _ => ApiError::Conflict("Resource already exists".to_string()),
                }
            }
            other => ApiError::internal("Database error", other),
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::NotFound => ApiError::not_found("Project not found"),
            ScopeError::Forbidden(msg) => ApiError::Forbidden(msg.to_string()),
            ScopeError::Database(e) => e.into(),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotInBacklog => ApiError::not_found("Task not found in backlog"),
            TransitionError::InvalidTarget(_) => {
                ApiError::invalid("status", "The selected status is invalid.")
            }
            TransitionError::AssignForbidden | TransitionError::ReassignForbidden => {
                ApiError::Forbidden(err.to_string())
            }
        }
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(err: ParseEnumError) -> Self {
        ApiError::invalid(err.field, err.to_string())
    }
}

impl From<PreferenceError> for ApiError {
    fn from(err: PreferenceError) -> Self {
        match err {
            PreferenceError::MissingValue => ApiError::invalid("value", err.to_string()),
            PreferenceError::Corrupt { .. } => ApiError::internal("Failed to read preference", err),
            PreferenceError::Database(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(_) => ApiError::internal("Failed to issue token", err),
            other => AuthError::from(other).into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal("Password operation failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use validator::Validate;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let (status, body) = body_json(ApiError::not_found("Project not found")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "message": "Project not found"}));
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let mut errors = FieldErrors::new();
        errors.add("title", "The title field is required.");
        errors.add("title", "The title may not be greater than 255 characters.");

        let (status, body) = body_json(ApiError::Validation(errors)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["title"].as_array().unwrap().len(), 2);
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_exposes_fault_text() {
        let err: ApiResult<()> = Err(ApiError::internal("Database error", "connection reset"));
        let err = err.or_fail("Failed to create task").unwrap_err();

        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to create task");
        assert_eq!(body["error"], "connection reset");
    }

    #[test]
    fn test_or_fail_keeps_client_errors() {
        let result: Result<(), ScopeError> = Err(ScopeError::NotFound);
        let err = result.or_fail("Failed to load project").unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(ApiError::from(ScopeError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ScopeError::Forbidden("Only project owner or admin can add members")).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::from(TransitionError::ReassignForbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(TransitionError::NotInBacklog).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(AuthError::MissingCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(JwtError::Expired).to_string(), "Token expired");
    }

    #[derive(Validate)]
    struct Typed {
        #[validate(length(min = 1, message = "The type field is required."))]
        task_type: String,
    }

    #[test]
    fn test_renamed_fields_use_json_key() {
        let typed = Typed { task_type: String::new() };
        let fields = FieldErrors::from(&typed.validate().unwrap_err());

        assert_eq!(fields.get("type"), Some(&["The type field is required.".to_string()][..]));
        assert!(fields.get("task_type").is_none());
    }

    #[derive(Validate)]
    struct Entry {
        #[validate(length(min = 1, message = "The key field is required."))]
        key: String,
    }

    #[derive(Validate)]
    struct Batch {
        #[validate(nested)]
        preferences: Vec<Entry>,
    }

    #[test]
    fn test_nested_validation_paths() {
        let batch = Batch {
            preferences: vec![
                Entry { key: "ok".into() },
                Entry { key: String::new() },
            ],
        };
        let fields = FieldErrors::from(&batch.validate().unwrap_err());

        assert_eq!(
            fields.get("preferences.1.key"),
            Some(&["The key field is required.".to_string()][..])
        );
        assert!(fields.get("preferences.0.key").is_none());
    }
}
