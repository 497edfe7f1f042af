/// Request extractors
///
/// [`ApiJson`] is `axum::Json` with rejections rendered through [`ApiError`]
/// (422 under `body`). [`ValidJson`] additionally runs the `validator`
/// derive before the handler sees the value. [`ApiQuery`] does the same for
/// query strings (422 under `query`).

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// JSON body that passed validation
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Unwraps a field that validation already marked as required
pub fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::invalid(field, format!("The {} field is required.", field.replace('_', " "))))
}

/// Parses a project path segment; anything that is not a UUID cannot exist
pub fn project_uuid(segment: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(segment).map_err(|_| ApiError::not_found("Project not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"description": "x"}"#).unwrap();

        assert_eq!(absent.description, None);
        assert_eq!(null.description, Some(None));
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_required() {
        assert_eq!(required(Some(3), "story_points").unwrap(), 3);

        let err = required::<i32>(None, "story_points").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Validation failed: 1 fields");
    }

    #[test]
    fn test_project_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(project_uuid(&uuid.to_string()).unwrap(), uuid);
        assert!(project_uuid("42").is_err());
    }
}
