/// User preference endpoints
///
/// - `GET    /user/preferences` - Every preference as a `key: value` map
/// - `POST   /user/preferences` - Set one (`{key, value}`) or many (`{preferences: [...]}`)
/// - `GET    /user/preferences/:key` - One preference
/// - `PUT    /user/preferences/:key` - Set one preference by path
/// - `DELETE /user/preferences/:key` - Remove one preference
///
/// The `theme` key answers with a bare `{"theme": ...}` object instead of the
/// envelope, and only `PUT` restricts it to `light`, `dark` or `auto`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, OrFail},
    extract::{required, ApiJson, ValidJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::preference::{PreferenceValue, Theme, UserPreference, THEME_KEY},
};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PreferenceEntry {
    #[validate(
        required(message = "The key field is required."),
        length(min = 1, max = 255, message = "The key may not be greater than 255 characters.")
    )]
    pub key: Option<String>,

    /// `null` counts as missing
    #[validate(required(message = "The value field is required."))]
    pub value: Option<JsonValue>,
}

impl PreferenceEntry {
    fn into_pair(self) -> ApiResult<(String, PreferenceValue)> {
        let key = required(self.key, "key")?;
        let value = PreferenceValue::from_json(required(self.value, "value")?)?;
        Ok((key, value))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreferenceBatch {
    #[validate(
        length(min = 1, message = "The preferences field is required."),
        nested
    )]
    pub preferences: Vec<PreferenceEntry>,
}

/// Body of `POST /user/preferences`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StorePreferencesRequest {
    Bulk(PreferenceBatch),
    Single(PreferenceEntry),
}

impl Validate for StorePreferencesRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::Bulk(batch) => batch.validate(),
            Self::Single(entry) => entry.validate(),
        }
    }
}

impl StorePreferencesRequest {
    fn into_pairs(self) -> ApiResult<Vec<(String, PreferenceValue)>> {
        match self {
            Self::Bulk(batch) => batch.preferences.into_iter().map(PreferenceEntry::into_pair).collect(),
            Self::Single(entry) => Ok(vec![entry.into_pair()?]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferenceRequest {
    /// Only read for the `theme` key
    pub theme: Option<JsonValue>,
    pub value: Option<JsonValue>,
}

impl UpdatePreferenceRequest {
    /// `theme`, then `value`, then `light`
    fn theme(self) -> ApiResult<Theme> {
        let Some(raw) = self.theme.or(self.value) else {
            return Ok(Theme::default());
        };

        raw.as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ApiError::invalid("theme", "Theme must be light, dark, or auto"))
    }
}

#[derive(Debug, Serialize)]
pub struct ThemeBody {
    pub theme: Option<PreferenceValue>,
}

#[derive(Debug, Serialize)]
pub struct PreferenceBody {
    pub key: String,
    pub value: Option<PreferenceValue>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<BTreeMap<String, PreferenceValue>>> {
    let preferences = UserPreference::get_all(&state.db, auth.user_id)
        .await
        .or_fail("Failed to fetch preferences")?;

    Ok(ApiResponse::ok(preferences))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let value = UserPreference::get(&state.db, auth.user_id, &key)
        .await
        .or_fail("Failed to fetch preference")?;

    if key == THEME_KEY {
        return Ok(Json(ThemeBody { theme: value }).into_response());
    }

    Ok(ApiResponse::ok(PreferenceBody { key, value }).into_response())
}

/// Set one or many preferences
///
/// A batch is written in one transaction. Storage failures are reported as
/// a 422 under `preferences`.
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<StorePreferencesRequest>,
) -> ApiResult<ApiResponse<()>> {
    let pairs = req.into_pairs()?;

    let result = match pairs.as_slice() {
        [(key, value)] => UserPreference::set(&state.db, auth.user_id, key, value).await,
        _ => UserPreference::set_many(&state.db, auth.user_id, &pairs).await,
    };

    if let Err(e) = result {
        tracing::warn!(user_id = auth.user_id, error = %e, "Preference update failed");
        return Err(ApiError::invalid("preferences", format!("Failed to update preferences: {e}")));
    }

    Ok(ApiResponse::message("Preferences updated successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
    ApiJson(req): ApiJson<UpdatePreferenceRequest>,
) -> ApiResult<Response> {
    if key == THEME_KEY {
        let theme = req.theme()?;
        let value = PreferenceValue::from(theme.as_str());

        UserPreference::set(&state.db, auth.user_id, THEME_KEY, &value)
            .await
            .or_fail("Failed to update preference")?;

        return Ok(Json(ThemeBody { theme: Some(value) }).into_response());
    }

    let value = PreferenceValue::from_json(required(req.value, "value")?)?;

    UserPreference::set(&state.db, auth.user_id, &key, &value)
        .await
        .or_fail("Failed to update preference")?;

    Ok(ApiResponse::ok(PreferenceBody { key, value: Some(value) })
        .with_message("Preference updated successfully")
        .into_response())
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let removed = UserPreference::delete(&state.db, auth.user_id, &key)
        .await
        .or_fail("Failed to delete preference")?;

    if !removed {
        return Err(ApiError::not_found("Preference not found"));
    }

    Ok(ApiResponse::message("Preference deleted successfully"))
}
