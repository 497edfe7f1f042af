/// Authentication endpoints
///
/// - `POST /auth/register` - Register a new user and get tokens
/// - `POST /auth/login` - Login and get tokens
/// - `POST /auth/refresh` - Exchange a refresh token for a new access token
/// - `GET /user` - The authenticated user
///
/// Tokens are stateless; there is no server-side logout.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, OrFail},
    extract::{required, ValidJson},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        jwt::{self, TokenPair, TokenType},
        middleware::AuthContext,
        password,
    },
    models::user::{CreateUser, User},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "The name field is required."),
        length(min = 1, max = 255, message = "The name may not be greater than 255 characters.")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "The email field is required."),
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email may not be greater than 255 characters.")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "The password field is required."),
        length(min = 8, message = "The password must be at least 8 characters.")
    )]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required(message = "The email field is required."))]
    pub email: Option<String>,

    #[validate(required(message = "The password field is required."))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(required(message = "The refresh token field is required."))]
    pub refresh_token: Option<String>,
}

/// `data` of register and login responses
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct RefreshPayload {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Register a new user
///
/// # Errors
///
/// - `422`: Validation failed
/// - `409`: The e-mail is already registered
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    let name = required(req.name, "name")?;
    let email = required(req.email, "email")?;
    let password = required(req.password, "password")?;

    let password_hash = password::hash_password(&password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            name,
            email: email.trim().to_string(),
            password_hash,
        },
    )
    .await
    .or_fail("Failed to register user")?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = user.id, "User registered");
    Ok(ApiResponse::created(AuthPayload { user, tokens }).with_message("User registered successfully"))
}

/// Login with e-mail and password
///
/// # Errors
///
/// - `422`: Validation failed
/// - `401`: Unknown e-mail or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    let email = required(req.email, "email")?;
    let password = required(req.password, "password")?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, email.trim())
        .await
        .or_fail("Failed to login")?
        .ok_or_else(invalid)?;

    if !password::verify_password(&password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id)
        .await
        .or_fail("Failed to login")?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(ApiResponse::ok(AuthPayload { user, tokens }).with_message("Login successful"))
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401`: Invalid or expired refresh token, or an access token was supplied
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshPayload>> {
    let refresh_token = required(req.refresh_token, "refresh_token")?;
    let access_token = jwt::refresh_access_token(&refresh_token, state.jwt_secret())?;

    Ok(ApiResponse::ok(RefreshPayload {
        access_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// The authenticated user
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await
        .or_fail("Failed to fetch user")?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(ApiResponse::ok(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;
    use taskboard_shared::auth::password::MIN_PASSWORD_LENGTH;

    fn register(name: Option<&str>, email: Option<&str>, password: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: name.map(String::from),
            email: email.map(String::from),
            password: password.map(String::from),
        }
    }

    #[test]
    fn test_register_validation() {
        let ok = register(Some("Ada"), Some("ada@example.com"), Some("correct-horse"));
        assert!(ok.validate().is_ok());

        let missing = register(None, None, None);
        let fields = FieldErrors::from(&missing.validate().unwrap_err());
        assert_eq!(fields.get("name"), Some(&["The name field is required.".to_string()][..]));
        assert!(fields.get("email").is_some());
        assert!(fields.get("password").is_some());
    }

    #[test]
    fn test_register_rejects_short_password_and_bad_email() {
        let short = "x".repeat(MIN_PASSWORD_LENGTH - 1);
        let req = register(Some("Ada"), Some("not-an-email"), Some(&short));
        let fields = FieldErrors::from(&req.validate().unwrap_err());

        assert_eq!(
            fields.get("password"),
            Some(&["The password must be at least 8 characters.".to_string()][..])
        );
        assert_eq!(
            fields.get("email"),
            Some(&["The email must be a valid email address.".to_string()][..])
        );
    }

    #[test]
    fn test_auth_payload_flattens_tokens() {
        let payload = AuthPayload {
            user: User {
                id: 1,
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "$argon2id$secret".into(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                last_login_at: None,
            },
            tokens: TokenPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
                token_type: "Bearer",
                expires_in: 86400,
            },
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
        assert_eq!(json["user"]["email"], "ada@example.com");
        assert!(json["user"].get("password_hash").is_none());
    }
}
