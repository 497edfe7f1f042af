/// Project membership endpoints
///
/// - `GET  /projects/:project/members` - List members
/// - `POST /projects/:project/members` - Add members or change their role
///
/// Reading needs ownership, any membership, or an assigned task. Adding
/// needs ownership or an `owner`/`admin` membership; a caller who can see
/// the project but lacks that role gets 403 rather than 404.

use crate::{
    app::AppState,
    error::{ApiResult, FieldErrors, OrFail},
    extract::{project_uuid, required, ValidJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use std::borrow::Cow;
use taskboard_shared::{
    auth::{
        middleware::AuthContext,
        scope::{resolve_member_manager, resolve_project, ScopeRule},
    },
    models::{
        member::{ProjectMember, ProjectRole},
        task::ParseEnumError,
        user::User,
    },
};
use validator::{Validate, ValidationError};

fn assignable_role(value: &str) -> Result<(), ValidationError> {
    match value.parse::<ProjectRole>() {
        Ok(role) if role.is_assignable() => Ok(()),
        _ => Err(ValidationError::new("in")
            .with_message(Cow::Owned(ParseEnumError::new("role", value).to_string()))),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMembersRequest {
    #[validate(
        required(message = "The user ids field is required."),
        length(min = 1, message = "The user ids field is required.")
    )]
    pub user_ids: Option<Vec<i64>>,

    /// `member` (default) or `admin`
    #[validate(custom(function = "assignable_role"))]
    pub role: Option<String>,
}

impl AddMembersRequest {
    fn role(&self) -> ApiResult<ProjectRole> {
        match self.role.as_deref() {
            Some(raw) => Ok(raw.parse()?),
            None => Ok(ProjectRole::Member),
        }
    }
}

/// Flags every id in `requested` that is not in `existing` as `user_ids.N`
fn unknown_user_errors(requested: &[i64], existing: &[i64]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (index, id) in requested.iter().enumerate() {
        if !existing.contains(id) {
            errors.add(
                format!("user_ids.{index}"),
                format!("The selected user_ids.{index} is invalid."),
            );
        }
    }
    errors
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
) -> ApiResult<ApiResponse<Vec<ProjectMember>>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::MemberRead).await?;

    let members = ProjectMember::list_by_project(&state.db, project.id)
        .await
        .or_fail("Failed to fetch members")?;

    Ok(ApiResponse::ok(members))
}

/// Add users to the project with one role
///
/// Existing members get the new role; the owner's row is never changed.
///
/// # Errors
///
/// - `404`: Project not visible to the caller
/// - `403`: Visible, but the caller is not owner or admin
/// - `422`: Empty list, unknown user id or role outside `member`/`admin`
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ValidJson(req): ValidJson<AddMembersRequest>,
) -> ApiResult<ApiResponse<Vec<ProjectMember>>> {
    let project = resolve_member_manager(&state.db, project_uuid(&project)?, auth.actor()).await?;

    let role = req.role()?;
    let user_ids = required(req.user_ids, "user_ids")?;

    let existing = User::existing_ids(&state.db, &user_ids)
        .await
        .or_fail("Failed to add members")?;
    unknown_user_errors(&user_ids, &existing).into_result()?;

    ProjectMember::upsert_many(&state.db, project.id, &user_ids, role)
        .await
        .or_fail("Failed to add members")?;

    let members = ProjectMember::list_by_project(&state.db, project.id)
        .await
        .or_fail("Failed to add members")?;

    Ok(ApiResponse::created(members).with_message("Members added successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_defaults_to_member() {
        let req: AddMembersRequest = serde_json::from_value(json!({"user_ids": [2]})).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.role().unwrap(), ProjectRole::Member);
    }

    #[test]
    fn test_owner_role_cannot_be_granted() {
        let req: AddMembersRequest =
            serde_json::from_value(json!({"user_ids": [2], "role": "owner"})).unwrap();
        let errors = FieldErrors::from(&req.validate().unwrap_err());

        assert_eq!(errors.get("role"), Some(&["The selected role is invalid.".to_string()][..]));
    }

    #[test]
    fn test_empty_user_list_is_rejected() {
        let req: AddMembersRequest = serde_json::from_value(json!({"user_ids": []})).unwrap();
        let errors = FieldErrors::from(&req.validate().unwrap_err());

        assert!(errors.get("user_ids").is_some());
    }

    #[test]
    fn test_unknown_user_errors_use_indexed_paths() {
        let errors = unknown_user_errors(&[4, 99, 5, 100], &[4, 5]);

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("user_ids.1"),
            Some(&["The selected user_ids.1 is invalid.".to_string()][..])
        );
        assert!(errors.get("user_ids.3").is_some());
        assert!(unknown_user_errors(&[4], &[4]).is_empty());
    }
}
