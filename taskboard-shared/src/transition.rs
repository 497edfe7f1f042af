//! Task status and assignment rules
//!
//! Status is a flat set: a direct update may set any declared value. The
//! dedicated backlog move is stricter:
//!
//! ```text
//! backlog ──move──▶ todo
//! backlog ──move──▶ in_progress
//! ```
//!
//! `done` and `backlog` are never move targets, and a task not in `backlog`
//! cannot be moved. Only the project owner can hand a task to someone else;
//! a non-owner asking for reassignment during a move is ignored, not refused,
//! and so is an owner naming themselves.

use crate::auth::scope::Actor;
use crate::models::task::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Task is not in the backlog")]
    NotInBacklog,

    #[error("Tasks can only be moved from the backlog to todo or in_progress")]
    InvalidTarget(TaskStatus),

    #[error("Only project owner can assign tasks to other users")]
    AssignForbidden,

    #[error("Only project owner can reassign tasks")]
    ReassignForbidden,
}

/// Outcome of a validated backlog move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub status: TaskStatus,

    /// New assignee, or `None` to keep the current one
    pub assignee: Option<i64>,
}

/// Statuses a backlog move may target
pub fn is_move_target(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Todo | TaskStatus::InProgress)
}

/// Validates a move out of the backlog
///
/// # Errors
///
/// - `NotInBacklog` if `current` is anything but `backlog`
/// - `InvalidTarget` if `target` is `backlog` or `done`
pub fn plan_backlog_move(
    current: TaskStatus,
    target: TaskStatus,
    actor: Actor,
    project_owner_id: i64,
    requested_assignee: Option<i64>,
) -> Result<MovePlan, TransitionError> {
    if current != TaskStatus::Backlog {
        return Err(TransitionError::NotInBacklog);
    }
    if !is_move_target(target) {
        return Err(TransitionError::InvalidTarget(target));
    }

    // The owner naming themselves keeps the current assignee
    let assignee = requested_assignee.filter(|id| actor.is(project_owner_id) && !actor.is(*id));

    Ok(MovePlan {
        status: target,
        assignee,
    })
}

/// Picks the assignee for a new task
///
/// Defaults to the actor. Naming anyone else requires project ownership.
pub fn check_assignment(
    actor: Actor,
    project_owner_id: i64,
    requested: Option<i64>,
) -> Result<i64, TransitionError> {
    match requested {
        None => Ok(actor.id()),
        Some(user_id) if actor.is(user_id) => Ok(user_id),
        Some(user_id) if actor.is(project_owner_id) => Ok(user_id),
        Some(_) => Err(TransitionError::AssignForbidden),
    }
}

/// Guards a reassignment through a regular update
///
/// Keeping the current assignee is always allowed; changing it requires ownership.
pub fn check_reassignment(
    actor: Actor,
    project_owner_id: i64,
    current_assignee: i64,
    requested: Option<i64>,
) -> Result<(), TransitionError> {
    match requested {
        Some(user_id) if user_id != current_assignee && !actor.is(project_owner_id) => {
            Err(TransitionError::ReassignForbidden)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 1;
    const OTHER: i64 = 2;

    #[test]
    fn test_move_requires_backlog_source() {
        for current in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(
                plan_backlog_move(current, TaskStatus::Todo, Actor(OWNER), OWNER, None),
                Err(TransitionError::NotInBacklog)
            );
        }
    }

    #[test]
    fn test_move_rejects_done_and_backlog_targets() {
        for target in [TaskStatus::Done, TaskStatus::Backlog] {
            assert_eq!(
                plan_backlog_move(TaskStatus::Backlog, target, Actor(OWNER), OWNER, None),
                Err(TransitionError::InvalidTarget(target))
            );
        }
    }

    #[test]
    fn test_move_to_active_states() {
        for target in [TaskStatus::Todo, TaskStatus::InProgress] {
            let plan = plan_backlog_move(TaskStatus::Backlog, target, Actor(OTHER), OWNER, None).unwrap();
            assert_eq!(plan.status, target);
            assert_eq!(plan.assignee, None);
        }
    }

    #[test]
    fn test_owner_can_reassign_during_move() {
        let plan =
            plan_backlog_move(TaskStatus::Backlog, TaskStatus::Todo, Actor(OWNER), OWNER, Some(OTHER)).unwrap();
        assert_eq!(plan.assignee, Some(OTHER));
    }

    #[test]
    fn test_owner_naming_self_keeps_assignee() {
        let plan =
            plan_backlog_move(TaskStatus::Backlog, TaskStatus::Todo, Actor(OWNER), OWNER, Some(OWNER)).unwrap();
        assert_eq!(plan.status, TaskStatus::Todo);
        assert_eq!(plan.assignee, None);
    }

    #[test]
    fn test_non_owner_reassignment_is_silently_dropped() {
        let plan =
            plan_backlog_move(TaskStatus::Backlog, TaskStatus::InProgress, Actor(OTHER), OWNER, Some(3)).unwrap();
        assert_eq!(plan.status, TaskStatus::InProgress);
        assert_eq!(plan.assignee, None);
    }

    #[test]
    fn test_check_assignment() {
        assert_eq!(check_assignment(Actor(OTHER), OWNER, None), Ok(OTHER));
        assert_eq!(check_assignment(Actor(OTHER), OWNER, Some(OTHER)), Ok(OTHER));
        assert_eq!(check_assignment(Actor(OWNER), OWNER, Some(OTHER)), Ok(OTHER));
        assert_eq!(
            check_assignment(Actor(OTHER), OWNER, Some(OWNER)),
            Err(TransitionError::AssignForbidden)
        );
    }

    #[test]
    fn test_check_reassignment() {
        assert_eq!(check_reassignment(Actor(OTHER), OWNER, OTHER, None), Ok(()));
        assert_eq!(check_reassignment(Actor(OTHER), OWNER, OTHER, Some(OTHER)), Ok(()));
        assert_eq!(check_reassignment(Actor(OWNER), OWNER, OTHER, Some(OWNER)), Ok(()));
        assert_eq!(
            check_reassignment(Actor(OTHER), OWNER, OTHER, Some(3)),
            Err(TransitionError::ReassignForbidden)
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TransitionError::AssignForbidden.to_string(),
            "Only project owner can assign tasks to other users"
        );
        assert_eq!(TransitionError::ReassignForbidden.to_string(), "Only project owner can reassign tasks");
    }
}
