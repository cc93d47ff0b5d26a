//! Authorization rules
//!
//! Pure predicates over (actor, project) pairs, consulted by business
//! services before every mutating operation. No side effects, no I/O;
//! violations are raised by the caller as `PmError::AccessDenied` and
//! translated to a forbidden response at the request boundary.

use pm_core::Id;
use pm_models::Project;

use crate::identity::CurrentUser;

/// Actor is the project owner
pub fn is_owner(project: &Project, actor_id: Id) -> bool {
    project.is_owner(actor_id)
}

/// Actor is a project member (the owner always is, by invariant)
pub fn is_member(project: &Project, actor_id: Id) -> bool {
    project.is_member(actor_id)
}

/// Members may be added by the owner or by an admin
pub fn can_add_member(project: &Project, actor: &CurrentUser) -> bool {
    is_owner(project, actor.id) || actor.is_admin()
}

/// Members may be removed by the owner only, and the owner can never be
/// removed, for any actor
pub fn can_remove_member(project: &Project, actor: &CurrentUser, target_id: Id) -> bool {
    is_owner(project, actor.id) && !is_owner(project, target_id)
}

/// Update/delete requires ownership; membership is insufficient
pub fn can_modify_project(project: &Project, actor: &CurrentUser) -> bool {
    is_owner(project, actor.id)
}

/// Viewing requires membership
pub fn can_view_project(project: &Project, actor: &CurrentUser) -> bool {
    is_member(project, actor.id)
}
