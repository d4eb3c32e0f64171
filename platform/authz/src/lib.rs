//! Authorization primitives for CRM resources.

use entity::user::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("action {action} denied for role {role:?}")]
    Denied { action: &'static str, role: Role },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// List every ticket in the system, not just the caller's.
    ListAllTickets,
    /// Read or change a ticket authored by someone else.
    ManageForeignTicket,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::ListAllTickets => "tickets:list_all",
            Action::ManageForeignTicket => "tickets:manage_foreign",
        }
    }
}

/// The authenticated caller as seen by policy checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn check(&self, subject: &Subject, action: Action) -> Result<(), AuthzError> {
        let allowed = match action {
            Action::ListAllTickets | Action::ManageForeignTicket => subject.role == Role::Admin,
        };
        if allowed {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                action: action.as_str(),
                role: subject.role,
            })
        }
    }

    /// Owners always pass; anyone else needs `ManageForeignTicket`.
    pub fn can_touch_ticket(&self, subject: &Subject, author_id: Uuid) -> bool {
        subject.user_id == author_id
            || self.check(subject, Action::ManageForeignTicket).is_ok()
    }
}
