use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub admin: bool,
    pub created_at: String,
}

/// A reimbursement claim. `status` is kept as the raw stored string because
/// the permissive policy persists whatever an admin sends.
#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct ReimbursementRequest {
    pub id: i64,
    pub owner_id: i64,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub category: String,
    pub notes: String,
    pub receipt_path: Option<String>,
    pub status: String,
    pub created_at: String,
}

/// Row of the admin review listing.
#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct RequestWithOwner {
    pub id: i64,
    pub owner_id: i64,
    pub owner_name: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub category: String,
    pub notes: String,
    pub receipt_path: Option<String>,
    pub status: String,
}

/// Form fields of a new request, already validated.
#[derive(Debug, Clone, Default)]
pub struct NewRequest {
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub category: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pendente",
            RequestStatus::Approved => "Aprovado",
            RequestStatus::Rejected => "Rejeitado",
        }
    }

    /// Transition table of the strict policy. Resolved requests are final.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pendente" => Ok(RequestStatus::Pending),
            "Aprovado" => Ok(RequestStatus::Approved),
            "Rejeitado" => Ok(RequestStatus::Rejected),
            other => Err(AppError::UnknownStatus(other.to_owned())),
        }
    }
}

/// How `set_status` treats admin input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any string, any transition, no existence check.
    #[default]
    Permissive,
    /// Known statuses only, following `RequestStatus::can_transition_to`.
    Strict,
}

impl FromStr for StatusPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(StatusPolicy::Permissive),
            "strict" => Ok(StatusPolicy::Strict),
            other => Err(AppError::ConfigError(format!(
                "STATUS_POLICY must be 'permissive' or 'strict', got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("Aprovado".parse::<RequestStatus>().unwrap(), RequestStatus::Approved);
        assert_eq!(RequestStatus::Rejected.to_string(), "Rejeitado");
        assert!(matches!(
            "aprovado".parse::<RequestStatus>(),
            Err(AppError::UnknownStatus(s)) if s == "aprovado"
        ));
    }

    #[test]
    fn resolved_statuses_are_terminal() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn status_policy_from_env_value() {
        assert_eq!(" Strict ".parse::<StatusPolicy>().unwrap(), StatusPolicy::Strict);
        assert_eq!(StatusPolicy::default(), StatusPolicy::Permissive);
        assert!("lenient".parse::<StatusPolicy>().is_err());
    }
}
