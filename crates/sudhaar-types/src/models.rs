use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted value is not one of an enum's choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid {}", self.value, self.kind)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a closed set of string choices with the exact wire/storage text
/// for each variant.
macro_rules! choices {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

choices!(
    /// Account role. Decides which campaign and moderation operations a user may perform.
    Role, "role" {
        Citizen => "citizen",
        Ngo => "ngo",
        Official => "official",
    }
);

choices!(
    IssueStatus, "status" {
        Open => "Open",
        Pending => "Pending",
        Verified => "Verified",
        InProgress => "In Progress",
        Critical => "Critical",
        Resolved => "Resolved",
        Rejected => "Rejected",
    }
);

choices!(
    Priority, "priority" {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
);

choices!(
    IssueCategory, "issue category" {
        Roads => "Roads",
        Sanitation => "Sanitation",
        Electricity => "Electricity",
        Water => "Water",
        Civic => "Civic",
        Health => "Health",
        Environment => "Environment",
        Education => "Education",
        Other => "Other",
    }
);

choices!(
    CampaignCategory, "campaign category" {
        Health => "Health",
        Education => "Education",
        Environment => "Environment",
        Civic => "Civic",
        Sanitation => "Sanitation",
        Water => "Water",
        Electricity => "Electricity",
    }
);

choices!(
    /// Fundraising lifecycle. Money raised by a `Completed` campaign counts as utilized.
    CampaignStatus, "campaign status" {
        Active => "active",
        Completed => "completed",
    }
);

choices!(
    TokenType, "token type" {
        Access => "access",
        Refresh => "refresh",
    }
);

impl IssueStatus {
    /// Statuses that still need attention. Everything except Resolved and Rejected.
    pub fn is_active(&self) -> bool {
        !matches!(self, IssueStatus::Resolved | IssueStatus::Rejected)
    }
}

// -- JWT Claims --

/// JWT claims shared by token issuance and the request authentication
/// middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: usize,
    pub exp: usize,
}

/// The authenticated user a request acts on behalf of. Handlers receive it
/// explicitly and pass it down; nothing reads it from ambient state.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn is_official(&self) -> bool {
        self.role == Role::Official
    }

    pub fn is_ngo(&self) -> bool {
        self.role == Role::Ngo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips_through_from_str() {
        for status in IssueStatus::ALL {
            assert_eq!(status.as_str().parse::<IssueStatus>().unwrap(), *status);
        }
        assert_eq!(IssueStatus::InProgress.as_str(), "In Progress");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "Closed".parse::<IssueStatus>().unwrap_err();
        assert_eq!(err.kind, "status");
        assert_eq!(err.to_string(), "\"Closed\" is not a valid status");
        assert!("open".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn serde_uses_display_text() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let role: Role = serde_json::from_str("\"ngo\"").unwrap();
        assert_eq!(role, Role::Ngo);
    }

    #[test]
    fn active_statuses() {
        assert!(IssueStatus::Open.is_active());
        assert!(IssueStatus::Critical.is_active());
        assert!(!IssueStatus::Resolved.is_active());
        assert!(!IssueStatus::Rejected.is_active());
    }
}
