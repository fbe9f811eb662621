//! Role: the authorization level of a remote actor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Ordered authorization level: `viewer < user < manager < owner`.
///
/// A command is reachable by an actor whose role is at least the command's
/// minimal role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    #[default]
    User,
    Manager,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::User => "user",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }

    /// Whether an actor holding `self` may invoke something gated on `required`.
    #[must_use]
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "owner" => Ok(Self::Owner),
            other => Err(SchemaError::InvalidRole(other.to_string())),
        }
    }
}
