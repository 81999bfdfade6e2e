use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;
use crate::content::{PromptContent, Role, SYSTEM_ORDER};

/// Decides which of the optional roles takes order slot 2 on new versions.
///
/// The policy is read once per create and frozen into the stored content;
/// changing it afterwards never touches existing versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleOrderPolicy {
    /// user = 2, assistant = 3
    #[default]
    UserFirst,
    /// assistant = 2, user = 3
    AssistantFirst,
}

impl RoleOrderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserFirst => "user_first",
            Self::AssistantFirst => "assistant_first",
        }
    }

    pub fn toggle(&mut self) {
        *self = self.toggled();
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::UserFirst => Self::AssistantFirst,
            Self::AssistantFirst => Self::UserFirst,
        }
    }

    pub fn assign(self, role: Role) -> u8 {
        match (self, role) {
            (_, Role::System) => SYSTEM_ORDER,
            (Self::UserFirst, Role::User) | (Self::AssistantFirst, Role::Assistant) => 2,
            (Self::UserFirst, Role::Assistant) | (Self::AssistantFirst, Role::User) => 3,
        }
    }

    /// Recover the policy a stored content was created under.
    ///
    /// Content with neither optional role present carries no evidence and
    /// reports the default.
    pub fn detect(content: &PromptContent) -> Self {
        match (content.user.order, content.assistant.order) {
            (Some(3), _) | (_, Some(2)) => Self::AssistantFirst,
            _ => Self::UserFirst,
        }
    }
}

impl fmt::Display for RoleOrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleOrderPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_first" => Ok(Self::UserFirst),
            "assistant_first" => Ok(Self::AssistantFirst),
            _ => Err(CoreError::InvalidData(format!("unknown role order: {s}"))),
        }
    }
}
