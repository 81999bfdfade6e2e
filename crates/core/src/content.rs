//! Prompt content: the three role slots of a version.
//!
//! Stored content always carries all three roles. A role that was not supplied
//! at creation is kept as an empty slot (`order: null, prompt: null`) so the
//! persisted form and the API form are identical.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;
use crate::role_order::RoleOrderPolicy;

/// Order slot of the system prompt. Never changes.
pub const SYSTEM_ORDER: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role entry. Both fields are set for a present role and both are
/// `None` for an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSlot {
    pub order: Option<u8>,
    pub prompt: Option<String>,
}

impl MessageSlot {
    pub fn present(order: u8, prompt: impl Into<String>) -> Self {
        Self {
            order: Some(order),
            prompt: Some(prompt.into()),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.prompt.is_some()
    }
}

/// Content of a stored version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContent {
    pub system: MessageSlot,
    pub user: MessageSlot,
    pub assistant: MessageSlot,
}

impl PromptContent {
    pub fn slot(&self, role: Role) -> &MessageSlot {
        match role {
            Role::System => &self.system,
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
        }
    }

    /// Check the structural rules every stored content must satisfy.
    pub fn check(&self) -> Result<(), CoreError> {
        match (&self.system.order, &self.system.prompt) {
            (Some(SYSTEM_ORDER), Some(prompt)) if !prompt.trim().is_empty() => {}
            _ => {
                return Err(CoreError::InvalidData(
                    "system slot must have order 1 and a non-empty prompt".into(),
                ));
            }
        }

        for role in [Role::User, Role::Assistant] {
            let slot = self.slot(role);
            match (slot.order, &slot.prompt) {
                (None, None) => {}
                (Some(2 | 3), Some(_)) => {}
                _ => {
                    return Err(CoreError::InvalidData(format!(
                        "{role} slot must be empty or hold order 2 or 3 with a prompt"
                    )));
                }
            }
        }

        if let (Some(user), Some(assistant)) = (self.user.order, self.assistant.order)
            && user == assistant
        {
            return Err(CoreError::InvalidData(format!(
                "user and assistant share order {user}"
            )));
        }
        Ok(())
    }

    /// Named MessagePack encoding, the persisted form.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Prompt text submitted for a new version, before order slots are assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub system: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub assistant: Option<String>,
}

impl ContentDraft {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: None,
            assistant: None,
        }
    }

    pub fn with_user(mut self, prompt: impl Into<String>) -> Self {
        self.user = Some(prompt.into());
        self
    }

    pub fn with_assistant(mut self, prompt: impl Into<String>) -> Self {
        self.assistant = Some(prompt.into());
        self
    }

    /// Validate the draft and freeze role orders under `policy`.
    ///
    /// Blank optional prompts count as absent. Prompt text is kept verbatim.
    pub fn build(&self, policy: RoleOrderPolicy) -> Result<PromptContent, CoreError> {
        if self.system.trim().is_empty() {
            return Err(CoreError::Validation("system prompt is required".into()));
        }

        let slot = |role: Role, prompt: &Option<String>| match prompt {
            Some(text) if !text.trim().is_empty() => {
                MessageSlot::present(policy.assign(role), text.clone())
            }
            _ => MessageSlot::absent(),
        };

        Ok(PromptContent {
            system: MessageSlot::present(SYSTEM_ORDER, self.system.clone()),
            user: slot(Role::User, &self.user),
            assistant: slot(Role::Assistant, &self.assistant),
        })
    }
}

impl From<&PromptContent> for ContentDraft {
    fn from(content: &PromptContent) -> Self {
        Self {
            system: content.system.prompt.clone().unwrap_or_default(),
            user: content.user.prompt.clone(),
            assistant: content.assistant.prompt.clone(),
        }
    }
}
