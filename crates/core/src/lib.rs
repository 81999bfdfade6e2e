pub mod content;
pub mod error;
pub mod ids;
pub mod paging;
pub mod role_order;
pub mod version;

pub use content::{ContentDraft, MessageSlot, PromptContent, Role};
pub use error::CoreError;
pub use ids::*;
pub use paging::{Page, PageRequest};
pub use role_order::RoleOrderPolicy;
pub use version::{NodeSummary, Version};
