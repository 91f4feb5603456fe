pub mod dispatch_service;
pub mod mention_service;
pub mod role_service;

pub use dispatch_service::{DispatchConfig, DispatchService};
pub use mention_service::MentionProcessor;
pub use role_service::{OwnerEntry, RoleService};
