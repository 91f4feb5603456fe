// src/lib.rs

pub mod cache;
pub mod identity;
pub mod plugins;
pub mod presence;
pub mod services;
pub mod state;
pub mod test_utils;
pub mod utils;

pub use mochibot_common::error::Error;
pub use services::dispatch_service::{DispatchConfig, DispatchService};
