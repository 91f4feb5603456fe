// File: src/plugins/builtin/mod.rs

pub mod mute;
pub mod promote;
pub mod transfer;

pub use mute::MutePlugin;
pub use promote::PromotePlugin;
pub use transfer::TransferPlugin;

use std::sync::Arc;

use super::CommandPlugin;

/// The built-in plugin set, in registration (and therefore precedence)
/// order.
pub fn builtin_plugins() -> Vec<Arc<dyn CommandPlugin>> {
    vec![
        Arc::new(MutePlugin::new()),
        Arc::new(TransferPlugin::new()),
        Arc::new(PromotePlugin::new()),
    ]
}
