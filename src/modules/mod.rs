//! Built-in modules
//!
//! Activated by name through the `BOT_MODULES` list.

pub mod account;
pub mod health;
pub mod transcript;
pub mod webchat;

use std::sync::Arc;

use crate::module::{HostModule, ModuleCatalog};

pub use account::AccountModule;
pub use health::HealthModule;
pub use webchat::{WebChatChannel, WebChatModule};

/// Catalog of every module shipped with the host
pub fn builtin_catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with(health::NAME, health_module)
        .with(account::NAME, account_module)
        .with(webchat::NAME, webchat_module)
}

fn health_module() -> Arc<dyn HostModule> {
    Arc::new(HealthModule)
}

fn account_module() -> Arc<dyn HostModule> {
    Arc::new(AccountModule)
}

fn webchat_module() -> Arc<dyn HostModule> {
    Arc::new(WebChatModule)
}
