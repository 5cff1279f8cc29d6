//! Clients for the remote services docent depends on.
//!
//! - completion providers implementing `docent_core::Provider`
//! - code sandboxes implementing `docent_core::CodeSandbox`
//!
//! The router builds both from configuration.

pub mod openai_compat;
pub mod router;
pub mod sandbox;

pub use openai_compat::{AuthStyle, OpenAiCompatProvider};
pub use router::{ProviderRouter, build_from_config, build_sandbox};
pub use sandbox::{DisabledSandbox, HttpSandbox};
