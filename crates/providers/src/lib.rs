//! Model service implementations for Lumeo.
//!
//! All providers implement the `lumeo_core::Provider` trait.
//! [`router::build_from_config`] picks the configured one.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, default_model};
