// Generation capability adapters: each behind a feature flag.

#[cfg(feature = "openai-compat")]
pub mod openai_compat;
