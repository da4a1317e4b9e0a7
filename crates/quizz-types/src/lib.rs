// quizz-types: Layer 1 data model and the generation capability contract
#![allow(clippy::result_large_err)]

pub mod config;
pub mod error;
pub mod provider;
pub mod quiz;
pub mod request;
pub mod stream;

pub use config::*;
pub use error::*;
pub use provider::*;
pub use quiz::*;
pub use request::*;
pub use stream::*;
