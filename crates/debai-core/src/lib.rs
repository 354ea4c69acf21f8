pub mod config;
pub mod error;
pub mod types;

pub use config::DebaiConfig;
pub use error::{DebaiError, Result};
pub use types::*;
