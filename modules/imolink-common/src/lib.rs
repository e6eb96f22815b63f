pub mod config;
pub mod error;
pub mod types;
pub mod urls;

pub use config::{Config, StrategyKind, Tuning};
pub use error::ImolinkError;
pub use types::*;
pub use urls::*;
