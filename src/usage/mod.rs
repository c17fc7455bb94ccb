//! Claude Code session pipeline - parsing, attribution and statistics

pub mod cache;
pub mod config;
pub mod models;
pub mod overrides;
pub mod pricing;
pub mod project;
pub mod reader;
pub mod stats;
pub mod tally;

pub use cache::*;
pub use config::*;
pub use models::*;
pub use overrides::*;
pub use pricing::*;
pub use project::ProjectResolver;
pub use reader::*;
pub use stats::*;
