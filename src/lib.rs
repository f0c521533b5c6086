pub mod archive;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod store;
pub mod warnings;

pub use config::SorloadConfig;
pub use entity::{Decision, PlatformUid};
pub use error::{Result, SorloadError};
pub use pipeline::{DateRange, DumpSource, Pipeline, RunContext, RunReport};
pub use store::{DecisionStore, SqliteStore};
