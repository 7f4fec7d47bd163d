pub mod cli;
pub mod load_config;
pub mod metrics;

pub use cli::{run, Cli, Commands};
