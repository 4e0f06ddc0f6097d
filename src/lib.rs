pub mod basedir;
pub mod commands;
pub mod config;
pub mod digest;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod markup;
pub mod metadata;
pub mod monfile;
pub mod monitor;
pub mod query;
pub mod version_pair;
