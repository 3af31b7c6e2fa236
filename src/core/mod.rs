pub mod config;
pub mod discovery;
pub mod metadata;
pub mod paths;
