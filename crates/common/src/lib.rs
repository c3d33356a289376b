pub mod config;
pub mod error;
pub mod moralis;
pub mod observability;
pub mod types;
