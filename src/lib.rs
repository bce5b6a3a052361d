//! Fetches the legacy EC2 JSON price files and folds them into one table
//! keyed by region, OS, instance family, size and pricing term.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod parse;

pub use config::Config;
pub use error::ParseError;
pub use fetch::{FetchReport, Fetcher};
pub use parse::{Parser, PricingOutput};
