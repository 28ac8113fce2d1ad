//! Housing price estimation: dataset cleaning, linear model training and a
//! small HTTP prediction service with a fixed-formula fallback.

pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod web;

pub use config::Config;
pub use error::{DataError, InputError, MLError};
