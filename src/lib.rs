#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod sources;
pub mod store;
pub mod sync;
pub mod tracker;
