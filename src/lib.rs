#![forbid(unsafe_code)]

pub mod calendar;
pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod hhmm;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod status;
pub mod transport;
