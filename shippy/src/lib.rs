//! Shippy Library
//!
//! Builds a service's container image from a CI branch and rolls the
//! service's cluster deployment onto it.

pub mod app;
pub mod aws;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod image;
pub mod logs;
pub mod notify;
pub mod utils;
