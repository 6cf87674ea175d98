#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod client;
pub mod config;
pub mod data;
pub mod feed;
pub mod loader;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod reactions;
pub mod share;
pub mod storage;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
