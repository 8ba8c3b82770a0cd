pub mod backend;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod fsutil;
pub mod locator;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod settings;
