#![forbid(unsafe_code)]

pub mod browser;
pub mod cli;
pub mod config;
pub mod document_store;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod harvest;
pub mod logging;
pub mod manifest;
pub mod normalize;
pub mod orchestrator;
pub mod pending;
pub mod session;
