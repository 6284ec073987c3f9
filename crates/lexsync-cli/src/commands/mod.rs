//! Command handlers

pub mod config;
pub mod document;
pub mod status;
pub mod sync;
pub mod word;
