//! CLI command handlers

pub mod commands;

pub use commands::{check, render, roundtrip, translate, Input, OutputFormat};
