//! Integration test modules

mod config;
mod history;
mod ollama;
mod streaming;
