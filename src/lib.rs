pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod logs;
pub mod mitigations;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod source;
pub mod ui;
