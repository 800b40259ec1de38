//! # aria-cli
//!
//! Command-line interface for the Aria phone operator.
//!
//! ## Commands
//!
//! - `aria serve`: Run the automation protocol server over ADB
//! - `aria serve-api`: Run the HTTP chat API
//! - `aria chat`: Interactive chat in the terminal
//! - `aria ask`: One-shot request
//! - `aria ping` / `aria screen`: Talk to a running automation server
//! - `aria devices`: List ADB devices
//! - `aria config`: Show configuration

pub mod commands;

pub use commands::Cli;
