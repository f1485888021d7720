//! CLI module for focusloop.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `input`: Parsing of the line commands read during `run`
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod input;

pub use commands::{Cli, Commands, PresetsArgs, RenderArgs, RunArgs};
pub use display::Display;
pub use input::{parse_line, InputError};
