//! CLI module - Subcommand handlers for the `retarget` binary

pub mod commands;
