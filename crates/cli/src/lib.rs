//! Library half of the `flowline` binary: argument parsing, environment
//! credentials and text rendering.

pub mod command;
pub mod config;
pub mod render;
