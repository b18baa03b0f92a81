//! CLI command handlers.

pub mod config;
pub mod render;
pub mod send;
pub mod split;

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Reads the whole input from `file`, or from stdin when none is given.
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input from {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read input from stdin")?;
            Ok(input)
        }
    }
}
