//! Prints the balanced chunks a delivery would send.

use std::path::Path;

use anyhow::{Context, Result};
use mdgram_core::config::Config;
use mdgram_core::{ChunkingConfig, Dialect, MarkerTable, SpanTracker, render, split};
use serde::Serialize;

pub struct SplitOptions<'a> {
    pub dialect: Dialect,
    pub max_chars: Option<usize>,
    pub json: bool,
    pub file: Option<&'a Path>,
}

#[derive(Debug, Serialize)]
struct ChunkOutput {
    index: usize,
    chars: usize,
    text: String,
}

pub fn run(config: &Config, options: &SplitOptions<'_>) -> Result<()> {
    let source = super::read_input(options.file)?;
    let chunking = ChunkingConfig {
        max_chunk_chars: options
            .max_chars
            .unwrap_or(config.chunking.max_chunk_chars),
        ..config.chunking.clone()
    };

    let table = MarkerTable::for_dialect(options.dialect);
    let rendered = render(&source, table);
    let mut tracker = SpanTracker::new(table);
    let chunks: Vec<ChunkOutput> = split(rendered.text(), table, &chunking)
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let text = tracker.balance(chunk.text);
            ChunkOutput {
                index,
                chars: text.chars().count(),
                text,
            }
        })
        .collect();

    if options.json {
        let json = serde_json::to_string_pretty(&chunks).context("serialize chunks")?;
        println!("{json}");
        return Ok(());
    }

    let total = chunks.len();
    for chunk in &chunks {
        println!(
            "--- chunk {}/{} ({} chars) ---",
            chunk.index + 1,
            total,
            chunk.chars
        );
        println!("{}", chunk.text);
    }
    Ok(())
}
