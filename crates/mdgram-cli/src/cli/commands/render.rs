use std::path::Path;

use anyhow::Result;
use mdgram_core::{Dialect, MarkerTable, render};

use super::read_input;

pub fn run(dialect: Dialect, file: Option<&Path>) -> Result<()> {
    let source = read_input(file)?;
    let rendered = render(&source, MarkerTable::for_dialect(dialect));
    print!("{}", rendered.text());
    Ok(())
}
