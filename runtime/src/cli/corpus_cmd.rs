//! `harvest corpus [dir]` — print the establishment → reviews map as JSON.

use crate::cli::output::{self, Styled};
use crate::corpus;
use anyhow::Result;
use std::path::Path;

pub fn run(dir: &Path) -> Result<()> {
    let corpus = corpus::build(dir)?;
    output::print_json(&serde_json::to_value(&corpus)?);

    if !output::is_quiet() && !output::is_json() {
        let s = Styled::new();
        let reviews: usize = corpus.values().map(Vec::len).sum();
        eprintln!(
            "  {} {} places, {reviews} reviews from {}",
            s.ok_sym(),
            corpus.len(),
            dir.display()
        );
    }
    Ok(())
}
