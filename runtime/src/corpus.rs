//! Review corpus — the input handed to keyword extraction.
//!
//! Maps each establishment to every review text collected for it, read back
//! from the review files in a directory. Files from several run dates for
//! the same establishment are merged in date order.

use crate::sink::{self, REVIEW_FILE_PREFIX};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub type Corpus = BTreeMap<String, Vec<String>>;

/// Establishment name and run date encoded in a review file name.
fn parse_file_name(pattern: &Regex, file_name: &str) -> Option<(String, String)> {
    let caps = pattern.captures(file_name)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

pub fn build(dir: &Path) -> Result<Corpus> {
    let pattern = Regex::new(&format!(
        r"^{}(.+)_(\d{{4}}-\d{{2}}-\d{{2}})\.csv$",
        regex::escape(REVIEW_FILE_PREFIX)
    ))?;

    let mut files: Vec<(String, String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match parse_file_name(&pattern, file_name) {
            Some((name, date)) => files.push((name, date, path)),
            None => debug!(file = file_name, "not a review file"),
        }
    }
    files.sort();

    let mut corpus = Corpus::new();
    for (name, _, path) in files {
        let texts = sink::read_reviews(&path)?;
        corpus.entry(name).or_default().extend(texts);
    }
    Ok(corpus)
}
