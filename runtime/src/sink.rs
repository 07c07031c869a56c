//! Record sink — CSV files for listings and reviews.
//!
//! Files start with a UTF-8 byte order mark so spreadsheet tools pick the
//! right encoding for Korean text. Readers accept files with or without it.

use crate::model::{ListingRecord, ReviewRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BOM: &str = "\u{feff}";
const LISTING_HEADER: [&str; 4] = ["id", "storeName", "category", "url"];
const REVIEW_HEADER: [&str; 1] = ["review"];
pub const REVIEW_FILE_PREFIX: &str = "리뷰_";
const UNSAFE_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// `맛집 강남` → `맛집_강남_list.csv`.
pub fn listing_file_name(query: &str) -> String {
    format!("{}_list.csv", query.trim().replace(' ', "_"))
}

/// Strip characters that are not allowed in file names.
pub fn clean_filename(name: &str) -> String {
    name.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}

pub fn review_file_name(display_name: &str, date: NaiveDate) -> String {
    format!(
        "{REVIEW_FILE_PREFIX}{}_{}.csv",
        clean_filename(display_name),
        date.format("%Y-%m-%d")
    )
}

fn create_with_bom(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(BOM.as_bytes())?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

/// Listing file writer. Each row is flushed as soon as it is written, so a
/// run that dies midway leaves a valid file behind.
pub struct ListingWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl ListingWriter {
    /// Create (or truncate) the file and write the header row.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = create_with_bom(path)?;
        writer.write_record(LISTING_HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &ListingRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .with_context(|| format!("failed to write row to {}", self.path.display()))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Write the review file for one establishment into `dir`.
///
/// Returns `None` without touching the disk when there is nothing to write.
/// An existing file with the same name is replaced.
pub fn write_reviews(
    dir: &Path,
    display_name: &str,
    date: NaiveDate,
    records: &[ReviewRecord],
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        return Ok(None);
    }
    let path = dir.join(review_file_name(display_name, date));
    let mut writer = create_with_bom(&path)?;
    writer.write_record(REVIEW_HEADER)?;
    for record in records {
        writer.write_record([record.normalized_text.as_str()])?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = records.len(), "review file written");
    Ok(Some(path))
}

/// One establishment to collect reviews for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    pub display_name: String,
    pub detail_url: String,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(rename = "storeName")]
    store_name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ReviewRow {
    review: String,
}

fn read_without_bom(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(match raw.strip_prefix(BOM) {
        Some(rest) => rest.to_string(),
        None => raw,
    })
}

/// Read `(storeName, url)` pairs from a listing file, in file order.
///
/// Rows without a URL are skipped.
pub fn read_listings(path: &Path) -> Result<Vec<ReviewTarget>> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut targets = Vec::new();

    for (line, row) in reader.deserialize::<ListingRow>().enumerate() {
        let row = row.with_context(|| format!("bad row {} in {}", line + 2, path.display()))?;
        let url = row.url.trim();
        if url.is_empty() {
            warn!(name = %row.store_name, "listing row has no url, skipping");
            continue;
        }
        targets.push(ReviewTarget {
            display_name: row.store_name.trim().to_string(),
            detail_url: url.to_string(),
        });
    }
    Ok(targets)
}

/// Read the review texts back out of a review file.
pub fn read_reviews(path: &Path) -> Result<Vec<String>> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    reader
        .deserialize::<ReviewRow>()
        .map(|row| {
            row.map(|r| r.review)
                .with_context(|| format!("bad review row in {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: u32, name: &str, url: &str) -> ListingRecord {
        ListingRecord {
            sequence_id: id,
            display_name: name.to_string(),
            category: "카페".to_string(),
            detail_url: url.to_string(),
        }
    }

    fn review(text: &str) -> ReviewRecord {
        ReviewRecord {
            raw_text: text.to_string(),
            normalized_text: text.to_string(),
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(listing_file_name("강남 카페 "), "강남_카페_list.csv");
        assert_eq!(clean_filename(r#"a/b\c*d?e:f"g<h>i|j"#), "abcdefghij");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(review_file_name("카페 A/B", date), "리뷰_카페 AB_2024-03-09.csv");
    }

    #[test]
    fn test_listing_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("q_list.csv");
        let mut writer = ListingWriter::create(&path).unwrap();
        writer.write(&listing(1, "첫집", "https://m.place/place/1")).unwrap();
        writer.write(&listing(2, "둘, 집", "https://m.place/place/2")).unwrap();
        assert_eq!(writer.rows(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with(BOM));
        let lines: Vec<_> = raw.trim_start_matches(BOM).lines().collect();
        assert_eq!(lines[0], "id,storeName,category,url");
        assert_eq!(lines[1], "1,첫집,카페,https://m.place/place/1");
        assert_eq!(lines[2], "2,\"둘, 집\",카페,https://m.place/place/2");
    }

    #[test]
    fn test_empty_listing_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty_list.csv");
        let writer = ListingWriter::create(&path).unwrap();
        assert_eq!(writer.rows(), 0);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim_start_matches(BOM).trim_end(), "id,storeName,category,url");
    }

    #[test]
    fn test_read_listings_skips_rows_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(
            &path,
            format!("{BOM}id,storeName,category,url\n1,가게,한식,https://x/place/1\n2,빈집,한식,\n3,또집,양식,https://x/place/3\n"),
        )
        .unwrap();

        let targets = read_listings(&path).unwrap();
        assert_eq!(
            targets,
            vec![
                ReviewTarget {
                    display_name: "가게".into(),
                    detail_url: "https://x/place/1".into()
                },
                ReviewTarget {
                    display_name: "또집".into(),
                    detail_url: "https://x/place/3".into()
                },
            ]
        );
    }

    #[test]
    fn test_read_listings_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "storeName,url\nA,https://x/place/9\n").unwrap();
        assert_eq!(read_listings(&path).unwrap()[0].display_name, "A");
    }

    #[test]
    fn test_review_file_written_and_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let first = write_reviews(dir.path(), "빵집", date, &[review("a"), review("b")])
            .unwrap()
            .unwrap();
        let second = write_reviews(dir.path(), "빵집", date, &[review("맛있어요, 또 올게요")])
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(read_reviews(&second).unwrap(), ["맛있어요, 또 올게요"]);
    }

    #[test]
    fn test_no_reviews_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(write_reviews(dir.path(), "없음", date, &[]).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
