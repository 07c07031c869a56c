//! Review text cleanup.

use crate::model::ReviewRecord;

/// True when `raw` contains any marker of a non-review node.
pub fn is_noise(raw: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| !m.is_empty() && raw.contains(m.as_str()))
}

/// Strip the collapse label and collapse all whitespace runs to one space.
pub fn normalize(raw: &str, collapse_label: &str) -> String {
    let stripped = if collapse_label.is_empty() {
        raw.to_string()
    } else {
        raw.replace(collapse_label, "")
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn raw leaf texts into review records, dropping noise and empties.
pub fn to_records(raw: Vec<String>, markers: &[String], collapse_label: &str) -> Vec<ReviewRecord> {
    raw.into_iter()
        .filter(|text| !is_noise(text, markers))
        .filter_map(|raw_text| {
            let normalized_text = normalize(&raw_text, collapse_label);
            (!normalized_text.is_empty()).then_some(ReviewRecord {
                raw_text,
                normalized_text,
            })
        })
        .collect()
}
