//! Content revealing and text extraction.
//!
//! [`loader`] drives a document until it stops producing new content;
//! [`text`] turns the leaf texts it exposes into clean review records.

pub mod loader;
pub mod text;
