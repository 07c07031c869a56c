//! Browser-driven harvester for map place listings and their user reviews.
//!
//! The list stage walks paginated search results and resolves each entry to
//! its canonical detail URL. The review stage opens each detail page, drains
//! the lazily loaded review list, and writes one CSV per establishment. A
//! corpus builder folds those files back into an establishment → reviews map.

pub mod audit;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extraction;
pub mod harvest;
pub mod model;
pub mod navigation;
pub mod renderer;
pub mod selectors;
pub mod session;
pub mod sink;
pub mod stealth;
