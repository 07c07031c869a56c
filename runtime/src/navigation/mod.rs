//! Frame navigation and bounded waits.

pub mod frames;
pub mod wait;
