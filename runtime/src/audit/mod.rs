//! Run trace.

pub mod logger;
