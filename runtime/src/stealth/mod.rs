//! Client identity and pacing.
//!
//! `fingerprint` shapes how the launched browser presents itself to the
//! site; `behavior` spaces out actions between list entries.

pub mod behavior;
pub mod fingerprint;
