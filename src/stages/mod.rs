//! Sequential pipeline stages
//!
//! Each stage is a pure function over the data produced upstream. The
//! engine in `lib.rs` runs them in order with cancellation checks between.

pub mod arrange;
pub mod classify;
pub mod features;
pub mod onset;
pub mod quantize;
pub mod tempo;
