//! Row-level cleaning stages.
//!
//! Stages run strictly in this order, each consuming the previous stage's
//! rows by value:
//!
//! 1. [`temporal`] builds timestamps and tags unparsable rows.
//! 2. [`range`] drops tagged and out-of-bounds rows.
//! 3. [`dedup`] drops repeated trip ids.
//! 4. [`integrity`] drops GPS points of trips that did not survive.
//! 5. [`features`] derives calendar and time-of-day columns.

pub mod dedup;
pub mod features;
pub mod integrity;
pub mod range;
pub mod temporal;
