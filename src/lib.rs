#![cfg_attr(doc, warn(missing_docs))]
//! fpg1: a cycle-level model of a two-clock-domain vector graphics processor.
//!
//! The execution domain owns an 8-stage pipelined divider; the display domain runs the raster.
//! Signals between them cross through synchronizer relays, and each domain leaves reset only after
//! the clock source has reported a stable lock for a settle interval.

pub mod emu;
pub mod plat;
