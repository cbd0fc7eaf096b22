//! Guest kernel knowledge: board constants and the memory-layout patch set.
//!
//! - [`board`] - constants of the reference board the guest kernel targets
//! - [`params`] - container descriptor to patch rules

pub mod board;
pub mod params;

pub use board::{Board, VERSATILE};
pub use params::{format_hex, KernelParamUpdater, PatchRecord, PatchReport};
