//! The cycle-level model of the fpg1 core: the divide pipeline, per-domain reset sequencing and
//! the synchronizers between the execution and display clock domains.

use thiserror::Error;

use crate::plat::DomainId;

pub mod alu;
pub mod clock;
pub mod debugger;
pub mod divider;
pub mod emulator;
pub mod host;
pub mod registers;
pub mod relay;
pub mod reset;
pub mod sync;
pub mod system;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lock synchronizer depth {0} is too shallow (must be at least 2)")]
    SyncDepth(usize),
    #[error("settle interval must be at least one tick")]
    ZeroSettle,
    #[error("clock period of the {0} domain must be non-zero")]
    ZeroPeriod(DomainId),
    #[error("pacing rate must be a positive number of edges per second")]
    Pace,
}
