//! Blocking coordination primitives for pool-of-workers patterns.

pub mod countdown;
pub mod permit_gate;

pub use countdown::CountdownBarrier;
pub use permit_gate::{PermitGate, PermitGuard};
