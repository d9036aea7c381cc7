//! Latency compensation
//!
//! Everything here works on copies of match state: RTT tracking, input
//! history, reconciliation of predicted movement, snapshot interpolation and
//! lag-compensated rewind. Match actors only write snapshots; connection
//! tasks do the rest.

pub mod input_history;
pub mod interpolation;
pub mod latency;
pub mod reconcile;
pub mod service;

pub use input_history::{InputPayload, InputSample};
pub use interpolation::{InterpolatedState, StateSnapshot};
pub use latency::{LatencyReport, LinkState};
pub use reconcile::ReconciliationResult;
pub use service::CompensationService;
