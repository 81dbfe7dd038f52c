//! Per-domain calculators over aligned rows.
//!
//! Every computor degrades to a "no data" record (zero samples, absent
//! percentages) on empty input instead of failing.

pub mod comfort;
pub mod cycles;
pub mod damper;
pub mod discharge;
pub mod flow;
pub mod reheat;
pub mod stats;

pub use comfort::{compute_comfort, ComfortMetrics};
pub use cycles::{compute_binary_cycles, CycleMetrics};
pub use damper::{damper_vs_distribution, damper_vs_setpoint, DamperBasis, DamperSanityMetrics};
pub use discharge::{compute_discharge_tracking, DischargeMetrics};
pub use flow::{compute_flow_tracking, FlowMetrics};
pub use reheat::{compute_reheat_waste, ReheatMetrics};
