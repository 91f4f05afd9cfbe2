//! Device health scoring
//!
//! `scorer` holds the pure composite score; `monitor` gathers its inputs
//! from storage, stores the result on the device and writes the hourly
//! history snapshot.

pub mod monitor;
pub mod scorer;
pub mod types;

pub use monitor::HealthScorer;
pub use scorer::{compute_score, derive_status};
pub use types::{DeviceHealth, HealthBreakdown, HealthInputs, HealthStatus};
