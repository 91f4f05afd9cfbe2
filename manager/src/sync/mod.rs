//! Sync reconciliation engine.
//!
//! For one device, pulls endpoints, subscribers, bandwidth profiles and
//! ports over RPC and reconciles each listing against storage:
//!
//! | entity             | key                      | when absent     |
//! |--------------------|--------------------------|-----------------|
//! | endpoints          | MAC address              | mark not alive  |
//! | subscribers        | device id, else name     | mark not alive  |
//! | bandwidth profiles | profile name             | soft delete     |
//! | ports              | interface                | retain          |
//!
//! Every pass is recorded as a sync attempt whatever its outcome.

pub mod engine;
pub mod mapping;
pub mod passes;
pub mod reconcile;

pub use engine::{PassReport, SyncEngine, SyncReport, PASS_ORDER};
pub use passes::PassStats;
pub use reconcile::{absence_policy, three_way_diff, AbsencePolicy, Diff};
