//! HTTP request handlers for the manager API.
//!
//! - `announce` - device announcements (plain JSON reply, not the envelope)
//! - `alarms` - alarm listing, manual raise, close and acknowledge
//! - `common` - response envelope and error mapping
//! - `devices` - device views and admin-triggered operations
//! - `settings` - runtime settings and the audit log

pub mod alarms;
pub mod announce;
pub mod common;
pub mod devices;
pub mod settings;

pub use alarms::*;
pub use announce::*;
pub use devices::*;
pub use settings::*;
