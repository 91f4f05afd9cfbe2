//! This module provides reusable test utilities:
//! - Mock GAM device speaking JSON-RPC
//! - Test configuration builder
//! - In-memory test databases
//! - Announcement and inventory payload builders

// Allow unused code in test fixtures - not every test uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_device;
pub mod test_config;
pub mod test_data;
pub mod test_database;

// Re-export commonly used items
pub use mock_device::MockDevice;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
