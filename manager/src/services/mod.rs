pub mod device_service;

pub use device_service::{DeviceService, OperationOutcome};
