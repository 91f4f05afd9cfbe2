//! Device JSON-RPC protocol: client, method wrappers, payload shapes and
//! the port identifier mapping.

pub mod client;
pub mod methods;
pub mod ports;
pub mod types;

pub use client::{resolve_credentials, ClientOptions, GamRpcClient};
pub use methods::method;
pub use ports::{port_index, port_name};
