// vyform-api: Async Rust client for the VyOS HTTPS configuration API

pub mod client;
pub mod command;
pub mod error;
pub mod transport;

pub use client::DeviceClient;
pub use command::{ConfigCommand, ConfigOp, flatten_body, split_path};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
