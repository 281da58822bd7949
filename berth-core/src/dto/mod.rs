//! Data Transfer Objects for the container engine API
//!
//! Parsed configuration records are handed to the request-building layer
//! as the `HostConfig` fragment of a container-creation request, using the
//! engine's PascalCase JSON keys.

pub mod host_config;

pub use host_config::{HostConfig, PortBindingDto, exposed_ports};
