//! Core domain types
//!
//! This module contains the structures shared between the stream tailer
//! (frames) and the request-building layer (parsed configuration records).
//! All records are immutable values owned by the caller.

pub mod bind;
pub mod frame;
pub mod link;
pub mod port;

pub use bind::{AccessMode, BindSpec};
pub use frame::{Frame, HEADER_SIZE, StreamType};
pub use link::LinkSpec;
pub use port::{ExposedPort, HostBinding, PortBindingSpec, PortBindings, Protocol};
