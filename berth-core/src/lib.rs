//! Berth Core
//!
//! Core types and parsers for the Berth container build-step integration.
//!
//! This crate contains:
//! - Domain types: frames of the attach stream and container configuration records
//! - Parsers: the tolerant text grammars for binds, port bindings and links
//! - DTOs: engine request fragments built from parsed records

pub mod domain;
pub mod dto;
pub mod error;
pub mod parser;

pub use error::{GrammarError, GrammarKind};
