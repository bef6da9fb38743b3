//! # vantage-core
//!
//! Foundation types and utilities shared by all Vantage crates:
//!
//! - **Branded IDs**: [`ids::SessionId`] as a newtype over the wire string
//! - **Clock**: [`clock::now_millis`] for epoch-millisecond timestamps
//! - **Logging**: [`logging::init`] tracing-subscriber setup for the binary
//!
//! ## Crate Position
//!
//! Foundation crate. The session store builds on the ids and clock; the
//! binary drives logging init.

#![deny(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod logging;
