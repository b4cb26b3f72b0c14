//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the analysis loop
//! and the protocol stack without live sources or a hosted decision maker.

pub mod mocks;

pub use mocks::*;
