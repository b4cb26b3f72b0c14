//! Wire message types for the WatchTower source protocol
//!
//! This module implements the envelope, method set, error codes and payload
//! structures exchanged between protocol clients and servers.

pub mod messages;

pub use messages::*;
