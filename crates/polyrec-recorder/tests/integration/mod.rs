//! Integration tests for polyrec-recorder.
//!
//! These tests verify the interaction between components:
//! - WebSocket session lifecycle against a mock venue
//! - Subscription handling and reconnection behavior
//! - Message flow through routing, buffering and the Parquet sink

pub mod common;
