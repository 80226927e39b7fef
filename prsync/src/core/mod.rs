//! Deterministic, pure logic shared by both reconciliation policies.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! snapshots and return deterministic outputs suitable for tests.

pub mod content;
pub mod priority;
pub mod received_plan;
pub mod request_plan;
pub mod state;
pub mod types;
