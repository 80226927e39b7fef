//! Mirror GitHub review work into Todoist tasks.
//!
//! Each run polls the review host, reconciles two policies against a persisted
//! tracking document, and creates or closes tasks so the task store converges
//! on the current review state. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (state document, per-PR decisions,
//!   priority table, task wording). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (HTTP, GitHub, Todoist, state file,
//!   config), each behind a trait where tests need a seam.
//!
//! Orchestration modules ([`requests`], [`received`], [`sync`]) drive core
//! decisions through the adapters.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod received;
pub mod requests;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
