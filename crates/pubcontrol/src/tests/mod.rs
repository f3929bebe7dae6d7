//! Crate-level test suites.
//!
//! - `harness`: recording transport, test format and tracing setup
//! - `batching`: batch bound and FIFO delivery through the worker
//! - `shutdown`: `wait_all_sent` lifecycle and the closed state
//! - `fan_out`: orchestrator publish and the combined callback
//! - `end_to_end`: HTTP delivery against a mock endpoint


mod shutdown;
