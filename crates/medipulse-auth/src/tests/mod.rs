//! Pipeline tests against a scripted API.
//!
//! - `harness.rs`      - MockApi transport, client builders, wait helpers
//! - `scenarios.rs`    - End-to-end refresh scenarios
//! - `single_flight.rs`- One refresh per window, FIFO release, retry-once
//! - `failures.rs`     - Refresh failure, timeout, abandonment, passthrough errors
//! - `session_flows.rs`- Login, register, logout, persistence
//! - `endpoints.rs`    - Resource endpoint groups
