//! Integration tests for microaudit-remote
//!
//! Uses wiremock to simulate the backend's data and auth APIs and verifies
//! the request shapes and status mapping of the REST adapters.

mod common;

mod test_identity;
mod test_store;
