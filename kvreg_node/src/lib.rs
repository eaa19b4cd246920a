//! Shared between the `kvreg_node` binary and its integration tests, so the
//! test suite can boot real servers on loopback ports without duplicating
//! the router/ticker wiring.
pub mod app_state;
pub mod handlers;
pub mod reqwest_transport;
pub mod tickers;
