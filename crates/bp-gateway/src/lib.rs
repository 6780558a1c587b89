//! Gateway service (`spec.md` §4.8): the only component external callers
//! see. Every handler reads an immutable `GatewayConfig` snapshot rather
//! than touching global mutable state (REDESIGN FLAG, SPEC_FULL.md §4.8).

pub mod raw_client;
pub mod routes;
pub mod state;
pub mod stitch;

pub use state::{AppState, GatewayConfig};
