/// The node state machine and election/replication protocol for a small,
/// fixed, leader-elected key/value register cluster.
#[deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]
mod common;
mod state;
pub mod rpc_messages;
mod transport;

pub use common::{KeyNotFound, RaftConfig, Role, ServerId, TransportError};
pub use rpc_messages::*;
pub use state::NodeState;
pub use transport::RaftTransport;
