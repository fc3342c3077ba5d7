//! # Ports
//!
//! - `inbound`: `XaCoordinatorApi`
//! - `outbound`: `XaResourceDescriptor`, `ResourceResolver`, `TransactionListener`,
//!   plus `MockResource` and `MockListener`

pub mod inbound;
pub mod outbound;

pub use inbound::XaCoordinatorApi;
pub use outbound::{
    MockListener, MockResource, ResourceResolver, TransactionListener, XaResourceDescriptor,
};
