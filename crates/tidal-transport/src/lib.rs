//! Transport abstractions for Tidal.
//!
//! The connection engine only depends on the byte-oriented [`Connector`]
//! contract; concrete links live in sibling crates or in [`memory`].

pub mod connector;
pub mod memory;

pub use connector::{Connector, Link, LinkMetrics, TransportError, TransportHealthSnapshot};
pub use memory::{MemoryAcceptor, MemoryConnector, MemoryPeer};
