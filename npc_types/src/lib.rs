//! # npc Types
//!
//! Fundamental types shared by every npc crate.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Addresses are validated when built, never later
//! - **Platform neutral**: The wire form of an address never depends on the host OS
//! - **Type safety first**: A malformed address cannot be represented
//!
//! ## Key Types
//!
//! - [`EndpointAddress`]: Hierarchical address of a registered procedure
//! - [`InvalidAddressError`]: Why a sequence of segments is not an address

pub mod address;

pub use address::{build_address, EndpointAddress, InvalidAddressError, ADDRESS_SEPARATOR};
