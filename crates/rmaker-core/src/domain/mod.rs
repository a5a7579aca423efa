//! Domain types for provisioning and local control.
//!
//! Nothing here performs I/O.  These types describe *what* the tool talks
//! to (a [`device::DeviceInfo`]), what the device says it can do
//! ([`capabilities::Capabilities`]), and the values carried by the command
//! families (Wi-Fi networks and connection state, local-control properties).
//!
//! # Why keep these apart from the wire messages? (for beginners)
//!
//! The protobuf structs in [`crate::protocol::messages`] mirror the firmware
//! byte-for-byte: every enum is an `i32`, SSIDs are raw bytes and most fields
//! are optional.  Callers should not have to deal with that.  The domain
//! types are the checked, typed view the rest of the workspace works with;
//! the conversion happens once, at the edge.

pub mod capabilities;
pub mod device;
pub mod property;
pub mod wifi;
