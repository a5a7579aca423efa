//! Infrastructure layer for the provisioning tool.
//!
//! Contains the I/O-facing adapters: device transports (HTTP, serial
//! console, BLE and the in-memory mock), the cloud REST client, and
//! configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rmaker_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.

pub mod cloud;
pub mod storage;
pub mod transport;
