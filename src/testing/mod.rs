//! Test harness utilities.
//!
//! Compiled into the library so integration tests can build packets and
//! stand-in models without real hardware or trained artifacts.

pub mod fixtures;
