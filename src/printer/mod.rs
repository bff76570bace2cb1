//! # Printer Module
//!
//! Identity and runtime settings of the emulated printer.
//!
//! ## Modules
//!
//! - [`config`]: Device identity and emulator configuration

pub mod config;

pub use config::{BasicAuth, EmulatorConfig, PrinterIdentity};
