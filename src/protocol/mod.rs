//! # StarPRNT Protocol
//!
//! The subset of the StarPRNT command set a CloudPRNT printer needs to
//! understand in order to render a job.
//!
//! ## Module Structure
//!
//! - [`commands`]: Escape bytes and integer encoding
//! - [`raster`]: Raster graphics (ESC GS S) decoding into RGBA pixels
//!
//! ## Protocol Reference
//!
//! This implementation is based on "StarPRNT Command Specifications Rev. 4.10"
//! by Star Micronics Co., Ltd.

pub mod commands;
pub mod raster;

pub use raster::DecodedImage;
