//! romflash-core - Core library for EPROM programming sessions
//!
//! This crate holds the data model shared by the link layer and the CLI:
//! the memory type catalogue, program images in their textual form, chunk
//! planning, verification reports and progress reporting. It is designed to
//! be `no_std` compatible so the same types can be reused on the controller
//! side.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), adds file I/O
//! - `alloc` - Enable heap allocation (images, verification reports)
//!
//! # Example
//!
//! ```ignore
//! use romflash_core::{image::ProgramImage, memory::MemoryType, verify};
//!
//! let memory: MemoryType = "2732".parse()?;
//! let image = ProgramImage::from_binary_text("00000001\n11111111\n")?;
//! memory.region().check_fits(image.len())?;
//!
//! let report = verify::compare(image.as_bytes(), image.as_bytes())?;
//! assert!(report.is_success());
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
#[cfg(feature = "alloc")]
pub mod image;
pub mod memory;
pub mod progress;
#[cfg(feature = "alloc")]
pub mod verify;

pub use error::{Error, Result};
