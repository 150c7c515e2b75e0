//! External SPI SRAM access.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`MemSelect`] / [`MemConfig`] | Compile-time device table (pins, capacity) |
//! | [`command`] | Opcode + 24-bit address framing shared by both drivers |
//! | [`SpiMemory`] | Blocking driver over an `embedded-hal` SPI device |
//! | [`SharedSpiMemory`] | Blocking driver on a bus shared through `embedded-hal-bus` |
//! | [`SpiMemoryDma`] | Pipelined driver over a DMA transfer queue (`dma` feature) |
//! | [`MemoryRegion`] / [`split_span`] | Region bounds and wraparound arithmetic |
//!
//! ## Address space
//!
//! The memories are byte addressed with 24-bit addresses. Audio is stored as
//! 16-bit samples, MSB first, so sample `n` of a region lives at byte
//! `2 * (region.start + n)`.

pub mod command;
mod device;
mod region;
mod spi;

#[cfg(feature = "dma")]
mod dma;

#[cfg(test)]
pub(crate) mod sim;

pub use device::{BitOrder, MemConfig, MemSelect, SpiSettings, MEM0_CONFIG, MEM1_CONFIG};
pub use region::{
    calc_audio_samples, calc_audio_time_ms, split_span, wrap_add, wrap_sub, MemoryRegion, Span,
};
pub use spi::{SharedSpiMemory, SpiMemory};

#[cfg(feature = "dma")]
pub use dma::{ActiveLowChipSelect, Channel, SpiMemoryDma, Transfer, TransferQueue, TransferStatus};

use crate::error::Error;

/// Sample-granular access to an external memory, addressed in bytes.
///
/// Implemented by both drivers so the delay line can run on either. Writes
/// may still be on the wire when they return (pipelined driver), but a
/// `read_samples` observes every earlier write and returns with `dest` filled.
pub trait SampleMemory {
    /// Store `samples` starting at byte `address`.
    fn write_samples(&mut self, address: u32, samples: &[i16]) -> Result<(), Error>;

    /// Load `dest.len()` samples starting at byte `address`.
    fn read_samples(&mut self, address: u32, dest: &mut [i16]) -> Result<(), Error>;

    /// Store `count` zero samples starting at byte `address`.
    fn zero_samples(&mut self, address: u32, count: usize) -> Result<(), Error>;
}
