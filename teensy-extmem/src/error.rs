//! Crate-wide error type.
//!
//! Bus errors are reduced to the `embedded-hal` [`ErrorKind`](embedded_hal::spi::ErrorKind)
//! of the failing peripheral so that drivers over different HALs share one
//! error type and the delay line can stay generic over its memory backend.

use core::fmt;

use embedded_hal::spi;

/// Errors reported by the external memory drivers and the delay line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The SPI bus reported a failure on every attempt.
    Spi(spi::ErrorKind),
    /// The chip-select line could not be released; the transfer was not
    /// retried.
    ChipSelect,
    /// A transfer was issued before `begin()`.
    NotStarted,
    /// A pipelined transfer does not fit the driver's scratch buffer.
    TransferTooLarge {
        /// Payload length that was requested, in bytes.
        requested: usize,
        /// Payload capacity of the scratch buffer, in bytes.
        capacity: usize,
    },
    /// The configured region starts past the end of the device.
    RegionOutOfRange {
        /// Requested first sample.
        start: u32,
        /// Device capacity in samples.
        capacity: u32,
    },
    /// The configured region cannot hold a single audio block.
    RegionTooSmall {
        /// Region length in samples.
        length: u32,
        /// Block size in samples.
        block: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(kind) => write!(f, "spi bus error: {kind}"),
            Error::ChipSelect => f.write_str("chip select could not be released"),
            Error::NotStarted => f.write_str("memory driver used before begin()"),
            Error::TransferTooLarge {
                requested,
                capacity,
            } => write!(
                f,
                "transfer of {requested} bytes exceeds scratch capacity of {capacity} bytes"
            ),
            Error::RegionOutOfRange { start, capacity } => write!(
                f,
                "region start {start} is outside device capacity of {capacity} samples"
            ),
            Error::RegionTooSmall { length, block } => write!(
                f,
                "region of {length} samples is shorter than one {block}-sample block"
            ),
        }
    }
}

impl core::error::Error for Error {}
