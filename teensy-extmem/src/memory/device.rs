//! Compile-time table of the external memory devices and their bus settings.
//!
//! Each GTA-style audio board carries up to two SPI SRAMs. `MEM0` sits on the
//! primary SPI port, `MEM1` on the secondary one. The table records the pins
//! the board routes to each device so a HAL can build the bus, plus the
//! device size used to bound every region carved out of it.

use embedded_hal::spi::{Mode, MODE_0};

/// Selects one of the external memory devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSelect {
    /// First SPI SRAM, on SPI bus 0.
    Mem0,
    /// Second SPI SRAM, on SPI bus 1.
    Mem1,
}

/// Pin routing and capacity of one external memory device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemConfig {
    /// Data out (controller to memory).
    pub mosi: u8,
    /// Data in (memory to controller).
    pub miso: u8,
    /// Serial clock.
    pub sck: u8,
    /// Active-low chip select.
    pub cs: u8,
    /// Device size in 16-bit samples.
    pub capacity: u32,
}

/// 1 Mbit SRAM on the primary SPI port.
pub const MEM0_CONFIG: MemConfig = MemConfig {
    mosi: 7,
    miso: 8,
    sck: 14,
    cs: 15,
    capacity: 65_536,
};

/// 1 Mbit SRAM on the secondary SPI port.
pub const MEM1_CONFIG: MemConfig = MemConfig {
    mosi: 21,
    miso: 5,
    sck: 20,
    cs: 31,
    capacity: 65_536,
};

impl MemSelect {
    /// Pin routing and capacity for this device.
    pub const fn config(self) -> MemConfig {
        match self {
            MemSelect::Mem0 => MEM0_CONFIG,
            MemSelect::Mem1 => MEM1_CONFIG,
        }
    }

    /// Index of the physical SPI bus the device hangs off.
    pub const fn bus_id(self) -> usize {
        match self {
            MemSelect::Mem0 => 0,
            MemSelect::Mem1 => 1,
        }
    }

    /// Device size in samples.
    pub const fn capacity(self) -> u32 {
        self.config().capacity
    }
}

/// Order in which bits of a word are shifted onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Most significant bit shifted out first (what the SRAM expects).
    MsbFirst,
    /// Least significant bit shifted out first.
    LsbFirst,
}

/// Bus configuration a HAL must apply before handing the SPI bus to a driver.
///
/// `embedded-hal` buses are configured at construction, so the drivers only
/// carry these settings for the HAL and the DMA queue to read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    /// Clock rate in Hz.
    pub frequency_hz: u32,
    /// Bit order within each frame.
    pub bit_order: BitOrder,
    /// Clock polarity and phase.
    pub mode: Mode,
}

impl SpiSettings {
    /// 20 MHz, MSB first, mode 0.
    pub const DEFAULT: SpiSettings = SpiSettings {
        frequency_hz: 20_000_000,
        bit_order: BitOrder::MsbFirst,
        mode: MODE_0,
    };

    /// Default settings at a different clock rate.
    pub const fn with_frequency(frequency_hz: u32) -> Self {
        SpiSettings {
            frequency_hz,
            ..Self::DEFAULT
        }
    }
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}
