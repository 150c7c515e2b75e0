//! Blocking SPI SRAM driver.
//!
//! Each call is one complete transaction on an
//! [`embedded_hal::spi::SpiDevice`]: opcode and 24-bit address, then the
//! payload, framed by chip select. The device owns chip select and bus
//! arbitration, so several drivers can sit on one physical bus through
//! `embedded-hal-bus`:
//!
//! ```ignore
//! static SPI0: Mutex<RefCell<Lpspi4>> = Mutex::new(RefCell::new(lpspi4));
//!
//! let mut sram_a = SpiMemory::on_shared_bus(&SPI0, cs_a, MemSelect::Mem0)?;
//! let mut sram_b = SpiMemory::on_shared_bus(&SPI0, cs_b, MemSelect::Mem0)?;
//! sram_a.begin();
//! sram_b.begin();
//! sram_a.write16(0x100, &[1, 2, 3])?;
//! ```
//!
//! Byte-wide methods need an 8-bit device; the `*16` methods and
//! [`SampleMemory`] need a 16-bit device, in which case the opcode rides in
//! the high byte of the first address word.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{self, Operation, SpiDevice};
use embedded_hal_bus::spi::{CriticalSectionDevice, NoDelay};

use super::command::{self, command_header, command_header16};
use super::device::{MemSelect, SpiSettings};
use super::SampleMemory;
use crate::constants::{BYTES_PER_SAMPLE, MAX_RETRIES};
use crate::error::Error;

/// Words staged on the stack per transaction for zero fills and sample
/// conversion.
const CHUNK_WORDS: usize = 64;

/// Blocking driver for one external SPI SRAM.
pub struct SpiMemory<SPI> {
    spi: SPI,
    mem: MemSelect,
    settings: SpiSettings,
    started: bool,
}

impl<SPI: spi::ErrorType> SpiMemory<SPI> {
    /// Create a driver with the default 20 MHz settings.
    pub fn new(spi: SPI, mem: MemSelect) -> Self {
        Self::with_settings(spi, mem, SpiSettings::DEFAULT)
    }

    /// Create a driver with explicit bus settings.
    pub fn with_settings(spi: SPI, mem: MemSelect, settings: SpiSettings) -> Self {
        Self {
            spi,
            mem,
            settings,
            started: false,
        }
    }

    /// Enable transfers. The device deselected the chip when it was built.
    pub fn begin(&mut self) {
        self.started = true;
        log::debug!("spi memory {:?} started at {} Hz", self.mem, self.settings.frequency_hz);
    }

    /// Whether [`begin()`](Self::begin) has run.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn mem(&self) -> MemSelect {
        self.mem
    }

    pub fn settings(&self) -> &SpiSettings {
        &self.settings
    }

    /// Consume the driver and return the device.
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Run `operations` as one transaction, re-running it on bus errors up to
    /// [`MAX_RETRIES`] times.
    ///
    /// A chip-select fault is not retried: the line may still be asserted.
    fn transaction<W>(&mut self, operations: &mut [Operation<'_, W>]) -> Result<(), Error>
    where
        W: Copy + 'static,
        SPI: SpiDevice<W>,
    {
        if !self.started {
            return Err(Error::NotStarted);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let Err(e) = self.spi.transaction(operations) else {
                return Ok(());
            };
            let kind = spi::Error::kind(&e);
            if kind == spi::ErrorKind::ChipSelectFault {
                log::warn!("spi memory {:?}: chip select fault", self.mem);
                return Err(Error::ChipSelect);
            }
            if attempt >= MAX_RETRIES {
                log::warn!("spi memory {:?}: giving up after {} attempts: {:?}", self.mem, attempt, kind);
                return Err(Error::Spi(kind));
            }
            log::debug!("spi memory {:?}: attempt {} failed ({:?}), retrying", self.mem, attempt, kind);
        }
    }
}

/// Driver on a bus shared with other devices through a critical section.
pub type SharedSpiMemory<'a, BUS, CS> = SpiMemory<CriticalSectionDevice<'a, BUS, CS, NoDelay>>;

impl<'a, BUS, CS> SharedSpiMemory<'a, BUS, CS>
where
    BUS: spi::ErrorType,
    CS: OutputPin,
{
    /// Attach a driver with its own chip select to a shared `bus`.
    ///
    /// Deselects the chip; fails with [`Error::ChipSelect`] if that fails.
    pub fn on_shared_bus(
        bus: &'a Mutex<RefCell<BUS>>,
        cs: CS,
        mem: MemSelect,
    ) -> Result<Self, Error> {
        let device =
            CriticalSectionDevice::new_no_delay(bus, cs).map_err(|_| Error::ChipSelect)?;
        Ok(SpiMemory::new(device, mem))
    }
}

// ── Byte-wide access ───────────────────────────────────────────────────────

impl<SPI: SpiDevice<u8>> SpiMemory<SPI> {
    /// Write one byte.
    pub fn write_byte(&mut self, address: u32, data: u8) -> Result<(), Error> {
        self.write(address, &[data])
    }

    /// Write a block of bytes starting at `address`.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let header = command_header(command::WRITE, address);
        self.transaction(&mut [Operation::Write(&header), Operation::Write(data)])
    }

    /// Write `count` zero bytes starting at `address`.
    pub fn zero(&mut self, address: u32, count: usize) -> Result<(), Error> {
        let zeros = [0u8; CHUNK_WORDS * 2];
        let mut address = address;
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(zeros.len());
            self.write(address, &zeros[..n])?;
            address += n as u32;
            remaining -= n;
        }
        Ok(())
    }

    /// Set the SRAM mode register (byte, page or sequential access).
    pub fn write_mode_register(&mut self, mode: u8) -> Result<(), Error> {
        self.transaction(&mut [Operation::Write(&[command::WRITE_MODE_REGISTER, mode])])
    }

    /// Read one byte.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, Error> {
        let mut data = [0u8; 1];
        self.read(address, &mut data)?;
        Ok(data[0])
    }

    /// Fill `dest` from consecutive addresses starting at `address`.
    pub fn read(&mut self, address: u32, dest: &mut [u8]) -> Result<(), Error> {
        let header = command_header(command::READ, address);
        self.transaction(&mut [Operation::Write(&header), Operation::Read(dest)])
    }
}

// ── 16-bit access ──────────────────────────────────────────────────────────

impl<SPI: SpiDevice<u16>> SpiMemory<SPI> {
    /// Write one 16-bit word.
    pub fn write_word(&mut self, address: u32, data: u16) -> Result<(), Error> {
        self.write16(address, &[data])
    }

    /// Write a block of 16-bit words starting at byte `address`.
    pub fn write16(&mut self, address: u32, data: &[u16]) -> Result<(), Error> {
        let header = command_header16(command::WRITE, address);
        self.transaction(&mut [Operation::Write(&header), Operation::Write(data)])
    }

    /// Write `count` zero words starting at byte `address`.
    pub fn zero16(&mut self, address: u32, count: usize) -> Result<(), Error> {
        let zeros = [0u16; CHUNK_WORDS];
        let mut address = address;
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(CHUNK_WORDS);
            self.write16(address, &zeros[..n])?;
            address += n as u32 * BYTES_PER_SAMPLE;
            remaining -= n;
        }
        Ok(())
    }

    /// Read one 16-bit word.
    pub fn read_word(&mut self, address: u32) -> Result<u16, Error> {
        let mut data = [0u16; 1];
        self.read16(address, &mut data)?;
        Ok(data[0])
    }

    /// Fill `dest` with consecutive words starting at byte `address`.
    pub fn read16(&mut self, address: u32, dest: &mut [u16]) -> Result<(), Error> {
        let header = command_header16(command::READ, address);
        self.transaction(&mut [Operation::Write(&header), Operation::Read(dest)])
    }
}

impl<SPI: SpiDevice<u16>> SampleMemory for SpiMemory<SPI> {
    fn write_samples(&mut self, address: u32, samples: &[i16]) -> Result<(), Error> {
        log::trace!("write {} samples at {:#08x}", samples.len(), address);
        let mut words = [0u16; CHUNK_WORDS];
        let mut address = address;
        for chunk in samples.chunks(CHUNK_WORDS) {
            let words = &mut words[..chunk.len()];
            for (word, &sample) in words.iter_mut().zip(chunk) {
                *word = sample as u16;
            }
            self.write16(address, words)?;
            address += chunk.len() as u32 * BYTES_PER_SAMPLE;
        }
        Ok(())
    }

    fn read_samples(&mut self, address: u32, dest: &mut [i16]) -> Result<(), Error> {
        log::trace!("read {} samples at {:#08x}", dest.len(), address);
        let mut words = [0u16; CHUNK_WORDS];
        let mut address = address;
        for chunk in dest.chunks_mut(CHUNK_WORDS) {
            let words = &mut words[..chunk.len()];
            self.read16(address, words)?;
            for (sample, &word) in chunk.iter_mut().zip(words.iter()) {
                *sample = word as i16;
            }
            address += chunk.len() as u32 * BYTES_PER_SAMPLE;
        }
        Ok(())
    }

    fn zero_samples(&mut self, address: u32, count: usize) -> Result<(), Error> {
        log::trace!("zero {} samples at {:#08x}", count, address);
        self.zero16(address, count)
    }
}
