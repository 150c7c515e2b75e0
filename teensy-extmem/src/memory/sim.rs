//! Simulated SPI SRAM for tests.
//!
//! [`Sram`] models a 23LC1024-style device in sequential mode: it decodes the
//! opcode and 24-bit address from the bytes shifted in while selected, then
//! reads or writes consecutive bytes. [`SimSpi`] and [`SimCs`] drive it
//! through the `embedded-hal` traits, and [`sim_memory`] attaches a blocking
//! driver to a shared [`SimBus`]; [`SimDmaQueue`] drives
//! it through the transfer-queue trait, completing each transfer after a set
//! number of status polls.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use critical_section::Mutex;
use embedded_hal::digital::{self, ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{self, ErrorKind, ErrorType, SpiBus};

use super::command;
use super::{MemSelect, SharedSpiMemory, SpiMemory};

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Opcode,
    Address { opcode: u8, got: u8, address: u32 },
    ModeRegister,
    Data { opcode: u8, address: u32 },
}

struct SramState {
    data: Vec<u8>,
    selected: bool,
    phase: Phase,
    mode: u8,
    transactions: Vec<(u8, u32)>,
    fail_remaining: u32,
    cs_stuck: bool,
}

impl SramState {
    fn shift(&mut self, out: u8) -> u8 {
        assert!(self.selected, "bus traffic while chip select is high");
        match self.phase {
            Phase::Idle => 0,
            Phase::Opcode => {
                self.phase = match out {
                    command::READ | command::WRITE => Phase::Address {
                        opcode: out,
                        got: 0,
                        address: 0,
                    },
                    command::WRITE_MODE_REGISTER => Phase::ModeRegister,
                    other => panic!("unknown opcode {other:#04x}"),
                };
                0
            }
            Phase::Address { opcode, got, address } => {
                let address = (address << 8) | out as u32;
                if got == 2 {
                    self.transactions.push((opcode, address));
                    self.phase = Phase::Data { opcode, address };
                } else {
                    self.phase = Phase::Address {
                        opcode,
                        got: got + 1,
                        address,
                    };
                }
                0
            }
            Phase::ModeRegister => {
                self.mode = out;
                self.phase = Phase::Idle;
                0
            }
            Phase::Data { opcode, address } => {
                let index = address as usize % self.data.len();
                let value = if opcode == command::WRITE {
                    self.data[index] = out;
                    0
                } else {
                    self.data[index]
                };
                self.phase = Phase::Data {
                    opcode,
                    address: address + 1,
                };
                value
            }
        }
    }

    /// Inject a fault at the start of a transaction, if one is pending.
    fn check_fault(&mut self) -> Result<(), SimSpiError> {
        if matches!(self.phase, Phase::Opcode) && self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(SimSpiError);
        }
        Ok(())
    }
}

/// Shared handle to one simulated SRAM.
#[derive(Clone)]
pub(crate) struct Sram(Rc<RefCell<SramState>>);

impl Sram {
    pub(crate) fn new(size: usize) -> Self {
        Sram(Rc::new(RefCell::new(SramState {
            data: std::vec![0; size],
            selected: false,
            phase: Phase::Idle,
            mode: 0,
            transactions: Vec::new(),
            fail_remaining: 0,
            cs_stuck: false,
        })))
    }

    pub(crate) fn bytes(&self, address: usize, len: usize) -> Vec<u8> {
        self.0.borrow().data[address..address + len].to_vec()
    }

    /// Samples stored MSB first starting at byte `address`.
    pub(crate) fn samples(&self, address: usize, len: usize) -> Vec<i16> {
        self.bytes(address, len * 2)
            .chunks_exact(2)
            .map(|p| i16::from_be_bytes([p[0], p[1]]))
            .collect()
    }

    pub(crate) fn fill(&self, value: u8) {
        self.0.borrow_mut().data.fill(value);
    }

    /// Every (opcode, address) header seen, in bus order.
    pub(crate) fn transactions(&self) -> Vec<(u8, u32)> {
        self.0.borrow().transactions.clone()
    }

    pub(crate) fn transaction_count(&self) -> usize {
        self.0.borrow().transactions.len()
    }

    pub(crate) fn clear_log(&self) {
        self.0.borrow_mut().transactions.clear();
    }

    pub(crate) fn is_selected(&self) -> bool {
        self.0.borrow().selected
    }

    pub(crate) fn mode_register(&self) -> u8 {
        self.0.borrow().mode
    }

    /// Fail the next `n` transactions at their first bus access.
    pub(crate) fn fail_next(&self, n: u32) {
        self.0.borrow_mut().fail_remaining = n;
    }

    pub(crate) fn failures_remaining(&self) -> u32 {
        self.0.borrow().fail_remaining
    }

    /// While stuck, releasing chip select fails and leaves the chip selected.
    pub(crate) fn stick_chip_select(&self, stuck: bool) {
        self.0.borrow_mut().cs_stuck = stuck;
    }

    fn select(&self) {
        let mut s = self.0.borrow_mut();
        assert!(!s.selected, "chip select asserted twice");
        s.selected = true;
        s.phase = Phase::Opcode;
    }

    fn deselect(&self) -> Result<(), SimPinError> {
        let mut s = self.0.borrow_mut();
        if s.cs_stuck {
            return Err(SimPinError);
        }
        s.selected = false;
        s.phase = Phase::Idle;
        Ok(())
    }
}

// ── embedded-hal bus and pin ───────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct SimSpiError;

impl spi::Error for SimSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// SPI bus wired to a simulated SRAM. Supports 8- and 16-bit frames.
pub(crate) struct SimSpi {
    sram: Sram,
}

impl SimSpi {
    pub(crate) fn new(sram: &Sram) -> Self {
        SimSpi { sram: sram.clone() }
    }

    fn exchange8(&mut self, out: u8) -> u8 {
        self.sram.0.borrow_mut().shift(out)
    }

    fn exchange16(&mut self, out: u16) -> u16 {
        let [hi, lo] = out.to_be_bytes();
        let hi = self.exchange8(hi);
        let lo = self.exchange8(lo);
        u16::from_be_bytes([hi, lo])
    }

    fn check_fault(&mut self) -> Result<(), SimSpiError> {
        self.sram.0.borrow_mut().check_fault()
    }
}

impl ErrorType for SimSpi {
    type Error = SimSpiError;
}

impl SpiBus<u8> for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for w in words.iter_mut() {
            *w = self.exchange8(0);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for &w in words {
            self.exchange8(w);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let len = read.len().max(write.len());
        for i in 0..len {
            let r = self.exchange8(write.get(i).copied().unwrap_or(0));
            if let Some(slot) = read.get_mut(i) {
                *slot = r;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for w in words.iter_mut() {
            *w = self.exchange8(*w);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SpiBus<u16> for SimSpi {
    fn read(&mut self, words: &mut [u16]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for w in words.iter_mut() {
            *w = self.exchange16(0);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u16]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for &w in words {
            self.exchange16(w);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u16], write: &[u16]) -> Result<(), Self::Error> {
        self.check_fault()?;
        let len = read.len().max(write.len());
        for i in 0..len {
            let r = self.exchange16(write.get(i).copied().unwrap_or(0));
            if let Some(slot) = read.get_mut(i) {
                *slot = r;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u16]) -> Result<(), Self::Error> {
        self.check_fault()?;
        for w in words.iter_mut() {
            *w = self.exchange16(*w);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Chip-select pin of a simulated SRAM.
pub(crate) struct SimCs {
    sram: Sram,
}

impl SimCs {
    pub(crate) fn new(sram: &Sram) -> Self {
        SimCs { sram: sram.clone() }
    }
}

#[derive(Debug)]
pub(crate) struct SimPinError;

impl digital::Error for SimPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl PinErrorType for SimCs {
    type Error = SimPinError;
}

impl OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.sram.select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.sram.deselect()
    }
}

/// One physical SPI bus wired to a simulated SRAM, shareable by devices.
pub(crate) type SimBus = Mutex<RefCell<SimSpi>>;

/// Blocking driver on a [`SimBus`].
pub(crate) type SimMemory<'a> = SharedSpiMemory<'a, SimSpi, SimCs>;

pub(crate) fn sim_bus(sram: &Sram) -> SimBus {
    Mutex::new(RefCell::new(SimSpi::new(sram)))
}

/// Attach one more driver, with its own chip select, to `bus`. Not started.
pub(crate) fn sim_memory<'a>(bus: &'a SimBus, sram: &Sram, mem: MemSelect) -> SimMemory<'a> {
    SpiMemory::on_shared_bus(bus, SimCs::new(sram), mem).unwrap()
}

// ── DMA transfer queue ─────────────────────────────────────────────────────

#[cfg(feature = "dma")]
pub(crate) use dma_sim::SimDmaQueue;

#[cfg(feature = "dma")]
mod dma_sim {
    use std::cell::{Cell, RefCell};
    use std::vec::Vec;

    use super::Sram;
    use crate::memory::{Channel, Transfer, TransferQueue, TransferStatus};

    #[derive(Clone, Copy)]
    enum Slot {
        Idle,
        InFlight { transfer: Transfer, remaining: u32 },
        Done,
    }

    /// Transfer queue that runs each transfer against a simulated SRAM once
    /// its descriptor has been polled `polls_to_complete` times.
    pub(crate) struct SimDmaQueue {
        sram: Sram,
        polls_to_complete: u32,
        slots: RefCell<[Slot; 2]>,
        polls: Cell<u32>,
        begun: u32,
        registered: RefCell<Vec<Channel>>,
    }

    fn index(channel: Channel) -> usize {
        match channel {
            Channel::Outbound => 0,
            Channel::Inbound => 1,
        }
    }

    impl SimDmaQueue {
        pub(crate) fn new(sram: &Sram, polls_to_complete: u32) -> Self {
            SimDmaQueue {
                sram: sram.clone(),
                polls_to_complete,
                slots: RefCell::new([Slot::Idle; 2]),
                polls: Cell::new(0),
                begun: 0,
                registered: RefCell::new(Vec::new()),
            }
        }

        /// Total status polls observed.
        pub(crate) fn polls(&self) -> u32 {
            self.polls.get()
        }

        pub(crate) fn begin_count(&self) -> u32 {
            self.begun
        }

        /// Channels in registration order.
        pub(crate) fn registered(&self) -> Vec<Channel> {
            self.registered.borrow().clone()
        }

        /// Run the transfer as the DMA engine would: assert chip select,
        /// shift `len` bytes out of `tx`, capture what comes back into `rx`.
        fn execute(&self, transfer: Transfer) {
            self.sram.select();
            for i in 0..transfer.len {
                // SAFETY: the driver keeps both buffers alive and untouched
                // while the transfer is in flight, and `len` fits them.
                unsafe {
                    let out = *transfer.tx.as_ptr().add(i);
                    let back = self.sram.0.borrow_mut().shift(out);
                    if let Some(rx) = transfer.rx {
                        *rx.as_ptr().add(i) = back;
                    }
                }
            }
            let _ = self.sram.deselect();
        }
    }

    impl TransferQueue for SimDmaQueue {
        fn begin(&mut self) {
            self.begun += 1;
        }

        unsafe fn register(&mut self, channel: Channel, transfer: Transfer) {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[index(channel)];
            assert!(
                !matches!(slot, Slot::InFlight { .. }),
                "transfer registered on {channel:?} descriptor while in flight"
            );
            *slot = Slot::InFlight {
                transfer,
                remaining: self.polls_to_complete,
            };
            self.registered.borrow_mut().push(channel);
        }

        fn status(&self, channel: Channel) -> TransferStatus {
            self.polls.set(self.polls.get() + 1);
            let current = self.slots.borrow()[index(channel)];
            match current {
                Slot::Idle => TransferStatus::Idle,
                Slot::Done => TransferStatus::Done,
                Slot::InFlight {
                    transfer,
                    remaining: 0,
                } => {
                    self.execute(transfer);
                    self.slots.borrow_mut()[index(channel)] = Slot::Done;
                    TransferStatus::Done
                }
                Slot::InFlight {
                    transfer,
                    remaining,
                } => {
                    self.slots.borrow_mut()[index(channel)] = Slot::InFlight {
                        transfer,
                        remaining: remaining - 1,
                    };
                    TransferStatus::InFlight
                }
            }
        }
    }
}
