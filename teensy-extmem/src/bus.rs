//! Shared SPI bus usage tracking.
//!
//! The audio update runs at interrupt priority and may start SPI traffic at
//! any time, so while any delay line on a bus is active, the bus driver must
//! mask the audio interrupt around its own transactions. [`SharedBus`] keeps
//! one reference count per physical bus and tells the platform when masking
//! must start (count 0 → 1) and when it may stop (count 1 → 0).
//!
//! The counts live in a [`critical_section::Mutex`], which is enough because
//! the only contender is the audio interrupt itself.
//!
//! ```ignore
//! static BUS: SharedBus<TeensySpiInterrupts> = SharedBus::new(TeensySpiInterrupts);
//!
//! let mut looper = AudioEffectLoopExternal::<_, _>::new(sram, &BUS, config)?;
//! looper.delay(500.0); // BUS.start(0) on the first active engine
//! looper.disable();    // BUS.stop(0) on the last one
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::constants::BUS_COUNT;

/// Platform hook that routes the audio interrupt through the SPI driver's
/// interrupt masking.
pub trait BusInterrupts {
    /// Start masking the audio interrupt during transactions on `bus`.
    fn using_interrupt(&mut self, bus: usize);

    /// Stop masking the audio interrupt on `bus`.
    fn not_using_interrupt(&mut self, bus: usize);
}

/// No masking needed (single-context use, or tests).
impl BusInterrupts for () {
    fn using_interrupt(&mut self, _bus: usize) {}
    fn not_using_interrupt(&mut self, _bus: usize) {}
}

struct Usage<I> {
    counts: [u32; BUS_COUNT],
    interrupts: I,
}

/// Per-bus reference count of active users, shared by every delay line on
/// the board.
pub struct SharedBus<I> {
    inner: Mutex<RefCell<Usage<I>>>,
}

impl<I: BusInterrupts> SharedBus<I> {
    /// Create a tracker with every count at zero.
    pub const fn new(interrupts: I) -> Self {
        SharedBus {
            inner: Mutex::new(RefCell::new(Usage {
                counts: [0; BUS_COUNT],
                interrupts,
            })),
        }
    }

    /// Register one more active user of `bus`. Returns the new count.
    ///
    /// # Panics
    ///
    /// If `bus >= BUS_COUNT`.
    pub fn start(&self, bus: usize) -> u32 {
        critical_section::with(|cs| {
            let mut usage = self.inner.borrow_ref_mut(cs);
            let usage = &mut *usage;
            usage.counts[bus] += 1;
            let count = usage.counts[bus];
            if count == 1 {
                log::debug!("spi bus {} in use, masking audio interrupt", bus);
                usage.interrupts.using_interrupt(bus);
            }
            count
        })
    }

    /// Drop one active user of `bus`. Returns the new count.
    ///
    /// Stopping a bus with no users is ignored.
    ///
    /// # Panics
    ///
    /// If `bus >= BUS_COUNT`.
    pub fn stop(&self, bus: usize) -> u32 {
        critical_section::with(|cs| {
            let mut usage = self.inner.borrow_ref_mut(cs);
            let usage = &mut *usage;
            match usage.counts[bus] {
                0 => {
                    log::warn!("spi bus {} stopped with no active users", bus);
                    0
                }
                1 => {
                    usage.counts[bus] = 0;
                    log::debug!("spi bus {} idle, unmasking audio interrupt", bus);
                    usage.interrupts.not_using_interrupt(bus);
                    0
                }
                n => {
                    usage.counts[bus] = n - 1;
                    n - 1
                }
            }
        })
    }

    /// Number of active users of `bus`.
    pub fn usage(&self, bus: usize) -> u32 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).counts[bus])
    }

    /// Run `f` with the platform hook, e.g. to inspect it.
    pub fn with_interrupts<R>(&self, f: impl FnOnce(&mut I) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs).interrupts))
    }
}
