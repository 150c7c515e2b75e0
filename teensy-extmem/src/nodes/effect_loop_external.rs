//! Looper backed by external SPI SRAM.
//!
//! [`AudioEffectLoopExternal`] treats a region of external memory as a
//! circular buffer. While idle it passes audio straight through and records
//! every block at the write head. Calling [`delay()`](AudioEffectLoopExternal::delay)
//! freezes the recording and starts playing back the last `n` samples in a
//! loop until [`disable()`](AudioEffectLoopExternal::disable).
//!
//! ```text
//!            region (length samples)
//!   0                                         length
//!   ├──────────────┬───────────────┬──────────┤
//!   │  older audio │◄── delay ────►│          │
//!   └──────────────┴───────────────┴──────────┘
//!                  ▲               ▲
//!             read_offset      write_head
//! ```
//!
//! Any block that straddles the end of the region is moved in two pieces,
//! see [`split_span`].
//!
//! # Example
//!
//! ```ignore
//! static BUS: SharedBus<()> = SharedBus::new(());
//!
//! let config = LoopConfig::new(MemSelect::Mem0).capacity_ms(2000.0);
//! let mut looper = AudioEffectLoopExternal::<_, _>::new(sram, &BUS, config)?;
//! looper.clear()?;
//!
//! // In the audio update:
//! looper.update(input.as_deref(), output.as_deref_mut());
//!
//! // From the UI:
//! looper.delay(750.0);  // loop the last 750 ms
//! looper.disable();     // back to pass-through
//! ```

use crate::bus::{BusInterrupts, SharedBus};
use crate::constants::{AUDIO_BLOCK_SAMPLES, AUDIO_SAMPLE_RATE_EXACT};
use crate::error::Error;
use crate::memory::{
    calc_audio_samples, calc_audio_time_ms, split_span, wrap_add, wrap_sub, MemSelect,
    MemoryRegion, SampleMemory, Span,
};
use crate::node::{AudioBlock, AudioNode};

/// How much external memory a looper reserves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
    /// A fixed number of 16-bit samples.
    Samples(u32),
    /// A duration in milliseconds, converted at the configured sample rate.
    Millis(f32),
}

/// Construction parameters for [`AudioEffectLoopExternal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    /// Memory device holding the region.
    pub mem: MemSelect,
    /// First sample of the region on the device.
    pub start: u32,
    /// Region size; clamped to what is left of the device after `start`.
    pub capacity: Capacity,
    /// Sample rate used to convert milliseconds to samples.
    pub sample_rate: f32,
}

impl LoopConfig {
    /// The whole of `mem`, at the hardware sample rate.
    pub const fn new(mem: MemSelect) -> Self {
        LoopConfig {
            mem,
            start: 0,
            capacity: Capacity::Samples(mem.capacity()),
            sample_rate: AUDIO_SAMPLE_RATE_EXACT,
        }
    }

    pub const fn start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    pub const fn capacity_samples(mut self, samples: u32) -> Self {
        self.capacity = Capacity::Samples(samples);
        self
    }

    pub const fn capacity_ms(mut self, milliseconds: f32) -> Self {
        self.capacity = Capacity::Millis(milliseconds);
        self
    }

    pub const fn sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

/// Looper mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Pass-through; every block is recorded at the write head.
    Recording,
    /// Recording frozen; the last `delay_length()` samples play in a loop.
    Looping,
}

/// Looper over a region of external SPI SRAM.
///
/// `N` is the block size in samples. All methods take `&mut self`; when the
/// looper is shared between the audio interrupt and application code, keep
/// it in a `critical_section::Mutex<RefCell<_>>`.
pub struct AudioEffectLoopExternal<'a, M, I: BusInterrupts, const N: usize = AUDIO_BLOCK_SAMPLES>
{
    memory: M,
    bus: &'a SharedBus<I>,
    region: MemoryRegion,
    sample_rate: f32,
    /// Next sample slot to record into.
    write_head: u32,
    /// Next sample slot to play from.
    read_offset: u32,
    delay_samples: u32,
    active: bool,
    faults: u32,
}

impl<'a, M, I, const N: usize> AudioEffectLoopExternal<'a, M, I, N>
where
    M: SampleMemory,
    I: BusInterrupts,
{
    /// Reserve a region as described by `config`.
    ///
    /// The region is clamped to the device. This does no bus traffic; call
    /// [`clear()`](Self::clear) to wipe stale contents.
    pub fn new(memory: M, bus: &'a SharedBus<I>, config: LoopConfig) -> Result<Self, Error> {
        let samples = match config.capacity {
            Capacity::Samples(n) => n,
            Capacity::Millis(ms) => calc_audio_samples(ms, config.sample_rate),
        };
        let region = MemoryRegion::new(config.mem, config.start, samples)?;
        if (region.len() as usize) < N {
            return Err(Error::RegionTooSmall {
                length: region.len(),
                block: N,
            });
        }
        log::debug!(
            "loop on {:?}: samples {}..{}",
            config.mem,
            region.start(),
            region.start() + region.len()
        );
        Ok(AudioEffectLoopExternal {
            memory,
            bus,
            region,
            sample_rate: config.sample_rate,
            write_head: 0,
            read_offset: 0,
            delay_samples: 0,
            active: false,
            faults: 0,
        })
    }

    /// Zero the whole region.
    pub fn clear(&mut self) -> Result<(), Error> {
        let address = self.region.byte_address(0);
        self.memory
            .zero_samples(address, self.region.len() as usize)
    }

    /// Start looping the last `milliseconds` of recorded audio.
    ///
    /// Negative values mean zero; values beyond the region are clamped.
    pub fn delay(&mut self, milliseconds: f32) {
        let n = calc_audio_samples(milliseconds, self.sample_rate);
        self.delay_samples(n);
    }

    /// Start looping the last `samples` recorded samples.
    ///
    /// The loop can be at most one sample shorter than the region so the
    /// read position never coincides with the write head.
    pub fn delay_samples(&mut self, samples: u32) {
        let max = self.max_delay_samples();
        let n = if samples > max {
            log::warn!("loop delay of {} samples clamped to {}", samples, max);
            max
        } else {
            samples
        };

        self.delay_samples = n;
        self.read_offset = wrap_sub(self.write_head, n, self.region.len());

        if !self.active {
            self.bus.start(self.region.mem().bus_id());
        }
        self.active = true;
        log::debug!(
            "loop active: {} samples, write head {}, read offset {}",
            n,
            self.write_head,
            self.read_offset
        );
    }

    /// Stop looping and return to pass-through recording.
    pub fn disable(&mut self) {
        if self.active {
            self.active = false;
            self.bus.stop(self.region.mem().bus_id());
            log::debug!("loop disabled at write head {}", self.write_head);
        }
    }

    /// Process one block.
    ///
    /// Without an output block nothing happens. Bus faults are returned;
    /// [`AudioNode::update`] turns them into silence.
    pub fn process(
        &mut self,
        input: Option<&AudioBlock<N>>,
        output: Option<&mut AudioBlock<N>>,
    ) -> Result<(), Error> {
        let Some(output) = output else {
            log::trace!("loop: no output block, dropping");
            return Ok(());
        };

        if self.active {
            return self.play(output);
        }

        match input {
            Some(block) => {
                output.copy_from_slice(block);
                self.record(Some(block))
            }
            None => {
                // Record silence so the loop never replays stale memory.
                output.fill(0);
                self.record(None)
            }
        }
    }

    fn record(&mut self, block: Option<&AudioBlock<N>>) -> Result<(), Error> {
        let len = self.region.len();
        let (first, second) = split_span(self.write_head, N as u32, len);
        let split = first.len as usize;

        self.store(first, block.map(|b| &b[..split]))?;
        if let Some(second) = second {
            self.store(second, block.map(|b| &b[split..]))?;
        }

        self.write_head = wrap_add(self.write_head, N as u32, len);
        Ok(())
    }

    fn store(&mut self, span: Span, data: Option<&[i16]>) -> Result<(), Error> {
        let address = self.region.byte_address(span.offset);
        match data {
            Some(samples) => self.memory.write_samples(address, samples),
            None => self.memory.zero_samples(address, span.len as usize),
        }
    }

    fn play(&mut self, output: &mut AudioBlock<N>) -> Result<(), Error> {
        let len = self.region.len();
        let (first, second) = split_span(self.read_offset, N as u32, len);
        let (head, tail) = output.split_at_mut(first.len as usize);

        self.memory
            .read_samples(self.region.byte_address(first.offset), head)?;
        if let Some(second) = second {
            self.memory
                .read_samples(self.region.byte_address(second.offset), tail)?;
        }

        // Samples left before the read position would reach the write head.
        let lag = wrap_sub(self.write_head, self.read_offset, len);
        self.read_offset = if lag <= N as u32 {
            wrap_sub(self.write_head, self.delay_samples, len)
        } else {
            wrap_add(self.read_offset, N as u32, len)
        };
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn state(&self) -> LoopState {
        if self.active {
            LoopState::Looping
        } else {
            LoopState::Recording
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    pub fn write_head(&self) -> u32 {
        self.write_head
    }

    pub fn read_offset(&self) -> u32 {
        self.read_offset
    }

    /// Current loop length in samples.
    pub fn delay_length(&self) -> u32 {
        self.delay_samples
    }

    /// Longest loop the region supports, in samples.
    pub fn max_delay_samples(&self) -> u32 {
        self.region.len() - 1
    }

    /// Longest loop the region supports, in milliseconds.
    pub fn max_delay_ms(&self) -> f32 {
        calc_audio_time_ms(self.max_delay_samples(), self.sample_rate)
    }

    /// Blocks replaced by silence because of bus faults.
    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

impl<'a, M, I, const N: usize> AudioNode<N> for AudioEffectLoopExternal<'a, M, I, N>
where
    M: SampleMemory,
    I: BusInterrupts,
{
    fn update(&mut self, input: Option<&AudioBlock<N>>, mut output: Option<&mut AudioBlock<N>>) {
        if let Err(e) = self.process(input, output.as_deref_mut()) {
            self.faults = self.faults.saturating_add(1);
            log::warn!("loop: external memory fault, emitting silence: {}", e);
            if let Some(out) = output {
                out.fill(0);
            }
        }
    }
}

impl<'a, M, I: BusInterrupts, const N: usize> Drop for AudioEffectLoopExternal<'a, M, I, N> {
    fn drop(&mut self) {
        if self.active {
            self.bus.stop(self.region.mem().bus_id());
        }
    }
}
