//! # teensy-extmem
//!
//! A `no_std` driver for external SPI SRAM on the
//! [Teensy 4.x](https://www.pjrc.com/teensy/) audio boards, and a looping
//! delay line that records into it. It plugs into the same block-based
//! update model as the [PJRC Teensy Audio Library](https://www.pjrc.com/teensy/td_libs_Audio.html):
//! one `update()` per 128-sample block, called from the audio interrupt.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Device | [`memory`] | Device table, command framing, region arithmetic |
//! | Driver | [`memory::SpiMemory`] | Blocking transfers over an `embedded-hal` SPI device |
//! | Driver | [`memory::SpiMemoryDma`] | Pipelined transfers over a DMA queue (`dma` feature) |
//! | Bus | [`bus`] | Per-bus usage count and audio interrupt masking |
//! | Trait | [`node`] | `AudioNode` block hook |
//! | Effect | [`nodes`] | [`AudioEffectLoopExternal`](nodes::AudioEffectLoopExternal) |
//!
//! ## Quick start
//!
//! ```ignore
//! use teensy_extmem::bus::SharedBus;
//! use teensy_extmem::memory::{MemSelect, SpiMemory};
//! use teensy_extmem::node::AudioNode;
//! use teensy_extmem::nodes::{AudioEffectLoopExternal, LoopConfig};
//!
//! static BUS: SharedBus<()> = SharedBus::new(());
//!
//! // `spi` is any `embedded_hal::spi::SpiDevice`; use
//! // `SpiMemory::on_shared_bus` to put several loopers on one bus.
//! let mut sram = SpiMemory::new(spi, MemSelect::Mem0);
//! sram.begin();
//!
//! let config = LoopConfig::new(MemSelect::Mem0).capacity_ms(1500.0);
//! let mut looper = AudioEffectLoopExternal::<_, _>::new(sram, &BUS, config)?;
//! looper.clear()?;
//!
//! // In your audio ISR / timer callback:
//! looper.update(input.as_deref(), output.as_deref_mut());
//!
//! // From the UI:
//! looper.delay(400.0);
//! looper.disable();
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `dma` | yes | [`memory::SpiMemoryDma`] and the [`memory::TransferQueue`] trait |
//!
//! ## Audio parameters
//!
//! - **Block size:** 128 samples ([`constants::AUDIO_BLOCK_SAMPLES`])
//! - **Sample rate:** 44 117.647 Hz ([`constants::AUDIO_SAMPLE_RATE_EXACT`])
//! - **Sample format:** `i16`, stored MSB first
//! - **Device size:** 65 536 samples per memory ([`memory::MEM0_CONFIG`])
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: bus edges and loop changes at
//! `debug`, clamped parameters and bus faults at `warn`, per-transfer detail
//! at `trace`. Install any logger on the target to see them.

#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod error;
pub mod node;
pub mod memory;
pub mod bus;
pub mod nodes;

pub use error::Error;
