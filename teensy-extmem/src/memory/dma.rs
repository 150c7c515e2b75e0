//! Pipelined SPI SRAM driver over a DMA transfer queue.
//!
//! [`SpiMemoryDma`] queues transfers instead of clocking them out itself.
//! It owns two descriptors, one outbound (writes and zero fills) and one
//! inbound (reads), each backed by a scratch buffer holding the 4-byte
//! command header inline with the payload so the whole transaction is a
//! single contiguous DMA transfer:
//!
//! ```text
//! scratch buffer (capacity + 4 bytes)
//! ┌────────┬──────┬──────┬──────┬─────────────────────────┐
//! │ opcode │ A23… │ A15… │ A7…  │ payload (out) / data in │
//! └────────┴──────┴──────┴──────┴─────────────────────────┘
//! ```
//!
//! ## Descriptor discipline
//!
//! A buffer belongs to the DMA engine while its descriptor is in flight.
//! Every method that reuses a buffer first busy-polls that descriptor until
//! the previous transfer finished, so back-to-back writes serialize instead
//! of corrupting the transfer on the wire. Transfers on one descriptor run in
//! issue order; nothing orders the outbound descriptor against the inbound
//! one.
//!
//! Reads are two-step: [`read()`](SpiMemoryDma::read) queues the transfer,
//! [`read_buffer_contents()`](SpiMemoryDma::read_buffer_contents) waits for
//! it and copies the data out. Callers that must not block can check
//! [`is_read_busy()`](SpiMemoryDma::is_read_busy) or
//! [`poll_read_status()`](SpiMemoryDma::poll_read_status) first.

use core::ptr::NonNull;

use super::command::{self, command_header, decode_samples, encode_samples};
use super::device::{MemSelect, SpiSettings};
use super::SampleMemory;
use crate::constants::{BYTES_PER_SAMPLE, COMMAND_HEADER_BYTES};
use crate::error::Error;

/// One of the driver's two transfer descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Writes and zero fills.
    Outbound,
    /// Reads.
    Inbound,
}

/// State of a descriptor as reported by the transfer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Nothing has been issued on this descriptor yet.
    Idle,
    /// The DMA engine owns the descriptor's buffer.
    InFlight,
    /// The last transfer completed; the buffer is back with the driver.
    Done,
}

/// Active-low chip select handed to the queue with every transfer.
///
/// The queue asserts `pin` for the duration of the transfer and applies
/// `settings` to the bus before starting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLowChipSelect {
    pub pin: u8,
    pub settings: SpiSettings,
}

/// A transfer as handed to the DMA engine.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    /// Bytes shifted out, `len` of them.
    pub tx: NonNull<u8>,
    /// Where the bytes shifted in go, or `None` to discard them.
    pub rx: Option<NonNull<u8>>,
    /// Total length including the command header.
    pub len: usize,
    pub cs: ActiveLowChipSelect,
}

/// A DMA-driven SPI transfer engine.
///
/// Implementations run registered transfers in order per channel and report
/// completion through [`status()`](Self::status).
pub trait TransferQueue {
    /// Start the engine. Called once by [`SpiMemoryDma::begin`].
    fn begin(&mut self);

    /// Queue `transfer` on `channel`.
    ///
    /// # Safety
    ///
    /// `transfer.tx` (and `transfer.rx`, if any) must point to at least
    /// `transfer.len` bytes that stay valid and are not accessed by anyone
    /// else until `status(channel)` stops reporting
    /// [`TransferStatus::InFlight`]. The channel must not already be in flight.
    unsafe fn register(&mut self, channel: Channel, transfer: Transfer);

    /// Current state of the descriptor on `channel`. Must not block.
    fn status(&self, channel: Channel) -> TransferStatus;
}

/// Pipelined driver for one external SPI SRAM.
///
/// Scratch buffers are supplied by the caller as `'static` storage (placed
/// in DMA-capable RAM on hardware) so they cannot move or be freed while a
/// transfer is in flight. Payload capacity is the smaller buffer length
/// minus the 4-byte header.
pub struct SpiMemoryDma<Q> {
    queue: Q,
    mem: MemSelect,
    cs: ActiveLowChipSelect,
    tx_buffer: &'static mut [u8],
    rx_buffer: &'static mut [u8],
    /// Total length of the last inbound transfer, header included.
    rx_len: usize,
    started: bool,
}

impl<Q: TransferQueue> SpiMemoryDma<Q> {
    /// Create a driver with the default 20 MHz settings.
    ///
    /// # Panics
    ///
    /// If either buffer cannot hold the command header plus one sample.
    pub fn new(
        queue: Q,
        mem: MemSelect,
        tx_buffer: &'static mut [u8],
        rx_buffer: &'static mut [u8],
    ) -> Self {
        Self::with_settings(queue, mem, SpiSettings::DEFAULT, tx_buffer, rx_buffer)
    }

    /// Create a driver with explicit bus settings.
    pub fn with_settings(
        queue: Q,
        mem: MemSelect,
        settings: SpiSettings,
        tx_buffer: &'static mut [u8],
        rx_buffer: &'static mut [u8],
    ) -> Self {
        let min = COMMAND_HEADER_BYTES + BYTES_PER_SAMPLE as usize;
        assert!(
            tx_buffer.len() >= min && rx_buffer.len() >= min,
            "DMA scratch buffers must hold at least {min} bytes"
        );
        SpiMemoryDma {
            queue,
            mem,
            cs: ActiveLowChipSelect {
                pin: mem.config().cs,
                settings,
            },
            tx_buffer,
            rx_buffer,
            rx_len: 0,
            started: false,
        }
    }

    /// Start the underlying transfer queue. Only the first call has an effect.
    pub fn begin(&mut self) {
        if self.started {
            return;
        }
        self.queue.begin();
        self.started = true;
        log::debug!(
            "dma spi memory {:?} started, {} byte payloads",
            self.mem,
            self.capacity()
        );
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn mem(&self) -> MemSelect {
        self.mem
    }

    pub fn chip_select(&self) -> &ActiveLowChipSelect {
        &self.cs
    }

    /// Largest payload, in bytes, one transfer can carry.
    pub fn capacity(&self) -> usize {
        self.tx_buffer.len().min(self.rx_buffer.len()) - COMMAND_HEADER_BYTES
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Wait for both descriptors to finish and return the queue and buffers.
    pub fn release(self) -> (Q, &'static mut [u8], &'static mut [u8]) {
        self.wait(Channel::Outbound);
        self.wait(Channel::Inbound);
        (self.queue, self.tx_buffer, self.rx_buffer)
    }

    // ── Status ─────────────────────────────────────────────────────────

    /// Non-blocking state of the outbound descriptor.
    pub fn poll_write_status(&self) -> TransferStatus {
        self.queue.status(Channel::Outbound)
    }

    /// Non-blocking state of the inbound descriptor.
    pub fn poll_read_status(&self) -> TransferStatus {
        self.queue.status(Channel::Inbound)
    }

    /// `true` while a write or zero fill is in flight.
    pub fn is_write_busy(&self) -> bool {
        self.poll_write_status() == TransferStatus::InFlight
    }

    /// `true` while a read is in flight.
    pub fn is_read_busy(&self) -> bool {
        self.poll_read_status() == TransferStatus::InFlight
    }

    fn wait(&self, channel: Channel) {
        while self.queue.status(channel) == TransferStatus::InFlight {
            core::hint::spin_loop();
        }
    }

    fn check(&self, payload: usize) -> Result<(), Error> {
        if !self.started {
            return Err(Error::NotStarted);
        }
        let capacity = self.capacity();
        if payload > capacity {
            return Err(Error::TransferTooLarge {
                requested: payload,
                capacity,
            });
        }
        Ok(())
    }

    // ── Outbound ───────────────────────────────────────────────────────

    /// Queue a write of `data` at byte `address`.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.queue_write(address, data.len(), |payload| payload.copy_from_slice(data))
    }

    /// Queue a write of `count` zero bytes at byte `address`.
    pub fn zero(&mut self, address: u32, count: usize) -> Result<(), Error> {
        self.queue_write(address, count, |payload| payload.fill(0))
    }

    /// Queue a write of 16-bit words at byte `address`.
    pub fn write16(&mut self, address: u32, data: &[u16]) -> Result<(), Error> {
        self.queue_write(address, data.len() * 2, |payload| encode_samples(data, payload))
    }

    /// Queue a write of `count` zero words at byte `address`.
    pub fn zero16(&mut self, address: u32, count: usize) -> Result<(), Error> {
        self.zero(address, count * 2)
    }

    fn queue_write(
        &mut self,
        address: u32,
        payload_len: usize,
        fill: impl FnOnce(&mut [u8]),
    ) -> Result<(), Error> {
        self.check(payload_len)?;
        self.wait(Channel::Outbound);

        let len = COMMAND_HEADER_BYTES + payload_len;
        self.tx_buffer[..COMMAND_HEADER_BYTES]
            .copy_from_slice(&command_header(command::WRITE, address));
        fill(&mut self.tx_buffer[COMMAND_HEADER_BYTES..len]);

        let transfer = Transfer {
            tx: NonNull::from(&mut *self.tx_buffer).cast::<u8>(),
            rx: None,
            len,
            cs: self.cs,
        };
        // SAFETY: the buffer is 'static and exclusively ours; the outbound
        // descriptor was idle (waited above) and every later access to
        // `tx_buffer` waits on it again.
        unsafe { self.queue.register(Channel::Outbound, transfer) };
        Ok(())
    }

    // ── Inbound ────────────────────────────────────────────────────────

    /// Queue a read of `count` bytes from byte `address`.
    ///
    /// The data is available through
    /// [`read_buffer_contents()`](Self::read_buffer_contents).
    pub fn read(&mut self, address: u32, count: usize) -> Result<(), Error> {
        self.check(count)?;
        self.wait(Channel::Inbound);

        let len = COMMAND_HEADER_BYTES + count;
        self.rx_buffer[..COMMAND_HEADER_BYTES]
            .copy_from_slice(&command_header(command::READ, address));
        self.rx_buffer[COMMAND_HEADER_BYTES..len].fill(0);
        self.rx_len = len;

        let buffer = NonNull::from(&mut *self.rx_buffer).cast::<u8>();
        let transfer = Transfer {
            tx: buffer,
            rx: Some(buffer),
            len,
            cs: self.cs,
        };
        // SAFETY: as for writes, with the inbound descriptor guarding
        // `rx_buffer`. The engine shifts each byte out before it stores the
        // byte shifted in at the same position, so sharing the buffer is fine.
        unsafe { self.queue.register(Channel::Inbound, transfer) };
        Ok(())
    }

    /// Queue a read of `count` 16-bit words from byte `address`.
    pub fn read16(&mut self, address: u32, count: usize) -> Result<(), Error> {
        self.read(address, count * 2)
    }

    /// Wait for the pending read, then copy `dest.len()` bytes starting
    /// `offset` bytes into its payload.
    pub fn read_buffer_contents(&mut self, dest: &mut [u8], offset: usize) -> Result<(), Error> {
        self.wait(Channel::Inbound);
        let start = COMMAND_HEADER_BYTES + offset;
        let end = start + dest.len();
        if end > self.rx_len {
            return Err(Error::TransferTooLarge {
                requested: offset + dest.len(),
                capacity: self.rx_len.saturating_sub(COMMAND_HEADER_BYTES),
            });
        }
        dest.copy_from_slice(&self.rx_buffer[start..end]);
        Ok(())
    }

    /// Wait for the pending read, then decode `dest.len()` words starting
    /// `word_offset` words into its payload.
    pub fn read_buffer_contents16(
        &mut self,
        dest: &mut [u16],
        word_offset: usize,
    ) -> Result<(), Error> {
        self.wait(Channel::Inbound);
        let start = COMMAND_HEADER_BYTES + word_offset * 2;
        let end = start + dest.len() * 2;
        if end > self.rx_len {
            return Err(Error::TransferTooLarge {
                requested: (word_offset + dest.len()) * 2,
                capacity: self.rx_len.saturating_sub(COMMAND_HEADER_BYTES),
            });
        }
        decode_samples(&self.rx_buffer[start..end], dest);
        Ok(())
    }

    /// Samples that fit in one transfer.
    fn samples_per_transfer(&self) -> usize {
        self.capacity() / BYTES_PER_SAMPLE as usize
    }
}

impl<Q: TransferQueue> SampleMemory for SpiMemoryDma<Q> {
    fn write_samples(&mut self, address: u32, samples: &[i16]) -> Result<(), Error> {
        let per = self.samples_per_transfer();
        let mut address = address;
        for chunk in samples.chunks(per) {
            self.queue_write(address, chunk.len() * 2, |payload| {
                for (pair, &s) in payload.chunks_exact_mut(2).zip(chunk.iter()) {
                    pair.copy_from_slice(&s.to_be_bytes());
                }
            })?;
            address += (chunk.len() * 2) as u32;
        }
        Ok(())
    }

    fn read_samples(&mut self, address: u32, dest: &mut [i16]) -> Result<(), Error> {
        // The descriptors are not ordered against each other; drain queued
        // writes so the read observes them.
        self.wait(Channel::Outbound);
        let per = self.samples_per_transfer();
        let mut address = address;
        for chunk in dest.chunks_mut(per) {
            let bytes = chunk.len() * 2;
            self.read(address, bytes)?;
            self.wait(Channel::Inbound);
            let payload = &self.rx_buffer[COMMAND_HEADER_BYTES..COMMAND_HEADER_BYTES + bytes];
            for (s, pair) in chunk.iter_mut().zip(payload.chunks_exact(2)) {
                *s = i16::from_be_bytes([pair[0], pair[1]]);
            }
            address += bytes as u32;
        }
        Ok(())
    }

    fn zero_samples(&mut self, address: u32, count: usize) -> Result<(), Error> {
        let per = self.samples_per_transfer();
        let mut address = address;
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(per);
            self.zero(address, n * 2)?;
            address += (n * 2) as u32;
            remaining -= n;
        }
        Ok(())
    }
}
