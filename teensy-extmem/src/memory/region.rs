//! Regions of external memory and circular-buffer span arithmetic.

use crate::constants::BYTES_PER_SAMPLE;
use crate::error::Error;

use super::device::MemSelect;

/// A contiguous run of samples inside a region: `len` samples from `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u32,
    pub len: u32,
}

/// Split an access of `len` samples starting at `start` within a circular
/// region of `region_len` samples.
///
/// Returns the span up to the end of the region and, if the access wraps,
/// the remainder starting at offset 0. The two lengths always sum to `len`.
///
/// Requires `start < region_len` and `len <= region_len`.
pub fn split_span(start: u32, len: u32, region_len: u32) -> (Span, Option<Span>) {
    debug_assert!(start < region_len, "span start {start} outside region of {region_len}");
    debug_assert!(len <= region_len, "span of {len} longer than region of {region_len}");

    if start + len <= region_len {
        (Span { offset: start, len }, None)
    } else {
        let first = region_len - start;
        (
            Span { offset: start, len: first },
            Some(Span { offset: 0, len: len - first }),
        )
    }
}

/// Advance a head by `step` samples around a region of `region_len` samples.
#[inline]
pub fn wrap_add(head: u32, step: u32, region_len: u32) -> u32 {
    ((head as u64 + step as u64) % region_len as u64) as u32
}

/// Position `distance` samples behind `head` around a region of `region_len`.
#[inline]
pub fn wrap_sub(head: u32, distance: u32, region_len: u32) -> u32 {
    if head >= distance {
        head - distance
    } else {
        region_len - (distance - head)
    }
}

/// Number of samples (rounded to nearest) covering `milliseconds` of audio.
///
/// Negative durations map to zero.
pub fn calc_audio_samples(milliseconds: f32, sample_rate: f32) -> u32 {
    if !(milliseconds > 0.0) {
        return 0;
    }
    libm::roundf(milliseconds * (sample_rate / 1000.0)) as u32
}

/// Duration in milliseconds of `samples` samples.
pub fn calc_audio_time_ms(samples: u32, sample_rate: f32) -> f32 {
    samples as f32 * 1000.0 / sample_rate
}

/// A slice of one external memory device reserved for a single user.
///
/// `start` and `length` are measured in samples. Regions owned by different
/// users must not overlap; that is up to whoever hands them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    mem: MemSelect,
    start: u32,
    length: u32,
}

impl MemoryRegion {
    /// Reserve up to `length` samples starting at sample `start` of `mem`.
    ///
    /// A region that would run past the end of the device is shortened to
    /// fit. A start at or beyond the end of the device is rejected.
    pub fn new(mem: MemSelect, start: u32, length: u32) -> Result<Self, Error> {
        let capacity = mem.capacity();
        if start >= capacity {
            return Err(Error::RegionOutOfRange { start, capacity });
        }
        let avail = capacity - start;
        let length = if length > avail {
            log::warn!("region of {} samples clamped to {}", length, avail);
            avail
        } else {
            length
        };
        Ok(MemoryRegion { mem, start, length })
    }

    /// The whole device.
    pub fn whole(mem: MemSelect) -> Self {
        MemoryRegion {
            mem,
            start: 0,
            length: mem.capacity(),
        }
    }

    pub fn mem(&self) -> MemSelect {
        self.mem
    }

    /// First sample of the region on the device.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Region size in samples.
    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Device byte address of the sample at `offset` within the region.
    #[inline]
    pub fn byte_address(&self, offset: u32) -> u32 {
        (self.start + offset) * BYTES_PER_SAMPLE
    }
}
