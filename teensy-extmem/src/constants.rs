/// Number of 16-bit samples per audio block.
pub const AUDIO_BLOCK_SAMPLES: usize = 128;

/// Exact audio sample rate in Hz (matches Teensy hardware PLL configuration).
pub const AUDIO_SAMPLE_RATE_EXACT: f32 = 44_117.647;

/// Bytes occupied by one sample in external memory.
pub const BYTES_PER_SAMPLE: u32 = 2;

/// Number of physical SPI buses that can carry external memory.
pub const BUS_COUNT: usize = 2;

/// Attempts made by the blocking driver before a bus fault is surfaced.
pub const MAX_RETRIES: u8 = 3;

/// Length of the opcode + 24-bit address header, in bytes.
pub const COMMAND_HEADER_BYTES: usize = 4;
