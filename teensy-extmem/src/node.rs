use crate::constants::AUDIO_BLOCK_SAMPLES;

/// One block of signed 16-bit audio.
pub type AudioBlock<const N: usize = AUDIO_BLOCK_SAMPLES> = [i16; N];

/// Per-block processing hook invoked by the host's audio update.
///
/// The host hands over at most one input block and, if it could allocate
/// one, an output block to fill. A node must not hold on to either past the
/// call, and must tolerate `None` in both positions.
pub trait AudioNode<const N: usize = AUDIO_BLOCK_SAMPLES> {
    /// Process one block of audio.
    fn update(&mut self, input: Option<&AudioBlock<N>>, output: Option<&mut AudioBlock<N>>);
}
