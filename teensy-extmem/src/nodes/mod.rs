//! Audio nodes backed by external memory.
//!
//! | Node | Inputs | Outputs | Description |
//! |------|--------|---------|-------------|
//! | [`AudioEffectLoopExternal`] | 1 | 1 | Pass-through recorder that loops the last `n` ms on demand |
//!
//! Each implements the [`AudioNode`](crate::node::AudioNode) trait.

mod effect_loop_external;

pub use effect_loop_external::{AudioEffectLoopExternal, Capacity, LoopConfig, LoopState};
