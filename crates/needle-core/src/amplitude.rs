//! Peak amplitude extraction from interleaved PCM blocks.
//!
//! A block holds `frames × channels` samples laid out frame by frame
//! (`L R L R …` for stereo). The extractor strides over one channel and
//! reports the largest magnitude normalised to full scale.

/// Full-scale magnitude of a signed 16-bit sample.
pub const I16_FULL_SCALE: f32 = 32768.0;

/// A PCM sample that knows its own magnitude relative to full scale.
pub trait PcmSample: Copy {
    /// Absolute value of the sample divided by full scale, in `[0, 1]`.
    fn magnitude(self) -> f32;
}

impl PcmSample for i16 {
    fn magnitude(self) -> f32 {
        // i32 so that |-32768| does not overflow
        (self as i32).abs() as f32 / I16_FULL_SCALE
    }
}

impl PcmSample for u16 {
    fn magnitude(self) -> f32 {
        // Offset binary: 32768 is silence.
        (self as i32 - 32768).abs() as f32 / I16_FULL_SCALE
    }
}

impl PcmSample for f32 {
    fn magnitude(self) -> f32 {
        // NaN.min(1.0) is 1.0, so handle it explicitly.
        if self.is_nan() {
            0.0
        } else {
            self.abs().min(1.0)
        }
    }
}

/// Peak normalised magnitude of `channel` within an interleaved block.
///
/// Every sample of the channel is visited once. An empty block, a zero
/// channel count or a channel index past the layout all give `0.0`.
pub fn peak_amplitude<S: PcmSample>(block: &[S], channels: usize, channel: usize) -> f32 {
    if channels == 0 || channel >= channels {
        return 0.0;
    }

    block
        .iter()
        .skip(channel)
        .step_by(channels)
        .map(|&s| s.magnitude())
        .fold(0.0_f32, f32::max)
}
