//! Synthetic stereo input for running without a capture device.
//!
//! A sine tone whose level swells slowly between full scale and a floor,
//! with the right channel a quarter cycle behind the left so the two needles
//! move independently.

use std::f64::consts::PI;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use needle_core::ForcePublisher;

pub const DEMO_SAMPLE_RATE: u32 = 48_000;
pub const DEMO_BLOCK_FRAMES: usize = 1024;

const CHANNELS: usize = 2;
const TONE_HZ: f64 = 440.0;
/// One full swell, loud → quiet → loud.
const SWELL_SECS: f64 = 4.0;
/// Quietest point of the swell.
const FLOOR_DB: f64 = -36.0;

/// Interleaved stereo i16 tone generator.
pub struct TestSignal {
    sample_rate: u32,
    frames: usize,
    position: u64,
}

impl TestSignal {
    pub fn new(sample_rate: u32, frames: usize) -> Self {
        Self {
            sample_rate,
            frames,
            position: 0,
        }
    }

    /// Wall time covered by one block.
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// Fill `out` with the next block and move on.
    pub fn next_block(&mut self, out: &mut Vec<i16>) {
        out.clear();
        out.reserve(self.frames * CHANNELS);
        let rate = self.sample_rate as f64;
        for i in 0..self.frames as u64 {
            let t = (self.position + i) as f64 / rate;
            let tone = (t * TONE_HZ * 2.0 * PI).sin();
            for ch in 0..CHANNELS {
                out.push((tone * envelope(t, ch) * i16::MAX as f64) as i16);
            }
        }
        self.position += self.frames as u64;
    }
}

/// Linear gain for `channel` at time `t`.
fn envelope(t: f64, channel: usize) -> f64 {
    let phase = 2.0 * PI * t / SWELL_SECS - channel as f64 * PI / 2.0;
    let depth = 0.5 - 0.5 * phase.cos();
    10f64.powf(FLOOR_DB * depth / 20.0)
}

/// Publish one block every block period until aborted.
pub fn spawn_demo(mut signal: TestSignal, publisher: ForcePublisher) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = signal.block_period();
        info!(
            "demo source: {} Hz tone, {} frames every {:?}",
            TONE_HZ, signal.frames, period
        );
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut block = Vec::new();
        loop {
            interval.tick().await;
            signal.next_block(&mut block);
            publisher.publish_block(&block, CHANNELS);
        }
    })
}
