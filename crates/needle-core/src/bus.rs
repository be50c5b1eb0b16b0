//! Lock-free scalars shared between the audio, simulation and render paths.
//!
//! Each slot has one writer and one reader. Values are f32 bit patterns in
//! an `AtomicU32`, so a read never observes half a write. Nothing is queued:
//! the reader always sees the latest published value.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::amplitude::{peak_amplitude, PcmSample};
use crate::force::ForceCurve;

/// A single f32 cell with latest-value-wins semantics.
#[derive(Debug)]
pub struct SharedScalar(AtomicU32);

impl SharedScalar {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedScalar {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Meter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Left => "L",
            Channel::Right => "R",
        }
    }
}

/// The two cross-context values for each channel.
#[derive(Debug, Default)]
pub struct MeterBus {
    forces: [SharedScalar; 2],
    deflections: [SharedScalar; 2],
}

impl MeterBus {
    /// Bus with zero force and needles resting at `deflection`.
    pub fn new(deflection: f32) -> Arc<Self> {
        Arc::new(Self {
            forces: [SharedScalar::new(0.0), SharedScalar::new(0.0)],
            deflections: [SharedScalar::new(deflection), SharedScalar::new(deflection)],
        })
    }

    pub fn force(&self, channel: Channel) -> f32 {
        self.forces[channel.index()].load()
    }

    pub fn set_force(&self, channel: Channel, force: f32) {
        self.forces[channel.index()].store(force);
    }

    /// Same force on both channels.
    pub fn set_forces(&self, force: f32) {
        for ch in Channel::ALL {
            self.set_force(ch, force);
        }
    }

    pub fn deflection(&self, channel: Channel) -> f32 {
        self.deflections[channel.index()].load()
    }

    pub fn set_deflection(&self, channel: Channel, deflection: f32) {
        self.deflections[channel.index()].store(deflection);
    }
}

/// The audio-side writer: turns each captured block into two forces.
///
/// Cheap to call from a real-time callback: no locks, no allocation, one
/// pass over each channel. Clones share the enable flag.
#[derive(Debug, Clone)]
pub struct ForcePublisher {
    bus: Arc<MeterBus>,
    curve: ForceCurve,
    enabled: Arc<AtomicBool>,
}

impl ForcePublisher {
    pub fn new(bus: Arc<MeterBus>, curve: ForceCurve) -> Self {
        Self {
            bus,
            curve,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// While disabled, blocks are dropped and the bus keeps whatever force
    /// was last set on it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Publish forces for an interleaved block with `channels` channels.
    /// A mono block drives both needles.
    pub fn publish_block<S: PcmSample>(&self, block: &[S], channels: usize) {
        if !self.is_enabled() {
            return;
        }
        for ch in Channel::ALL {
            let source = if channels == 1 { 0 } else { ch.index() };
            let peak = peak_amplitude(block, channels, source);
            self.bus.set_force(ch, self.curve.apply(peak));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trips_bits() {
        let s = SharedScalar::default();
        assert_eq!(s.load(), 0.0);
        for v in [1.0, -0.0, 0.123_456_7, f32::MAX, f32::MIN_POSITIVE] {
            s.store(v);
            assert_eq!(s.load().to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_latest_value_wins() {
        let bus = MeterBus::new(1.0);
        bus.set_force(Channel::Left, 0.2);
        bus.set_force(Channel::Left, 0.7);
        assert_eq!(bus.force(Channel::Left), 0.7);
        assert_eq!(bus.force(Channel::Right), 0.0);
        assert_eq!(bus.deflection(Channel::Right), 1.0);
    }

    #[test]
    fn test_publish_silent_block() {
        let bus = MeterBus::new(1.0);
        bus.set_forces(0.9);
        let publisher = ForcePublisher::new(bus.clone(), ForceCurve::VisualLinear);
        publisher.publish_block(&[0i16; 2048], 2);
        for ch in Channel::ALL {
            assert!(bus.force(ch).abs() < 1e-5);
        }
    }

    #[test]
    fn test_publish_stereo_block() {
        let bus = MeterBus::new(0.0);
        let publisher = ForcePublisher::new(bus.clone(), ForceCurve::VisualLinear);
        let mut block = vec![0i16; 2048];
        block[1] = i16::MIN;
        publisher.publish_block(&block, 2);
        assert!(bus.force(Channel::Left).abs() < 1e-5);
        assert!((bus.force(Channel::Right) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mono_block_drives_both() {
        let bus = MeterBus::new(0.0);
        let publisher = ForcePublisher::new(bus.clone(), ForceCurve::Logarithmic);
        publisher.publish_block(&[0.0f32, 1.0, -0.5], 1);
        assert!((bus.force(Channel::Left) - 1.0).abs() < 1e-5);
        assert_eq!(bus.force(Channel::Left), bus.force(Channel::Right));
    }

    #[test]
    fn test_disabled_publisher_holds_forces() {
        let bus = MeterBus::new(1.0);
        let publisher = ForcePublisher::new(bus.clone(), ForceCurve::VisualLinear);
        let gate = publisher.clone();
        gate.set_enabled(false);
        bus.set_forces(1.0);

        publisher.publish_block(&[0i16; 64], 2);
        assert_eq!(bus.force(Channel::Left), 1.0);

        gate.set_enabled(true);
        publisher.publish_block(&[0i16; 64], 2);
        assert!(bus.force(Channel::Left).abs() < 1e-5);
    }
}
