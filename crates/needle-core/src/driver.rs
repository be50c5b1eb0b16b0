//! Simulation driver: bridges clock ticks to sprung-mass advances.
//!
//! Each tick reads the clock, advances both needles by however many whole
//! milliseconds passed since the previous tick, and publishes the new
//! deflections. A late tick simply runs more steps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::bus::{Channel, MeterBus};
use crate::config::MeterConfig;
use crate::spring::{Bounds, SprungMass};

/// Ticks longer than this many periods are logged as stalls.
const STALL_PERIODS: u64 = 10;

/// Source of monotonic millisecond timestamps.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since construction. Built on `tokio::time::Instant`, so it
/// follows tokio's paused clock in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Owns both channels' sprung masses and advances them on demand.
pub struct SimulationDriver<C: Clock = MonotonicClock> {
    bus: Arc<MeterBus>,
    masses: [SprungMass; 2],
    bounds: Bounds,
    clock: C,
    last_update: u64,
}

impl<C: Clock> SimulationDriver<C> {
    /// Start both needles from `template` and publish their resting
    /// deflection. The first tick measures from now.
    pub fn new(bus: Arc<MeterBus>, template: SprungMass, bounds: Bounds, clock: C) -> Self {
        let last_update = clock.now_millis();
        let driver = Self {
            bus,
            masses: [template; 2],
            bounds,
            clock,
            last_update,
        };
        driver.publish();
        driver
    }

    pub fn from_config(bus: Arc<MeterBus>, meter: &MeterConfig, clock: C) -> Self {
        let template = SprungMass::new(meter.movement(), meter.initial_displacement);
        Self::new(bus, template, meter.bounds(), clock)
    }

    /// Advance by the time elapsed since the previous tick. Returns the
    /// number of milliseconds simulated.
    pub fn tick(&mut self) -> u64 {
        let now = self.clock.now_millis();
        // A clock seen going backwards simulates nothing.
        let elapsed = now.saturating_sub(self.last_update);
        self.advance(elapsed);
        self.last_update = now;
        elapsed
    }

    /// Advance both channels by `millis` steps under their current forces.
    pub fn advance(&mut self, millis: u64) {
        for ch in Channel::ALL {
            let force = self.bus.force(ch);
            self.masses[ch.index()].advance(force, self.bounds, millis);
        }
        self.publish();
    }

    pub fn mass(&self, channel: Channel) -> &SprungMass {
        &self.masses[channel.index()]
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    fn publish(&self) {
        for ch in Channel::ALL {
            self.bus
                .set_deflection(ch, self.masses[ch.index()].displacement());
        }
    }
}

/// Run `driver` on a fixed period. After every tick `on_tick` is called to
/// request a redraw; returning `false` stops the task.
pub fn spawn_simulation<C, F>(
    mut driver: SimulationDriver<C>,
    period: Duration,
    mut on_tick: F,
) -> JoinHandle<()>
where
    C: Clock + Send + 'static,
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let period_ms = period.as_millis().max(1) as u64;
        info!("simulation running every {} ms", period_ms);

        // The first tick fires immediately and catches up on the time since
        // the driver was built.
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let elapsed = driver.tick();
            if elapsed > period_ms * STALL_PERIODS {
                debug!("simulation caught up {} ms after a stall", elapsed);
            }
            if !on_tick() {
                debug!("redraw receiver gone, stopping simulation");
                break;
            }
        }
    })
}
