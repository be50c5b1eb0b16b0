//! Signal-to-motion core of the needle VU meter.
//!
//! Audio blocks become per-channel forces ([`amplitude`], [`force`]), forces
//! drive damped sprung masses ([`spring`]) on a fixed-step clock
//! ([`driver`]), and the resulting deflections are read by a renderer. The
//! three paths only meet at the atomic slots in [`bus`].

pub mod amplitude;
pub mod bus;
pub mod config;
pub mod driver;
pub mod force;
pub mod platform;
pub mod spring;

pub use amplitude::{peak_amplitude, PcmSample};
pub use bus::{Channel, ForcePublisher, MeterBus};
pub use driver::{spawn_simulation, Clock, ManualClock, MonotonicClock, SimulationDriver};
pub use force::{map_force, ForceCurve};
pub use spring::{Bounds, Movement, SprungMass};
