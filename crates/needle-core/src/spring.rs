//! The needle's mechanics: a driven, damped mass on a spring.
//!
//! Motion obeys `m·a = F − k·x − d·v` and is integrated with explicit Euler
//! at a fixed step of one millisecond. Callers pass the number of
//! milliseconds that have elapsed, so the same sequence of
//! `(force, millis)` pairs always yields the same motion no matter how
//! irregularly the caller is scheduled.

/// Integration step in seconds, one per elapsed millisecond.
pub const STEP_SECS: f32 = 0.001;

/// Closed displacement range. Reaching either end is an elastic collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    pub const UNIT: Bounds = Bounds { min: 0.0, max: 1.0 };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.min && x <= self.max
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Physical constants of a meter movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// Mass of the needle.
    pub mass: f32,
    /// Spring constant.
    pub spring: f32,
    /// Damping coefficient (critical = 2·√(k·m)).
    pub damping: f32,
}

impl Movement {
    /// Slightly under-damped: swings past the target and settles.
    pub const CLASSIC: Movement = Movement {
        mass: 0.005,
        spring: 1.0,
        damping: 0.08,
    };

    pub fn critical_damping(&self) -> f32 {
        2.0 * (self.spring * self.mass).sqrt()
    }
}

impl Default for Movement {
    fn default() -> Self {
        Self::CLASSIC
    }
}

/// One channel's sprung mass: fixed constants plus position and velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprungMass {
    movement: Movement,
    displacement: f32,
    velocity: f32,
}

impl Default for SprungMass {
    /// Classic movement resting at full deflection.
    fn default() -> Self {
        Self::new(Movement::CLASSIC, 1.0)
    }
}

impl SprungMass {
    pub fn new(movement: Movement, displacement: f32) -> Self {
        Self {
            movement,
            displacement,
            velocity: 0.0,
        }
    }

    pub fn displacement(&self) -> f32 {
        self.displacement
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Apply `force` for `millis` one-millisecond steps and return the new
    /// displacement, which always lies within `bounds`.
    pub fn advance(&mut self, force: f32, bounds: Bounds, millis: u64) -> f32 {
        if millis == 0 {
            return self.displacement;
        }

        let Movement {
            mass,
            spring,
            damping,
        } = self.movement;

        for _ in 0..millis {
            self.reflect(bounds);
            let accel = (force - spring * self.displacement - damping * self.velocity) / mass;
            self.velocity += accel * STEP_SECS;
            self.displacement += self.velocity * STEP_SECS;
        }

        // The last step may have carried the mass past a stop. Reflecting
        // now is exactly what the next step would do first.
        self.reflect(bounds);
        self.displacement
    }

    fn reflect(&mut self, bounds: Bounds) {
        if self.displacement < bounds.min {
            self.displacement = bounds.min;
            if self.velocity < 0.0 {
                self.velocity = -self.velocity;
            }
        }
        if self.displacement > bounds.max {
            self.displacement = bounds.max;
            if self.velocity > 0.0 {
                self.velocity = -self.velocity;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_duration_is_noop() {
        let mut m = SprungMass::new(Movement::CLASSIC, 1.7);
        m.velocity = -3.0;
        let before = m;
        // out of bounds on purpose: a zero advance must not even clamp
        assert_eq!(m.advance(0.4, Bounds::UNIT, 0), 1.7);
        assert_eq!(m, before);
    }

    #[test]
    fn test_classic_is_underdamped() {
        let mv = Movement::CLASSIC;
        assert!(mv.damping < mv.critical_damping());
        assert!((mv.critical_damping() - 0.1414).abs() < 1e-3);
    }

    #[test]
    fn test_full_force_holds_full_deflection() {
        let mut m = SprungMass::default();
        for _ in 0..100 {
            m.advance(1.0, Bounds::UNIT, 12);
            assert!((m.displacement() - 1.0).abs() < 1e-6);
            assert!(m.velocity().abs() < 1e-6);
        }
    }

    #[test]
    fn test_overshoots_then_settles() {
        let mut m = SprungMass::new(Movement::CLASSIC, 0.0);
        let target = 0.5;
        let mut peak = 0.0_f32;
        for _ in 0..300 {
            peak = peak.max(m.advance(target, Bounds::UNIT, 1));
        }
        assert!(peak > target, "expected overshoot, peak {peak}");
        m.advance(target, Bounds::UNIT, 3000);
        assert!((m.displacement() - target).abs() < 1e-3);
    }

    #[test]
    fn test_reflection_flips_outward_velocity() {
        let mut m = SprungMass::new(Movement::CLASSIC, -0.2);
        m.velocity = -1.0;
        m.reflect(Bounds::UNIT);
        assert_eq!(m.displacement(), 0.0);
        assert_eq!(m.velocity(), 1.0);

        let mut m = SprungMass::new(Movement::CLASSIC, 1.2);
        m.velocity = -1.0;
        m.reflect(Bounds::UNIT);
        assert_eq!(m.displacement(), 1.0);
        // already heading back inside, keep it
        assert_eq!(m.velocity(), -1.0);
    }

    #[test]
    fn test_hard_drop_stays_in_bounds() {
        let mut m = SprungMass::default();
        for millis in [1u64, 3, 7, 12, 25, 40, 500] {
            let x = m.advance(0.0, Bounds::UNIT, millis);
            assert!(Bounds::UNIT.contains(x), "x={x} after {millis}ms");
        }
    }

    #[test]
    fn test_step_count_not_call_count_drives_motion() {
        let mut a = SprungMass::default();
        let mut b = SprungMass::default();
        a.advance(0.3, Bounds::UNIT, 36);
        for ms in [12, 5, 19] {
            b.advance(0.3, Bounds::UNIT, ms);
        }
        assert_eq!(a, b);
    }
}
