//! A single particle of the constellation

use glam::Vec2;
use rand::seq::SliceRandom as _;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::Colour;

/// The size of the surface that particles live on, in surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[expect(
    clippy::exhaustive_structs,
    reason = "It's very unlikely that this is going to have any more fields added to it"
)]
pub struct Bounds {
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Bounds {
    /// Bounds of a terminal with the given number of columns and rows. A row holds 2 pixels.
    #[must_use]
    pub fn from_tty_size(width: u16, height: u16, scale: f32) -> Self {
        Self {
            width: f32::from(width) * scale,
            height: f32::from(height) * 2.0 * scale,
        }
    }

    /// Whether there's any room at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// One point of light.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ParticleState {
    /// Where it is, always within the surface bounds after an update.
    pub position: Vec2,
    /// Its own drift. Never changes after creation.
    pub velocity: Vec2,
    /// Extra motion from being pushed by the pointer. It decays every tick.
    pub momentum: Vec2,
    /// Radius in surface units.
    pub size: f32,
    /// Picked from the palette.
    pub colour: Colour,
    /// Opacity.
    pub alpha: f32,
}

impl ParticleState {
    /// A stationary particle with the first palette colour. Mostly useful for placing particles
    /// by hand.
    #[must_use]
    pub fn at(position: Vec2, config: &SimulationConfig) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            momentum: Vec2::ZERO,
            size: config.size_range.0,
            colour: config
                .palette
                .first()
                .copied()
                .unwrap_or((1.0, 1.0, 1.0, 1.0)),
            alpha: config.alpha_range.1,
        }
    }

    /// Create a particle somewhere random on the surface, drifting in a random direction.
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, config: &SimulationConfig, bounds: Bounds) -> Self {
        let half_speed = config.base_speed / 2.0;
        let position = Vec2::new(
            random_in(rng, 0.0, bounds.width),
            random_in(rng, 0.0, bounds.height),
        );
        let velocity = Vec2::new(
            random_in(rng, -half_speed, half_speed),
            random_in(rng, -half_speed, half_speed),
        );
        let colour = config
            .palette
            .choose(rng)
            .copied()
            .unwrap_or((1.0, 1.0, 1.0, 1.0));

        Self {
            position,
            velocity,
            momentum: Vec2::ZERO,
            size: random_in(rng, config.size_range.0, config.size_range.1),
            colour,
            alpha: random_in(rng, config.alpha_range.0, config.alpha_range.1),
        }
    }

    /// Builder-style helper to set the drift.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Uniform in `[min, max)`, or just `min` when the range is empty. `gen_range` panics on empty
/// ranges, which a zero `base_speed` or a zero-sized surface would otherwise produce.
fn random_in<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    rng.gen_range(min..max)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng as _;

    fn config() -> SimulationConfig {
        SimulationConfig::try_from(&crate::config::Config::default()).unwrap()
    }

    #[test]
    fn spawned_particles_respect_their_ranges() {
        let config = config();
        let bounds = Bounds {
            width: 800.0,
            height: 480.0,
        };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            let particle = ParticleState::spawn(&mut rng, &config, bounds);
            assert!((0.0..800.0).contains(&particle.position.x));
            assert!((0.0..480.0).contains(&particle.position.y));
            assert!(particle.velocity.x.abs() <= 0.4);
            assert!(particle.velocity.y.abs() <= 0.4);
            assert!((0.5..=2.5).contains(&particle.size));
            assert!((0.5..=1.0).contains(&particle.alpha));
            assert!(config.palette.contains(&particle.colour));
            assert_eq!(particle.momentum, Vec2::ZERO);
        }
    }

    #[test]
    fn same_seed_same_particles() {
        let config = config();
        let bounds = Bounds::from_tty_size(80, 24, config.scale);
        let mut first = rand_chacha::ChaCha8Rng::seed_from_u64(42);
        let mut second = rand_chacha::ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(
                ParticleState::spawn(&mut first, &config, bounds),
                ParticleState::spawn(&mut second, &config, bounds)
            );
        }
    }

    #[test]
    fn zero_speed_means_no_drift() {
        let mut config = config();
        config.base_speed = 0.0;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let particle = ParticleState::spawn(&mut rng, &config, Bounds::from_tty_size(10, 5, 1.0));
        assert_eq!(particle.velocity, Vec2::ZERO);
    }

    #[test]
    fn bounds_from_tty_size() {
        let bounds = Bounds::from_tty_size(80, 24, 10.0);
        assert_eq!(
            bounds,
            Bounds {
                width: 800.0,
                height: 480.0
            }
        );
        assert!(!bounds.is_empty());
        assert!(Bounds::from_tty_size(0, 24, 10.0).is_empty());
    }
}
