//! Move a particle forward by one frame.
//!
//! A particle's own drift never changes, the pointer only ever adds to its separate momentum,
//! which then decays geometrically. So a pushed particle always settles back into its original
//! speed and direction.

use glam::Vec2;

use crate::config::SimulationConfig;
use crate::particle::{Bounds, ParticleState};

/// How far inside the far edge a particle reappears when it leaves through the near edge. With
/// the default scale this is a tenth of a terminal pixel.
pub const WRAP_INSET: f32 = 1.0;

/// Advance a particle by one tick, given where the pointer is, if anywhere.
pub fn advance(
    particle: &mut ParticleState,
    config: &SimulationConfig,
    pointer: Option<Vec2>,
    bounds: Bounds,
) {
    particle.momentum *= config.damping;
    particle.position += particle.velocity + particle.momentum;

    particle.position.x = wrap(particle.position.x, bounds.width);
    particle.position.y = wrap(particle.position.y, bounds.height);

    if let Some(pointer) = pointer {
        particle.momentum -= push(particle.position, pointer, config);
    }
}

/// Hard wrap onto `[0, bound)`. Leaving through 0 lands just inside `bound`, leaving through
/// `bound` lands on 0.
#[must_use]
pub fn wrap(coordinate: f32, bound: f32) -> f32 {
    if coordinate < 0.0 {
        let inset = bound - WRAP_INSET;
        if inset < bound {
            return inset.max(0.0);
        }
        // So big that the inset is lost to rounding.
        return largest_below(bound);
    }
    if coordinate >= bound {
        return 0.0;
    }
    coordinate
}

/// The nearest `f32` below a positive, finite `value`.
fn largest_below(value: f32) -> f32 {
    f32::from_bits(value.to_bits().saturating_sub(1))
}

/// The momentum the pointer imparts this tick, pointing from the particle towards the pointer.
/// It gets subtracted, so the particle is pushed away. Falls off linearly from full strength on
/// the pointer to nothing at `mouse_radius`.
#[must_use]
pub fn push(position: Vec2, pointer: Vec2, config: &SimulationConfig) -> Vec2 {
    let delta = pointer - position;
    let distance = delta.length();

    // The direction is undefined when the pointer is exactly on the particle.
    if distance >= config.mouse_radius || distance == 0.0 {
        return Vec2::ZERO;
    }

    let direction = delta / distance;
    let force = (config.mouse_radius - distance) / config.mouse_radius;
    direction * force * config.push_strength
}
