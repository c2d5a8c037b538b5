//! Find the lines that join particles that are near each other.
//!
//! Every pair closer than `connection_radius` is joined, the line fading from `line_opacity` when
//! the particles touch, to nothing at the radius. Checking every pair is quadratic, which is
//! nothing for the ~100 particles of a normal constellation. For bigger counts there's an R-tree
//! backed pass that reports exactly the same segments in exactly the same order.

use glam::Vec2;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::config::SimulationConfig;
use crate::particle::ParticleState;

/// A line to draw between 2 particles.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct Segment {
    /// Indices of the 2 particles, the lower index always first.
    pub pair: (usize, usize),
    /// Position of the first particle.
    pub from: Vec2,
    /// Position of the second particle.
    pub to: Vec2,
    /// How visible the line is, between 0 and `line_opacity`.
    pub opacity: f32,
}

/// Lazily walks every unordered pair of particles, yielding the ones that are close enough.
#[derive(Debug, Clone)]
pub struct Connections<'particles> {
    /// Everything in the current frame.
    particles: &'particles [ParticleState],
    /// Pairs must be closer than this.
    radius: f32,
    /// Opacity of a zero-length connection.
    max_opacity: f32,
    /// The first particle of the next pair to check.
    a: usize,
    /// The second particle of the next pair to check. Always greater than `a`.
    b: usize,
}

/// Every connection between the given particles, computed as it's iterated.
#[must_use]
pub fn connections<'particles>(
    particles: &'particles [ParticleState],
    config: &SimulationConfig,
) -> Connections<'particles> {
    Connections {
        particles,
        radius: config.connection_radius,
        max_opacity: config.line_opacity,
        a: 0,
        b: 1,
    }
}

impl Iterator for Connections<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(first) = self.particles.get(self.a) {
            while let Some(second) = self.particles.get(self.b) {
                let b = self.b;
                self.b += 1;
                let maybe_segment =
                    segment_between((self.a, first), (b, second), self.radius, self.max_opacity);
                if maybe_segment.is_some() {
                    return maybe_segment;
                }
            }
            self.a += 1;
            self.b = self.a + 1;
        }
        None
    }
}

/// The same connections as [`connections`], found with a spatial index. All the segments are
/// computed up front.
#[must_use]
pub fn indexed_connections(
    particles: &[ParticleState],
    config: &SimulationConfig,
) -> std::vec::IntoIter<Segment> {
    let points = particles
        .iter()
        .enumerate()
        .map(|(index, particle)| GeomWithData::new(particle.position.to_array(), index))
        .collect();
    let tree = RTree::bulk_load(points);

    // The R-tree compares squared distances, the pairwise pass compares square roots. Searching
    // a touch wider means rounding can never hide a pair, `segment_between` has the final say.
    let search_radius = config.connection_radius * 1.001;
    let search_radius_squared = search_radius * search_radius;

    let mut segments = Vec::new();
    for (a, first) in particles.iter().enumerate() {
        let neighbours =
            tree.locate_within_distance(first.position.to_array(), search_radius_squared);
        for neighbour in neighbours {
            let b = neighbour.data;
            if b <= a {
                continue;
            }
            let Some(second) = particles.get(b) else {
                continue;
            };
            if let Some(segment) = segment_between(
                (a, first),
                (b, second),
                config.connection_radius,
                config.line_opacity,
            ) {
                segments.push(segment);
            }
        }
    }

    segments.sort_unstable_by_key(|segment| segment.pair);
    segments.into_iter()
}

/// The connecting segment, if the particles are close enough.
fn segment_between(
    (a, first): (usize, &ParticleState),
    (b, second): (usize, &ParticleState),
    radius: f32,
    max_opacity: f32,
) -> Option<Segment> {
    let distance = first.position.distance(second.position);
    if distance >= radius {
        return None;
    }

    Some(Segment {
        pair: (a, b),
        from: first.position,
        to: second.position,
        opacity: (1.0 - distance / radius) * max_opacity,
    })
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::float_cmp,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;
    use crate::particle::Bounds;
    use rand::SeedableRng as _;

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::try_from(&crate::config::Config::default()).unwrap();
        config.connection_radius = 100.0;
        config
    }

    fn particles_at(config: &SimulationConfig, positions: &[(f32, f32)]) -> Vec<ParticleState> {
        positions
            .iter()
            .map(|&(x, y)| ParticleState::at(Vec2::new(x, y), config))
            .collect()
    }

    #[test]
    fn two_particles_half_a_radius_apart() {
        let config = config();
        let particles = particles_at(&config, &[(0.0, 0.0), (50.0, 0.0)]);
        let segments: Vec<Segment> = connections(&particles, &config).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].pair, (0, 1));
        assert_eq!(segments[0].from, Vec2::new(0.0, 0.0));
        assert_eq!(segments[0].to, Vec2::new(50.0, 0.0));
        assert!((segments[0].opacity - 0.2).abs() < 1e-6);
    }

    #[test]
    fn exactly_at_radius_is_not_connected() {
        let config = config();
        let particles = particles_at(&config, &[(0.0, 0.0), (100.0, 0.0)]);
        assert_eq!(connections(&particles, &config).count(), 0);
    }

    #[test]
    fn just_inside_radius_is_faint() {
        let config = config();
        let particles = particles_at(&config, &[(0.0, 0.0), (99.99, 0.0)]);
        let segment = connections(&particles, &config).next().unwrap();
        assert!(segment.opacity > 0.0);
        assert!(segment.opacity < 0.001);
    }

    #[test]
    fn no_self_pairs_or_duplicates() {
        let config = config();
        let particles = particles_at(&config, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let pairs: Vec<(usize, usize)> = connections(&particles, &config)
            .map(|segment| segment.pair)
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn symmetric_regardless_of_order() {
        let config = config();
        let positions = [(0.0, 0.0), (30.0, 40.0), (90.0, 10.0), (300.0, 300.0)];
        let forwards = particles_at(&config, &positions);
        let mut backwards = forwards.clone();
        backwards.reverse();
        let last = positions.len() - 1;

        let forward_segments: Vec<Segment> = connections(&forwards, &config).collect();
        let backward_segments: Vec<Segment> = connections(&backwards, &config).collect();
        assert_eq!(forward_segments.len(), backward_segments.len());

        for segment in &forward_segments {
            let mirrored = (last - segment.pair.1, last - segment.pair.0);
            let matching = backward_segments
                .iter()
                .find(|other| other.pair == mirrored)
                .unwrap();
            assert_eq!(matching.opacity, segment.opacity);
        }
    }

    #[test]
    fn empty_and_single() {
        let config = config();
        assert_eq!(connections(&[], &config).count(), 0);
        let one = particles_at(&config, &[(5.0, 5.0)]);
        assert_eq!(connections(&one, &config).count(), 0);
        assert_eq!(indexed_connections(&one, &config).count(), 0);
    }

    #[test]
    fn indexed_pass_matches_pairwise_pass() {
        let mut config = config();
        config.connection_radius = 60.0;
        let bounds = Bounds {
            width: 800.0,
            height: 480.0,
        };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(99);
        let particles: Vec<ParticleState> = (0..400)
            .map(|_| ParticleState::spawn(&mut rng, &config, bounds))
            .collect();

        let pairwise: Vec<Segment> = connections(&particles, &config).collect();
        let indexed: Vec<Segment> = indexed_connections(&particles, &config).collect();
        assert!(!pairwise.is_empty());
        assert_eq!(pairwise, indexed);
    }
}
