//! The frame loop: own the particles, apply the host's events, and draw a frame every tick.

use std::collections::VecDeque;

use color_eyre::eyre::Result;
use glam::Vec2;
use rand::Rng;

use crate::canvas::Canvas;
use crate::config::SimulationConfig;
use crate::connections::{connections, indexed_connections, Segment};
use crate::particle::{Bounds, ParticleState};
use crate::physics;
use crate::surface::Surface;

/// The number of microseconds in a second.
pub const MICROSECONDS_PER_SECOND: u64 = 1_000_000;

/// How many recent frame build times are kept for the debug log.
const DURATIONS_WINDOW: usize = 30;

/// Where the loop is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum State {
    /// Waiting for the host to say how big the surface is.
    Uninitialized,
    /// Drawing a frame every tick.
    Running,
    /// Told to end. No more frames are drawn.
    Stopped,
}

/// Things that happen in the host, delivered between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// The terminal's size, in columns and rows. The first non-zero one starts the loop.
    Resize {
        /// Columns
        width: u16,
        /// Rows
        height: u16,
    },
    /// The pointer is over the given pixel.
    PointerMove {
        /// Pixel column
        x: u32,
        /// Pixel row
        y: u32,
    },
    /// The pointer left, it no longer pushes anything.
    PointerLeave,
    /// Stop for good.
    End,
}

/// `RenderLoop`
pub struct RenderLoop<R: Rng> {
    /// The simulation's constants.
    config: SimulationConfig,
    /// Where particles get their randomness from.
    rng: R,
    /// Lifecycle
    state: State,
    /// All the particles, created once when the loop starts.
    particles: Vec<ParticleState>,
    /// Size of the surface in surface units.
    bounds: Bounds,
    /// Pointer position in surface units, if it's over the terminal.
    pointer: Option<Vec2>,
    /// The frame under construction.
    surface: Surface,
    /// The time at which the previous frame was rendererd.
    last_frame_tick: tokio::time::Instant,
    /// Build times of recent frames.
    durations: VecDeque<f64>,
    /// How many frames have been rendered.
    frames: u64,
}

impl<R: Rng> RenderLoop<R> {
    /// Instantiate. Nothing is drawn until the host tells us its size.
    pub fn new(config: SimulationConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            state: State::Uninitialized,
            particles: Vec::new(),
            bounds: Bounds {
                width: 0.0,
                height: 0.0,
            },
            pointer: None,
            surface: Surface::default(),
            last_frame_tick: tokio::time::Instant::now(),
            durations: VecDeque::default(),
            frames: 0,
        }
    }

    /// Where the loop is in its life.
    pub const fn state(&self) -> State {
        self.state
    }

    /// The current particles.
    pub fn particles(&self) -> &[ParticleState] {
        &self.particles
    }

    /// Direct access to the particles, for placing them by hand.
    pub fn particles_mut(&mut self) -> &mut [ParticleState] {
        &mut self.particles
    }

    /// The surface's size in surface units.
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Where the pointer is, in surface units.
    pub const fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    /// The most recently rendered frame.
    pub const fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Apply an event from the host.
    pub fn handle_event(&mut self, event: Event) {
        tracing::trace!("Render loop received event: {event:?}");

        match event {
            Event::Resize { width, height } => self.resize(width, height),
            Event::PointerMove { x, y } => {
                let pixel = Vec2::new(to_f32(x), to_f32(y)) + 0.5;
                self.pointer = Some(pixel * self.config.scale);
            }
            Event::PointerLeave => self.pointer = None,
            Event::End => self.stop(),
        }
    }

    /// Keep track of the size of the host's terminal, starting the loop if this is the first time
    /// we've heard about it.
    fn resize(&mut self, width: u16, height: u16) {
        self.bounds = Bounds::from_tty_size(width, height, self.config.scale);
        self.surface = Surface::new(width, height, self.config.background);

        if self.state == State::Uninitialized && !self.bounds.is_empty() {
            self.initialise();
        }
    }

    /// Create all the particles.
    fn initialise(&mut self) {
        let bounds = self.bounds;
        let config = &self.config;
        let rng = &mut self.rng;
        self.particles = (0..config.particle_count)
            .map(|_| ParticleState::spawn(&mut *rng, config, bounds))
            .collect();
        self.state = State::Running;

        tracing::debug!(
            "Constellation initialised with {} particles on a {}x{} surface.",
            self.particles.len(),
            self.bounds.width,
            self.bounds.height
        );
    }

    /// No more frames.
    pub fn stop(&mut self) {
        tracing::debug!("Stopping the render loop");
        self.state = State::Stopped;
    }

    /// One frame: move and draw every particle, then draw the connections between them. All the
    /// particles are moved before any connection is found, so lines always join this frame's
    /// positions.
    pub fn tick<C: Canvas>(&mut self, canvas: &mut C) {
        if self.state != State::Running {
            return;
        }

        // A zero-sized terminal would wrap every particle onto the origin.
        if self.bounds.is_empty() {
            return;
        }

        canvas.clear();

        let scale = self.config.scale;
        let glow = self.config.glow_blur / scale;
        for particle in &mut self.particles {
            physics::advance(particle, &self.config, self.pointer, self.bounds);
            let (red, green, blue, alpha) = particle.colour;
            canvas.fill_disc(
                particle.position / scale,
                particle.size / scale,
                (red, green, blue, alpha * particle.alpha),
                glow,
            );
        }

        if self.particles.len() > self.config.spatial_index_threshold {
            self.draw_connections(canvas, indexed_connections(&self.particles, &self.config));
        } else {
            self.draw_connections(canvas, connections(&self.particles, &self.config));
        }
    }

    /// Stroke every connection.
    fn draw_connections<C: Canvas>(&self, canvas: &mut C, segments: impl Iterator<Item = Segment>) {
        let scale = self.config.scale;
        let (red, green, blue, _) = self.config.line_colour;
        for segment in segments {
            canvas.stroke_line(
                segment.from / scale,
                segment.to / scale,
                (red, green, blue, segment.opacity),
                self.config.line_width,
            );
        }
    }

    /// Build a frame on our own surface and return it ready for the host. `None` when the loop
    /// isn't running.
    pub fn render(&mut self) -> Result<Option<constellation_protocol::PluginOutputMessages>> {
        if self.state != State::Running {
            return Ok(None);
        }

        let start = std::time::Instant::now();

        let mut surface = std::mem::take(&mut self.surface);
        self.tick(&mut surface);
        let pixels = surface.to_pixels();
        self.surface = surface;

        self.record_duration(start.elapsed().as_secs_f64());

        Ok(Some(
            constellation_protocol::PluginOutputMessages::OutputPixels(pixels?),
        ))
    }

    /// Keep a rolling window of frame build times, and log their average now and then.
    fn record_duration(&mut self, duration: f64) {
        self.durations.push_front(duration);
        if self.durations.len() > DURATIONS_WINDOW {
            self.durations.pop_back();
        }

        self.frames = self.frames.wrapping_add(1);
        if self.frames % u64::from(self.config.frame_rate) == 0 {
            #[expect(
                clippy::as_conversions,
                clippy::cast_precision_loss,
                reason = "This is just debugging output"
            )]
            let average = self.durations.iter().sum::<f64>() / self.durations.len() as f64;
            tracing::debug!(
                "Frame {}: average build time {:.3}ms",
                self.frames,
                average * 1000.0
            );
        }
    }

    /// Sleep until the next frame render is due.
    pub async fn sleep_until_next_frame_tick(&mut self) {
        let target = MICROSECONDS_PER_SECOND.wrapping_div(self.config.frame_rate.into());
        let target_frame_rate_micro = std::time::Duration::from_micros(target);
        if let Some(wait) = target_frame_rate_micro.checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = tokio::time::Instant::now();
    }

    /// Our main entrypoint. Renders a frame every tick and applies events in between. Events are
    /// never applied part way through a frame. Returns when an `End` event arrives or either
    /// channel closes.
    pub async fn run(
        mut self,
        mut events: tokio::sync::mpsc::Receiver<Event>,
        output: tokio::sync::mpsc::Sender<constellation_protocol::PluginOutputMessages>,
    ) -> Result<()> {
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                () = self.sleep_until_next_frame_tick() => {
                    if let Some(frame) = self.render()? {
                        if output.send(frame).await.is_err() {
                            tracing::debug!("Output channel closed");
                            self.stop();
                        }
                    }
                },
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event),
                        None => {
                            tracing::debug!("Event channel closed");
                            self.stop();
                        }
                    }
                }
            }

            if self.state == State::Stopped {
                break;
            }
        }

        tracing::debug!("Leaving render loop");
        Ok(())
    }
}

/// Pixel coordinates are far too small to lose precision.
#[expect(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "Terminals aren't millions of pixels wide"
)]
const fn to_f32(value: u32) -> f32 {
    value as f32
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::float_cmp,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;
    use crate::Colour;
    use rand::SeedableRng as _;

    /// Everything a frame asked to be drawn.
    #[derive(Debug, PartialEq)]
    enum Drawing {
        Clear,
        Disc(Vec2),
        Line(Vec2, Vec2, f32),
    }

    #[derive(Default)]
    struct Recorder {
        drawings: Vec<Drawing>,
    }

    impl Canvas for Recorder {
        fn clear(&mut self) {
            self.drawings.push(Drawing::Clear);
        }

        fn fill_disc(&mut self, centre: Vec2, _radius: f32, _colour: Colour, _glow: f32) {
            self.drawings.push(Drawing::Disc(centre));
        }

        fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour, _width: f32) {
            self.drawings.push(Drawing::Line(from, to, colour.3));
        }
    }

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::try_from(&crate::config::Config::default()).unwrap();
        config.particle_count = 2;
        config.connection_radius = 100.0;
        config.mouse_radius = 50.0;
        config.damping = 0.96;
        config.base_speed = 0.0;
        config.scale = 1.0;
        config
    }

    fn render_loop(config: SimulationConfig) -> RenderLoop<rand_chacha::ChaCha8Rng> {
        RenderLoop::new(config, rand_chacha::ChaCha8Rng::seed_from_u64(0))
    }

    #[test]
    fn starts_on_first_non_zero_resize() {
        let mut render_loop = render_loop(config());
        assert_eq!(render_loop.state(), State::Uninitialized);
        assert!(render_loop.render().unwrap().is_none());

        render_loop.handle_event(Event::Resize {
            width: 0,
            height: 0,
        });
        assert_eq!(render_loop.state(), State::Uninitialized);

        render_loop.handle_event(Event::Resize {
            width: 100,
            height: 50,
        });
        assert_eq!(render_loop.state(), State::Running);
        assert_eq!(render_loop.particles().len(), 2);
        assert_eq!(
            render_loop.bounds(),
            Bounds {
                width: 100.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn resizing_keeps_particles() {
        let mut render_loop = render_loop(config());
        render_loop.handle_event(Event::Resize {
            width: 100,
            height: 50,
        });
        let before = render_loop.particles().to_vec();
        render_loop.handle_event(Event::Resize {
            width: 40,
            height: 10,
        });
        assert_eq!(render_loop.particles(), before.as_slice());
        assert_eq!(render_loop.bounds().width, 40.0);
        assert_eq!(render_loop.surface().width, 40);
        assert_eq!(render_loop.surface().height, 20);

        let mut recorder = Recorder::default();
        render_loop.tick(&mut recorder);
        for particle in render_loop.particles() {
            assert!(particle.position.x < 40.0 && particle.position.y < 20.0);
        }
    }

    #[test]
    fn zero_sized_terminal_leaves_particles_alone() {
        let mut config = config();
        config.particle_count = 50;
        let mut render_loop = render_loop(config);
        render_loop.handle_event(Event::Resize {
            width: 80,
            height: 24,
        });
        let before = render_loop.particles().to_vec();

        render_loop.handle_event(Event::Resize {
            width: 0,
            height: 0,
        });
        assert_eq!(render_loop.state(), State::Running);
        let mut recorder = Recorder::default();
        render_loop.tick(&mut recorder);
        assert!(recorder.drawings.is_empty());
        assert!(render_loop.render().unwrap().is_some());

        render_loop.handle_event(Event::Resize {
            width: 80,
            height: 24,
        });
        assert_eq!(render_loop.particles(), before.as_slice());
    }

    #[test]
    fn pointer_events() {
        let mut config = config();
        config.scale = 10.0;
        let mut render_loop = render_loop(config);
        render_loop.handle_event(Event::PointerMove { x: 3, y: 4 });
        assert_eq!(render_loop.pointer(), Some(Vec2::new(35.0, 45.0)));
        render_loop.handle_event(Event::PointerLeave);
        assert_eq!(render_loop.pointer(), None);
    }

    #[test]
    fn two_still_particles_one_connection() {
        let mut render_loop = render_loop(config());
        render_loop.handle_event(Event::Resize {
            width: 100,
            height: 50,
        });
        render_loop.particles_mut()[0].position = Vec2::new(0.0, 0.0);
        render_loop.particles_mut()[1].position = Vec2::new(50.0, 0.0);

        let mut recorder = Recorder::default();
        render_loop.tick(&mut recorder);

        assert_eq!(render_loop.particles()[0].position, Vec2::new(0.0, 0.0));
        assert_eq!(render_loop.particles()[1].position, Vec2::new(50.0, 0.0));
        assert_eq!(recorder.drawings.len(), 4);
        assert_eq!(recorder.drawings[0], Drawing::Clear);
        assert_eq!(recorder.drawings[1], Drawing::Disc(Vec2::new(0.0, 0.0)));
        assert_eq!(recorder.drawings[2], Drawing::Disc(Vec2::new(50.0, 0.0)));
        let Drawing::Line(from, to, opacity) = recorder.drawings[3] else {
            panic!("Expected a line, got {:?}", recorder.drawings[3]);
        };
        assert_eq!(from, Vec2::new(0.0, 0.0));
        assert_eq!(to, Vec2::new(50.0, 0.0));
        assert!((opacity - 0.2).abs() < 1e-6);
    }

    #[test]
    fn connections_use_this_frames_positions() {
        let mut render_loop = render_loop(config());
        render_loop.handle_event(Event::Resize {
            width: 100,
            height: 50,
        });
        render_loop.particles_mut()[0] =
            ParticleState::at(Vec2::new(10.0, 10.0), &config()).with_velocity(Vec2::new(5.0, 0.0));
        render_loop.particles_mut()[1] = ParticleState::at(Vec2::new(40.0, 10.0), &config())
            .with_velocity(Vec2::new(-5.0, 0.0));

        let mut recorder = Recorder::default();
        render_loop.tick(&mut recorder);

        let first_line = recorder
            .drawings
            .iter()
            .position(|drawing| matches!(drawing, Drawing::Line(..)))
            .unwrap();
        let last_disc = recorder
            .drawings
            .iter()
            .rposition(|drawing| matches!(drawing, Drawing::Disc(..)))
            .unwrap();
        assert!(last_disc < first_line);
        let Drawing::Line(from, to, opacity) = recorder.drawings[first_line] else {
            panic!("Expected a line");
        };
        assert_eq!(from, Vec2::new(15.0, 10.0));
        assert_eq!(to, Vec2::new(35.0, 10.0));
        assert!((opacity - 0.32).abs() < 1e-6);
    }

    #[test]
    fn render_produces_pixels() {
        let mut config = config();
        config.background = None;
        let mut render_loop = render_loop(config);
        render_loop.handle_event(Event::Resize {
            width: 20,
            height: 10,
        });
        let Some(constellation_protocol::PluginOutputMessages::OutputPixels(pixels)) =
            render_loop.render().unwrap()
        else {
            panic!("Expected a frame");
        };
        assert!(!pixels.is_empty());
        assert!(pixels
            .iter()
            .all(|pixel| pixel.coordinates.0 < 20 && pixel.coordinates.1 < 20));
    }

    #[test]
    fn end_stops_the_loop() {
        let mut render_loop = render_loop(config());
        render_loop.handle_event(Event::Resize {
            width: 10,
            height: 10,
        });
        render_loop.handle_event(Event::End);
        assert_eq!(render_loop.state(), State::Stopped);
        assert!(render_loop.render().unwrap().is_none());
    }
}
