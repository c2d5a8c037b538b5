//! End to end tests
#[cfg(test)]
mod e2e {
    use constellation::config::{Config, SimulationConfig};
    use constellation::render_loop::{Event, RenderLoop, State};
    use constellation_protocol::{Pixel, PluginOutputMessages};
    use glam::Vec2;
    use rand::SeedableRng as _;

    /// How long to wait for anything asynchronous before failing.
    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn simulation() -> SimulationConfig {
        SimulationConfig::try_from(&Config::default()).unwrap()
    }

    fn rng() -> rand_chacha::ChaCha8Rng {
        rand_chacha::ChaCha8Rng::seed_from_u64(1)
    }

    struct Running {
        events: tokio::sync::mpsc::Sender<Event>,
        frames: tokio::sync::mpsc::Receiver<PluginOutputMessages>,
        handle: tokio::task::JoinHandle<Result<(), String>>,
    }

    fn start(config: SimulationConfig) -> Running {
        let (events_tx, events_rx) = tokio::sync::mpsc::channel(16);
        let (frames_tx, frames_rx) = tokio::sync::mpsc::channel(1);
        let handle = tokio::spawn(async move {
            RenderLoop::new(config, rng())
                .run(events_rx, frames_tx)
                .await
                .map_err(|error| format!("{error:?}"))
        });
        Running {
            events: events_tx,
            frames: frames_rx,
            handle,
        }
    }

    async fn next_frame(running: &mut Running) -> Vec<Pixel> {
        let frame = tokio::time::timeout(TIMEOUT, running.frames.recv())
            .await
            .unwrap()
            .unwrap();
        match frame {
            PluginOutputMessages::OutputPixels(pixels) => pixels,
            _ => panic!("Unexpected frame: {frame:?}"),
        }
    }

    async fn finish(running: Running) {
        drop(running.frames);
        tokio::time::timeout(TIMEOUT, running.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn frames_start_after_resize() {
        let mut running = start(simulation());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(running.frames.try_recv().is_err());

        running
            .events
            .send(Event::Resize {
                width: 40,
                height: 12,
            })
            .await
            .unwrap();

        for _ in 0..3 {
            let pixels = next_frame(&mut running).await;
            assert!(!pixels.is_empty());
            for pixel in pixels {
                assert!(pixel.coordinates.0 < 40);
                assert!(pixel.coordinates.1 < 24);
            }
        }

        running.events.send(Event::End).await.unwrap();
        finish(running).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_fills_every_pixel() {
        let mut running = start(simulation());
        running
            .events
            .send(Event::Resize {
                width: 10,
                height: 5,
            })
            .await
            .unwrap();
        let pixels = next_frame(&mut running).await;
        assert_eq!(pixels.len(), 100);

        running.events.send(Event::End).await.unwrap();
        finish(running).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pointer_events_do_not_stop_frames() {
        let mut running = start(simulation());
        running
            .events
            .send(Event::Resize {
                width: 30,
                height: 10,
            })
            .await
            .unwrap();
        next_frame(&mut running).await;

        running
            .events
            .send(Event::PointerMove { x: 15, y: 10 })
            .await
            .unwrap();
        next_frame(&mut running).await;
        running.events.send(Event::PointerLeave).await.unwrap();
        next_frame(&mut running).await;

        running.events.send(Event::End).await.unwrap();
        finish(running).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closing_the_event_channel_stops_the_loop() {
        let running = start(simulation());
        drop(running.events);
        tokio::time::timeout(TIMEOUT, running.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn two_particles_are_joined_by_a_faint_line() {
        let mut config = simulation();
        config.particle_count = 2;
        config.scale = 1.0;
        config.base_speed = 0.0;
        config.glow_blur = 0.0;
        config.connection_radius = 100.0;
        config.background = None;
        let line_colour = config.line_colour;

        let mut render_loop = RenderLoop::new(config.clone(), rng());
        render_loop.handle_event(Event::Resize {
            width: 50,
            height: 5,
        });
        assert_eq!(render_loop.state(), State::Running);
        render_loop.particles_mut()[0] =
            constellation::particle::ParticleState::at(Vec2::new(5.0, 5.0), &config);
        render_loop.particles_mut()[1] =
            constellation::particle::ParticleState::at(Vec2::new(45.0, 5.0), &config);

        let Some(PluginOutputMessages::OutputPixels(pixels)) = render_loop.render().unwrap()
        else {
            panic!("Expected a frame");
        };

        let midway = pixels
            .iter()
            .find(|pixel| pixel.coordinates == (25, 5))
            .unwrap();
        let colour = midway.color.unwrap();
        assert!((colour.0 - line_colour.0).abs() < 1e-6);
        assert!((colour.1 - line_colour.1).abs() < 1e-6);
        assert!((colour.2 - line_colour.2).abs() < 1e-6);
        assert!((colour.3 - 0.24).abs() < 1e-6);

        assert!(!pixels.iter().any(|pixel| pixel.coordinates.1 == 0));
    }

    #[test]
    fn pushed_particles_recover_their_drift() {
        let mut config = simulation();
        config.scale = 1.0;
        let mut render_loop = RenderLoop::new(config.clone(), rng());
        render_loop.handle_event(Event::Resize {
            width: 200,
            height: 100,
        });
        render_loop.particles_mut()[0] = constellation::particle::ParticleState::at(
            Vec2::new(100.0, 100.0),
            &config,
        )
        .with_velocity(Vec2::new(0.1, 0.0));

        render_loop.handle_event(Event::PointerMove { x: 95, y: 100 });
        let mut surface = constellation::surface::Surface::new(200, 100, None);
        render_loop.tick(&mut surface);
        let pushed = render_loop.particles()[0].clone();
        assert!(pushed.momentum.x > 0.0);
        assert_eq!(pushed.velocity, Vec2::new(0.1, 0.0));

        render_loop.handle_event(Event::PointerLeave);
        for _ in 0..400 {
            render_loop.tick(&mut surface);
        }
        let recovered = &render_loop.particles()[0];
        assert!(recovered.momentum.length() < 1e-6);
        assert_eq!(recovered.velocity, Vec2::new(0.1, 0.0));
    }
}
