//! A raster of terminal pixels for the constellation to be drawn on.
//!
//! A terminal "pixel" is half a cell, using the UTF8 half-block trick: ▀▄. So a terminal of
//! `width` columns and `height` rows is `width` x `height * 2` pixels. Everything drawn is
//! alpha-blended, so overlapping glows and lines build up the way they would on a canvas.

use color_eyre::eyre::{bail, Result};
use glam::Vec2;

use crate::canvas::Canvas;
use crate::Colour;

/// Fully transparent.
pub const TRANSPARENT: Colour = (0.0, 0.0, 0.0, 0.0);

/// Even the tiniest disc must cover the pixel its centre is in. Every point is within this
/// distance of the nearest pixel centre.
const MIN_DISC_RADIUS: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// How bright a glow is compared to the disc it surrounds.
const GLOW_INTENSITY: f32 = 0.35;

/// `Surface`
#[derive(Clone, Debug, Default)]
pub struct Surface {
    /// Width in pixels, the same as the terminal's number of columns.
    pub width: usize,
    /// Height in pixels, twice the terminal's number of rows.
    pub height: usize,
    /// Inner and outer colours of the radial backdrop.
    background: Option<(Colour, Colour)>,
    /// Row-major pixel colours.
    pixels: Vec<Colour>,
}

impl Surface {
    /// A cleared surface for a terminal with the given number of columns and rows.
    #[must_use]
    pub fn new(columns: u16, rows: u16, background: Option<(Colour, Colour)>) -> Self {
        let width = usize::from(columns);
        let height = usize::from(rows) * 2;
        let mut surface = Self {
            width,
            height,
            background,
            pixels: vec![TRANSPARENT; width * height],
        };
        surface.clear();
        surface
    }

    /// Blend a colour onto the pixel at the given coordinates.
    pub fn add_pixel(&mut self, x: usize, y: usize, colour: Colour) -> Result<()> {
        if x >= self.width {
            bail!("Tried to add pixel to column: {x}")
        }
        if y >= self.height {
            bail!("Tried to add pixel to row: {y}")
        }
        self.blend(x, y, colour);
        Ok(())
    }

    /// The current colour of a pixel.
    #[must_use]
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Colour> {
        if x >= self.width {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Every pixel that isn't fully transparent, ready to send to the host.
    pub fn to_pixels(&self) -> Result<Vec<constellation_protocol::Pixel>> {
        let mut pixels = Vec::new();
        for (index, colour) in self.pixels.iter().enumerate() {
            if colour.3 <= 0.0 {
                continue;
            }
            let x = u32::try_from(index % self.width)?;
            let y = u32::try_from(index / self.width)?;
            pixels.push(
                constellation_protocol::Pixel::builder()
                    .coordinates((x, y))
                    .color(*colour)
                    .build(),
            );
        }
        Ok(pixels)
    }

    /// Source-over alpha blending. Out of bounds pixels are silently ignored, shapes are allowed
    /// to hang off the edge of the surface.
    fn blend(&mut self, x: usize, y: usize, source: Colour) {
        if x >= self.width {
            return;
        }
        let Some(destination) = self.pixels.get_mut(y * self.width + x) else {
            return;
        };
        *destination = blend_over(source, *destination);
    }

    /// Blend onto signed coordinates, as produced when rasterising shapes near the edges.
    fn blend_signed(&mut self, x: i64, y: i64, source: Colour) {
        let (Ok(x_usize), Ok(y_usize)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        self.blend(x_usize, y_usize, source);
    }

    /// The backdrop colour of a given pixel.
    fn background_at(&self, x: usize, y: usize) -> Colour {
        let Some((inner, outer)) = self.background else {
            return TRANSPARENT;
        };

        let centre = Vec2::new(to_f32(self.width), to_f32(self.height)) / 2.0;
        let furthest = centre.length().max(f32::EPSILON);
        let pixel = Vec2::new(to_f32(x), to_f32(y)) + 0.5;
        let progress = (pixel.distance(centre) / furthest).clamp(0.0, 1.0);

        (
            lerp(inner.0, outer.0, progress),
            lerp(inner.1, outer.1, progress),
            lerp(inner.2, outer.2, progress),
            lerp(inner.3, outer.3, progress),
        )
    }
}

impl Canvas for Surface {
    fn clear(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let colour = self.background_at(x, y);
                if let Some(pixel) = self.pixels.get_mut(y * self.width + x) {
                    *pixel = colour;
                }
            }
        }
    }

    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        reason = "Coordinates are floored onto the pixel grid"
    )]
    fn fill_disc(&mut self, centre: Vec2, radius: f32, colour: Colour, glow: f32) {
        let radius = radius.max(MIN_DISC_RADIUS);
        let reach = radius + glow.max(0.0);
        let min = (centre - reach).floor();
        let max = (centre + reach).ceil();

        for y in (min.y as i64)..=(max.y as i64) {
            for x in (min.x as i64)..=(max.x as i64) {
                let pixel_centre = Vec2::new(x as f32, y as f32) + 0.5;
                let distance = pixel_centre.distance(centre);
                let strength = if distance <= radius {
                    1.0
                } else if distance < reach {
                    let fade = 1.0 - (distance - radius) / (reach - radius);
                    fade * fade * GLOW_INTENSITY
                } else {
                    continue;
                };
                self.blend_signed(x, y, (colour.0, colour.1, colour.2, colour.3 * strength));
            }
        }
    }

    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        reason = "Coordinates are floored onto the pixel grid"
    )]
    fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour, width: f32) {
        let delta = to - from;
        let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as u32;
        let thickness = width.round().max(1.0) as i64;
        let offset = (thickness - 1) / 2;

        let mut covered = Vec::new();
        for step in 0..=steps {
            let point = from + delta * (step as f32 / steps as f32);
            let (x, y) = (point.x.floor() as i64, point.y.floor() as i64);
            for dy in 0..thickness {
                for dx in 0..thickness {
                    covered.push((x + dx - offset, y + dy - offset));
                }
            }
        }

        // Consecutive samples often land on the same pixel, and each pixel must only be blended
        // once or the line gets darker where it's steep.
        covered.sort_unstable();
        covered.dedup();
        for (x, y) in covered {
            self.blend_signed(x, y, colour);
        }
    }
}

/// Porter-Duff source-over with straight (non-premultiplied) alpha.
#[must_use]
pub fn blend_over(source: Colour, destination: Colour) -> Colour {
    let source_alpha = source.3.clamp(0.0, 1.0);
    let destination_alpha = destination.3 * (1.0 - source_alpha);
    if destination_alpha <= 0.0 {
        return (source.0, source.1, source.2, source_alpha);
    }
    let alpha = source_alpha + destination_alpha;

    let mix = |source_channel: f32, destination_channel: f32| {
        (source_channel * source_alpha + destination_channel * destination_alpha) / alpha
    };
    (
        mix(source.0, destination.0),
        mix(source.1, destination.1),
        mix(source.2, destination.2),
        alpha,
    )
}

/// Linear interpolation.
fn lerp(from: f32, to: f32, progress: f32) -> f32 {
    from + (to - from) * progress
}

/// Pixel counts are far too small to lose precision.
#[expect(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "Terminals aren't millions of pixels wide"
)]
const fn to_f32(value: usize) -> f32 {
    value as f32
}

#[cfg(test)]
#[expect(clippy::float_cmp, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    const WHITE: Colour = (1.0, 1.0, 1.0, 1.0);
    const RED: Colour = (1.0, 0.0, 0.0, 1.0);

    fn blank(columns: u16, rows: u16) -> Surface {
        Surface::new(columns, rows, None)
    }

    #[test]
    fn pixel_dimensions() {
        let surface = blank(4, 3);
        assert_eq!(surface.width, 4);
        assert_eq!(surface.height, 6);
        assert!(surface.to_pixels().unwrap().is_empty());
    }

    #[test]
    fn add_pixels_in_and_out_of_bounds() {
        let mut surface = blank(2, 2);
        surface.add_pixel(1, 3, WHITE).unwrap();
        assert_eq!(surface.get_pixel(1, 3), Some(WHITE));

        let result = surface.add_pixel(1, 4, WHITE).unwrap_err();
        assert_eq!(
            format!("{}", result.root_cause()),
            "Tried to add pixel to row: 4"
        );
        let result = surface.add_pixel(2, 0, WHITE).unwrap_err();
        assert_eq!(
            format!("{}", result.root_cause()),
            "Tried to add pixel to column: 2"
        );
    }

    #[test]
    fn only_visible_pixels_are_exported() {
        let mut surface = blank(3, 1);
        surface.add_pixel(2, 1, RED).unwrap();
        let pixels = surface.to_pixels().unwrap();
        assert_eq!(pixels.len(), 1);
        assert_eq!(pixels[0].coordinates, (2, 1));
        assert_eq!(pixels[0].color, Some(RED));
    }

    #[test]
    fn blending() {
        let half_red = (1.0, 0.0, 0.0, 0.5);
        assert_eq!(blend_over(half_red, TRANSPARENT), half_red);
        assert_eq!(blend_over(RED, WHITE), RED);

        let (red, green, blue, alpha) = blend_over(half_red, WHITE);
        assert_eq!(alpha, 1.0);
        assert_eq!(red, 1.0);
        assert_eq!(green, 0.5);
        assert_eq!(blue, 0.5);
    }

    #[test]
    fn clear_wipes_the_frame() {
        let mut surface = blank(2, 1);
        surface.add_pixel(0, 0, WHITE).unwrap();
        surface.clear();
        assert_eq!(surface.get_pixel(0, 0), Some(TRANSPARENT));
    }

    #[test]
    fn background_is_a_radial_gradient() {
        let inner = (1.0, 1.0, 1.0, 1.0);
        let outer = (0.0, 0.0, 0.0, 1.0);
        let surface = Surface::new(10, 5, Some((inner, outer)));
        let centre = surface.get_pixel(5, 5).unwrap();
        let corner = surface.get_pixel(0, 0).unwrap();
        assert!(centre.0 > corner.0);
        assert_eq!(centre.3, 1.0);
        assert_eq!(surface.to_pixels().unwrap().len(), 100);
    }

    #[test]
    fn tiny_disc_still_covers_its_pixel() {
        let mut surface = blank(4, 2);
        surface.fill_disc(Vec2::new(1.5, 2.5), 0.05, RED, 0.0);
        assert_eq!(surface.get_pixel(1, 2), Some(RED));
        assert_eq!(surface.get_pixel(3, 0), Some(TRANSPARENT));
    }

    #[test]
    fn disc_glow_is_fainter_than_its_core() {
        let mut surface = blank(10, 5);
        surface.fill_disc(Vec2::new(5.5, 5.5), 1.0, WHITE, 3.0);
        let core = surface.get_pixel(5, 5).unwrap();
        let glow = surface.get_pixel(7, 5).unwrap();
        let beyond = surface.get_pixel(9, 9).unwrap();
        assert_eq!(core.3, 1.0);
        assert!(glow.3 > 0.0 && glow.3 < core.3);
        assert_eq!(beyond, TRANSPARENT);
    }

    #[test]
    fn disc_hanging_off_the_edge() {
        let mut surface = blank(2, 1);
        surface.fill_disc(Vec2::new(0.0, 0.0), 2.0, WHITE, 2.0);
        assert_eq!(surface.get_pixel(0, 0).unwrap().3, 1.0);
    }

    #[test]
    fn horizontal_line() {
        let mut surface = blank(5, 1);
        let colour = (0.7, 0.8, 1.0, 0.4);
        surface.stroke_line(Vec2::new(0.5, 0.5), Vec2::new(4.5, 0.5), colour, 1.0);
        for x in 0..5 {
            assert_eq!(surface.get_pixel(x, 0), Some(colour));
            assert_eq!(surface.get_pixel(x, 1), Some(TRANSPARENT));
        }
    }

    #[test]
    fn steep_line_blends_each_pixel_once() {
        let mut surface = blank(3, 5);
        let colour = (1.0, 1.0, 1.0, 0.5);
        surface.stroke_line(Vec2::new(1.2, 0.1), Vec2::new(1.6, 9.9), colour, 1.0);
        for y in 0..10 {
            assert_eq!(surface.get_pixel(1, y), Some(colour));
        }
    }
}
