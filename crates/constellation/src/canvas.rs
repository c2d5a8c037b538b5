//! The drawing primitives the render loop needs from a surface.

use glam::Vec2;

use crate::Colour;

/// Anything the constellation can be drawn onto. All coordinates and lengths are in pixels.
pub trait Canvas {
    /// Wipe the previous frame, painting the background if there is one.
    fn clear(&mut self);

    /// A filled disc, haloed by a glow that fades out over `glow` pixels beyond its edge. The
    /// colour's alpha is the disc's opacity.
    fn fill_disc(&mut self, centre: Vec2, radius: f32, colour: Colour, glow: f32);

    /// A straight line. The colour's alpha is the line's opacity.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour, width: f32);
}
