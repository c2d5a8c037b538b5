//! Constellation: a field of softly glowing particles that drift across your terminal's
//! background, joined by faint lines whenever they come close, and pushed aside by the pointer.

pub mod canvas;
pub mod cli_args;
pub mod config;
pub mod connections;
pub mod particle;
pub mod physics;
pub mod plugin;
pub mod render_loop;
pub mod run;
pub mod surface;

#[expect(clippy::pub_use, reason = "Colours are used everywhere")]
pub use constellation_protocol::Colour;
