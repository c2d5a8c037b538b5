//! These are all the types that pass between Constellation and the host terminal that
//! composites its layer.

#![expect(clippy::pub_use, reason = "This seems to come from the `bon` crate")]

/// An RGBA colour.
pub type Colour = (f32, f32, f32, f32);

/// Output from the plugin that renders pixels in the terminal.
#[derive(serde::Serialize, serde::Deserialize, bon::Builder, Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct Pixel {
    /// The coordinates of the pixel. [0, 0] is in the top-left. The y-axis is twice as long as the
    /// number of rows in the terminal because 2 "pixels" can fit in a single TTY cell using the
    /// UTF8 half-block trick: ▀▄▀▄
    pub coordinates: (u32, u32),
    /// An optional colour for the pixel. If `None` (or `null` in the case of JSON) is used then
    /// the default foreground colour is used.
    pub color: Option<Colour>,
}

/// The various kinds of messages that the host can send to the plugin.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PluginInputMessages {
    /// Sent once the host's terminal size is known and whenever it changes afterwards.
    #[serde(rename = "tty_resize")]
    TTYResize {
        /// The number of columns in the new terminal size.
        width: u16,
        /// The number of rows in the new terminal size.
        height: u16,
    },
    /// The pointer moved. Coordinates are in pixels, so `y` can be up to twice the number of
    /// rows.
    PointerMove {
        /// Pixel column.
        x: u32,
        /// Pixel row.
        y: u32,
    },
    /// The pointer left the terminal.
    PointerLeave,
}

/// All the message kinds that the plugin can send to the host.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PluginOutputMessages {
    /// A complete frame of the layer. Transparent pixels are not included.
    OutputPixels(Vec<Pixel>),
}

#[expect(clippy::default_numeric_fallback, reason = "Tests aren't so strict")]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn output_pixels() {
        let expected = serde_json::json!(
            {
                "output_pixels": [{
                    "coordinates": [1, 2],
                    "color": [0.1, 0.2, 0.3, 0.4],
                }]
            }
        );

        let output = PluginOutputMessages::OutputPixels(vec![Pixel::builder()
            .coordinates((1, 2))
            .color((0.1, 0.2, 0.3, 0.4))
            .build()]);

        assert_eq!(
            expected.to_string(),
            serde_json::to_string(&output).unwrap()
        );
    }

    #[test]
    fn input_tty_resize() {
        let expected = serde_json::json!(
            {
                "tty_resize": {
                    "width": 1,
                    "height": 2,
                }
            }
        );

        let output = PluginInputMessages::TTYResize {
            width: 1,
            height: 2,
        };

        assert_eq!(
            expected.to_string(),
            serde_json::to_string(&output).unwrap()
        );
    }

    #[test]
    fn input_pointer_move() {
        let json = r#"{"pointer_move": {"x": 3, "y": 7}}"#;
        let message: PluginInputMessages = serde_json::from_str(json).unwrap();
        assert_eq!(message, PluginInputMessages::PointerMove { x: 3, y: 7 });
    }

    #[test]
    fn input_pointer_leave() {
        let message: PluginInputMessages = serde_json::from_str(r#""pointer_leave""#).unwrap();
        assert_eq!(message, PluginInputMessages::PointerLeave);
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#""pointer_leave""#
        );
    }
}
