//! Talk to the host over STDIN and STDOUT.
//!
//! The host streams JSON messages to us on STDIN and we stream frames back on STDOUT. Neither
//! side uses delimiters, the streaming JSON parser finds where each message ends.

use color_eyre::eyre::Result;
use constellation_protocol::{PluginInputMessages, PluginOutputMessages};

use crate::render_loop::Event;

/// Start a thread that parses the host's messages and forwards them to the render loop. The
/// thread sends a final [`Event::End`] when its input closes.
pub fn start_listener<R>(
    reader: R,
    events: tokio::sync::mpsc::Sender<Event>,
) -> std::thread::JoinHandle<()>
where
    R: std::io::Read + Send + 'static,
{
    std::thread::spawn(move || {
        tracing::trace!("Starting to parse JSON stream from host...");
        listener(reader, &events);
        tracing::debug!("Host's input closed");
        if let Err(error) = events.blocking_send(Event::End) {
            tracing::error!("Couldn't send end event: {error:?}");
        }
    })
}

/// Parse the host's messages until the input ends, or is no longer valid JSON.
///
/// Each message is first parsed as arbitrary JSON, so that a message we don't know about doesn't
/// end the stream.
pub fn listener<R: std::io::Read>(reader: R, events: &tokio::sync::mpsc::Sender<Event>) {
    let reader = std::io::BufReader::new(reader);
    let messages = serde_json::Deserializer::from_reader(reader).into_iter::<serde_json::Value>();

    for parse_result in messages {
        let json = match parse_result {
            Ok(json) => json,
            Err(error) => {
                tracing::error!("Error parsing host message: {error:?}");
                continue;
            }
        };

        let message = match serde_json::from_value::<PluginInputMessages>(json) {
            Ok(message) => message,
            Err(error) => {
                tracing::trace!("Ignoring unknown host message: {error:?}");
                continue;
            }
        };

        tracing::trace!("Parsed JSON message: {message:?}");
        let Some(event) = to_event(message) else {
            continue;
        };
        if let Err(error) = events.blocking_send(event) {
            tracing::error!("Couldn't send parsed host message: {error:?}");
            break;
        }
    }
}

/// Convert a message from the host into something the render loop understands.
fn to_event(message: PluginInputMessages) -> Option<Event> {
    let event = match message {
        PluginInputMessages::TTYResize { width, height } => Event::Resize { width, height },
        PluginInputMessages::PointerMove { x, y } => Event::PointerMove { x, y },
        PluginInputMessages::PointerLeave => Event::PointerLeave,
        _ => return None,
    };
    Some(event)
}

/// Write every frame the render loop makes to STDOUT, until the render loop hangs up.
pub async fn send_output(
    mut frames: tokio::sync::mpsc::Receiver<PluginOutputMessages>,
) -> Result<()> {
    while let Some(frame) = frames.recv().await {
        let mut stdout = std::io::stdout().lock();
        let result = write_frame(&mut stdout, &frame);
        if let Err(error) = result {
            tracing::error!("Error sending JSON to host: {error:?}");
        }
    }

    tracing::debug!("Leaving output loop");
    Ok(())
}

/// Serialise a frame and write it out in one go.
pub fn write_frame<W: std::io::Write>(writer: &mut W, frame: &PluginOutputMessages) -> Result<()> {
    let json = serde_json::to_string(frame)?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(input: &'static str) -> Vec<Event> {
        let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(16);
        start_listener(input.as_bytes(), events_tx).join().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn parses_a_stream_of_messages() {
        let events = parse(
            r#"{"tty_resize":{"width":80,"height":24}}
               {"pointer_move":{"x":3,"y":4}}"pointer_leave""#,
        );
        assert_eq!(
            events,
            vec![
                Event::Resize {
                    width: 80,
                    height: 24
                },
                Event::PointerMove { x: 3, y: 4 },
                Event::PointerLeave,
                Event::End,
            ]
        );
    }

    #[test]
    fn skips_unknown_messages() {
        let events = parse(r#"{"cursor_blink":{"on":true}} "pointer_leave""#);
        assert_eq!(events, vec![Event::PointerLeave, Event::End]);
    }

    #[test]
    fn closed_input_ends() {
        assert_eq!(parse(""), vec![Event::End]);
    }

    #[test]
    fn writes_frames_as_json() {
        let frame = PluginOutputMessages::OutputPixels(vec![constellation_protocol::Pixel::builder()
            .coordinates((1, 2))
            .color((1.0, 0.5, 0.0, 1.0))
            .build()]);
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();
        let written: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "output_pixels": [
                    { "coordinates": [1, 2], "color": [1.0, 0.5, 0.0, 1.0] }
                ]
            })
        );
    }
}
