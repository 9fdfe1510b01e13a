//! Wire encoding for the event stream
//!
//! Each event is one frame terminated by a blank line:
//!
//! ```text
//! data: {"type":"<type>","html":"<optional>","data":<json>}\n\n
//! ```
//!
//! Comment frames (`: <text>\n\n`) announce the connection and keep it alive.
//! The payload is compact JSON, which escapes every control character inside
//! strings, so a multi-line `html` or `data` value stays on one line.

use bytes::{BufMut, Bytes, BytesMut};

use super::Event;

const DATA_PREFIX: &[u8] = b"data: ";
const COMMENT_PREFIX: &[u8] = b": ";
const FRAME_END: &[u8] = b"\n\n";

/// Failure to serialize an event payload
#[derive(Debug, thiserror::Error)]
#[error("failed to encode event: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Encode an event as a `data:` frame
pub fn encode_event(event: &Event) -> Result<Bytes, EncodeError> {
    let json = serde_json::to_vec(event)?;
    debug_assert!(!json.contains(&b'\n'));

    let mut buf = BytesMut::with_capacity(DATA_PREFIX.len() + json.len() + FRAME_END.len());
    buf.put_slice(DATA_PREFIX);
    buf.put_slice(&json);
    buf.put_slice(FRAME_END);
    Ok(buf.freeze())
}

/// Encode a comment frame
///
/// Line breaks in `text` are replaced with spaces so the comment cannot end
/// the frame early or smuggle in a `data:` line.
pub fn encode_comment(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(COMMENT_PREFIX.len() + text.len() + FRAME_END.len());
    buf.put_slice(COMMENT_PREFIX);
    for ch in text.chars() {
        match ch {
            '\r' | '\n' => buf.put_u8(b' '),
            _ => {
                let mut tmp = [0u8; 4];
                buf.put_slice(ch.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
    buf.put_slice(FRAME_END);
    buf.freeze()
}

/// Frame written as soon as a connection is accepted
pub fn connected_frame(channel: &str) -> Bytes {
    encode_comment(&format!("connected to {}", channel))
}

/// Frame written on the keep-alive interval
pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": keep-alive\n\n")
}
