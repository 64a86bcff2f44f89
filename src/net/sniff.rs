//! Protocol classification from a connection's first bytes.
//!
//! # Responsibilities
//! - Recognize the HTTP/2 client preface
//! - Walk HTTP/2 frames up to the first complete header block
//! - HPACK-decode that block and inspect `content-type`
//!
//! Nothing here consumes the connection: callers buffer what they read and
//! replay it to whichever server ends up owning the stream.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The HTTP/2 connection preface sent by every prior-knowledge client.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Smallest sniff budget that holds a client's preface, SETTINGS and first
/// header block.
pub const MIN_SNIFF_BYTES: usize = 1024;

/// Media type announced by gRPC clients.
pub const GRPC_CONTENT_TYPE: &str = "application/grpc";

const FRAME_HEADER_LEN: usize = 9;
const FRAME_HEADERS: u8 = 0x1;
const FRAME_CONTINUATION: u8 = 0x9;
const FLAG_END_HEADERS: u8 = 0x4;
const FLAG_PADDED: u8 = 0x8;
const FLAG_PRIORITY: u8 = 0x20;

/// Which server a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// HTTP/2 with a gRPC content-type.
    Rpc,
    /// Everything else.
    Gateway,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Rpc => "rpc",
            Protocol::Gateway => "gateway",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of inspecting a prefix of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Matched(Protocol),
    NeedMore,
}

/// Whether a `content-type` value names the gRPC wire format.
///
/// `application/grpc` and its `+codec` variants match; `application/grpc-web`
/// does not.
pub fn is_rpc_content_type(value: &[u8]) -> bool {
    let grpc = GRPC_CONTENT_TYPE.as_bytes();
    value == grpc || (value.starts_with(grpc) && value.get(grpc.len()) == Some(&b'+'))
}

/// Classify a buffered connection prefix.
pub fn inspect(buf: &[u8]) -> Verdict {
    let preface_len = buf.len().min(HTTP2_PREFACE.len());
    if buf[..preface_len] != HTTP2_PREFACE[..preface_len] {
        return Verdict::Matched(Protocol::Gateway);
    }
    if buf.len() < HTTP2_PREFACE.len() {
        return Verdict::NeedMore;
    }

    let mut offset = HTTP2_PREFACE.len();
    let mut block: Option<(u32, Vec<u8>)> = None;

    loop {
        let Some(frame) = parse_frame(&buf[offset..]) else {
            return Verdict::NeedMore;
        };
        offset += FRAME_HEADER_LEN + frame.payload.len();

        if let Some((stream_id, fragment)) = block.as_mut() {
            // A header block must be followed by its own continuations only.
            if frame.kind != FRAME_CONTINUATION || *stream_id != frame.stream_id {
                return Verdict::Matched(Protocol::Gateway);
            }
            fragment.extend_from_slice(frame.payload);
            if frame.flags & FLAG_END_HEADERS != 0 {
                return Verdict::Matched(classify_block(fragment));
            }
            continue;
        }

        if frame.kind == FRAME_HEADERS {
            let Some(fragment) = headers_fragment(frame.flags, frame.payload) else {
                return Verdict::Matched(Protocol::Gateway);
            };
            if frame.flags & FLAG_END_HEADERS != 0 {
                return Verdict::Matched(classify_block(fragment));
            }
            block = Some((frame.stream_id, fragment.to_vec()));
        }
    }
}

struct Frame<'a> {
    kind: u8,
    flags: u8,
    stream_id: u32,
    payload: &'a [u8],
}

fn parse_frame(buf: &[u8]) -> Option<Frame<'_>> {
    if buf.len() < FRAME_HEADER_LEN {
        return None;
    }
    let len = (usize::from(buf[0]) << 16) | (usize::from(buf[1]) << 8) | usize::from(buf[2]);
    if buf.len() < FRAME_HEADER_LEN + len {
        return None;
    }
    let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7fff_ffff;
    Some(Frame {
        kind: buf[3],
        flags: buf[4],
        stream_id,
        payload: &buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len],
    })
}

/// Strip padding and priority fields from a HEADERS payload.
fn headers_fragment(flags: u8, payload: &[u8]) -> Option<&[u8]> {
    let mut start = 0;
    let mut end = payload.len();
    if flags & FLAG_PADDED != 0 {
        let pad = usize::from(*payload.first()?);
        start += 1;
        end = end.checked_sub(pad)?;
    }
    if flags & FLAG_PRIORITY != 0 {
        start += 5;
    }
    if start > end {
        return None;
    }
    Some(&payload[start..end])
}

fn classify_block(block: &[u8]) -> Protocol {
    let mut decoder = hpack::Decoder::new();
    let Ok(headers) = decoder.decode(block) else {
        return Protocol::Gateway;
    };
    let rpc = headers
        .iter()
        .any(|(name, value)| {
            name.eq_ignore_ascii_case(b"content-type") && is_rpc_content_type(value)
        });
    if rpc {
        Protocol::Rpc
    } else {
        Protocol::Gateway
    }
}

/// Read from `io` into `buf` until the connection can be classified.
///
/// Timeout, EOF, read errors and an exhausted byte budget all fall back to
/// [`Protocol::Gateway`], the catch-all consumer.
pub async fn sniff<R>(
    io: &mut R,
    buf: &mut BytesMut,
    max_bytes: usize,
    timeout: Duration,
) -> Protocol
where
    R: AsyncRead + Unpin,
{
    let read_loop = async {
        loop {
            if let Verdict::Matched(protocol) = inspect(&buf[..]) {
                return protocol;
            }
            if buf.len() >= max_bytes {
                return Protocol::Gateway;
            }
            buf.reserve(4096.min(max_bytes - buf.len()));
            match io.read_buf(&mut *buf).await {
                Ok(0) | Err(_) => return Protocol::Gateway,
                Ok(_) => {}
            }
        }
    };

    tokio::time::timeout(timeout, read_loop)
        .await
        .unwrap_or(Protocol::Gateway)
}
