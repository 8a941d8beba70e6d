//! Frame codecs for the sockline duplex stream.
//!
//! The client never interprets the bytes it moves. Whatever turns outgoing
//! buffers into wire bytes, and wire bytes back into frames, plugs in through
//! [`FrameCodec`]. Two codecs are provided:
//!
//! - [`RawCodec`]: pass-through, every read becomes one frame
//! - [`LengthDelimitedCodec`]: length-prefixed frames from tokio-util
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use sockline_codec::RawCodec;
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut codec = RawCodec::new();
//! let mut wire = BytesMut::new();
//! codec.encode(Bytes::from_static(b"ping"), &mut wire).unwrap();
//!
//! let frame = codec.decode(&mut wire).unwrap().unwrap();
//! assert_eq!(&frame[..], b"ping");
//! ```

mod raw;

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub use raw::RawCodec;
pub use tokio_util::codec::LengthDelimitedCodec;

/// A codec the client can layer over its duplex stream.
///
/// Encoding failures and decoding failures are both reported as
/// [`io::Error`], which the client treats as a transport failure. A decoder
/// must never yield an empty frame for live data: the client reads an empty
/// frame as the peer closing the stream.
///
/// Implemented for every type meeting the bounds, so tokio-util codecs work
/// as-is.
pub trait FrameCodec:
    Encoder<Bytes, Error = io::Error>
    + Decoder<Item = BytesMut, Error = io::Error>
    + Clone
    + Send
    + Sync
    + Unpin
    + 'static
{
}

impl<T> FrameCodec for T where
    T: Encoder<Bytes, Error = io::Error>
        + Decoder<Item = BytesMut, Error = io::Error>
        + Clone
        + Send
        + Sync
        + Unpin
        + 'static
{
}
