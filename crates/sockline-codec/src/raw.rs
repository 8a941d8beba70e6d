//! Pass-through codec.
//!
//! `RawCodec` applies no framing at all. Outgoing buffers are written as-is
//! and every chunk the socket hands back becomes one frame, split only when
//! it exceeds the configured maximum frame size. Message boundaries are
//! therefore whatever TCP delivers; layer a real codec on top when the
//! application needs them.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum size of a single decoded frame (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Codec that moves bytes without interpreting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCodec {
    /// Upper bound on the length of one decoded frame.
    max_frame_size: usize,
}

impl RawCodec {
    /// Create a codec with the default 64 KB frame limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec that splits inbound data into frames of at most
    /// `max_frame_size` bytes.
    ///
    /// A zero limit is raised to one byte, since an empty frame means
    /// the peer closed the stream.
    ///
    /// ```
    /// use sockline_codec::RawCodec;
    ///
    /// let codec = RawCodec::with_max_frame_size(0);
    /// assert_eq!(codec.max_frame_size(), 1);
    /// ```
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.max(1),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for RawCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RawCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let len = src.len().min(self.max_frame_size);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for RawCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_codec_new() {
        let codec = RawCodec::new();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_codec_default() {
        assert_eq!(RawCodec::default(), RawCodec::new());
    }

    #[test]
    fn test_decode_empty_buffer() {
        let mut codec = RawCodec::new();
        let mut buffer = BytesMut::new();

        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_decode_takes_whole_chunk() {
        let mut codec = RawCodec::new();
        let mut buffer = BytesMut::from(&b"0123456789"[..]);

        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&frame[..], b"0123456789");
        assert!(buffer.is_empty());
    }

    #[rstest]
    #[case(10, 3, vec![3, 3, 3, 1])]
    #[case(10, 5, vec![5, 5])]
    #[case(4, 64, vec![4])]
    fn test_decode_splits_at_limit(
        #[case] input_len: usize,
        #[case] limit: usize,
        #[case] expected: Vec<usize>,
    ) {
        let mut codec = RawCodec::with_max_frame_size(limit);
        let mut buffer = BytesMut::from(&vec![0xAB; input_len][..]);

        let mut sizes = Vec::new();
        while let Some(frame) = codec.decode(&mut buffer).unwrap() {
            sizes.push(frame.len());
        }
        assert_eq!(sizes, expected);
    }

    #[test]
    fn test_decode_eof_drains_remaining_bytes() {
        let mut codec = RawCodec::new();
        let mut buffer = BytesMut::from(&b"tail"[..]);

        let frame = codec.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(&frame[..], b"tail");
        assert!(codec.decode_eof(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_encode_appends() {
        let mut codec = RawCodec::new();
        let mut buffer = BytesMut::from(&b"ab"[..]);

        codec.encode(Bytes::from_static(b"cd"), &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"abcd");
    }
}
