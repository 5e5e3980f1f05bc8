//! Length-prefixed framing for the kedung wire protocol.
//!
//! Every message on the wire is `PPPPPPP<payload>` where `PPPPPPP` is the
//! payload length in bytes, written as zero-padded decimal ASCII with a
//! fixed width (the "prefix width", 7 by default). [`Decoder`] reassembles
//! complete frames out of whatever fragments the kernel happens to deliver;
//! [`encode`] does the reverse.

use crate::error::PrefixError;
use bytes::{Buf, BytesMut};

/// Encode a single payload as a length-prefixed frame.
///
/// Fails with [`PrefixError::Overflow`] if `payload` does not fit in
/// `prefix_width` decimal digits.
pub fn encode(payload: &[u8], prefix_width: usize) -> Result<BytesMut, PrefixError> {
    let max_len = 10usize.pow(prefix_width as u32);
    if payload.len() >= max_len {
        return Err(PrefixError::Overflow {
            len: payload.len(),
            prefix_width,
        });
    }

    let mut out = BytesMut::with_capacity(prefix_width + payload.len());
    out.extend_from_slice(format!("{:0width$}", payload.len(), width = prefix_width).as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Reassembles frames out of an arbitrarily fragmented or coalesced byte
/// stream. Each connection owns its own `Decoder`; residual bytes from an
/// incomplete frame are held across calls to [`Decoder::push`].
#[derive(Debug)]
pub struct Decoder {
    prefix_width: usize,
    residual: BytesMut,
    /// Set once a prefix fails to parse as a non-negative integer. The
    /// reference implementation treats this as fatal for the stream: the
    /// whole residual is parked and never re-synchronized.
    stalled: bool,
}

impl Decoder {
    /// Construct a decoder using the given prefix width.
    pub fn new(prefix_width: usize) -> Self {
        Self {
            prefix_width,
            residual: BytesMut::new(),
            stalled: false,
        }
    }

    /// Append newly-received bytes and drain as many complete frames as
    /// are now available. Returns the frames in the order they completed.
    ///
    /// If the stream previously stalled on a malformed prefix, this
    /// returns an empty vec and keeps accumulating bytes into the
    /// residual forever (see §9 Design Notes: this is a preserved
    /// limitation, not a bug to silently work around).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<BytesMut> {
        self.residual.extend_from_slice(bytes);

        if self.stalled {
            return Vec::new();
        }

        let mut frames = Vec::new();
        loop {
            if self.residual.len() < self.prefix_width {
                break;
            }

            let prefix = &self.residual[..self.prefix_width];
            let length = match parse_prefix(prefix) {
                Some(length) => length,
                None => {
                    self.stalled = true;
                    break;
                }
            };

            if self.residual.len() < self.prefix_width + length {
                break;
            }

            self.residual.advance(self.prefix_width);
            let frame = self.residual.split_to(length);
            frames.push(frame);
        }

        frames
    }
}

fn parse_prefix(prefix: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(prefix).ok()?;
    let trimmed = text.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some(0);
    }
    trimmed.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: usize = 7;

    #[test]
    fn test_roundtrip_single_frame() {
        let payload = b"hello world";
        let frame = encode(payload, P).unwrap();
        let mut decoder = Decoder::new(P);
        let frames = decoder.push(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], payload);
    }

    #[test]
    fn test_overflow() {
        let too_big = vec![0u8; 10usize.pow(3)];
        let err = encode(&too_big, 3).unwrap_err();
        assert_eq!(
            err,
            PrefixError::Overflow {
                len: too_big.len(),
                prefix_width: 3
            }
        );
    }

    #[test]
    fn test_fragmentation_invariance() {
        let a = encode(b"first", P).unwrap();
        let b = encode(b"second-payload", P).unwrap();
        let whole = [&a[..], &b[..]].concat();

        // Split at every possible boundary and confirm identical output.
        for split in 0..=whole.len() {
            let mut decoder = Decoder::new(P);
            let mut frames = decoder.push(&whole[..split]);
            frames.extend(decoder.push(&whole[split..]));
            assert_eq!(frames.len(), 2, "split at {split} produced wrong frame count");
            assert_eq!(&frames[0][..], b"first");
            assert_eq!(&frames[1][..], b"second-payload");
        }
    }

    #[test]
    fn test_coalesced_frames_single_read() {
        let a = encode(b"one", P).unwrap();
        let b = encode(b"two", P).unwrap();
        let whole = [&a[..], &b[..]].concat();

        let mut decoder = Decoder::new(P);
        let frames = decoder.push(&whole);
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], b"one");
        assert_eq!(&frames[1][..], b"two");
    }

    #[test]
    fn test_split_mid_prefix_and_mid_payload() {
        let frame = encode(b"{\"key_1\":\"value_1\"}", P).unwrap();
        let mid = frame.len() / 2;

        let mut decoder = Decoder::new(P);
        let mut frames = decoder.push(&frame[..mid]);
        assert!(frames.is_empty());
        frames.extend(decoder.push(&frame[mid..]));
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &b"{\"key_1\":\"value_1\"}"[..]);
    }

    #[test]
    fn test_malformed_prefix_stalls_stream() {
        let mut decoder = Decoder::new(P);
        let frames = decoder.push(b"abcdefg{\"command\":1}");
        assert!(frames.is_empty());
        assert!(decoder.stalled);

        // A subsequent well-formed frame does not recover the stream.
        let next = encode(b"{}", P).unwrap();
        let frames = decoder.push(&next);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode(b"", P).unwrap();
        let mut decoder = Decoder::new(P);
        let frames = decoder.push(&frame);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }
}
