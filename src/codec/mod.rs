//! Framing of specMech commands and replies.
//!
//! [`encode`] produces the outgoing `c;N\r` frames; [`decode`] turns one
//! complete raw reply into a [`MechReply`]. [`MechClientCodec`] adapts both
//! to [`tokio_util::codec`] so the client can drive a
//! [`Framed`](tokio_util::codec::Framed) transport: bytes accumulate until
//! the `>` terminator or the `!` reboot marker is observed, then the whole
//! interaction decodes as one item.

pub mod decode;
pub mod encode;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use specmech_types::MechReply;

pub use decode::decode_reply;
pub use encode::{Encode, Frame, MechCommand};

/// Upper bound on a buffered reply; a stream that keeps growing past this
/// without a terminator is broken.
pub const MAX_REPLY_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum MechCodecError {
    #[error("Reply exceeded {MAX_REPLY_SIZE} bytes without a terminator")]
    ReplyTooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MechClientCodec;

impl Decoder for MechClientCodec {
    type Item = MechReply;
    type Error = MechCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // The protocol is strictly request/response: everything buffered up
        // to the terminator belongs to the in-flight command.
        if src.iter().any(|&b| b == b'>' || b == b'!') {
            let raw = src.split_to(src.len());
            Ok(Some(decode_reply(&raw)))
        } else if src.len() > MAX_REPLY_SIZE {
            Err(MechCodecError::ReplyTooLarge)
        } else {
            Ok(None)
        }
    }
}

impl Encoder<Frame> for MechClientCodec {
    type Error = MechCodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut writer = dst.writer();
        item.encode(&mut writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use specmech_types::ReplyCode;

    use super::*;

    #[test]
    fn test_decoder_accumulates_until_terminator() {
        let tests: [(&[u8], Option<ReplyCode>); 4] = [
            (b"$S2CMD,rp;1*0F", None),
            (b"\r\n$S2PNU,,o,,c,,o,,1*78", None),
            (b"\r\n", None),
            (b">", Some(ReplyCode::Valid)),
        ];

        let mut codec = MechClientCodec;
        let mut src = BytesMut::new();

        for (chunk, expected) in tests {
            src.extend_from_slice(chunk);
            let got = codec.decode(&mut src).unwrap();
            assert_eq!(got.map(|reply| reply.code), expected);
        }

        assert!(src.is_empty());
    }

    #[test]
    fn test_decoder_reboot_marker() {
        let mut codec = MechClientCodec;
        let mut src = BytesMut::from(b"!".as_ref());

        let reply = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(reply.code, ReplyCode::ControllerRebooted);
    }

    #[test]
    fn test_decoder_bounds_the_buffer() {
        let mut codec = MechClientCodec;
        let mut src = BytesMut::new();
        src.resize(MAX_REPLY_SIZE + 1, b'x');

        assert!(matches!(
            codec.decode(&mut src),
            Err(MechCodecError::ReplyTooLarge)
        ));
    }

    #[test]
    fn test_encoder() {
        let mut codec = MechClientCodec;
        let mut dst = BytesMut::new();

        codec
            .encode(
                Frame::new(MechCommand::Raw("rt".to_string()), Some(7)),
                &mut dst,
            )
            .unwrap();
        assert_eq!(&dst[..], b"rt;7\r");
    }
}
