use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame};
use crate::error::FrameError;
use crate::reassembler::{split_frame, ReassemblerConfig};

/// `tokio_util` codec over the lift frame format.
///
/// Decoding follows the same rules as [`StreamReassembler`]. A `FramedRead`
/// stops after the first error it yields, so long-lived readers that must
/// survive line noise should drive a [`StreamReassembler`] directly.
///
/// [`StreamReassembler`]: crate::StreamReassembler
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    config: ReassemblerConfig,
}

impl FrameCodec {
    pub fn new(config: ReassemblerConfig) -> Self {
        Self { config }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        split_frame(src, self.config.max_buffered_bytes)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, true, dst);
        Ok(())
    }
}
