use {
    super::Frame,
    crate::{
        message::{ActionCode, Channel, Message, Response},
        NodeId,
    },
    bytes::{Buf, BufMut, BytesMut},
    std::{convert::TryFrom, io},
    tokio_util::codec::{Decoder, Encoder},
};

/// The largest frame we're willing to buffer. Anything longer is most likely
/// garbage on the wire.
pub(crate) const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// 1 byte channel tag and 4 byte source node id
const HEADER_LEN: usize = 1 + 4;

/// Encodes and decodes length prefixed [`Frame`]s.
///
/// After the 4 byte frame length prefix comes the 1 byte channel tag and the
/// 4 byte id of the sending node. The rest depends on the channel:
/// - control: 4 byte action code, 4 byte payload length, payload,
/// - request: 4 byte payload length, payload,
/// - response: 4 byte ACK/NACK code.
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, buf: &mut BytesMut) -> io::Result<()> {
        let Frame { from, msg } = frame;
        let from = u32::try_from(from).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Node id does not fit in 4 bytes",
            )
        })?;

        if let Message::SegmentResponse(response) = msg {
            // frame length prefix: header and 4 byte code
            let frame_len = HEADER_LEN + 4;
            buf.reserve(4 + frame_len);
            buf.put_u32(frame_len as u32);
            buf.put_u8(Channel::Response as u8);
            buf.put_u32(from);
            buf.put_i32(response as i32);
            return Ok(());
        }

        let payload = msg.payload();
        // control messages also carry the 4 byte action code
        let code_len = if msg.action_code().is_some() { 4 } else { 0 };
        let frame_len = HEADER_LEN + code_len + 4 + payload.len();
        if frame_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Frame too long",
            ));
        }

        buf.reserve(4 + frame_len);
        buf.put_u32(frame_len as u32);
        buf.put_u8(msg.channel() as u8);
        buf.put_u32(from);
        if let Some(code) = msg.action_code() {
            buf.put_i32(code as i32);
        }
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(payload.as_bytes());

        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        // the frame length prefix must be present at the minimum, otherwise
        // we can't tell whether the whole frame arrived
        if buf.len() < 4 {
            return Ok(None);
        }

        // peek at the length without advancing the cursor, as we may need to
        // wait for the rest of the frame
        let mut len_prefix = [0; 4];
        len_prefix.copy_from_slice(&buf[..4]);
        let frame_len = u32::from_be_bytes(len_prefix) as usize;
        if frame_len > MAX_FRAME_LEN {
            return Err(invalid_data("Frame too long"));
        }
        if frame_len < HEADER_LEN {
            return Err(invalid_data("Frame shorter than its header"));
        }

        // check that we got the full frame in the buffer
        if buf.len() < 4 + frame_len {
            buf.reserve(4 + frame_len - buf.len());
            return Ok(None);
        }

        buf.advance(4);
        let mut frame = buf.split_to(frame_len);
        let channel = Channel::try_from(frame.get_u8())?;
        let from = frame.get_u32() as NodeId;
        let msg = match channel {
            Channel::Control => {
                if frame.remaining() < 4 {
                    return Err(invalid_data("Missing action code"));
                }
                let code = ActionCode::try_from(frame.get_i32())?;
                let payload = read_payload(&mut frame)?;
                Message::from_control(code, &payload)?
            }
            Channel::Request => {
                let payload = read_payload(&mut frame)?;
                Message::from_request(&payload)?
            }
            Channel::Response => {
                if frame.remaining() < 4 {
                    return Err(invalid_data("Missing response code"));
                }
                Message::SegmentResponse(Response::try_from(frame.get_i32())?)
            }
        };

        if frame.has_remaining() {
            return Err(invalid_data("Trailing bytes in frame"));
        }

        log::trace!("Decoded {} frame from node {}", msg, from);
        Ok(Some(Frame { from, msg }))
    }
}

// Reads a 4 byte length prefixed UTF-8 payload.
fn read_payload(frame: &mut BytesMut) -> io::Result<String> {
    if frame.remaining() < 4 {
        return Err(invalid_data("Missing payload length"));
    }
    let len = frame.get_u32() as usize;
    if frame.remaining() < len {
        return Err(invalid_data("Payload longer than frame"));
    }
    let payload = frame.split_to(len);
    String::from_utf8(payload.to_vec())
        .map_err(|_| invalid_data("Payload is not valid UTF-8"))
}

fn invalid_data(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
