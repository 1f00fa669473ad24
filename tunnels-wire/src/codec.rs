//! Message framing.
//!
//! Every frame is the 4-byte network magic, a big-endian u32 payload
//! length, and a bincode payload. The decoder is stateless: the buffer is
//! left untouched until a whole frame has arrived, so partial reads never
//! lose data and the header is cheap enough to re-validate.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{WireError, WireResult};
use crate::messages::Message;
use crate::serialization;
use crate::{MAX_MESSAGE_SIZE, NETWORK_MAGIC};

/// Bytes of magic plus length prefix in front of every payload.
const FRAME_HEADER_LEN: usize = NETWORK_MAGIC.len() + 4;

/// Codec framing [`Message`]s on a byte stream.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Create a new message codec.
    pub fn new() -> Self {
        Self
    }
}

/// Validate a frame header and return its payload length.
fn payload_len(header: &[u8]) -> WireResult<usize> {
    let (magic, len_bytes) = header.split_at(NETWORK_MAGIC.len());
    if magic != NETWORK_MAGIC.as_slice() {
        return Err(WireError::InvalidMagic {
            expected: NETWORK_MAGIC,
            actual: magic.try_into().expect("magic is 4 bytes"),
        });
    }

    let len = u32::from_be_bytes(len_bytes.try_into().expect("length is 4 bytes")) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(WireError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> WireResult<Option<Message>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let frame_len = FRAME_HEADER_LEN + payload_len(&src[..FRAME_HEADER_LEN])?;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len);
        frame.advance(FRAME_HEADER_LEN);
        serialization::deserialize(&frame).map(Some)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> WireResult<()> {
        let payload = serialization::serialize(&message)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        dst.reserve(FRAME_HEADER_LEN + payload.len());
        dst.extend_from_slice(&NETWORK_MAGIC);
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{NetAddress, SubnetworkId, VersionMessage};
    use crate::PROTOCOL_VERSION;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Version(VersionMessage {
                protocol_version: PROTOCOL_VERSION,
                network: "tunnels-mainnet".to_string(),
                services: 1,
                timestamp: 1_700_000_000,
                id: [7u8; 16],
                user_agent: "/tunnelsd:1.0.0/".to_string(),
                subnetwork_id: Some(SubnetworkId([3u8; 20])),
            }),
            Message::VerAck,
            Message::RequestAddresses {
                include_all_subnetworks: true,
                subnetwork_id: None,
            },
            Message::Addresses(vec![
                NetAddress::new("8.8.8.8".parse().unwrap(), 9333),
                NetAddress::new("2001:db8::1".parse().unwrap(), 9333),
            ]),
            Message::Ping(41),
            Message::Pong(41),
        ]
    }

    fn encode_one(message: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        MessageCodec::new().encode(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_every_message_kind_roundtrips() {
        let mut codec = MessageCodec::new();
        for message in sample_messages() {
            let mut buf = encode_one(message.clone());
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, message);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_frame_arrives_byte_by_byte() {
        let full = encode_one(Message::Ping(7));
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();

        // Nothing decodes until the very last byte lands.
        for &byte in &full[..full.len() - 1] {
            buf.put_u8(byte);
            assert_eq!(codec.decode(&mut buf).unwrap(), None);
        }
        buf.put_u8(full[full.len() - 1]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Ping(7)));
    }

    #[test]
    fn test_back_to_back_frames_drain_in_order() {
        let mut codec = MessageCodec::new();
        let messages = sample_messages();

        let mut buf = BytesMut::new();
        for message in &messages {
            codec.encode(message.clone(), &mut buf).unwrap();
        }

        let mut decoded = Vec::new();
        while let Some(message) = codec.decode(&mut buf).unwrap() {
            decoded.push(message);
        }
        assert_eq!(decoded, messages);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wrong_magic_is_rejected() {
        let mut buf = encode_one(Message::VerAck);
        // Corrupt one magic byte of an otherwise valid frame.
        buf[0] ^= 0x20;

        let result = MessageCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(WireError::InvalidMagic { .. })));
    }

    #[test]
    fn test_oversized_length_rejected_from_header_alone() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&NETWORK_MAGIC);
        buf.put_u32(MAX_MESSAGE_SIZE as u32 + 1);

        // No payload needed; the advertised length is enough to refuse.
        let result = MessageCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(WireError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_garbage_payload_is_a_serialization_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&NETWORK_MAGIC);
        buf.put_u32(3);
        buf.extend_from_slice(&[0xde, 0xad, 0xbe]);

        let result = MessageCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(WireError::Serialization(_))));
    }
}
