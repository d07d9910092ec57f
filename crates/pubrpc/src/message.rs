// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message model: call attributes, payloads and the envelope that carries
//! them on the wire.
//!
//! # Wire layout
//!
//! ```text
//! Attributes: id[16] type:u8 sink:opt<uri> priority:u8 ttl:opt<u32> reqid:opt<[16]>
//! Payload:    format:u8 data:len-prefixed
//! Message:    Attributes Payload
//! ```

use crate::codec::{
    put_optional, read_optional, CodecError, CodecResult, Cursor, CursorMut, Decode, Encode,
};
use crate::uri::Uri;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Kind of message carried by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MessageType {
    #[default]
    Publish = 1,
    Request = 2,
    Response = 3,
    Notification = 4,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Publish => "pub.v1",
            MessageType::Request => "req.v1",
            MessageType::Response => "res.v1",
            MessageType::Notification => "not.v1",
        }
    }

    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(MessageType::Publish),
            2 => Some(MessageType::Request),
            3 => Some(MessageType::Response),
            4 => Some(MessageType::Notification),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Priority {
    Cs0 = 0,
    Cs1 = 1,
    Cs2 = 2,
    Cs3 = 3,
    /// Minimum class for requests.
    #[default]
    Cs4 = 4,
    Cs5 = 5,
    Cs6 = 6,
}

impl Priority {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Priority::Cs0),
            1 => Some(Priority::Cs1),
            2 => Some(Priority::Cs2),
            3 => Some(Priority::Cs3),
            4 => Some(Priority::Cs4),
            5 => Some(Priority::Cs5),
            6 => Some(Priority::Cs6),
            _ => None,
        }
    }
}

/// 128-bit message identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageId(pub [u8; 16]);

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);

impl MessageId {
    /// Generate a process-unique id from wall-clock time, a counter and the
    /// calling thread.
    pub fn generate() -> Self {
        use std::hash::{Hash, Hasher};
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&(now.as_nanos() as u64).to_le_bytes());
        bytes[8..12].copy_from_slice(&ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());

        let tid_hash = {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish() as u32
        };
        bytes[12..16].copy_from_slice(&tid_hash.to_le_bytes());

        Self(bytes)
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId(")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "...)")
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Call metadata published next to a payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    pub id: MessageId,
    pub message_type: MessageType,
    /// Where replies (or the message itself) should go.
    pub sink: Option<Uri>,
    pub priority: Priority,
    /// Time to live in milliseconds.
    pub ttl_ms: Option<u32>,
    /// For responses: id of the request being answered.
    pub request_id: Option<MessageId>,
}

impl Attributes {
    /// Request attributes with a fresh id.
    pub fn request(sink: Uri, priority: Priority, ttl_ms: u32) -> Self {
        Self {
            id: MessageId::generate(),
            message_type: MessageType::Request,
            sink: Some(sink),
            priority,
            ttl_ms: Some(ttl_ms),
            request_id: None,
        }
    }

    /// Response attributes answering `request`.
    pub fn response(request: &Attributes) -> Self {
        Self {
            id: MessageId::generate(),
            message_type: MessageType::Response,
            sink: None,
            priority: request.priority,
            ttl_ms: request.ttl_ms,
            request_id: Some(request.id),
        }
    }

    pub fn publish() -> Self {
        Self {
            id: MessageId::generate(),
            message_type: MessageType::Publish,
            ..Self::default()
        }
    }
}

impl Encode for Attributes {
    fn encode(&self, cursor: &mut CursorMut) -> CodecResult<()> {
        cursor.put_bytes(&self.id.0);
        cursor.put_u8(self.message_type as u8);
        put_optional(cursor, self.sink.as_ref(), |c, sink| sink.encode(c))?;
        cursor.put_u8(self.priority as u8);
        put_optional(cursor, self.ttl_ms.as_ref(), |c, ttl| {
            c.put_u32_le(*ttl);
            Ok(())
        })?;
        put_optional(cursor, self.request_id.as_ref(), |c, id| {
            c.put_bytes(&id.0);
            Ok(())
        })
    }
}

fn read_message_id(cursor: &mut Cursor<'_>) -> CodecResult<MessageId> {
    let mut id = [0u8; 16];
    id.copy_from_slice(cursor.read_bytes(16)?);
    Ok(MessageId(id))
}

impl Decode for Attributes {
    fn decode(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let id = read_message_id(cursor)?;

        let offset = cursor.offset();
        let raw_type = cursor.read_u8()?;
        let message_type = MessageType::from_u8(raw_type).ok_or(CodecError::InvalidValue {
            offset,
            reason: format!("unknown message type {}", raw_type),
        })?;

        let sink = read_optional(cursor, Uri::decode)?;

        let offset = cursor.offset();
        let raw_priority = cursor.read_u8()?;
        let priority = Priority::from_u8(raw_priority).ok_or(CodecError::InvalidValue {
            offset,
            reason: format!("unknown priority {}", raw_priority),
        })?;

        let ttl_ms = read_optional(cursor, |c| c.read_u32_le())?;
        let request_id = read_optional(cursor, read_message_id)?;

        Ok(Self {
            id,
            message_type,
            sink,
            priority,
            ttl_ms,
            request_id,
        })
    }
}

/// How payload bytes should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PayloadFormat {
    /// Bytes are the value itself.
    #[default]
    Value = 0,
    /// Bytes reference a value stored elsewhere.
    Reference = 1,
}

/// Raw payload bytes plus a format tag. The default payload is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub data: Vec<u8>,
    pub format: PayloadFormat,
}

impl Payload {
    pub fn value(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            format: PayloadFormat::Value,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl Encode for Payload {
    fn encode(&self, cursor: &mut CursorMut) -> CodecResult<()> {
        cursor.put_u8(self.format as u8);
        cursor.put_len_prefixed(&self.data)
    }
}

impl Decode for Payload {
    fn decode(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let offset = cursor.offset();
        let format = match cursor.read_u8()? {
            0 => PayloadFormat::Value,
            1 => PayloadFormat::Reference,
            other => {
                return Err(CodecError::InvalidValue {
                    offset,
                    reason: format!("unknown payload format {}", other),
                })
            }
        };
        let data = cursor.read_len_prefixed()?.to_vec();
        Ok(Self { data, format })
    }
}

/// Envelope carried by replies: attributes plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub attributes: Attributes,
    pub payload: Payload,
}

impl Message {
    pub fn new(attributes: Attributes, payload: Payload) -> Self {
        Self {
            attributes,
            payload,
        }
    }
}

impl Encode for Message {
    fn encode(&self, cursor: &mut CursorMut) -> CodecResult<()> {
        self.attributes.encode(cursor)?;
        self.payload.encode(cursor)
    }
}

impl Decode for Message {
    fn decode(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let attributes = Attributes::decode(cursor)?;
        let payload = Payload::decode(cursor)?;
        Ok(Self {
            attributes,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_strings() {
        assert_eq!(MessageType::Request.to_string(), "req.v1");
        assert_eq!(MessageType::Response.as_str(), "res.v1");
        assert_eq!(MessageType::default(), MessageType::Publish);
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert!(MessageId::default().is_nil());
    }

    #[test]
    fn test_request_attributes_survive_codec() {
        let attrs = Attributes::request(Uri::rpc_method("petapp", 1, "echo"), Priority::Cs5, 1000);
        let bytes = attrs.to_bytes().expect("encode");
        let back = Attributes::from_bytes(&bytes).expect("decode");
        assert_eq!(back, attrs);
        assert_eq!(back.message_type, MessageType::Request);
    }

    #[test]
    fn test_response_links_request_id() {
        let request = Attributes::request(Uri::default(), Priority::Cs4, 500);
        let response = Attributes::response(&request);
        assert_eq!(response.request_id, Some(request.id));
        assert_eq!(response.message_type, MessageType::Response);
        assert_eq!(response.ttl_ms, Some(500));
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let mut bytes = Attributes::publish().to_bytes().expect("encode");
        bytes[16] = 0x7F;
        let err = Attributes::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { offset: 16, .. }));
    }

    #[test]
    fn test_message_with_trailing_garbage_rejected() {
        let message = Message::new(Attributes::publish(), Payload::value(vec![1, 2, 3]));
        let mut bytes = message.to_bytes().expect("encode");
        assert_eq!(Message::from_bytes(&bytes).expect("decode"), message);

        bytes.push(0);
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(CodecError::TrailingBytes { remaining: 1, .. })
        ));
    }

    #[test]
    fn test_default_payload_is_empty_value() {
        let payload = Payload::default();
        assert!(payload.is_empty());
        assert_eq!(payload.format, PayloadFormat::Value);
    }
}
