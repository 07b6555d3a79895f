use std::fmt;

use crate::codec::{CodecError, WireReader, WireWriter};

/// Addressing mode carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Player,
    Faction,
    Everyone,
}

impl DestinationKind {
    pub fn as_u16(self) -> u16 {
        match self {
            DestinationKind::Player => 0,
            DestinationKind::Faction => 1,
            DestinationKind::Everyone => 2,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(DestinationKind::Player),
            1 => Some(DestinationKind::Faction),
            2 => Some(DestinationKind::Everyone),
            _ => None,
        }
    }
}

/// Type tag of every message kind the protocol knows about.
///
/// Requests travel client to server, responses server to client. The tag values
/// are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    SettingsRequest,
    FleetRequest,
    ViolationsRequest,
    DisownRequest,
    Notification,
    Dialog,
    SettingsResponse,
    FleetResponse,
}

impl MessageType {
    pub fn as_u16(self) -> u16 {
        match self {
            MessageType::SettingsRequest => 1,
            MessageType::FleetRequest => 2,
            MessageType::ViolationsRequest => 3,
            MessageType::DisownRequest => 4,
            MessageType::Notification => 101,
            MessageType::Dialog => 102,
            MessageType::SettingsResponse => 103,
            MessageType::FleetResponse => 104,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(MessageType::SettingsRequest),
            2 => Some(MessageType::FleetRequest),
            3 => Some(MessageType::ViolationsRequest),
            4 => Some(MessageType::DisownRequest),
            101 => Some(MessageType::Notification),
            102 => Some(MessageType::Dialog),
            103 => Some(MessageType::SettingsResponse),
            104 => Some(MessageType::FleetResponse),
            _ => None,
        }
    }

    pub fn is_request(self) -> bool {
        self.as_u16() < 100
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Fixed header shared by every message: type tag, destination kind and the
/// destination id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub destination_kind: DestinationKind,
    pub destinations: Vec<i64>,
}

impl MessageHeader {
    pub fn new(
        message_type: MessageType,
        destination_kind: DestinationKind,
        destinations: Vec<i64>,
    ) -> Self {
        Self {
            message_type,
            destination_kind,
            destinations,
        }
    }

    pub fn encode(&self, writer: &mut WireWriter) -> Result<(), CodecError> {
        writer.put_u16(self.message_type.as_u16());
        writer.put_u16(self.destination_kind.as_u16());
        writer.put_len("destinations", self.destinations.len())?;
        for id in &self.destinations {
            writer.put_i64(*id);
        }
        Ok(())
    }

    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let tag = reader.get_u16("type_tag")?;
        let message_type = MessageType::from_u16(tag).ok_or(CodecError::UnknownMessageType(tag))?;
        let kind = reader.get_u16("dest_kind")?;
        let destination_kind = DestinationKind::from_u16(kind).ok_or(CodecError::InvalidEnum {
            field: "dest_kind",
            value: kind,
        })?;
        let count = reader.get_len("dest_count")?;
        let mut destinations = Vec::with_capacity(count.min(reader.remaining() / 8));
        for _ in 0..count {
            destinations.push(reader.get_i64("dest_ids")?);
        }
        Ok(Self {
            message_type,
            destination_kind,
            destinations,
        })
    }

    pub fn is_addressed_to(&self, id: i64) -> bool {
        self.destinations.contains(&id)
    }
}

/// Decodes only the header of a message, leaving the payload untouched.
pub fn decode_header(bytes: &[u8]) -> Result<MessageHeader, CodecError> {
    let mut reader = WireReader::new(bytes);
    MessageHeader::decode(&mut reader)
}
