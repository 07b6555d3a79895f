use crate::codec::{CodecError, WireReader, WireWriter};
use crate::header::{DestinationKind, MessageHeader, MessageType};
use crate::records::{FleetGridData, Font, OwnerType, SettingsPayload};

/// Payload of every message kind, each carrying only its own fields.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    SettingsRequest {
        return_address: i64,
    },
    FleetRequest {
        return_address: i64,
    },
    ViolationsRequest {
        return_address: i64,
    },
    DisownRequest {
        return_address: i64,
        entity_id: i64,
    },
    Notification {
        text: String,
        time_ms: i32,
        font: Font,
    },
    Dialog {
        title: String,
        body: String,
    },
    Settings(SettingsPayload),
    Fleet {
        owner_type: OwnerType,
        grids: Vec<FleetGridData>,
    },
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::SettingsRequest { .. } => MessageType::SettingsRequest,
            MessageBody::FleetRequest { .. } => MessageType::FleetRequest,
            MessageBody::ViolationsRequest { .. } => MessageType::ViolationsRequest,
            MessageBody::DisownRequest { .. } => MessageType::DisownRequest,
            MessageBody::Notification { .. } => MessageType::Notification,
            MessageBody::Dialog { .. } => MessageType::Dialog,
            MessageBody::Settings(_) => MessageType::SettingsResponse,
            MessageBody::Fleet { .. } => MessageType::FleetResponse,
        }
    }

    fn encode(&self, writer: &mut WireWriter) -> Result<(), CodecError> {
        match self {
            MessageBody::SettingsRequest { return_address }
            | MessageBody::FleetRequest { return_address }
            | MessageBody::ViolationsRequest { return_address } => {
                writer.put_i64(*return_address);
            }
            MessageBody::DisownRequest {
                return_address,
                entity_id,
            } => {
                writer.put_i64(*return_address);
                writer.put_i64(*entity_id);
            }
            MessageBody::Notification {
                text,
                time_ms,
                font,
            } => {
                writer.put_str("text", text)?;
                writer.put_i32(*time_ms);
                writer.put_u16(font.as_u16());
            }
            MessageBody::Dialog { title, body } => {
                writer.put_str("title", title)?;
                writer.put_str("body", body)?;
            }
            MessageBody::Settings(settings) => settings.encode(writer)?,
            MessageBody::Fleet { owner_type, grids } => {
                writer.put_u16(owner_type.as_u16());
                writer.put_len("grids", grids.len())?;
                for grid in grids {
                    grid.encode(writer)?;
                }
            }
        }
        Ok(())
    }

    fn decode(message_type: MessageType, reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let body = match message_type {
            MessageType::SettingsRequest => MessageBody::SettingsRequest {
                return_address: reader.get_i64("return_address")?,
            },
            MessageType::FleetRequest => MessageBody::FleetRequest {
                return_address: reader.get_i64("return_address")?,
            },
            MessageType::ViolationsRequest => MessageBody::ViolationsRequest {
                return_address: reader.get_i64("return_address")?,
            },
            MessageType::DisownRequest => MessageBody::DisownRequest {
                return_address: reader.get_i64("return_address")?,
                entity_id: reader.get_i64("entity_id")?,
            },
            MessageType::Notification => MessageBody::Notification {
                text: reader.get_str("text")?,
                time_ms: reader.get_i32("time_ms")?,
                font: Font::decode(reader)?,
            },
            MessageType::Dialog => MessageBody::Dialog {
                title: reader.get_str("title")?,
                body: reader.get_str("body")?,
            },
            MessageType::SettingsResponse => {
                MessageBody::Settings(SettingsPayload::decode(reader)?)
            }
            MessageType::FleetResponse => {
                let owner_type = OwnerType::decode(reader)?;
                let count = reader.get_len("grids")?;
                let mut grids = Vec::new();
                for _ in 0..count {
                    grids.push(FleetGridData::decode(reader)?);
                }
                MessageBody::Fleet { owner_type, grids }
            }
        };
        Ok(body)
    }
}

/// A complete protocol message: addressing plus a typed payload.
///
/// The header's type tag is always derived from the body, so the two cannot
/// disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub destination_kind: DestinationKind,
    pub destinations: Vec<i64>,
    pub body: MessageBody,
}

impl Message {
    pub fn new(destination_kind: DestinationKind, destinations: Vec<i64>, body: MessageBody) -> Self {
        Self {
            destination_kind,
            destinations,
            body,
        }
    }

    pub fn to_player(player: i64, body: MessageBody) -> Self {
        Self::new(DestinationKind::Player, vec![player], body)
    }

    pub fn to_faction(faction: i64, body: MessageBody) -> Self {
        Self::new(DestinationKind::Faction, vec![faction], body)
    }

    pub fn to_everyone(body: MessageBody) -> Self {
        Self::new(DestinationKind::Everyone, Vec::new(), body)
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader::new(
            self.message_type(),
            self.destination_kind,
            self.destinations.clone(),
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = WireWriter::with_capacity(64);
        self.header().encode(&mut writer)?;
        self.body.encode(&mut writer)?;
        Ok(writer.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = WireReader::new(bytes);
        let header = MessageHeader::decode(&mut reader)?;
        let body = MessageBody::decode(header.message_type, &mut reader)?;
        reader.finish()?;
        Ok(Self {
            destination_kind: header.destination_kind,
            destinations: header.destinations,
            body,
        })
    }
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, CodecError> {
    message.encode()
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    Message::decode(bytes)
}
