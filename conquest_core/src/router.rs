//! Inbound filtering and dispatch, outbound encoding.
//!
//! Every endpoint sees every broadcast frame. The router decodes the header
//! first, drops frames not addressed to the local identity, and only then
//! decodes the payload and hands it to exactly one [`MessageHandler`] method.

use conquest_proto::{
    decode_header, CodecError, DestinationKind, FleetGridData, Font, Message, MessageBody,
    MessageHeader, MessageType, OwnerType, SettingsPayload,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::owners::{FactionId, PlayerId};
use crate::transport::{Transport, TransportError};

/// Who this endpoint is, for address filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIdentity {
    /// Accepts every address.
    Server,
    Player {
        player: PlayerId,
        faction: Option<FactionId>,
    },
}

impl LocalIdentity {
    pub fn accepts(&self, header: &MessageHeader) -> bool {
        match (self, header.destination_kind) {
            (_, DestinationKind::Everyone) | (LocalIdentity::Server, _) => true,
            (LocalIdentity::Player { player, .. }, DestinationKind::Player) => {
                header.is_addressed_to(player.0)
            }
            (LocalIdentity::Player { faction, .. }, DestinationKind::Faction) => {
                faction.map_or(false, |faction| header.is_addressed_to(faction.0))
            }
        }
    }
}

/// One callback per message kind. Kinds an endpoint does not care about keep
/// the default no-op body.
#[allow(unused_variables)]
pub trait MessageHandler {
    fn on_settings_request(&mut self, return_address: i64) {}

    fn on_fleet_request(&mut self, return_address: i64) {}

    fn on_violations_request(&mut self, return_address: i64) {}

    fn on_disown_request(&mut self, return_address: i64, entity_id: i64) {}

    fn on_notification(&mut self, text: &str, time_ms: i32, font: Font) {}

    fn on_dialog(&mut self, title: &str, body: &str) {}

    fn on_settings(&mut self, settings: SettingsPayload) {}

    fn on_fleet(&mut self, owner_type: OwnerType, grids: Vec<FleetGridData>) {}
}

/// What [`MessageRouter::on_message`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(MessageType),
    /// Addressed to someone else.
    Filtered,
    /// Type tag this build does not know.
    Ignored(u16),
    Malformed,
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to encode message: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    identity: LocalIdentity,
}

impl MessageRouter {
    pub fn new(identity: LocalIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> LocalIdentity {
        self.identity
    }

    /// Faction membership can change while a client is connected.
    pub fn set_identity(&mut self, identity: LocalIdentity) {
        self.identity = identity;
    }

    pub fn on_message<H: MessageHandler + ?Sized>(&self, bytes: &[u8], handler: &mut H) -> Dispatch {
        let header = match decode_header(bytes) {
            Ok(header) => header,
            Err(CodecError::UnknownMessageType(tag)) => {
                debug!(target: "conquest::router", tag, "message.ignored=unknown_type");
                return Dispatch::Ignored(tag);
            }
            Err(err) => {
                warn!(
                    target: "conquest::router",
                    error = %err,
                    len = bytes.len(),
                    "message.dropped=bad_header"
                );
                return Dispatch::Malformed;
            }
        };

        if !self.identity.accepts(&header) {
            trace!(
                target: "conquest::router",
                message_type = %header.message_type,
                "message.filtered"
            );
            return Dispatch::Filtered;
        }

        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    target: "conquest::router",
                    message_type = %header.message_type,
                    error = %err,
                    "message.dropped=bad_payload"
                );
                return Dispatch::Malformed;
            }
        };

        let message_type = message.message_type();
        dispatch(message.body, handler);
        debug!(target: "conquest::router", %message_type, "message.dispatched");
        Dispatch::Handled(message_type)
    }

    /// Encodes and sends once. Servers broadcast, clients send to the server.
    pub fn send<T: Transport + ?Sized>(
        &self,
        message: &Message,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        let bytes = message.encode()?;
        match self.identity {
            LocalIdentity::Server => transport.broadcast(&bytes)?,
            LocalIdentity::Player { .. } => transport.send_to_server(&bytes)?,
        }
        trace!(
            target: "conquest::router",
            message_type = %message.message_type(),
            len = bytes.len(),
            "message.sent"
        );
        Ok(())
    }
}

fn dispatch<H: MessageHandler + ?Sized>(body: MessageBody, handler: &mut H) {
    match body {
        MessageBody::SettingsRequest { return_address } => {
            handler.on_settings_request(return_address)
        }
        MessageBody::FleetRequest { return_address } => handler.on_fleet_request(return_address),
        MessageBody::ViolationsRequest { return_address } => {
            handler.on_violations_request(return_address)
        }
        MessageBody::DisownRequest {
            return_address,
            entity_id,
        } => handler.on_disown_request(return_address, entity_id),
        MessageBody::Notification {
            text,
            time_ms,
            font,
        } => handler.on_notification(&text, time_ms, font),
        MessageBody::Dialog { title, body } => handler.on_dialog(&title, &body),
        MessageBody::Settings(payload) => handler.on_settings(payload),
        MessageBody::Fleet { owner_type, grids } => handler.on_fleet(owner_type, grids),
    }
}
