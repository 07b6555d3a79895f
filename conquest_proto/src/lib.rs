//! Wire protocol for the conquest server and its clients.
//!
//! Every message starts with a fixed header (type tag, destination kind,
//! destination ids) followed by a positional payload whose layout is implied by
//! the type tag. The schema carries no version field: adding a field to an
//! existing message kind is a breaking change.

mod codec;
mod header;
mod message;
mod records;

pub use codec::{CodecError, WireReader, WireWriter};
pub use header::{decode_header, DestinationKind, MessageHeader, MessageType};
pub use message::{decode_message, encode_message, Message, MessageBody};
pub use records::{
    ControlPointRecord, FleetGridData, Font, HullRuleRecord, OwnerType, SettingsPayload,
    ShipClass,
};
