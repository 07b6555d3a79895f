//! Client endpoint: sends requests for the local player and renders the
//! server's responses through a [`ClientSurface`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use conquest_proto::{
    FleetGridData, Font, Message, MessageBody, OwnerType, SettingsPayload, ShipClass,
};
use glam::DVec3;
use tracing::{debug, info};

use crate::owners::{EntityId, FactionId, PlayerId};
use crate::router::{Dispatch, LocalIdentity, MessageHandler, MessageRouter, RouterError};
use crate::transport::Transport;

pub const MARKER_DESCRIPTION: &str = "Conquest Control Point";

/// UI of the host game as seen by the client.
pub trait ClientSurface {
    fn show_notification(&mut self, text: &str, time_ms: i32, font: Font);

    fn show_dialog(&mut self, title: &str, body: &str);

    /// Adds a navigation marker at a world position.
    fn add_marker(&mut self, name: &str, description: &str, position: DVec3);
}

pub struct ConquestClient<S> {
    router: MessageRouter,
    player: PlayerId,
    view: ClientView<S>,
}

struct ClientView<S> {
    surface: S,
    server_settings: Option<SettingsPayload>,
    supported: BTreeMap<ShipClass, Vec<FleetGridData>>,
    unsupported: BTreeMap<ShipClass, Vec<FleetGridData>>,
}

impl<S: ClientSurface> ConquestClient<S> {
    pub fn new(player: PlayerId, faction: Option<FactionId>, surface: S) -> Self {
        Self {
            router: MessageRouter::new(LocalIdentity::Player { player, faction }),
            player,
            view: ClientView {
                surface,
                server_settings: None,
                supported: BTreeMap::new(),
                unsupported: BTreeMap::new(),
            },
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn set_faction(&mut self, faction: Option<FactionId>) {
        self.router.set_identity(LocalIdentity::Player {
            player: self.player,
            faction,
        });
    }

    /// Settings from the last settings response, if one arrived.
    pub fn server_settings(&self) -> Option<&SettingsPayload> {
        self.view.server_settings.as_ref()
    }

    pub fn supported_grids(&self) -> &BTreeMap<ShipClass, Vec<FleetGridData>> {
        &self.view.supported
    }

    pub fn unsupported_grids(&self) -> &BTreeMap<ShipClass, Vec<FleetGridData>> {
        &self.view.unsupported
    }

    pub fn surface(&self) -> &S {
        &self.view.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.view.surface
    }

    pub fn request_settings<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), RouterError> {
        self.request(
            MessageBody::SettingsRequest {
                return_address: self.player.0,
            },
            transport,
        )
    }

    pub fn request_fleet<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), RouterError> {
        self.request(
            MessageBody::FleetRequest {
                return_address: self.player.0,
            },
            transport,
        )
    }

    pub fn request_violations<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.request(
            MessageBody::ViolationsRequest {
                return_address: self.player.0,
            },
            transport,
        )
    }

    pub fn request_disown<T: Transport + ?Sized>(
        &self,
        entity: EntityId,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.request(
            MessageBody::DisownRequest {
                return_address: self.player.0,
                entity_id: entity.0,
            },
            transport,
        )
    }

    /// Requests are broadcast-addressed; the reply comes back to `return_address`.
    fn request<T: Transport + ?Sized>(
        &self,
        body: MessageBody,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        let message = Message::to_everyone(body);
        debug!(
            target: "conquest::client",
            player = %self.player,
            message_type = %message.message_type(),
            "request.sent"
        );
        self.router.send(&message, transport)
    }

    pub fn on_message(&mut self, bytes: &[u8]) -> Dispatch {
        self.router.on_message(bytes, &mut self.view)
    }
}

impl<S: ClientSurface> ClientView<S> {
    fn fleet_dialog(&self, owner_type: OwnerType) -> (String, String) {
        let title = match owner_type {
            OwnerType::Faction => "Your Faction's Fleet:",
            OwnerType::Player => "Your Fleet:",
            OwnerType::Unowned => "",
        };

        let mut body = String::new();
        for (class, grids) in &self.supported {
            let _ = write!(body, "{}: {}", class, grids.len());
            if let Some(settings) = &self.server_settings {
                let quota = settings.hull_rule(*class).map_or(0, |rule| match owner_type {
                    OwnerType::Faction => rule.max_per_faction,
                    OwnerType::Player => rule.max_per_solo_player,
                    OwnerType::Unowned => 0,
                });
                let _ = write!(body, " / {}", quota);
            }
            body.push('\n');
            for (index, grid) in grids.iter().enumerate() {
                let _ = writeln!(
                    body,
                    "  {}. {} - {} blocks",
                    index, grid.display_name, grid.block_count
                );
            }
        }

        body.push_str("\n  Unsupported:\n");
        for grids in self.unsupported.values() {
            for (index, grid) in grids.iter().enumerate() {
                let _ = writeln!(
                    body,
                    "     {}. {} - {} blocks",
                    index, grid.display_name, grid.block_count
                );
            }
        }
        body.push('\n');
        (title.to_string(), body)
    }
}

impl<S: ClientSurface> MessageHandler for ClientView<S> {
    fn on_notification(&mut self, text: &str, time_ms: i32, font: Font) {
        self.surface.show_notification(text, time_ms, font);
    }

    fn on_dialog(&mut self, title: &str, body: &str) {
        self.surface.show_dialog(title, body);
    }

    fn on_settings(&mut self, settings: SettingsPayload) {
        info!(
            target: "conquest::client",
            control_points = settings.control_points.len(),
            hull_rules = settings.hull_rules.len(),
            "settings.received"
        );
        for point in &settings.control_points {
            self.surface.add_marker(
                &point.name,
                MARKER_DESCRIPTION,
                DVec3::from_array(point.position),
            );
        }
        self.server_settings = Some(settings);
    }

    fn on_fleet(&mut self, owner_type: OwnerType, grids: Vec<FleetGridData>) {
        self.supported.clear();
        self.unsupported.clear();
        for grid in grids {
            let bucket = if grid.supported {
                &mut self.supported
            } else {
                &mut self.unsupported
            };
            bucket.entry(grid.ship_class).or_default().push(grid);
        }
        let (title, body) = self.fleet_dialog(owner_type);
        self.surface.show_dialog(&title, &body);
    }
}
