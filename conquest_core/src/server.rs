//! Server endpoint: round and save timers, client requests, outbound notices.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use conquest_proto::{Font, Message, MessageBody};
use tracing::{debug, error, info, warn};

use crate::fleet::GridSummary;
use crate::ledger::TokenLedger;
use crate::owners::{EntityId, FactionDirectory, FactionId, FleetOwner, PlayerId};
use crate::resolution::{resolve_round, RoundReport};
use crate::router::{Dispatch, LocalIdentity, MessageHandler, MessageRouter, RouterError};
use crate::scheduler::RoundGuard;
use crate::settings::ConquestSettings;
use crate::state::{ConquestState, StateError};
use crate::transport::Transport;
use crate::world::WorldQuery;

pub const ROUND_ENDED_TEXT: &str = "Conquest Round Ended";
const ROUND_ENDED_MS: i32 = 6000;
const REWARD_NOTICE_MS: i32 = 6000;
const DERELICT_NOTICE_MS: i32 = 10_000;
const DISOWN_NOTICE_MS: i32 = 5000;
pub const VIOLATIONS_TITLE: &str = "Fleet Violations";

/// How a derelict countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerelictCompletion {
    Cancelled,
    Elapsed,
}

pub struct ConquestServer<H, T> {
    settings: Arc<ConquestSettings>,
    state: ConquestState,
    host: H,
    transport: T,
    router: MessageRouter,
    round_guard: RoundGuard,
    rounds_completed: u64,
}

impl<H, T> ConquestServer<H, T>
where
    H: WorldQuery + FactionDirectory,
    T: Transport,
{
    pub fn new(settings: Arc<ConquestSettings>, state: ConquestState, host: H, transport: T) -> Self {
        Self {
            settings,
            state,
            host,
            transport,
            router: MessageRouter::new(LocalIdentity::Server),
            round_guard: RoundGuard::new(),
            rounds_completed: 0,
        }
    }

    pub fn settings(&self) -> &ConquestSettings {
        &self.settings
    }

    pub fn state(&self) -> &ConquestState {
        &self.state
    }

    pub fn tokens_last_round(&self) -> &TokenLedger {
        &self.state.tokens_last_round
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Shared handle to the in-progress flag, for callers that want to check
    /// before taking the server lock.
    pub fn round_guard(&self) -> RoundGuard {
        self.round_guard.clone()
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    /// Runs one round pass. Returns `None` when a previous pass still holds the
    /// guard.
    pub fn on_round_timer(&mut self) -> Option<RoundReport> {
        let Some(_pass) = self.round_guard.try_begin() else {
            warn!(target: "conquest::server", "round.skipped=in_progress");
            return None;
        };

        let started = Instant::now();
        let report = resolve_round(
            &mut self.host,
            &self.settings,
            &mut self.state.tokens_last_round,
        );

        if !report.completed {
            error!(
                target: "conquest::server",
                resolved = report.results.len(),
                faults = report.faults.len(),
                "round.aborted"
            );
            return Some(report);
        }

        self.rounds_completed += 1;
        self.announce_round_end();
        info!(
            target: "conquest::server",
            round = self.rounds_completed,
            control_points = report.results.len(),
            rewarded = report.rewarded().count(),
            faults = report.faults.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "round.completed"
        );
        Some(report)
    }

    fn announce_round_end(&mut self) {
        let ended = Message::to_everyone(MessageBody::Notification {
            text: ROUND_ENDED_TEXT.to_string(),
            time_ms: ROUND_ENDED_MS,
            font: Font::White,
        });
        self.send_logged(&ended);

        let grants: Vec<(FactionId, u64)> = self.state.tokens_last_round.iter().collect();
        for (faction, amount) in grants {
            let notice = Message::to_faction(
                faction.0,
                MessageBody::Notification {
                    text: format!("Your faction earned {} tokens this round", amount),
                    time_ms: REWARD_NOTICE_MS,
                    font: Font::Green,
                },
            );
            self.send_logged(&notice);
        }
    }

    /// Saves state to the configured path. Failures are logged and returned;
    /// the service keeps running either way.
    pub fn on_save_timer(&mut self) -> Result<(), StateError> {
        let result = self.state.save(self.settings.state_path());
        if let Err(err) = &result {
            error!(
                target: "conquest::server",
                path = %self.settings.state_path().display(),
                error = %err,
                "state.save_failed"
            );
        }
        result
    }

    pub fn on_message(&mut self, bytes: &[u8]) -> Dispatch {
        let router = self.router.clone();
        router.on_message(bytes, &mut RequestHandler { server: self })
    }

    pub fn send(&mut self, message: &Message) -> Result<(), RouterError> {
        self.router.send(message, &mut self.transport)
    }

    fn send_logged(&mut self, message: &Message) {
        if let Err(err) = self.send(message) {
            warn!(
                target: "conquest::server",
                message_type = %message.message_type(),
                error = %err,
                "message.send_failed"
            );
        }
    }

    /// Tracks a grid in its owner's fleet; returns whether it is within quota.
    pub fn record_grid(&mut self, owner: FleetOwner, summary: GridSummary) -> bool {
        self.state.fleets.record_grid(owner, summary, &self.settings)
    }

    pub fn notify_derelict_start(
        &mut self,
        faction: FactionId,
        grid_name: &str,
    ) -> Result<(), RouterError> {
        let minutes = self.settings.derelict_countdown_secs() as f32 / 60.0;
        let text = format!(
            "Your faction's grid {} will become a derelict in {} minutes",
            grid_name, minutes
        );
        self.send(&derelict_notice(faction, text, Font::Red))
    }

    pub fn notify_derelict_end(
        &mut self,
        faction: FactionId,
        grid_name: &str,
        completion: DerelictCompletion,
    ) -> Result<(), RouterError> {
        let (text, font) = match completion {
            DerelictCompletion::Cancelled => (
                format!(
                    "Your faction's grid {} is no longer in danger of becoming a derelict",
                    grid_name
                ),
                Font::Green,
            ),
            DerelictCompletion::Elapsed => (
                format!("Your faction's grid {} has become a derelict", grid_name),
                Font::Red,
            ),
        };
        self.send(&derelict_notice(faction, text, font))
    }

    fn owner_of(&self, player: PlayerId) -> FleetOwner {
        FleetOwner::resolve(player, &self.host)
    }
}

fn derelict_notice(faction: FactionId, text: String, font: Font) -> Message {
    Message::to_faction(
        faction.0,
        MessageBody::Notification {
            text,
            time_ms: DERELICT_NOTICE_MS,
            font,
        },
    )
}

struct RequestHandler<'a, H, T> {
    server: &'a mut ConquestServer<H, T>,
}

impl<H, T> MessageHandler for RequestHandler<'_, H, T>
where
    H: WorldQuery + FactionDirectory,
    T: Transport,
{
    fn on_settings_request(&mut self, return_address: i64) {
        debug!(target: "conquest::server", player = return_address, "request.settings");
        let payload = self.server.settings.to_payload();
        self.server
            .send_logged(&Message::to_player(return_address, MessageBody::Settings(payload)));
    }

    fn on_fleet_request(&mut self, return_address: i64) {
        let owner = self.server.owner_of(PlayerId(return_address));
        let grids = self.server.state.fleets.fleet_data(owner);
        debug!(
            target: "conquest::server",
            player = return_address,
            %owner,
            grids = grids.len(),
            "request.fleet"
        );
        let reply = Message::to_player(
            return_address,
            MessageBody::Fleet {
                owner_type: owner.owner_type(),
                grids,
            },
        );
        self.server.send_logged(&reply);
    }

    fn on_violations_request(&mut self, return_address: i64) {
        let owner = self.server.owner_of(PlayerId(return_address));
        let status = self.server.state.fleets.query(owner);
        debug!(
            target: "conquest::server",
            player = return_address,
            %owner,
            unsupported = status.unsupported_count(),
            "request.violations"
        );

        let mut body = String::new();
        if status.unsupported.is_empty() {
            body.push_str("No grids exceed your fleet limits.\n");
        }
        for (class, grids) in &status.unsupported {
            let quota = self.server.settings.quota_for(*class, owner.owner_type());
            let _ = writeln!(body, "{}: {} over the limit of {}", class, grids.len(), quota);
            for grid in grids {
                let _ = writeln!(body, "  {} - {} blocks", grid.display_name, grid.block_count);
            }
        }
        let reply = Message::to_player(
            return_address,
            MessageBody::Dialog {
                title: VIOLATIONS_TITLE.to_string(),
                body,
            },
        );
        self.server.send_logged(&reply);
    }

    fn on_disown_request(&mut self, return_address: i64, entity_id: i64) {
        let owner = self.server.owner_of(PlayerId(return_address));
        let entity = EntityId(entity_id);
        let removed = self
            .server
            .state
            .fleets
            .remove_grid(owner, entity, &self.server.settings);

        let (text, font) = match &removed {
            Some(summary) => {
                info!(target: "conquest::server", %owner, %entity, "fleet.grid_disowned");
                (format!("{} has been disowned", summary.display_name), Font::White)
            }
            None => {
                debug!(target: "conquest::server", %owner, %entity, "fleet.disown_rejected");
                (format!("Grid {} is not part of your fleet", entity), Font::Red)
            }
        };
        let reply = Message::to_player(
            return_address,
            MessageBody::Notification {
                text,
                time_ms: DISOWN_NOTICE_MS,
                font,
            },
        );
        self.server.send_logged(&reply);
    }
}
