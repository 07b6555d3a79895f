#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use conquest_core::{
    load_settings_from_env, Block, ClientSurface, ConquestSettings, EntityId, FactionDirectory,
    FactionId, GridInfo, InMemoryWorld, InventoryHandle, ItemDefinition, PlayerId, WorldError,
    WorldQuery,
};
use conquest_proto::{Font, Message};
use glam::DVec3;

static INIT: Once = Once::new();

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture("conquest_settings.json");
        debug_assert!(
            config_path.exists(),
            "missing test conquest settings at {}",
            config_path.display()
        );
        std::env::set_var("CONQUEST_CONFIG_PATH", &config_path);
    });
}

pub fn test_settings() -> Arc<ConquestSettings> {
    ensure_test_config();
    let (settings, metadata) = load_settings_from_env();
    assert!(
        metadata.path().is_some(),
        "fixture settings failed to load, got the builtin document"
    );
    settings
}

pub fn fixture_world() -> InMemoryWorld {
    InMemoryWorld::from_file(&fixture("world_scenario.json")).expect("fixture world parses")
}

pub fn decode_all(frames: &[Vec<u8>]) -> Vec<Message> {
    frames
        .iter()
        .map(|frame| Message::decode(frame).expect("server frames decode"))
        .collect()
}

/// Wraps the in-memory world and fails every sphere query centred on `fail_at`.
pub struct FaultyWorld {
    pub inner: InMemoryWorld,
    pub fail_at: Option<DVec3>,
}

impl FaultyWorld {
    pub fn new(inner: InMemoryWorld, fail_at: DVec3) -> Self {
        Self {
            inner,
            fail_at: Some(fail_at),
        }
    }
}

impl WorldQuery for FaultyWorld {
    fn entities_within_sphere(&self, center: DVec3, radius: f64) -> Result<Vec<EntityId>, WorldError> {
        if self.fail_at == Some(center) {
            return Err(WorldError::Host("injected sphere query failure".to_string()));
        }
        self.inner.entities_within_sphere(center, radius)
    }

    fn grid(&self, entity: EntityId) -> Result<Option<GridInfo>, WorldError> {
        self.inner.grid(entity)
    }

    fn blocks_of(&self, entity: EntityId) -> Result<Vec<Block>, WorldError> {
        self.inner.blocks_of(entity)
    }

    fn deposit_items(
        &mut self,
        inventory: InventoryHandle,
        quantity: u32,
        item: &ItemDefinition,
    ) -> Result<(), WorldError> {
        self.inner.deposit_items(inventory, quantity, item)
    }
}

impl FactionDirectory for FaultyWorld {
    fn faction_of(&self, player: PlayerId) -> Option<FactionId> {
        self.inner.faction_of(player)
    }
}

/// Client UI that remembers everything it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub notifications: Vec<(String, i32, Font)>,
    pub dialogs: Vec<(String, String)>,
    pub markers: Vec<(String, DVec3)>,
}

impl ClientSurface for RecordingSurface {
    fn show_notification(&mut self, text: &str, time_ms: i32, font: Font) {
        self.notifications.push((text.to_string(), time_ms, font));
    }

    fn show_dialog(&mut self, title: &str, body: &str) {
        self.dialogs.push((title.to_string(), body.to_string()));
    }

    fn add_marker(&mut self, name: &str, _description: &str, position: DVec3) {
        self.markers.push((name.to_string(), position));
    }
}
