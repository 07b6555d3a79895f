//! Read access to the host simulation plus the single mutation the round
//! resolution needs (depositing reward items).

use std::fmt;

use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::owners::{EntityId, FactionId};

bitflags! {
    /// Operational state of a block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BlockState: u8 {
        /// Built to completion and undamaged.
        const FUNCTIONAL = 1 << 0;
        /// Switched on and doing its job.
        const WORKING = 1 << 1;
    }
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::FUNCTIONAL | BlockState::WORKING
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Reactor,
    Beacon,
    CargoContainer,
    Other,
}

/// Handle to the inventory of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryHandle {
    pub grid: EntityId,
    pub block: u32,
}

impl fmt::Display for InventoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.grid, self.block)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub state: BlockState,
    #[serde(default)]
    pub broadcast_radius: f64,
    #[serde(default)]
    pub inventory: Option<InventoryHandle>,
}

impl Block {
    pub fn is_functional(&self) -> bool {
        self.state.contains(BlockState::FUNCTIONAL)
    }

    pub fn is_working(&self) -> bool {
        self.state.contains(BlockState::WORKING)
    }

    pub fn is_classifier(&self, subtype_fragment: &str) -> bool {
        self.kind == BlockKind::Beacon && self.subtype.contains(subtype_fragment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSize {
    Large,
    Small,
}

/// Reward destination preference: stations first, then large ships, then small ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GridCategory {
    Station,
    LargeShip,
    SmallShip,
}

impl GridCategory {
    pub fn classify(is_static: bool, size: GridSize) -> Self {
        match (is_static, size) {
            (true, _) => GridCategory::Station,
            (false, GridSize::Large) => GridCategory::LargeShip,
            (false, GridSize::Small) => GridCategory::SmallShip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub entity: EntityId,
    #[serde(default)]
    pub name: String,
    pub position: DVec3,
    #[serde(default)]
    pub is_static: bool,
    pub size: GridSize,
    /// Faction of the grid's owner; `None` for unowned or solo-owned grids.
    #[serde(default)]
    pub faction: Option<FactionId>,
}

impl GridInfo {
    pub fn category(&self) -> GridCategory {
        GridCategory::classify(self.is_static, self.size)
    }
}

/// Item placed into an inventory as a round reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub type_id: String,
    pub subtype: String,
}

impl Default for ItemDefinition {
    fn default() -> Self {
        Self {
            type_id: "Component".to_string(),
            subtype: "ShipLicense".to_string(),
        }
    }
}

impl fmt::Display for ItemDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_id, self.subtype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("entity {0} does not exist")]
    EntityNotFound(EntityId),
    #[error("inventory {0} is unavailable")]
    InventoryUnavailable(InventoryHandle),
    #[error("host query failed: {0}")]
    Host(String),
}

/// Host world as seen by the round resolution.
pub trait WorldQuery {
    /// Entities whose bounds intersect the sphere, in host order.
    fn entities_within_sphere(&self, center: DVec3, radius: f64)
        -> Result<Vec<EntityId>, WorldError>;

    /// Grid details, or `None` when the entity is not a grid.
    fn grid(&self, entity: EntityId) -> Result<Option<GridInfo>, WorldError>;

    /// Blocks of a grid in grid order.
    fn blocks_of(&self, entity: EntityId) -> Result<Vec<Block>, WorldError>;

    fn deposit_items(
        &mut self,
        inventory: InventoryHandle,
        quantity: u32,
        item: &ItemDefinition,
    ) -> Result<(), WorldError>;
}
