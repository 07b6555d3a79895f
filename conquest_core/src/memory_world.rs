//! In-process host world: grids, blocks and faction membership held in memory.
//!
//! Backs the headless server binary (loaded from a JSON scenario) and the test
//! suites.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::owners::{EntityId, FactionDirectory, FactionId, PlayerId};
use crate::world::{Block, GridInfo, InventoryHandle, ItemDefinition, WorldError, WorldQuery};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRecord {
    pub info: GridInfo,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Non-grid entity (debris, characters, ...) that shows up in sphere queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooseEntity {
    pub entity: EntityId,
    pub position: DVec3,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Membership {
    pub player: PlayerId,
    pub faction: FactionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldScenario {
    pub grids: Vec<GridRecord>,
    pub loose_entities: Vec<LooseEntity>,
    pub memberships: Vec<Membership>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositRecord {
    pub inventory: InventoryHandle,
    pub quantity: u32,
    pub item: ItemDefinition,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read world scenario from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse world scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct InMemoryWorld {
    grids: Vec<GridRecord>,
    loose: Vec<LooseEntity>,
    memberships: HashMap<PlayerId, FactionId>,
    deposits: Vec<DepositRecord>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a world from a scenario. A grid id listed twice keeps its last
    /// record, as with [`InMemoryWorld::add_grid`]; loose entities reusing a grid
    /// id are dropped.
    pub fn from_scenario(scenario: WorldScenario) -> Self {
        let mut world = Self {
            memberships: scenario
                .memberships
                .into_iter()
                .map(|m| (m.player, m.faction))
                .collect(),
            ..Self::default()
        };
        for record in scenario.grids {
            world.add_grid(record.info, record.blocks);
        }
        for loose in scenario.loose_entities {
            world.add_loose_entity(loose.entity, loose.position);
        }
        world
    }

    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario: WorldScenario = serde_json::from_str(&contents)?;
        Ok(Self::from_scenario(scenario))
    }

    pub fn add_grid(&mut self, info: GridInfo, blocks: Vec<Block>) {
        self.grids.retain(|record| record.info.entity != info.entity);
        self.grids.push(GridRecord { info, blocks });
    }

    pub fn remove_grid(&mut self, entity: EntityId) -> Option<GridRecord> {
        let index = self.grids.iter().position(|r| r.info.entity == entity)?;
        Some(self.grids.remove(index))
    }

    pub fn add_loose_entity(&mut self, entity: EntityId, position: DVec3) {
        if self.record(entity).is_some() {
            return;
        }
        self.loose.retain(|l| l.entity != entity);
        self.loose.push(LooseEntity { entity, position });
    }

    pub fn set_membership(&mut self, player: PlayerId, faction: Option<FactionId>) {
        match faction {
            Some(faction) => {
                self.memberships.insert(player, faction);
            }
            None => {
                self.memberships.remove(&player);
            }
        }
    }

    pub fn deposits(&self) -> &[DepositRecord] {
        &self.deposits
    }

    pub fn take_deposits(&mut self) -> Vec<DepositRecord> {
        std::mem::take(&mut self.deposits)
    }

    fn record(&self, entity: EntityId) -> Option<&GridRecord> {
        self.grids.iter().find(|record| record.info.entity == entity)
    }
}

impl WorldQuery for InMemoryWorld {
    fn entities_within_sphere(
        &self,
        center: DVec3,
        radius: f64,
    ) -> Result<Vec<EntityId>, WorldError> {
        let grids = self
            .grids
            .iter()
            .map(|record| (record.info.entity, record.info.position));
        let loose = self.loose.iter().map(|l| (l.entity, l.position));
        Ok(grids
            .chain(loose)
            .filter(|(_, position)| position.distance(center) <= radius)
            .map(|(entity, _)| entity)
            .collect())
    }

    fn grid(&self, entity: EntityId) -> Result<Option<GridInfo>, WorldError> {
        if let Some(record) = self.record(entity) {
            return Ok(Some(record.info.clone()));
        }
        if self.loose.iter().any(|l| l.entity == entity) {
            return Ok(None);
        }
        Err(WorldError::EntityNotFound(entity))
    }

    fn blocks_of(&self, entity: EntityId) -> Result<Vec<Block>, WorldError> {
        self.record(entity)
            .map(|record| record.blocks.clone())
            .ok_or(WorldError::EntityNotFound(entity))
    }

    fn deposit_items(
        &mut self,
        inventory: InventoryHandle,
        quantity: u32,
        item: &ItemDefinition,
    ) -> Result<(), WorldError> {
        let exists = self
            .record(inventory.grid)
            .map(|record| {
                record
                    .blocks
                    .iter()
                    .any(|block| block.inventory == Some(inventory))
            })
            .unwrap_or(false);
        if !exists {
            return Err(WorldError::InventoryUnavailable(inventory));
        }
        self.deposits.push(DepositRecord {
            inventory,
            quantity,
            item: item.clone(),
        });
        Ok(())
    }
}

impl FactionDirectory for InMemoryWorld {
    fn faction_of(&self, player: PlayerId) -> Option<FactionId> {
        self.memberships.get(&player).copied()
    }
}
