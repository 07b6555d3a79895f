//! Groups the grids found around a control point by owning faction, keeping
//! only grids that qualify for scoring.

use std::collections::BTreeSet;

use glam::DVec3;
use tracing::debug;

use crate::owners::{EntityId, FactionId};
use crate::world::{Block, BlockKind, GridCategory, InventoryHandle, WorldError, WorldQuery};

/// Grid that passed every eligibility check for one control point.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGrid {
    pub entity: EntityId,
    pub name: String,
    pub faction: FactionId,
    pub block_count: usize,
    pub category: GridCategory,
    /// Inventories of the grid's cargo containers, in block order.
    pub cargo: Vec<InventoryHandle>,
}

/// Eligible grids per faction for a single control point.
///
/// Factions keep the order in which they first appeared in the spatial query
/// and grids keep query order, so the same query result always produces the
/// same tally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactionTally {
    entries: Vec<(FactionId, Vec<CandidateGrid>)>,
}

impl FactionTally {
    pub fn push(&mut self, grid: CandidateGrid) {
        match self.entries.iter_mut().find(|(id, _)| *id == grid.faction) {
            Some((_, grids)) => grids.push(grid),
            None => self.entries.push((grid.faction, vec![grid])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn faction_count(&self) -> usize {
        self.entries.len()
    }

    pub fn factions(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn grids_for(&self, faction: FactionId) -> Option<&[CandidateGrid]> {
        self.entries
            .iter()
            .find(|(id, _)| *id == faction)
            .map(|(_, grids)| grids.as_slice())
    }

    /// Grid count per faction, in tally order.
    pub fn counts(&self) -> Vec<(FactionId, usize)> {
        self.entries
            .iter()
            .map(|(id, grids)| (*id, grids.len()))
            .collect()
    }
}

/// Outcome of the three eligibility checks for one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Eligibility {
    pub powered: bool,
    pub has_marker: bool,
    pub marker_in_range: bool,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        self.powered && self.has_marker && self.marker_in_range
    }
}

/// Checks a grid's blocks against the scoring rules.
///
/// A grid qualifies when it has a functional, working reactor and a functional
/// classifier marker whose broadcast radius reaches the control point
/// (`radius >= distance`).
pub fn assess_blocks(blocks: &[Block], distance: f64, classifier_subtype: &str) -> Eligibility {
    let mut result = Eligibility::default();
    for block in blocks {
        match block.kind {
            BlockKind::Reactor => {
                result.powered |= block.is_functional() && block.is_working();
            }
            BlockKind::Beacon if block.is_classifier(classifier_subtype) => {
                if block.is_functional() {
                    result.has_marker = true;
                    result.marker_in_range |= block.broadcast_radius >= distance;
                }
            }
            _ => {}
        }
    }
    result
}

/// Filters the entities around `control_point` and groups the eligible grids by faction.
///
/// Non-grid entities, grids without a faction and grids failing
/// [`assess_blocks`] are dropped; that is a normal outcome and only traced at
/// debug level. An entity listed more than once is assessed at its first
/// appearance only.
pub fn aggregate<W: WorldQuery + ?Sized>(
    world: &W,
    entities: &[EntityId],
    control_point: DVec3,
    classifier_subtype: &str,
) -> Result<FactionTally, WorldError> {
    let mut tally = FactionTally::default();
    let mut seen = BTreeSet::new();

    for &entity in entities {
        if !seen.insert(entity) {
            debug!(target: "conquest::round", %entity, "grid.skipped=duplicate");
            continue;
        }
        let Some(info) = world.grid(entity)? else {
            continue;
        };
        let Some(faction) = info.faction else {
            debug!(target: "conquest::round", %entity, "grid.skipped=no_faction");
            continue;
        };

        let blocks = world.blocks_of(entity)?;
        let distance = info.position.distance(control_point);
        let eligibility = assess_blocks(&blocks, distance, classifier_subtype);
        debug!(
            target: "conquest::round",
            %entity,
            %faction,
            powered = eligibility.powered,
            has_marker = eligibility.has_marker,
            marker_in_range = eligibility.marker_in_range,
            "grid.assessed"
        );
        if !eligibility.is_eligible() {
            continue;
        }

        let cargo = blocks
            .iter()
            .filter(|block| block.kind == BlockKind::CargoContainer)
            .filter_map(|block| block.inventory)
            .collect();
        tally.push(CandidateGrid {
            entity,
            category: info.category(),
            name: info.name,
            faction,
            block_count: blocks.len(),
            cargo,
        });
    }

    Ok(tally)
}
