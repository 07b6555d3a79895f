//! Per-owner fleet tracking and quota support status.
//!
//! Entries are created on first reference and live for as long as the owning
//! [`crate::state::ConquestState`]; there is no eviction.

use std::collections::BTreeMap;

use conquest_proto::{FleetGridData, OwnerType, ShipClass};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::owners::{EntityId, FleetOwner};
use crate::settings::ConquestSettings;

/// What the registry knows about one grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSummary {
    pub entity: EntityId,
    pub owner_type: OwnerType,
    pub ship_class: ShipClass,
    pub block_count: u32,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TrackedGrid {
    summary: GridSummary,
    supported: bool,
}

/// Grids of one owner, in the order they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRecord {
    grids: Vec<TrackedGrid>,
}

impl FleetRecord {
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// The first `quota` grids of a class are supported, the rest are not.
    fn reclassify(&mut self, class: ShipClass, quota: u16) {
        let mut seen = 0usize;
        for grid in self
            .grids
            .iter_mut()
            .filter(|grid| grid.summary.ship_class == class)
        {
            grid.supported = seen < quota as usize;
            seen += 1;
        }
    }
}

/// Fleet status grouped by ship class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetStatus {
    pub supported: BTreeMap<ShipClass, Vec<GridSummary>>,
    pub unsupported: BTreeMap<ShipClass, Vec<GridSummary>>,
}

impl FleetStatus {
    pub fn unsupported_count(&self) -> usize {
        self.unsupported.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRegistry {
    fleets: BTreeMap<FleetOwner, FleetRecord>,
}

impl FleetRegistry {
    fn fleet_mut(&mut self, owner: FleetOwner) -> &mut FleetRecord {
        self.fleets.entry(owner).or_default()
    }

    /// Starts tracking a grid, or refreshes it if already tracked, and
    /// re-evaluates quota support for its class. A grid tracked under another
    /// owner is moved, freeing its slot there. Returns whether the grid is
    /// supported.
    pub fn record_grid(
        &mut self,
        owner: FleetOwner,
        summary: GridSummary,
        settings: &ConquestSettings,
    ) -> bool {
        let class = summary.ship_class;
        let entity = summary.entity;
        let quota = settings.quota_for(class, owner.owner_type());

        let previous_owners: Vec<FleetOwner> = self
            .fleets
            .iter()
            .filter(|(other, fleet)| {
                **other != owner && fleet.grids.iter().any(|g| g.summary.entity == entity)
            })
            .map(|(other, _)| *other)
            .collect();
        for previous_owner in previous_owners {
            self.remove_grid(previous_owner, entity, settings);
            debug!(
                target: "conquest::fleet",
                from = %previous_owner,
                to = %owner,
                %entity,
                "fleet.grid_transferred"
            );
        }

        let fleet = self.fleet_mut(owner);

        let existing = fleet.grids.iter().position(|g| g.summary.entity == entity);
        let previous_class = match existing {
            Some(index) => {
                let previous = fleet.grids[index].summary.ship_class;
                fleet.grids[index].summary = summary;
                Some(previous)
            }
            None => {
                fleet.grids.push(TrackedGrid {
                    summary,
                    supported: false,
                });
                None
            }
        };

        if let Some(previous) = previous_class.filter(|previous| *previous != class) {
            fleet.reclassify(previous, settings.quota_for(previous, owner.owner_type()));
        }
        fleet.reclassify(class, quota);

        let supported = fleet
            .grids
            .iter()
            .any(|g| g.summary.entity == entity && g.supported);
        debug!(
            target: "conquest::fleet",
            %owner,
            %entity,
            ship_class = %class,
            supported,
            "fleet.grid_recorded"
        );
        supported
    }

    /// Stops tracking a grid. The next grid of the same class, if any, takes over
    /// the freed quota slot.
    pub fn remove_grid(
        &mut self,
        owner: FleetOwner,
        entity: EntityId,
        settings: &ConquestSettings,
    ) -> Option<GridSummary> {
        let fleet = self.fleets.get_mut(&owner)?;
        let index = fleet.grids.iter().position(|g| g.summary.entity == entity)?;
        let removed = fleet.grids.remove(index).summary;
        fleet.reclassify(
            removed.ship_class,
            settings.quota_for(removed.ship_class, owner.owner_type()),
        );
        debug!(target: "conquest::fleet", %owner, %entity, "fleet.grid_removed");
        Some(removed)
    }

    pub fn query(&mut self, owner: FleetOwner) -> FleetStatus {
        let mut status = FleetStatus::default();
        for grid in &self.fleet_mut(owner).grids {
            let bucket = if grid.supported {
                &mut status.supported
            } else {
                &mut status.unsupported
            };
            bucket
                .entry(grid.summary.ship_class)
                .or_default()
                .push(grid.summary.clone());
        }
        status
    }

    /// Wire form of an owner's fleet, in recording order.
    pub fn fleet_data(&mut self, owner: FleetOwner) -> Vec<FleetGridData> {
        self.fleet_mut(owner)
            .grids
            .iter()
            .map(|grid| FleetGridData {
                owner_type: grid.summary.owner_type,
                ship_class: grid.summary.ship_class,
                supported: grid.supported,
                block_count: grid.summary.block_count,
                display_name: grid.summary.display_name.clone(),
            })
            .collect()
    }

    pub fn owner_count(&self) -> usize {
        self.fleets.len()
    }
}
