//! Round resolution: decides who holds each control point and places the reward.
//!
//! A round visits the configured control points in order. For each one the
//! grids inside its radius are aggregated per faction, a winner is picked with
//! [`pick_winner`], and the reward is deposited into the first cargo inventory
//! of the winner's best-ranked grid.

use std::cmp::Reverse;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::aggregate::{aggregate, CandidateGrid};
use crate::ledger::TokenLedger;
use crate::owners::{EntityId, FactionId};
use crate::settings::{ConquestSettings, ControlPoint, FaultPolicy};
use crate::world::{InventoryHandle, WorldError, WorldQuery};

/// Winner of a control point as picked by [`pick_winner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerSelection {
    pub faction: FactionId,
    pub grid_count: usize,
    pub tie: bool,
}

/// Picks the faction with the most grids.
///
/// Walks `counts` in order and lets any faction whose count is greater than
/// *or equal to* the running maximum take over. `tie` is recomputed at every
/// takeover as "new count equals the previous maximum", so it only reflects
/// the last takeover: `[5, 5, 6]` resolves to the third faction with no tie,
/// while `[3, 5, 5]` and `[5, 5, 3]` are ties. The result therefore depends on
/// the order of `counts`.
pub fn pick_winner(counts: &[(FactionId, usize)]) -> Option<WinnerSelection> {
    let mut winner: Option<WinnerSelection> = None;
    for &(faction, grid_count) in counts {
        let best = winner.map(|w| w.grid_count);
        if best.map_or(true, |best| grid_count >= best) {
            winner = Some(WinnerSelection {
                faction,
                grid_count,
                tie: best == Some(grid_count),
            });
        }
    }
    winner
}

/// Orders candidate reward destinations: stations, then large ships, then
/// small ships; larger grids first within a category; entity id last so the
/// order is total.
pub fn rank_reward_destinations(grids: &mut [CandidateGrid]) {
    grids.sort_by_key(|grid| (grid.category, Reverse(grid.block_count), grid.entity));
}

/// First cargo inventory of the best-ranked grid that has one.
///
/// Free capacity is not checked: the host decides what happens when the
/// deposit overflows the container.
pub fn select_reward_destination(ranked: &[CandidateGrid]) -> Option<(EntityId, InventoryHandle)> {
    ranked
        .iter()
        .find_map(|grid| grid.cargo.first().map(|inventory| (grid.entity, *inventory)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPointOutcome {
    /// No faction had an eligible grid in range.
    NoContest,
    Tie {
        grid_count: usize,
    },
    /// The winner owns no grid with a cargo inventory.
    NoDestination {
        faction: FactionId,
    },
    Rewarded {
        faction: FactionId,
        grid: EntityId,
        inventory: InventoryHandle,
        amount: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPointResult {
    pub control_point: String,
    pub outcome: ControlPointOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("control point {control_point} failed: {source}")]
pub struct RoundError {
    pub control_point: String,
    #[source]
    pub source: WorldError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub results: Vec<ControlPointResult>,
    pub faults: Vec<RoundError>,
    /// False when a fault stopped the pass before every control point was visited.
    pub completed: bool,
}

impl RoundReport {
    pub fn rewarded(&self) -> impl Iterator<Item = (FactionId, u32)> + '_ {
        self.results.iter().filter_map(|result| match result.outcome {
            ControlPointOutcome::Rewarded {
                faction, amount, ..
            } => Some((faction, amount)),
            _ => None,
        })
    }
}

/// Resolves one control point and credits any reward to `ledger`.
pub fn resolve_control_point<W: WorldQuery + ?Sized>(
    world: &mut W,
    control_point: &ControlPoint,
    settings: &ConquestSettings,
    ledger: &mut TokenLedger,
) -> Result<ControlPointOutcome, WorldError> {
    let entities = world.entities_within_sphere(control_point.position, control_point.radius)?;
    let tally = aggregate(
        &*world,
        &entities,
        control_point.position,
        settings.classifier_subtype(),
    )?;
    debug!(
        target: "conquest::round",
        control_point = %control_point.name,
        entities = entities.len(),
        factions = tally.faction_count(),
        "control_point.aggregated"
    );

    let Some(selection) = pick_winner(&tally.counts()) else {
        return Ok(ControlPointOutcome::NoContest);
    };
    if selection.tie {
        return Ok(ControlPointOutcome::Tie {
            grid_count: selection.grid_count,
        });
    }

    let mut ranked = tally
        .grids_for(selection.faction)
        .map(<[CandidateGrid]>::to_vec)
        .unwrap_or_default();
    rank_reward_destinations(&mut ranked);

    let Some((grid, inventory)) = select_reward_destination(&ranked) else {
        return Ok(ControlPointOutcome::NoDestination {
            faction: selection.faction,
        });
    };

    let amount = control_point.tokens_per_period;
    world.deposit_items(inventory, amount, settings.reward_item())?;
    ledger.credit(selection.faction, u64::from(amount));

    Ok(ControlPointOutcome::Rewarded {
        faction: selection.faction,
        grid,
        inventory,
        amount,
    })
}

/// Runs one full pass over every configured control point.
///
/// The ledger is reset first; credits made before a fault are kept because the
/// matching deposits already happened. What a fault does to the remaining
/// control points is decided by [`ConquestSettings::fault_policy`].
pub fn resolve_round<W: WorldQuery + ?Sized>(
    world: &mut W,
    settings: &ConquestSettings,
    ledger: &mut TokenLedger,
) -> RoundReport {
    let policy = settings.fault_policy();
    ledger.begin_round();
    let mut report = RoundReport {
        completed: true,
        ..RoundReport::default()
    };

    for control_point in settings.control_points() {
        match resolve_control_point(world, control_point, settings, ledger) {
            Ok(outcome) => {
                log_outcome(control_point, &outcome);
                report.results.push(ControlPointResult {
                    control_point: control_point.name.clone(),
                    outcome,
                });
            }
            Err(source) => {
                let fault = RoundError {
                    control_point: control_point.name.clone(),
                    source,
                };
                error!(
                    target: "conquest::round",
                    control_point = %control_point.name,
                    error = %fault,
                    ?policy,
                    "control_point.failed"
                );
                report.faults.push(fault);
                if policy == FaultPolicy::AbortPass {
                    report.completed = false;
                    break;
                }
            }
        }
    }

    report
}

fn log_outcome(control_point: &ControlPoint, outcome: &ControlPointOutcome) {
    match outcome {
        ControlPointOutcome::NoContest => debug!(
            target: "conquest::round",
            control_point = %control_point.name,
            "control_point.skipped=no_contest"
        ),
        ControlPointOutcome::Tie { grid_count } => info!(
            target: "conquest::round",
            control_point = %control_point.name,
            grid_count,
            "control_point.skipped=tie"
        ),
        ControlPointOutcome::NoDestination { faction } => info!(
            target: "conquest::round",
            control_point = %control_point.name,
            %faction,
            "control_point.skipped=no_destination"
        ),
        ControlPointOutcome::Rewarded {
            faction,
            grid,
            inventory,
            amount,
        } => info!(
            target: "conquest::round",
            control_point = %control_point.name,
            %faction,
            %grid,
            %inventory,
            amount,
            "control_point.rewarded"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_world::InMemoryWorld;
    use crate::world::{Block, BlockKind, BlockState, GridCategory, GridInfo, GridSize};
    use glam::DVec3;

    fn counts(values: &[usize]) -> Vec<(FactionId, usize)> {
        values
            .iter()
            .enumerate()
            .map(|(i, count)| (FactionId(i as i64 + 1), *count))
            .collect()
    }

    #[test]
    fn later_equal_count_takes_over_and_flags_tie() {
        let pick = pick_winner(&counts(&[3, 5, 5])).unwrap();
        assert_eq!(pick.faction, FactionId(3));
        assert!(pick.tie);
    }

    #[test]
    fn strict_leader_wins_without_tie() {
        let pick = pick_winner(&counts(&[5, 3])).unwrap();
        assert_eq!(pick.faction, FactionId(1));
        assert!(!pick.tie);
    }

    #[test]
    fn leading_tie_stays_a_tie() {
        let pick = pick_winner(&counts(&[5, 5, 3])).unwrap();
        assert_eq!(pick.faction, FactionId(2));
        assert!(pick.tie);
    }

    #[test]
    fn tie_flag_only_reflects_the_last_takeover() {
        // An earlier 5-5 tie is forgotten once a 6 takes over.
        let pick = pick_winner(&counts(&[5, 5, 6])).unwrap();
        assert_eq!(pick.faction, FactionId(3));
        assert!(!pick.tie);

        // Order matters: a 5 that reaches an earlier 5 after a smaller count is still a tie.
        let pick = pick_winner(&counts(&[5, 4, 5])).unwrap();
        assert_eq!(pick.faction, FactionId(3));
        assert!(pick.tie);
    }

    #[test]
    fn empty_tally_has_no_winner() {
        assert_eq!(pick_winner(&[]), None);
    }

    fn candidate(id: i64, category: GridCategory, blocks: usize, cargo: bool) -> CandidateGrid {
        CandidateGrid {
            entity: EntityId(id),
            name: format!("grid-{}", id),
            faction: FactionId(1),
            block_count: blocks,
            category,
            cargo: if cargo {
                vec![InventoryHandle {
                    grid: EntityId(id),
                    block: 0,
                }]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn category_beats_size_when_ranking() {
        let mut grids = vec![
            candidate(1, GridCategory::SmallShip, 500, true),
            candidate(2, GridCategory::LargeShip, 20, true),
            candidate(3, GridCategory::Station, 10, true),
            candidate(4, GridCategory::LargeShip, 80, true),
        ];
        rank_reward_destinations(&mut grids);
        let order: Vec<_> = grids.iter().map(|g| g.entity.0).collect();
        assert_eq!(order, vec![3, 4, 2, 1]);
    }

    #[test]
    fn cargo_less_station_falls_through_to_ship() {
        let mut grids = vec![
            candidate(1, GridCategory::LargeShip, 20, true),
            candidate(2, GridCategory::Station, 10, false),
        ];
        rank_reward_destinations(&mut grids);
        assert_eq!(select_reward_destination(&grids).unwrap().0, EntityId(1));

        let mut grids = vec![
            candidate(1, GridCategory::LargeShip, 20, true),
            candidate(2, GridCategory::Station, 10, true),
        ];
        rank_reward_destinations(&mut grids);
        assert_eq!(select_reward_destination(&grids).unwrap().0, EntityId(2));
    }

    fn eligible_blocks(grid: i64, cargo_blocks: u32) -> Vec<Block> {
        let mut blocks = vec![
            Block {
                kind: BlockKind::Reactor,
                subtype: "LargeReactor".to_string(),
                state: BlockState::default(),
                broadcast_radius: 0.0,
                inventory: None,
            },
            Block {
                kind: BlockKind::Beacon,
                subtype: "HullClassifierFrigate".to_string(),
                state: BlockState::default(),
                broadcast_radius: 10_000.0,
                inventory: None,
            },
        ];
        for index in 0..cargo_blocks {
            blocks.push(Block {
                kind: BlockKind::CargoContainer,
                subtype: "LargeContainer".to_string(),
                state: BlockState::default(),
                broadcast_radius: 0.0,
                inventory: Some(InventoryHandle {
                    grid: EntityId(grid),
                    block: index + 2,
                }),
            });
        }
        blocks
    }

    fn add_grid(world: &mut InMemoryWorld, id: i64, faction: i64, position: DVec3, cargo: u32) {
        world.add_grid(
            GridInfo {
                entity: EntityId(id),
                name: format!("grid-{}", id),
                position,
                is_static: false,
                size: GridSize::Large,
                faction: Some(FactionId(faction)),
            },
            eligible_blocks(id, cargo),
        );
    }

    fn settings_with(points: &[(&str, DVec3)]) -> ConquestSettings {
        ConquestSettings::default().with_control_points(
            points
                .iter()
                .map(|(name, position)| ControlPoint {
                    name: name.to_string(),
                    position: *position,
                    radius: 1_000.0,
                    tokens_per_period: 4,
                })
                .collect(),
        )
    }

    #[test]
    fn single_deposit_lands_in_first_container() {
        let mut world = InMemoryWorld::new();
        add_grid(&mut world, 1, 9, DVec3::ZERO, 3);
        add_grid(&mut world, 2, 9, DVec3::X, 2);
        let settings = settings_with(&[("Alpha", DVec3::ZERO)]);
        let mut ledger = TokenLedger::default();

        let report = resolve_round(&mut world, &settings, &mut ledger);

        assert!(report.completed);
        assert_eq!(world.deposits().len(), 1, "exactly one container is touched");
        let deposit = &world.deposits()[0];
        assert_eq!(deposit.quantity, 4);
        assert_eq!(deposit.item.subtype, "ShipLicense");
        assert_eq!(
            deposit.inventory,
            InventoryHandle {
                grid: EntityId(1),
                block: 2
            },
            "largest grid's first container"
        );
        assert_eq!(ledger.tokens_for(FactionId(9)), 4);
    }

    #[test]
    fn tie_and_empty_points_grant_nothing() {
        let mut world = InMemoryWorld::new();
        add_grid(&mut world, 1, 1, DVec3::ZERO, 1);
        add_grid(&mut world, 2, 2, DVec3::ZERO, 1);
        let settings = settings_with(&[("Tied", DVec3::ZERO), ("Empty", DVec3::splat(50_000.0))]);
        let mut ledger = TokenLedger::default();

        let report = resolve_round(&mut world, &settings, &mut ledger);

        assert_eq!(
            report.results[0].outcome,
            ControlPointOutcome::Tie { grid_count: 1 }
        );
        assert_eq!(report.results[1].outcome, ControlPointOutcome::NoContest);
        assert!(world.deposits().is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn winner_without_cargo_is_skipped_silently() {
        let mut world = InMemoryWorld::new();
        add_grid(&mut world, 1, 4, DVec3::ZERO, 0);
        let settings = settings_with(&[("Alpha", DVec3::ZERO)]);
        let mut ledger = TokenLedger::default();

        let report = resolve_round(&mut world, &settings, &mut ledger);

        assert_eq!(
            report.results[0].outcome,
            ControlPointOutcome::NoDestination {
                faction: FactionId(4)
            }
        );
        assert!(report.faults.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn credits_from_several_points_accumulate() {
        let mut world = InMemoryWorld::new();
        add_grid(&mut world, 1, 6, DVec3::ZERO, 1);
        add_grid(&mut world, 2, 6, DVec3::splat(10_000.0), 1);
        let settings = settings_with(&[("Alpha", DVec3::ZERO), ("Beta", DVec3::splat(10_000.0))]);
        let mut ledger = TokenLedger::default();
        ledger.credit(FactionId(99), 1);

        resolve_round(&mut world, &settings, &mut ledger);

        assert_eq!(ledger.tokens_for(FactionId(6)), 8);
        assert_eq!(ledger.tokens_for(FactionId(99)), 0, "previous round is forgotten");
    }

    struct FailingAt<'a> {
        inner: &'a mut InMemoryWorld,
        center: DVec3,
    }

    impl WorldQuery for FailingAt<'_> {
        fn entities_within_sphere(
            &self,
            center: DVec3,
            radius: f64,
        ) -> Result<Vec<EntityId>, WorldError> {
            if center == self.center {
                return Err(WorldError::Host("sphere query timed out".to_string()));
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
            item: &crate::world::ItemDefinition,
        ) -> Result<(), WorldError> {
            self.inner.deposit_items(inventory, quantity, item)
        }
    }

    /// Host whose sphere query reports every entity twice.
    struct Repeating<'a>(&'a mut InMemoryWorld);

    impl WorldQuery for Repeating<'_> {
        fn entities_within_sphere(
            &self,
            center: DVec3,
            radius: f64,
        ) -> Result<Vec<EntityId>, WorldError> {
            let found = self.0.entities_within_sphere(center, radius)?;
            Ok(found.iter().chain(found.iter()).copied().collect())
        }

        fn grid(&self, entity: EntityId) -> Result<Option<GridInfo>, WorldError> {
            self.0.grid(entity)
        }

        fn blocks_of(&self, entity: EntityId) -> Result<Vec<Block>, WorldError> {
            self.0.blocks_of(entity)
        }

        fn deposit_items(
            &mut self,
            inventory: InventoryHandle,
            quantity: u32,
            item: &crate::world::ItemDefinition,
        ) -> Result<(), WorldError> {
            self.0.deposit_items(inventory, quantity, item)
        }
    }

    #[test]
    fn repeated_query_results_still_tie() {
        let mut world = InMemoryWorld::new();
        add_grid(&mut world, 1, 7, DVec3::ZERO, 1);
        add_grid(&mut world, 2, 8, DVec3::X, 1);
        let settings = settings_with(&[("Alpha", DVec3::ZERO)]);
        let mut ledger = TokenLedger::default();

        let report = resolve_round(&mut Repeating(&mut world), &settings, &mut ledger);

        assert_eq!(
            report.results[0].outcome,
            ControlPointOutcome::Tie { grid_count: 1 }
        );
        assert!(world.deposits().is_empty());
        assert!(ledger.is_empty());
    }

    fn three_point_world() -> (InMemoryWorld, ConquestSettings) {
        let points = [
            ("One", DVec3::ZERO),
            ("Two", DVec3::splat(10_000.0)),
            ("Three", DVec3::splat(20_000.0)),
        ];
        let mut world = InMemoryWorld::new();
        for (index, (_, position)) in points.iter().enumerate() {
            add_grid(&mut world, index as i64 + 1, 1, *position, 1);
        }
        (world, settings_with(&points))
    }

    #[test]
    fn fault_aborts_the_rest_of_the_pass() {
        let (mut world, settings) = three_point_world();
        let mut ledger = TokenLedger::default();
        let mut failing = FailingAt {
            inner: &mut world,
            center: DVec3::splat(10_000.0),
        };

        let report = resolve_round(&mut failing, &settings, &mut ledger);

        assert!(!report.completed);
        assert_eq!(report.results.len(), 1, "only the first point resolved");
        assert_eq!(report.faults[0].control_point, "Two");
        assert_eq!(world.deposits().len(), 1);
        assert_eq!(ledger.tokens_for(FactionId(1)), 4, "credit before the fault is kept");
    }

    #[test]
    fn isolating_policy_continues_after_a_fault() {
        let (mut world, settings) = three_point_world();
        let mut ledger = TokenLedger::default();
        let mut failing = FailingAt {
            inner: &mut world,
            center: DVec3::splat(10_000.0),
        };

        let settings = settings.with_fault_policy(FaultPolicy::IsolateControlPoint);
        let report = resolve_round(&mut failing, &settings, &mut ledger);

        assert!(report.completed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(world.deposits().len(), 2);
    }
}
