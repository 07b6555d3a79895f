use conquest_core::{
    resolve_round, Block, BlockKind, BlockState, ConquestSettings, ControlPoint, EntityId,
    FactionId, GridInfo, GridSize, InMemoryWorld, InventoryHandle, TokenLedger,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::DVec3;

const FACTIONS: i64 = 6;

fn contested_world(grids_per_point: i64, points: &[ControlPoint]) -> InMemoryWorld {
    let mut world = InMemoryWorld::new();
    let mut next_id = 1;
    for point in points {
        for index in 0..grids_per_point {
            let id = next_id;
            next_id += 1;
            let offset = DVec3::new(index as f64, (index % 7) as f64, 0.0);
            world.add_grid(
                GridInfo {
                    entity: EntityId(id),
                    name: format!("grid-{}", id),
                    position: point.position + offset,
                    is_static: index % 5 == 0,
                    size: if index % 2 == 0 {
                        GridSize::Large
                    } else {
                        GridSize::Small
                    },
                    faction: Some(FactionId(index % FACTIONS)),
                },
                vec![
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
                        broadcast_radius: 5_000.0,
                        inventory: None,
                    },
                    Block {
                        kind: BlockKind::CargoContainer,
                        subtype: "LargeContainer".to_string(),
                        state: BlockState::default(),
                        broadcast_radius: 0.0,
                        inventory: Some(InventoryHandle {
                            grid: EntityId(id),
                            block: 2,
                        }),
                    },
                ],
            );
        }
    }
    world
}

fn bench_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("round");
    let points: Vec<ControlPoint> = (0..4)
        .map(|i| ControlPoint {
            name: format!("cp-{}", i),
            position: DVec3::new(i as f64 * 100_000.0, 0.0, 0.0),
            radius: 2_000.0,
            tokens_per_period: 5,
        })
        .collect();
    let settings = ConquestSettings::default().with_control_points(points.clone());

    for grids in [16i64, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("grids_per_point", grids), &grids, |b, &grids| {
            b.iter_batched(
                || (contested_world(grids, &points), TokenLedger::default()),
                |(mut world, mut ledger)| resolve_round(&mut world, &settings, &mut ledger),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(round_benches, bench_round);
criterion_main!(round_benches);
