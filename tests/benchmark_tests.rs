//! Performance benchmarks for the per-tick hot paths

use assert_approx_eq::assert_approx_eq;
use client::sync::Synchronizer;
use server::registry::IdGen;
use shared::protocol::{decode, encode};
use shared::{
    Command, CommandBuffer, Entity, EntitySpec, Init, Message, Model, MoveMode, Owner, Player,
    Priority, QueuedCommand, Snapshot, UnitKind, Vec2, World,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

fn unit(index: usize, owner: Owner) -> Entity {
    EntitySpec {
        id: None,
        kind: UnitKind::UnitSoldier,
        x: (index % 40) as f32 * 20.0,
        y: (index / 40) as f32 * 20.0,
        w: 20.0,
        h: 20.0,
        hp: 100,
        owner,
        speed: 60.0,
        color: "#ff0000".to_string(),
    }
    .into_entity(format!("u{}", index + 1), owner)
}

fn crowded_world(units: usize) -> World {
    let mut world = World::new();
    world.upsert_player(Player::new(1, "Ann", "#ff0000"));
    for i in 0..units {
        world.upsert_entity(unit(i, Owner::Player(1)));
    }
    world
}

fn move_all(world: &World, target: Vec2) -> QueuedCommand {
    QueuedCommand {
        issuer: Some(1),
        sequence: 1,
        command: Command::Move {
            ids: world.entities.keys().cloned().collect(),
            target,
            mode: MoveMode::Default,
        },
    }
}

/// Benchmarks authoritative ticks with every unit moving
#[test]
fn benchmark_model_tick() {
    let world = crowded_world(500);
    let order = move_all(&world, Vec2::new(2000.0, 2000.0));
    let mut model = Model::authoritative(20, Arc::new(IdGen::new())).with_world(world);
    model.tick(&[order]);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        model.tick(&[]);
    }

    let duration = start.elapsed();
    println!(
        "Model tick (500 moving units): {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(model.tick_count(), iterations + 1);
    for unit in model.world.entities.values() {
        assert_approx_eq!(unit.x, 2000.0, 1e-3);
        assert_approx_eq!(unit.y, 2000.0, 1e-3);
        assert!(unit.order.is_none());
    }
    // A 20 Hz tick has 50ms; stay far below it even in debug builds
    assert!(duration.as_millis() < 5_000);
}

/// Benchmarks encoding and decoding a full snapshot
#[test]
fn benchmark_snapshot_codec() {
    let world = crowded_world(200);
    let message = Message::Snapshot(Snapshot {
        server_time: 1_700_000_000_000,
        last_acknowledged_sequence: 42,
        full: true,
        players: world.players.clone(),
        entities: world.entities.clone(),
        removed: Vec::new(),
    });

    let iterations = 200;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let text = encode(&message).unwrap();
        bytes = text.len();
        let decoded = decode(&text).unwrap();
        assert!(matches!(decoded, Message::Snapshot(_)));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec (200 entities, {} bytes): {} round trips in {:?} ({:.2} μs/iter)",
        bytes,
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5_000);
}

/// Benchmarks the command buffer under one producer and one drainer
#[test]
fn benchmark_command_buffer() {
    let buffer = CommandBuffer::new();
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let priority = if i % 10 == 0 {
            Priority::High
        } else {
            Priority::Low
        };
        buffer.enqueue(
            QueuedCommand::system(Command::Stop {
                ids: vec!["u1".to_string()],
            }),
            priority,
        );
        if i % 100 == 99 {
            assert_eq!(buffer.drain().len(), 100);
        }
    }

    let duration = start.elapsed();
    println!(
        "Command buffer: {} enqueues in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(buffer.is_empty());
    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks snapshot reconciliation with drift on every entity
#[test]
fn benchmark_reconciliation() {
    let mut sync = Synchronizer::new(20, "bench");
    let mut players = BTreeMap::new();
    players.insert(1, Player::new(1, "Ann", "#ff0000"));
    sync.on_init(&Init {
        my_id: 1,
        server_time: 0,
        players: players.clone(),
    });

    let entities: BTreeMap<_, _> = (0..200)
        .map(|i| unit(i, Owner::Player(1)))
        .map(|e| (e.id.clone(), e))
        .collect();
    let mut snapshot = Snapshot {
        server_time: 0,
        last_acknowledged_sequence: 0,
        full: true,
        players,
        entities,
        removed: Vec::new(),
    };
    sync.on_snapshot(&snapshot);

    let iterations = 200;
    let start = Instant::now();

    for i in 0..iterations {
        for entity in snapshot.entities.values_mut() {
            entity.x += if i % 2 == 0 { 3.0 } else { -3.0 };
        }
        snapshot.server_time += 50;
        sync.on_snapshot(&snapshot);
        sync.tick();
    }

    let duration = start.elapsed();
    println!(
        "Reconciliation (200 drifting entities): {} snapshots in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(sync.world().entities.len(), 200);
    assert!(duration.as_millis() < 5_000);
}
