//! Stackcraft Headless Simulation Harness
//!
//! Drives scripted carry, drop and crafting scenarios against the engine.
//! Runs entirely in-process with no rendering or input devices.
//!
//! Usage:
//!   cargo run -p stackcraft-simtest
//!   cargo run -p stackcraft-simtest -- --verbose
//!   cargo run -p stackcraft-simtest -- --json
//!   RUST_LOG=stackcraft_core=debug cargo run -p stackcraft-simtest

use serde::Serialize;
use stackcraft_core::prelude::*;

// ── Station presets (same JSON the map layer ships) ─────────────────────
const STATIONS_JSON: &str = include_str!("../../../data/stations.json");

/// Units fed into every slot during the production sweep
const FEED_UNITS: u32 = 6;

/// Fixed tick used by every scenario (60 FPS)
const TICK: f32 = 1.0 / 60.0;

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn engine() -> SimulationEngine {
    SimulationEngine::with_config(SimulationConfig {
        seed: Some(7),
        ..Default::default()
    })
}

fn main() {
    env_logger::init();
    let verbose = std::env::args().any(|a| a == "--verbose");
    let json = std::env::args().any(|a| a == "--json");
    println!("=== Stackcraft Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Station preset validation
    let presets = match StationConfig::list_from_json(STATIONS_JSON) {
        Ok(presets) => presets,
        Err(e) => {
            results.push(check("presets_parse", false, format!("JSON parse error: {}", e)));
            Vec::new()
        }
    };
    results.extend(validate_presets(&presets, verbose));

    // 2. Stack split/merge sweep
    results.extend(validate_stack_topology(verbose));

    // 3. Carry and drop protocol
    results.extend(validate_transfers(verbose));

    // 4. Production runs for every preset
    results.extend(validate_production(&presets, verbose));

    // 5. Snapshot round trip
    results.extend(validate_persistence(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(report) => println!("{}", report),
            Err(e) => log::error!("failed to encode report: {}", e),
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Station Presets ──────────────────────────────────────────────────

fn validate_presets(presets: &[StationConfig], verbose: bool) -> Vec<TestResult> {
    println!("--- Station Presets ---");
    let mut results = Vec::new();

    results.push(check(
        "presets_not_empty",
        !presets.is_empty(),
        format!("{} presets loaded", presets.len()),
    ));

    let bad_rate: Vec<_> = presets
        .iter()
        .filter(|p| p.base_rate <= 0.0 || p.tier <= 0.0)
        .map(|p| p.name.as_str())
        .collect();
    results.push(check(
        "presets_positive_rates",
        bad_rate.is_empty(),
        if bad_rate.is_empty() {
            "all presets progress".to_string()
        } else {
            format!("stalled presets: {}", bad_rate.join(", "))
        },
    ));

    // A slot per input type; duplicates would never receive units
    let duplicated: Vec<_> = presets
        .iter()
        .filter(|p| {
            p.inputs.iter().enumerate().any(|(i, a)| {
                p.inputs[..i]
                    .iter()
                    .any(|b| b.resource_type == a.resource_type)
            })
        })
        .map(|p| p.name.as_str())
        .collect();
    results.push(check(
        "presets_distinct_inputs",
        duplicated.is_empty(),
        if duplicated.is_empty() {
            "no duplicated input types".to_string()
        } else {
            format!("duplicated inputs in: {}", duplicated.join(", "))
        },
    ));

    if verbose {
        for preset in presets {
            let inputs: Vec<_> = preset
                .inputs
                .iter()
                .map(|i| format!("{}x{}", i.resource_type.name(), i.min_units))
                .collect();
            println!(
                "    {:18} [{}] -> {} @ {:.2}/s",
                preset.name,
                inputs.join(", "),
                preset.output.name(),
                preset.base_rate * preset.tier
            );
        }
    }

    results
}

// ── 2. Stack Topology ───────────────────────────────────────────────────

fn validate_stack_topology(_verbose: bool) -> Vec<TestResult> {
    println!("--- Stack Topology ---");
    let mut results = Vec::new();

    // Every capacity against every stack size, picked up then dropped back
    let mut failures = Vec::new();
    let mut cases = 0;
    for size in 1..=6u32 {
        for capacity in 1..=8u32 {
            cases += 1;
            let mut engine = engine();
            let holder = engine.spawn_holder(capacity);
            let at = GridCell::new(0, 0, 0);
            let ok = (|| -> Result<bool, TransferError> {
                engine.spawn_stack(at, ResourceType::Rock, size)?;
                let carried = engine.try_pick_up(holder, PickupTarget::Cell(at))?;
                let taken = capacity.min(size);
                let left = engine.stack_at(at).and_then(|b| engine.count(b)).unwrap_or(0);
                let carried_indices = engine.stack_indices(carried).unwrap_or_default();
                let split_ok = engine.count(carried) == Some(taken)
                    && left == size - taken
                    && carried_indices == (0..taken).collect::<Vec<_>>();

                engine.try_drop(holder, at, || true)?;
                let rebuilt = engine.stack_at(at).and_then(|b| engine.stack_indices(b));
                Ok(split_ok && rebuilt == Some((0..size).collect()))
            })()
            .unwrap_or(false);
            if !ok {
                failures.push(format!("size={} capacity={}", size, capacity));
            }
        }
    }
    results.push(check(
        "stack_split_merge_sweep",
        failures.is_empty(),
        if failures.is_empty() {
            format!("{} pick-up/drop-back cases consistent", cases)
        } else {
            format!("inconsistent: {}", failures.join("; "))
        },
    ));

    // Height follows unit count
    let mut engine = engine();
    let at = GridCell::new(0, 0, 0);
    let height = engine
        .spawn_stack(at, ResourceType::Wood, 4)
        .ok()
        .and_then(|b| engine.height(b))
        .unwrap_or(0.0);
    let expected = 4.0 * ResourceType::Wood.default_height();
    results.push(check(
        "stack_height_sum",
        (height - expected).abs() < 1e-5,
        format!("height {:.3} (expected {:.3})", height, expected),
    ));

    results
}

// ── 3. Transfers ────────────────────────────────────────────────────────

fn validate_transfers(_verbose: bool) -> Vec<TestResult> {
    println!("--- Transfers ---");
    let mut results = Vec::new();
    let (a, b, c) = (
        GridCell::new(0, 0, 0),
        GridCell::new(1, 0, 0),
        GridCell::new(2, 0, 0),
    );

    let mut engine = engine();
    let holder = engine.spawn_holder(2);
    let setup = engine
        .spawn_stack(a, ResourceType::Wood, 2)
        .and_then(|_| engine.spawn_stack(b, ResourceType::Wood, 1))
        .and_then(|_| engine.spawn_stack(c, ResourceType::Rock, 1))
        .and_then(|_| engine.try_pick_up(holder, PickupTarget::Cell(a)));

    // Mismatched drop leaves both stacks alone
    let rock_drop = engine.try_drop(holder, c, || true);
    let rock_count = engine.stack_at(c).and_then(|s| engine.count(s));
    results.push(check(
        "transfer_mismatch_rejected",
        setup.is_ok() && rock_drop.is_err() && rock_count == Some(1) && engine.carried(holder).is_some(),
        format!("drop on rock: {:?}", rock_drop),
    ));

    // Guarded drop is refused
    let guarded = engine.try_drop(holder, b, || false);
    results.push(check(
        "transfer_guard_honoured",
        guarded == Err(TransferError::InvalidTransfer(Rejection::DropBlocked)),
        format!("{:?}", guarded),
    ));

    // Matching drop merges
    let merged = engine.try_drop(holder, b, || true);
    let indices = engine.stack_at(b).and_then(|s| engine.stack_indices(s));
    results.push(check(
        "transfer_merge_reindexes",
        matches!(merged, Ok(DropOutcome::Merged(_))) && indices == Some(vec![0, 1, 2]),
        format!("indices {:?}", indices),
    ));

    // Events mirror what happened
    let events = engine.drain_events();
    let picked = events
        .iter()
        .filter(|e| matches!(e, SimEvent::PickedUp { .. }))
        .count();
    let dropped = events
        .iter()
        .filter(|e| matches!(e, SimEvent::Dropped { merged: true, .. }))
        .count();
    results.push(check(
        "transfer_events",
        picked == 1 && dropped == 1,
        format!("{} pickups, {} merged drops", picked, dropped),
    ));

    results
}

// ── 4. Production ───────────────────────────────────────────────────────

fn validate_production(presets: &[StationConfig], verbose: bool) -> Vec<TestResult> {
    println!("--- Production ---");
    let mut results = Vec::new();

    for preset in presets {
        let mut engine = engine();
        let holder = engine.spawn_holder(FEED_UNITS);
        let station = engine.spawn_station(preset);

        let mut fed = true;
        for (i, input) in preset.inputs.iter().enumerate() {
            let at = GridCell::new(i as i32, 0, 0);
            fed &= engine
                .spawn_stack(at, input.resource_type, FEED_UNITS)
                .and_then(|_| engine.try_pick_up(holder, PickupTarget::Cell(at)))
                .and_then(|_| engine.try_interact_using(holder, station))
                .is_ok();
        }

        // Each slot supports (units - threshold + 1) cycles
        let expected_cycles = preset
            .inputs
            .iter()
            .map(|i| (FEED_UNITS + 1).saturating_sub(i.min_units))
            .min()
            .unwrap_or(0);

        let cycle_seconds = 1.0 / (preset.base_rate * preset.tier);
        let max_ticks = ((expected_cycles as f32 + 2.0) * cycle_seconds / TICK) as usize;
        let mut ticks = 0;
        let mut attempts = 0;
        let mut busy_rejections = 0;
        while ticks < max_ticks && engine.cycle_state(station) != Some(CycleState::Idle) {
            engine.update(TICK);
            ticks += 1;
            // Take from a slot mid-cycle: must always be refused
            if ticks % 30 == 0 && engine.cycle_progress(station).is_some() {
                attempts += 1;
                let taken = engine.try_pick_up(holder, PickupTarget::StationInput { station, slot: 0 });
                if taken == Err(TransferError::StationBusy) {
                    busy_rejections += 1;
                }
            }
        }
        let locked = busy_rejections > 0 && busy_rejections == attempts;

        let completed = engine
            .drain_events()
            .iter()
            .filter(|e| matches!(e, SimEvent::CycleCompleted { .. }))
            .count() as u32;
        let output = engine.output_stack(station).and_then(|s| engine.count(s)).unwrap_or(0);
        let remaining: Vec<u32> = (0..preset.inputs.len())
            .map(|slot| {
                engine
                    .slot_stack(station, slot)
                    .and_then(|s| engine.count(s))
                    .unwrap_or(0)
            })
            .collect();
        let consumed_ok = remaining.iter().all(|r| FEED_UNITS - r == expected_cycles);

        results.push(check(
            format!("production_{}", preset.name.to_lowercase().replace(' ', "_")),
            fed && locked && completed == expected_cycles && output == expected_cycles && consumed_ok,
            format!(
                "{} cycles in {} ticks, output {}, remaining {:?}, {}/{} busy rejections",
                completed, ticks, output, remaining, busy_rejections, attempts
            ),
        ));

        if verbose {
            println!(
                "    {:18} {:.1}s per cycle, {} cycles",
                preset.name, cycle_seconds, completed
            );
        }
    }

    results
}

// ── 5. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(_verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let mut engine = engine();
    let holder = engine.spawn_holder(3);
    let station = engine.spawn_station(&StationConfig::new(
        "Rail Crafter",
        &[ResourceType::Wood],
        ResourceType::Rail,
    ));
    let at = GridCell::new(0, 0, 0);
    let setup = engine
        .spawn_stack(at, ResourceType::Wood, 3)
        .and_then(|_| engine.try_pick_up(holder, PickupTarget::Cell(at)))
        .and_then(|_| engine.try_interact_using(holder, station));
    engine.update(1.0);

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    let mut loaded = SimulationEngine::new();
    let restored = loaded.load(&buffer[..]);

    results.push(check(
        "persistence_roundtrip",
        setup.is_ok()
            && saved.is_ok()
            && restored.is_ok()
            && loaded.unit_count() == engine.unit_count()
            && loaded.cycle_progress(station) == engine.cycle_progress(station),
        format!(
            "{} bytes, {} units, progress {:?}",
            buffer.len(),
            loaded.unit_count(),
            loaded.cycle_progress(station)
        ),
    ));

    results
}
