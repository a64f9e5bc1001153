//! Manaflow Headless Simulation Harness
//!
//! Validates the mana simulation on a sample map without any game engine.
//! Runs entirely in-process, with no rendering or input.
//!
//! Usage:
//!   cargo run -p manaflow-simtest
//!   cargo run -p manaflow-simtest -- --verbose --seed 7 --frames 1200
//!   cargo run -p manaflow-simtest -- --config my_config.json --map my_map.txt

use std::path::PathBuf;

use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;
use manaflow_core::components::{
    DiffusivityTable, GridCoord, ManaState, TerrainKind, TerrainLayer, DEFAULT_DORMANT_THRESHOLD,
};
use manaflow_core::config::SimulationConfig;
use manaflow_core::engine::SimulationEngine;
use manaflow_core::grid::{build_grid, resolve_terrain, GridSettings, TerrainLayers, WorldGrid};
use manaflow_core::systems::{
    generation_factor, DiffusionConfig, DiffusionSystem, DirectionWeights,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Sample map ──────────────────────────────────────────────────────────
const SAMPLE_MAP: &str = include_str!("../../../data/sample_map.txt");

#[derive(Parser, Debug)]
#[command(
    name = "manaflow-simtest",
    about = "Headless validation harness for the mana simulation"
)]
struct Args {
    /// Print per-section details and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Simulation config (JSON); defaults to the built-in config
    #[arg(long)]
    config: Option<PathBuf>,

    /// ASCII map (# wall, ~ mana pool, . ground); defaults to the bundled sample
    #[arg(long)]
    map: Option<PathBuf>,

    /// Seed for randomized initial mana
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Frames of 1/60 s to run in the full simulation section
    #[arg(long, default_value_t = 600)]
    frames: u32,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let env = Env::default().default_filter_or(level.to_string());
    // Only fails if a logger is already installed
    let _ = Builder::from_env(env).try_init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    println!("=== Manaflow Simulation Harness ===\n");

    let mut results = Vec::new();

    // 0. Inputs
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(detail) => {
            println!("  ✗ config_load: {}", detail);
            std::process::exit(1);
        }
    };
    let map = match load_map(&args) {
        Ok(map) => map,
        Err(detail) => {
            println!("  ✗ map_load: {}", detail);
            std::process::exit(1);
        }
    };
    let layers = TerrainLayers::from_ascii(&map, GridCoord::ZERO);

    // 1. Grid construction
    results.extend(validate_grid(&layers, &config, args.verbose));

    // 2. Pending-delta bookkeeping
    results.extend(validate_mana_state(args.seed));

    // 3. Generation curve
    results.extend(validate_generation_curve(&config));

    // 4. Diffusion invariants
    results.extend(validate_diffusion(&layers, &config, args.seed));

    // 5. Full simulation run
    results.extend(validate_full_run(&layers, &config, &args));

    // 6. Tick control
    results.extend(validate_tick_control(&layers, &config));

    // 7. Persistence
    results.extend(validate_persistence(&layers, &config));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
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

fn load_config(args: &Args) -> Result<SimulationConfig, String> {
    match &args.config {
        Some(path) => SimulationConfig::from_file(path).map_err(|e| e.to_string()),
        None => Ok(SimulationConfig::builtin()),
    }
}

fn load_map(args: &Args) -> Result<String, String> {
    match &args.map {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read map {:?}: {}", path, e)),
        None => Ok(SAMPLE_MAP.to_string()),
    }
}

fn make_grid(layers: &TerrainLayers, config: &SimulationConfig) -> Option<WorldGrid> {
    WorldGrid::from_layers(layers, &config.grid_settings()).ok()
}

fn out_of_bounds_cells(grid: &WorldGrid) -> usize {
    grid.cells()
        .filter(|c| {
            let m = c.mana();
            m.current() < m.min() || m.current() > m.max()
        })
        .count()
}

/// A check that could not run counts as a failure
fn setup_failed(name: &str, detail: impl std::fmt::Display) -> TestResult {
    TestResult {
        name: name.into(),
        passed: false,
        detail: format!("setup failed: {}", detail),
    }
}

fn missing_grid() -> Vec<TestResult> {
    vec![TestResult {
        name: "grid_available".into(),
        passed: false,
        detail: "map has no ground tiles".into(),
    }]
}

// ── 1. Grid ─────────────────────────────────────────────────────────────

fn validate_grid(
    layers: &TerrainLayers,
    config: &SimulationConfig,
    verbose: bool,
) -> Vec<TestResult> {
    println!("--- Grid ---");
    let mut results = Vec::new();

    let Some(grid) = make_grid(layers, config) else {
        return missing_grid();
    };
    let (width, height) = grid.size();

    results.push(TestResult {
        name: "grid_cell_count".into(),
        passed: grid.len() == width * height,
        detail: format!("{}x{} grid, {} cells", width, height, grid.len()),
    });

    // Every cell's terrain matches direct resolution at its world coordinate
    let mismatched = grid
        .cells()
        .filter(|c| resolve_terrain(layers, c.coordinates()) != c.terrain())
        .count();
    results.push(TestResult {
        name: "grid_terrain_resolved".into(),
        passed: mismatched == 0,
        detail: format!("{} cells disagree with their tile layers", mismatched),
    });

    // Diffusivity follows the configured table
    let wrong_diffusivity = grid
        .cells()
        .filter(|c| c.diffusivity() != config.diffusivity.for_terrain(c.terrain()))
        .count();
    results.push(TestResult {
        name: "grid_diffusivity_table".into(),
        passed: wrong_diffusivity == 0,
        detail: format!("{} cells with unexpected diffusivity", wrong_diffusivity),
    });

    // Overlapping layers resolve Wall > ManaSource > Ground
    let mut overlap = TerrainLayers::new();
    let c = GridCoord::new(0, 0);
    overlap.insert(TerrainLayer::Ground, c);
    overlap.insert(TerrainLayer::ManaSource, c);
    let pool_over_ground = resolve_terrain(&overlap, c);
    overlap.insert(TerrainLayer::Wall, c);
    let wall_over_pool = resolve_terrain(&overlap, c);
    results.push(TestResult {
        name: "grid_layer_priority".into(),
        passed: pool_over_ground == TerrainKind::ManaSource && wall_over_pool == TerrainKind::Wall,
        detail: "wall > mana source > ground".into(),
    });

    // Degenerate sizes are refused
    let refused = build_grid(layers, 0, 4, GridCoord::ZERO, &GridSettings::default()).is_err()
        && build_grid(layers, 4, -1, GridCoord::ZERO, &GridSettings::default()).is_err();
    results.push(TestResult {
        name: "grid_rejects_bad_size".into(),
        passed: refused,
        detail: "0xN and Nx-1 grids refused".into(),
    });

    if verbose {
        let count = |kind: TerrainKind| grid.cells().filter(|c| c.terrain() == kind).count();
        println!("  Terrain distribution:");
        for (name, kind) in [
            ("empty", TerrainKind::Empty),
            ("ground", TerrainKind::Ground),
            ("wall", TerrainKind::Wall),
            ("pool", TerrainKind::ManaSource),
        ] {
            println!("    {:6}: {} cells", name, count(kind));
        }
    }

    results
}

// ── 2. Mana State ───────────────────────────────────────────────────────

fn validate_mana_state(seed: u64) -> Vec<TestResult> {
    println!("--- Mana State ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed);

    let deltas: Vec<f32> = (0..100).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let mut in_order = ManaState::default();
    in_order.initialize(50.0);
    let mut reversed = in_order;
    for d in &deltas {
        in_order.add_pending_change(*d);
    }
    for d in deltas.iter().rev() {
        reversed.add_pending_change(*d);
    }
    in_order.apply_pending_changes();
    reversed.apply_pending_changes();
    let diff = (in_order.current() - reversed.current()).abs();
    results.push(TestResult {
        name: "mana_pending_commutative".into(),
        passed: diff < 1e-4,
        detail: format!("forward vs reverse differ by {:.2e}", diff),
    });

    let mut clamped = ManaState::default();
    clamped.add_pending_change(1.0e6);
    clamped.apply_pending_changes();
    let high_ok = clamped.current() == clamped.max() && clamped.is_overcharged();
    clamped.add_pending_change(-1.0e7);
    clamped.apply_pending_changes();
    let low_ok = clamped.current() == clamped.min()
        && clamped.is_dormant(DEFAULT_DORMANT_THRESHOLD);
    results.push(TestResult {
        name: "mana_commit_clamps".into(),
        passed: high_ok && low_ok && clamped.pending() == 0.0,
        detail: "commit clamps into [min, max] and clears pending".into(),
    });

    results
}

// ── 3. Generation ───────────────────────────────────────────────────────

fn validate_generation_curve(config: &SimulationConfig) -> Vec<TestResult> {
    println!("--- Generation ---");
    let mut results = Vec::new();
    let generation = config.generation;

    let at_zero = generation_factor(0.0, generation.decay_threshold, generation.decay_sharpness);
    results.push(TestResult {
        name: "generation_full_when_empty".into(),
        passed: (at_zero - 1.0).abs() < 1e-6,
        detail: format!("factor(0) = {:.4}", at_zero),
    });

    let mut previous = at_zero;
    let mut rises = 0;
    for step in 1..=1000 {
        let factor = generation_factor(
            step as f32 * 0.25,
            generation.decay_threshold,
            generation.decay_sharpness,
        );
        if factor > previous + 1e-7 {
            rises += 1;
        }
        previous = factor;
    }
    results.push(TestResult {
        name: "generation_monotone".into(),
        passed: rises == 0,
        detail: format!("{} increases over 1000 samples", rises),
    });

    let far = generation_factor(1.0e6, generation.decay_threshold, generation.decay_sharpness);
    results.push(TestResult {
        name: "generation_tapers".into(),
        passed: generation.decay_threshold <= 0.0 || far < 0.5,
        detail: format!("factor(1e6) = {:.2e}", far),
    });

    results
}

// ── 4. Diffusion ────────────────────────────────────────────────────────

fn validate_diffusion(
    layers: &TerrainLayers,
    config: &SimulationConfig,
    seed: u64,
) -> Vec<TestResult> {
    println!("--- Diffusion ---");
    let mut results = Vec::new();

    // Three cells in a line, only the first holds mana
    let line_config = SimulationConfig {
        diffusion: DiffusionConfig {
            rate: 0.1,
            weights: DirectionWeights::uniform(1.0),
        },
        diffusivity: DiffusivityTable {
            empty: 1.0,
            ..config.diffusivity
        },
        ..*config
    };
    let line = build_grid(
        &|_: TerrainLayer, _: GridCoord| false,
        3,
        1,
        GridCoord::ZERO,
        &line_config.grid_settings(),
    );
    match (line, SimulationEngine::without_systems(line_config)) {
        (Ok(mut line), Ok(mut engine)) => {
            line.set_mana(0, 0, 10.0);
            engine.set_grid(line);
            engine.register_system(Box::new(DiffusionSystem::new(line_config.diffusion)));
            engine.force_tick();
            if let Some(grid) = engine.grid() {
                let m = |ix| grid.cell(ix, 0).map(|c| c.mana().current()).unwrap_or(f32::NAN);
                results.push(TestResult {
                    name: "diffusion_three_cell_line".into(),
                    passed: m(0) < 10.0
                        && m(1) > 0.0
                        && m(2) == 0.0
                        && (grid.total_mana() - 10.0).abs() < 1e-5,
                    detail: format!("[{:.3}, {:.3}, {:.3}]", m(0), m(1), m(2)),
                });
            }
        }
        (Err(e), _) => results.push(setup_failed("diffusion_three_cell_line", e)),
        (_, Err(e)) => results.push(setup_failed("diffusion_three_cell_line", e)),
    }

    // Conservation on the sample map with random initial mana
    let Some(mut grid) = make_grid(layers, config) else {
        results.extend(missing_grid());
        return results;
    };
    let mut rng = StdRng::seed_from_u64(seed);
    grid.randomize_mana(&mut rng, 0.0..config.mana_bounds.max);
    let initial = grid.total_mana();

    let mut engine = match SimulationEngine::without_systems(*config) {
        Ok(engine) => engine,
        Err(e) => {
            results.push(setup_failed("diffusion_conserves_mana", e));
            return results;
        }
    };
    engine.set_grid(grid);
    engine.register_system(Box::new(DiffusionSystem::new(config.diffusion)));

    let mut worst_drift: f32 = 0.0;
    let mut out_of_bounds = 0;
    for _ in 0..300 {
        engine.force_tick();
        if let Some(grid) = engine.grid() {
            worst_drift = worst_drift.max((grid.total_mana() - initial).abs());
            out_of_bounds += out_of_bounds_cells(grid);
        }
    }
    results.push(TestResult {
        name: "diffusion_conserves_mana".into(),
        passed: worst_drift <= initial * 1e-4,
        detail: format!("total {:.2}, worst drift {:.2e} over 300 ticks", initial, worst_drift),
    });
    results.push(TestResult {
        name: "diffusion_stays_in_bounds".into(),
        passed: out_of_bounds == 0,
        detail: format!("{} out-of-bounds cell observations", out_of_bounds),
    });

    results
}

// ── 5. Full Run ─────────────────────────────────────────────────────────

fn validate_full_run(
    layers: &TerrainLayers,
    config: &SimulationConfig,
    args: &Args,
) -> Vec<TestResult> {
    println!("--- Full Simulation ---");
    let mut results = Vec::new();

    let Some(grid) = make_grid(layers, config) else {
        return missing_grid();
    };
    let mut engine = match SimulationEngine::new(*config) {
        Ok(engine) => engine.with_grid(grid),
        Err(e) => {
            results.push(setup_failed("run_tick_rate", e));
            return results;
        }
    };
    engine.resume();

    let frame = 1.0 / 60.0;
    let mut ticks = 0u64;
    let mut out_of_bounds = 0;
    for _ in 0..args.frames {
        ticks += engine.update(frame) as u64;
        if let Some(grid) = engine.grid() {
            out_of_bounds += out_of_bounds_cells(grid);
        }
    }

    let seconds = args.frames as f64 * frame as f64;
    let expected = (seconds * config.ticks_per_second as f64).floor() as u64;
    results.push(TestResult {
        name: "run_tick_rate".into(),
        passed: ticks.abs_diff(expected) <= 1 && ticks == engine.tick_count(),
        detail: format!("{} ticks in {:.2}s (expected ~{})", ticks, seconds, expected),
    });
    results.push(TestResult {
        name: "run_stays_in_bounds".into(),
        passed: out_of_bounds == 0,
        detail: format!("{} out-of-bounds cell observations", out_of_bounds),
    });

    if let Some(grid) = engine.grid() {
        let sources = grid.cells().filter(|c| c.is_mana_source()).count();
        let generated = grid.total_mana();
        results.push(TestResult {
            name: "run_sources_generate".into(),
            passed: sources == 0 || ticks == 0 || generated > 0.0,
            detail: format!("{} pools produced {:.2} mana", sources, generated),
        });

        if args.verbose {
            let dormant = grid
                .cells()
                .filter(|c| c.mana().is_dormant(DEFAULT_DORMANT_THRESHOLD))
                .count();
            let overcharged = grid.cells().filter(|c| c.mana().is_overcharged()).count();
            println!(
                "  After {} ticks: total {:.2}, {} dormant, {} overcharged",
                ticks, generated, dormant, overcharged
            );
        }
    }

    results
}

// ── 6. Tick Control ─────────────────────────────────────────────────────

fn validate_tick_control(layers: &TerrainLayers, config: &SimulationConfig) -> Vec<TestResult> {
    println!("--- Tick Control ---");
    let mut results = Vec::new();

    let Some(grid) = make_grid(layers, config) else {
        return missing_grid();
    };
    let mut engine = match SimulationEngine::new(*config) {
        Ok(engine) => engine.with_grid(grid),
        Err(e) => {
            results.push(setup_failed("tick_pause_blocks", e));
            return results;
        }
    };
    engine.resume();

    let due = config.max_catch_up_ticks.min(config.ticks_per_second);
    let advance = due as f32 / config.ticks_per_second as f32;

    engine.pause();
    let while_paused = engine.update(advance);
    results.push(TestResult {
        name: "tick_pause_blocks".into(),
        passed: while_paused == 0 && engine.tick_count() == 0,
        detail: format!("{} ticks while paused", while_paused),
    });

    engine.resume();
    let after_resume = engine.update(advance);
    results.push(TestResult {
        name: "tick_resume_catches_up".into(),
        passed: after_resume.abs_diff(due) <= 1,
        detail: format!("{} ticks after resume (expected {})", after_resume, due),
    });

    engine.toggle_pause();
    let forced = engine.force_tick();
    results.push(TestResult {
        name: "tick_force_while_paused".into(),
        passed: forced && engine.is_paused(),
        detail: format!("tick count now {}", engine.tick_count()),
    });

    let stall = engine_after_stall(layers, config);
    results.push(TestResult {
        name: "tick_catch_up_capped".into(),
        passed: stall == config.max_catch_up_ticks,
        detail: format!(
            "{} ticks after a 60s stall (cap {})",
            stall, config.max_catch_up_ticks
        ),
    });

    results
}

fn engine_after_stall(layers: &TerrainLayers, config: &SimulationConfig) -> u32 {
    let running = SimulationConfig {
        start_paused: false,
        ..*config
    };
    match (make_grid(layers, &running), SimulationEngine::new(running)) {
        (Some(grid), Ok(engine)) => engine.with_grid(grid).update(60.0),
        _ => 0,
    }
}

// ── 7. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(layers: &TerrainLayers, config: &SimulationConfig) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let Some(grid) = make_grid(layers, config) else {
        return missing_grid();
    };
    let (mut engine, mut restored) =
        match (SimulationEngine::new(*config), SimulationEngine::new(*config)) {
            (Ok(engine), Ok(restored)) => (engine.with_grid(grid), restored),
            (Err(e), _) | (_, Err(e)) => {
                results.push(setup_failed("save_load_roundtrip", e));
                return results;
            }
        };
    for _ in 0..25 {
        engine.force_tick();
    }

    let mut buffer = Vec::new();
    let roundtrip = engine
        .save(&mut buffer)
        .and_then(|_| restored.load(&buffer[..]));
    let matches = roundtrip.is_ok()
        && restored.grid() == engine.grid()
        && restored.tick_count() == engine.tick_count();
    results.push(TestResult {
        name: "save_load_roundtrip".into(),
        passed: matches,
        detail: match roundtrip {
            Ok(()) => format!("{} bytes", buffer.len()),
            Err(e) => e.to_string(),
        },
    });

    results
}
