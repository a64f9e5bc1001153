//! Simulation engine - fixed-rate tick orchestration over the world grid

use crate::components::GridCoord;
use crate::config::{ConfigError, SimulationConfig};
use crate::grid::{build_grid, GridError, TerrainSource, WorldGrid};
use crate::systems::{DiffusionSystem, GenerationSystem, TickSystem};

/// Slack when comparing the tick timer against the interval, so that an
/// exact multiple of the interval is not lost to rounding
const TIMER_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// Main simulation engine
pub struct SimulationEngine {
    grid: Option<WorldGrid>,
    /// Compute-phase systems in execution order
    systems: Vec<Box<dyn TickSystem>>,
    config: SimulationConfig,
    state: RunState,

    // Tick timing
    timer: f64,
    tick_interval: f64,
    tick_count: u64,
}

impl SimulationEngine {
    /// Create an engine with the built-in generation and diffusion systems
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let systems: Vec<Box<dyn TickSystem>> = vec![
            Box::new(GenerationSystem::new(config.generation)),
            Box::new(DiffusionSystem::new(config.diffusion)),
        ];
        Ok(Self {
            grid: None,
            systems,
            state: if config.start_paused {
                RunState::Paused
            } else {
                RunState::Running
            },
            timer: 0.0,
            tick_interval: config.tick_interval(),
            tick_count: 0,
            config,
        })
    }

    /// Create an engine with no systems registered
    pub fn without_systems(config: SimulationConfig) -> Result<Self, ConfigError> {
        let mut engine = Self::new(config)?;
        engine.systems.clear();
        Ok(engine)
    }

    pub fn with_grid(mut self, grid: WorldGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Append a system; it runs after those already registered
    pub fn register_system(&mut self, system: Box<dyn TickSystem>) {
        self.systems.push(system);
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Resolve terrain and replace the grid. On error the engine is left without a grid.
    pub fn build_grid<S: TerrainSource + ?Sized>(
        &mut self,
        source: &S,
        width: i32,
        height: i32,
        origin: GridCoord,
    ) -> Result<(), GridError> {
        self.grid = None;
        let grid = build_grid(source, width, height, origin, &self.config.grid_settings())?;
        self.grid = Some(grid);
        Ok(())
    }

    pub fn set_grid(&mut self, grid: WorldGrid) {
        self.grid = Some(grid);
    }

    pub fn take_grid(&mut self) -> Option<WorldGrid> {
        self.grid.take()
    }

    /// Read-only view of the grid, if one has been built
    pub fn grid(&self) -> Option<&WorldGrid> {
        self.grid.as_ref()
    }

    /// Mutable grid access for seeding mana between ticks
    pub fn grid_mut(&mut self) -> Option<&mut WorldGrid> {
        self.grid.as_mut()
    }

    /// Advance the tick timer by `delta_seconds` and run every tick that
    /// became due. Returns the number of ticks run.
    pub fn update(&mut self, delta_seconds: f32) -> u32 {
        if self.state == RunState::Paused || self.grid.is_none() {
            return 0;
        }

        let delta = delta_seconds as f64;
        if !delta.is_finite() {
            log::warn!("Ignoring non-finite frame delta {}", delta_seconds);
            return 0;
        }
        self.timer += delta.max(0.0);

        let mut ticks = 0;
        while self.timer + TIMER_EPSILON >= self.tick_interval {
            if ticks >= self.config.max_catch_up_ticks {
                let dropped = (self.timer / self.tick_interval) as u64;
                log::debug!(
                    "Catch-up limit of {} ticks reached, dropping {} ticks of backlog",
                    self.config.max_catch_up_ticks,
                    dropped
                );
                self.timer %= self.tick_interval;
                break;
            }
            self.timer = (self.timer - self.tick_interval).max(0.0);
            if self.handle_tick() {
                ticks += 1;
            }
        }
        ticks
    }

    /// Run one tick: every system computes, then every cell commits.
    /// Returns false, changing nothing, when there is no grid.
    pub fn handle_tick(&mut self) -> bool {
        let Some(grid) = self.grid.as_mut() else {
            log::debug!("Tick skipped: no grid");
            return false;
        };

        for system in &self.systems {
            system.compute(grid);
        }
        grid.commit_pending();

        self.tick_count += 1;
        true
    }

    /// Run one tick immediately, ignoring the timer and pause state
    pub fn force_tick(&mut self) -> bool {
        log::info!("Forcing simulation tick {}", self.tick_count + 1);
        self.handle_tick()
    }

    pub fn pause(&mut self) {
        self.state = RunState::Paused;
        log::info!("Simulation paused");
    }

    pub fn resume(&mut self) {
        self.state = RunState::Running;
        log::info!("Simulation resumed");
    }

    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
        };
        log::info!(
            "Simulation {}",
            if self.is_paused() { "paused" } else { "resumed" }
        );
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Number of ticks committed since creation (or since the last load)
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_interval(&self) -> f64 {
        self.tick_interval
    }

    pub fn set_ticks_per_second(&mut self, ticks_per_second: u32) -> Result<(), ConfigError> {
        let config = SimulationConfig {
            ticks_per_second,
            ..self.config
        };
        self.apply_config(config)
    }

    /// Validate and adopt a new config. Material settings only affect grids built afterwards.
    pub fn apply_config(&mut self, config: SimulationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.tick_interval = config.tick_interval();
        for system in &mut self.systems {
            system.configure(&config);
        }
        self.config = config;
        Ok(())
    }

    /// Save grid and tick count to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        match &self.grid {
            Some(grid) => crate::persistence::save_simulation(writer, grid, self.tick_count),
            None => Err(crate::persistence::SaveError::NoGrid),
        }
    }

    /// Load grid and tick count from a reader, resetting the tick timer
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), crate::persistence::SaveError> {
        let loaded = crate::persistence::load_simulation(reader)?;
        self.grid = Some(loaded.grid);
        self.tick_count = loaded.tick_count;
        self.timer = 0.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::TerrainLayer;
    use crate::grid::{GridSettings, TerrainLayers};
    use std::cell::Cell as CountCell;
    use std::rc::Rc;

    fn four_tps() -> SimulationConfig {
        SimulationConfig {
            ticks_per_second: 4,
            ..Default::default()
        }
    }

    fn engine_with_grid(config: SimulationConfig) -> SimulationEngine {
        let layers = TerrainLayers::from_ascii("~...\n....", GridCoord::ZERO);
        let grid = WorldGrid::from_layers(&layers, &config.grid_settings()).unwrap();
        SimulationEngine::new(config).unwrap().with_grid(grid)
    }

    struct CountingSystem {
        calls: Rc<CountCell<u32>>,
    }

    impl TickSystem for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn compute(&self, _grid: &mut WorldGrid) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::new(SimulationConfig::default()).unwrap();
        assert!(engine.grid().is_none());
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.run_state(), RunState::Running);
        assert_eq!(engine.system_names(), vec!["generation", "diffusion"]);
    }

    #[test]
    fn test_start_paused() {
        let config = SimulationConfig {
            start_paused: true,
            ..Default::default()
        };
        let engine = SimulationEngine::new(config).unwrap();
        assert!(engine.is_paused());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig {
            ticks_per_second: 0,
            ..Default::default()
        };
        assert!(SimulationEngine::new(config).is_err());
    }

    #[test]
    fn test_update_runs_due_ticks() {
        let mut engine = engine_with_grid(four_tps());
        assert_eq!(engine.update(0.1), 0);
        assert_eq!(engine.update(0.15), 1);
        assert_eq!(engine.update(0.5), 2);
        assert_eq!(engine.tick_count(), 3);
    }

    #[test]
    fn test_update_without_grid_is_noop() {
        let mut engine = SimulationEngine::new(four_tps()).unwrap();
        assert_eq!(engine.update(10.0), 0);
        assert!(!engine.handle_tick());
        assert!(!engine.force_tick());
        assert_eq!(engine.tick_count(), 0);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let config = SimulationConfig {
            max_catch_up_ticks: 3,
            ..four_tps()
        };
        let mut engine = engine_with_grid(config);
        assert_eq!(engine.update(10.0), 3);
        // Backlog was discarded, not deferred
        assert_eq!(engine.update(0.0), 0);
        assert_eq!(engine.update(0.25), 1);
    }

    #[test]
    fn test_non_finite_delta_is_ignored() {
        let mut engine = engine_with_grid(four_tps());
        assert_eq!(engine.update(f32::INFINITY), 0);
        assert_eq!(engine.update(f32::NAN), 0);
        assert_eq!(engine.update(f32::NEG_INFINITY), 0);
        assert_eq!(engine.tick_count(), 0);

        // The timer is intact afterwards
        assert_eq!(engine.update(1.0), 4);
        let mut later = 0;
        for _ in 0..10 {
            later += engine.update(1.0);
        }
        assert_eq!(later, 40);
    }

    #[test]
    fn test_pause_blocks_ticks() {
        let mut engine = engine_with_grid(four_tps());
        engine.pause();
        assert_eq!(engine.update(1.0), 0);
        engine.resume();
        assert_eq!(engine.update(1.0), 4);
    }

    #[test]
    fn test_toggle() {
        let mut engine = engine_with_grid(four_tps());
        engine.toggle_pause();
        assert!(engine.is_paused());
        engine.toggle_pause();
        assert_eq!(engine.run_state(), RunState::Running);
    }

    #[test]
    fn test_force_tick_ignores_pause() {
        let mut engine = engine_with_grid(four_tps());
        engine.pause();
        assert!(engine.force_tick());
        assert_eq!(engine.tick_count(), 1);
        let source = engine.grid().unwrap().cell(0, 0).unwrap();
        assert!(source.mana().current() > 0.0);
    }

    #[test]
    fn test_systems_run_in_order_once_per_tick() {
        let calls = Rc::new(CountCell::new(0));
        let mut engine = engine_with_grid(four_tps());
        engine.register_system(Box::new(CountingSystem {
            calls: Rc::clone(&calls),
        }));
        assert_eq!(engine.system_names(), vec!["generation", "diffusion", "counting"]);

        engine.update(0.75);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_generation_visible_to_diffusion_next_tick_only() {
        // A lone source next to an empty cell: the first tick's generated
        // mana must not diffuse within the same tick
        let layers = TerrainLayers::from_ascii("~.", GridCoord::ZERO);
        let config = SimulationConfig {
            diffusivity: crate::components::DiffusivityTable {
                ground: 1.0,
                ..Default::default()
            },
            ..four_tps()
        };
        let grid = WorldGrid::from_layers(&layers, &config.grid_settings()).unwrap();
        let mut engine = SimulationEngine::new(config).unwrap().with_grid(grid);

        engine.force_tick();
        let grid = engine.grid().unwrap();
        assert!((grid.cell(0, 0).unwrap().mana().current() - 10.0).abs() < 1e-5);
        assert_eq!(grid.cell(1, 0).unwrap().mana().current(), 0.0);

        engine.force_tick();
        assert!(engine.grid().unwrap().cell(1, 0).unwrap().mana().current() > 0.0);
    }

    #[test]
    fn test_build_grid_failure_leaves_no_grid() {
        let mut engine = engine_with_grid(four_tps());
        let source = |_: TerrainLayer, _: GridCoord| false;
        assert!(engine.build_grid(&source, 0, 3, GridCoord::ZERO).is_err());
        assert!(engine.grid().is_none());
        assert_eq!(engine.update(1.0), 0);

        engine.build_grid(&source, 3, 3, GridCoord::new(2, 2)).unwrap();
        assert_eq!(engine.grid().unwrap().origin(), GridCoord::new(2, 2));
    }

    #[test]
    fn test_apply_config_reaches_systems() {
        let mut engine = engine_with_grid(four_tps());
        let mut config = *engine.config();
        config.generation.base_rate = 0.0;
        engine.apply_config(config).unwrap();

        engine.force_tick();
        assert_eq!(engine.grid().unwrap().total_mana(), 0.0);
    }

    #[test]
    fn test_set_ticks_per_second() {
        let mut engine = engine_with_grid(four_tps());
        engine.set_ticks_per_second(2).unwrap();
        assert_eq!(engine.tick_interval(), 0.5);
        assert_eq!(engine.update(1.0), 2);
        assert!(engine.set_ticks_per_second(0).is_err());
        assert_eq!(engine.tick_interval(), 0.5);
    }

    #[test]
    fn test_grid_settings_from_config() {
        let config = SimulationConfig {
            diffusivity: crate::components::DiffusivityTable::blocking_walls(),
            ..four_tps()
        };
        let mut engine = SimulationEngine::new(config).unwrap();
        let source = |layer: TerrainLayer, _: GridCoord| layer == TerrainLayer::Wall;
        engine.build_grid(&source, 2, 2, GridCoord::ZERO).unwrap();
        assert!(engine.grid().unwrap().cells().all(|c| c.is_mana_blocked()));
        assert_eq!(GridSettings::default().diffusivity.wall, 1.0);
    }
}
