//! ai-path CLI - grid path following driver.
//!
//! - `ai-path run` - follow a path across a text map with a simulated agent
//! - `ai-path query` - one-shot path queries between two cells

mod map;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use ai_nav::NavGrid;
use ai_path::query;
use ai_path::{
    GridPathService, Mover, PathCallbacks, PathConfig, RetryingPathController, TickSignal, Vec3,
    Waypoint, WaypointAction,
};

#[derive(Parser)]
#[command(name = "ai-path")]
#[command(about = "Grid path following driver", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a path and follow it with a simulated agent
    Run {
        #[command(flatten)]
        route: RouteArgs,

        /// Block a cell at a given tick, as `x,y@tick` (repeatable)
        #[arg(long = "block", value_parser = parse_block)]
        blocks: Vec<BlockAt>,

        /// Number of ticks to simulate
        #[arg(long, default_value_t = 600)]
        ticks: u64,

        /// Wall-clock milliseconds per tick
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,

        /// Agent speed in world units per second
        #[arg(long, default_value_t = 4.0)]
        speed: f32,

        /// Override the configured waypoint reach distance
        #[arg(long)]
        reached: Option<f32>,
    },

    /// Report whether a path exists and what it costs
    Query {
        #[command(flatten)]
        route: RouteArgs,
    },
}

#[derive(Args)]
struct RouteArgs {
    /// Text map file
    #[arg(short, long)]
    map: PathBuf,

    /// Path configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World size of one map cell
    #[arg(long, default_value_t = 1.0)]
    cell_size: f32,

    /// Start cell, as `x,y`
    #[arg(long, value_parser = parse_cell)]
    from: (i32, i32),

    /// Destination cell, as `x,y`
    #[arg(long, value_parser = parse_cell)]
    to: (i32, i32),
}

#[derive(Debug, Clone, Copy)]
struct BlockAt {
    x: i32,
    y: i32,
    tick: u64,
}

fn parse_cell(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok((x, y))
}

fn parse_block(s: &str) -> Result<BlockAt, String> {
    let (cell, tick) = s
        .split_once('@')
        .ok_or_else(|| format!("expected `x,y@tick`, got `{s}`"))?;
    let (x, y) = parse_cell(cell)?;
    let tick = tick
        .trim()
        .parse()
        .map_err(|e| format!("bad tick in `{s}`: {e}"))?;
    Ok(BlockAt { x, y, tick })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run {
            route,
            blocks,
            ticks,
            tick_ms,
            speed,
            reached,
        } => run_simulation(&route, &blocks, ticks, tick_ms, speed, reached).await,
        Commands::Query { route } => run_query(&route).await,
    }
}

struct Scenario {
    config: PathConfig,
    service: GridPathService,
    from: Vec3,
    to: Vec3,
}

impl RouteArgs {
    fn load(&self) -> Result<Scenario> {
        let config = match &self.config {
            Some(path) => PathConfig::load(path)?,
            None => PathConfig::default(),
        };
        let grid = map::load(&self.map, self.cell_size)?;
        let from = cell_point(&grid, self.from)?;
        let to = cell_point(&grid, self.to)?;
        tracing::info!(
            map = %self.map.display(),
            width = grid.width(),
            height = grid.height(),
            "Loaded map"
        );
        Ok(Scenario {
            config,
            service: GridPathService::new(grid),
            from,
            to,
        })
    }
}

fn cell_point(grid: &NavGrid, (x, y): (i32, i32)) -> Result<Vec3> {
    if x < 0 || y < 0 || x >= grid.width() as i32 || y >= grid.height() as i32 {
        bail!(
            "cell ({x}, {y}) is outside the {}x{} map",
            grid.width(),
            grid.height()
        );
    }
    Ok(grid.cell_center(x, y))
}

async fn run_simulation(
    route: &RouteArgs,
    blocks: &[BlockAt],
    tick_count: u64,
    tick_ms: u64,
    speed: f32,
    reached: Option<f32>,
) -> Result<()> {
    let Scenario {
        config,
        service,
        from,
        to,
    } = route.load()?;
    let reached_distance = reached.unwrap_or(config.reached_distance);

    let callbacks = PathCallbacks::new()
        .on_state_changed(|old, new| tracing::debug!(from = ?old, to = ?new, "State changed"))
        .on_waypoint_reached(|waypoint, index| {
            tracing::info!(
                index,
                x = waypoint.position.x,
                y = waypoint.position.y,
                z = waypoint.position.z,
                "Waypoint reached"
            )
        })
        .on_path_completed(|| tracing::info!("Path completed"))
        .on_path_failed(|reason| tracing::warn!(%reason, "Path failed"))
        .on_path_blocked(|| tracing::warn!("Path blocked, recomputing"));

    let ticks = TickSignal::new();
    let controller = RetryingPathController::new(
        &service,
        config.options.clone(),
        callbacks,
        config.retry_config(),
        ticks.clone(),
    );

    let status = controller.compute(from, to).await?;
    if !status.is_success() {
        println!("No path: {status}");
        controller.destroy();
        return Ok(());
    }
    if let Some(waypoints) = controller.waypoints() {
        print_waypoints(&waypoints);
    }
    println!("Distance: {:.2}", controller.distance());

    let mover = Arc::new(SimMover::new(from, speed));
    controller.start_following(mover.clone(), reached_distance);

    let dt = Duration::from_millis(tick_ms.max(1));
    let mut interval = tokio::time::interval(dt);
    let mut elapsed = 0;
    for tick in 0..tick_count {
        interval.tick().await;
        elapsed = tick + 1;

        for block in blocks.iter().filter(|b| b.tick == tick) {
            let notified = service.set_blocked(block.x, block.y, true);
            tracing::info!(x = block.x, y = block.y, notified, "Cell blocked");
        }

        mover.step(dt.as_secs_f32());
        ticks.emit(dt.as_secs_f32());

        if controller.state().is_terminal() {
            break;
        }
    }

    let position = mover.position();
    println!();
    println!("Outcome: {:?} after {elapsed} ticks", controller.state());
    println!(
        "Agent at ({:.2}, {:.2}, {:.2}), {} jumps",
        position.x,
        position.y,
        position.z,
        mover.jumps()
    );
    println!(
        "Retries used: {}/{}",
        controller.retry_attempts(),
        controller.max_retries()
    );

    controller.destroy();
    Ok(())
}

async fn run_query(route: &RouteArgs) -> Result<()> {
    let Scenario {
        config,
        service,
        from,
        to,
    } = route.load()?;
    let options = query::validate_options(Some(config.options));

    let straight = query::straight_line_distance(from, to);
    let exists = query::path_exists(&service, from, to, &options).await;

    println!("Path exists: {exists}");
    println!("Straight-line distance: {straight:.2}");
    println!(
        "Line of sight: {}",
        query::has_line_of_sight(&service, from, to)
    );
    println!(
        "Performance impact: {:?}",
        query::estimate_performance_impact(straight, &options)
    );

    if let Some(distance) = query::path_distance(&service, from, to, &options).await {
        println!("Path distance: {distance:.2}");
    }
    if let Some(waypoints) = query::path_waypoints(&service, from, to, &options).await {
        let simplified = query::simplify_waypoints(&waypoints, 0.01);
        print_waypoints(&simplified);
    }
    Ok(())
}

fn print_waypoints(waypoints: &[Waypoint]) {
    println!("Waypoints: {}", waypoints.len());
    for (i, waypoint) in waypoints.iter().enumerate() {
        let p = waypoint.position;
        let action = match waypoint.action {
            WaypointAction::Walk => "",
            WaypointAction::Jump => " (jump)",
        };
        println!("  {i:>3}: ({:.2}, {:.2}, {:.2}){action}", p.x, p.y, p.z);
    }
}

/// Agent that moves toward its target at constant speed, one step per tick.
struct SimMover {
    speed: f32,
    state: Mutex<SimState>,
}

struct SimState {
    position: Vec3,
    target: Option<Vec3>,
    jumps: u32,
}

impl SimMover {
    fn new(position: Vec3, speed: f32) -> Self {
        Self {
            speed,
            state: Mutex::new(SimState {
                position,
                target: None,
                jumps: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn step(&self, dt: f32) {
        let mut state = self.state();
        let Some(target) = state.target else {
            return;
        };
        let offset = target - state.position;
        let reach = self.speed * dt;
        if offset.length() <= reach {
            state.position = target;
            state.target = None;
        } else {
            state.position += offset.normalize_or_zero() * reach;
        }
    }

    fn jumps(&self) -> u32 {
        self.state().jumps
    }
}

impl Mover for SimMover {
    fn move_to(&self, target: Vec3) {
        self.state().target = Some(target);
    }

    fn jump(&self) {
        self.state().jumps += 1;
        tracing::debug!("Agent jumped");
    }

    fn position(&self) -> Vec3 {
        self.state().position
    }
}
