use clap::{Args, Parser, Subcommand};
use gitfit_core::gate::{self, GateStatus};
use gitfit_core::state::load_or_init;
use gitfit_core::*;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gitfit")]
#[command(about = "Workout rotation prompter with spoken countdowns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (JSON, or TOML when it ends in .toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick, time and log the next exercise (default)
    Now(NowArgs),

    /// Show the rotation, last session and whether a session may start
    Status,

    /// Show logged sets, newest first
    History {
        /// Number of rows to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only show this exercise
        #[arg(long)]
        exercise: Option<String>,
    },

    /// Start a new cycle with every category and exercise remaining
    Reset,
}

#[derive(Args, Default)]
struct NowArgs {
    /// Start with this category
    #[arg(long)]
    category: Option<String>,

    /// Show the selection without prompting or logging
    #[arg(long)]
    dry_run: bool,

    /// Ignore cooldown and workout hours
    #[arg(long)]
    force: bool,

    /// Skip the timed countdown
    #[arg(long)]
    no_timer: bool,

    /// Echo cues without speaking them
    #[arg(long)]
    quiet: bool,
}

/// Files under the data directory
struct DataPaths {
    state: PathBuf,
    log: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        Self {
            state: data_dir.join("state.json"),
            log: data_dir.join("log.csv"),
        }
    }
}

fn main() -> Result<()> {
    gitfit_core::logging::init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    let paths = DataPaths::new(&data_dir);

    match cli.command {
        Some(Commands::Now(args)) => cmd_now(&config, &paths, args),
        Some(Commands::Status) => cmd_status(&config, &paths),
        Some(Commands::History { limit, exercise }) => cmd_history(&paths, limit, exercise),
        Some(Commands::Reset) => cmd_reset(&config, &paths),
        None => cmd_now(&config, &paths, NowArgs::default()),
    }
}

fn cmd_now(config: &Config, paths: &DataPaths, args: NowArgs) -> Result<()> {
    let mut store = JsonStateStore::new(&paths.state);
    let mut log = CsvSetLog::new(&paths.log);
    let mut announcer = SpeechAnnouncer::stdout(config.speech && !args.quiet);
    let mut pacer = ThreadPacer;
    let mut rng = rand::thread_rng();

    let mut session = Session::new(
        config,
        Collaborators {
            store: &mut store,
            log: &mut log,
            announcer: &mut announcer,
            pacer: &mut pacer,
            rng: &mut rng,
        },
    )?;

    let options = SessionOptions {
        force: args.force,
        dry_run: args.dry_run,
        timer: !args.no_timer,
        category: args.category,
    };

    let outcome = session.run(
        &options,
        chrono::Local::now(),
        &mut io::stdin().lock(),
        &mut io::stdout(),
    )?;
    tracing::debug!("Session finished: {:?}", outcome);

    Ok(())
}

fn cmd_status(config: &Config, paths: &DataPaths) -> Result<()> {
    let store = JsonStateStore::new(&paths.state);
    let state = load_or_init(&store, config)?;
    let now = chrono::Local::now();

    println!("Routine: {}", config.routine);
    match state.last_executed {
        Some(last) => println!("Last session: {}", last.format("%Y-%m-%d %H:%M")),
        None => println!("Last session: never"),
    }

    match gate::evaluate(config, &state, now) {
        GateStatus::Open => println!("Ready: a session can start now"),
        GateStatus::Cooldown { remaining } => {
            println!("Cooldown: next session in {}", gate::format_wait(remaining))
        }
        GateStatus::OffHours { .. } => println!(
            "Off hours: workouts run {:02}:00-{:02}:00",
            config.workout_hours.start, config.workout_hours.end
        ),
    }

    println!();
    println!(
        "Remaining categories: {}",
        list_or_none(&state.remaining_categories)
    );
    for category in config.categories.iter() {
        println!(
            "  {}: {}",
            category.name,
            list_or_none(state.exercises_remaining(&category.name))
        );
    }

    Ok(())
}

fn cmd_history(paths: &DataPaths, limit: usize, exercise: Option<String>) -> Result<()> {
    let log = CsvSetLog::new(&paths.log);
    let entries: Vec<_> = log
        .entries()?
        .into_iter()
        .filter(|e| exercise.as_deref().map_or(true, |name| e.exercise == name))
        .take(limit)
        .collect();

    if entries.is_empty() {
        println!("No sets logged yet.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<12} {:<20} {:>4}",
            entry.timestamp.format(LOG_TIMESTAMP_FORMAT),
            entry.category,
            entry.exercise,
            entry.reps
        );
    }

    Ok(())
}

fn cmd_reset(config: &Config, paths: &DataPaths) -> Result<()> {
    let mut store = JsonStateStore::new(&paths.state);
    let previous = load_or_init(&store, config)?;

    let state = RotationState {
        last_executed: previous.last_executed,
        ..RotationState::fresh(config)
    };
    store.save(&state)?;

    println!(
        "✓ Rotation reset: {} categories remaining",
        state.remaining_categories.len()
    );
    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
