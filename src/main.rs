use std::path::PathBuf;

use anyhow::{Context, Error};
use curricycler::{
    config::CurriculumConfig, readout, sc2::Sc2Runner, CurriculumController, JsonFileStore,
    TrainingSession,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Train a StarCraft II bot against a ladder of built-in AI difficulties

USAGE:
  curricycler [OPTIONS]

OPTIONS:
  --config     PATH        JSON config file                 [default: built-in reference values]
  --stats      PATH        Stats document holding progress  [default: env CURRICULUM_STATS_PATH or data/training_stats.json]
  --max-games  N           Stop after N games, 0 = never    [default: env MAX_GAMES or 0]
  --map        NAME        Play only this map

FLAGS:
  --status                 Print current progress as JSON and exit
  --realtime               Run games at normal speed
  -h, --help               Print help information

ENVIRONMENT:
  RUST_LOG                 Log filter (e.g. debug)
  CURRICULUM_MAPS          Comma-separated map pool
  CURRICULUM_REPLAY_DIR    Save a replay of every game here
";

struct Args {
    config: Option<PathBuf>,
    stats: Option<PathBuf>,
    max_games: Option<u64>,
    map: Option<String>,
    status: bool,
    realtime: bool,
}

fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let args = Args {
        config: pargs.opt_value_from_str("--config")?,
        stats: pargs.opt_value_from_str("--stats")?,
        max_games: pargs.opt_value_from_str("--max-games")?,
        map: pargs.opt_value_from_str("--map")?,
        status: pargs.contains("--status"),
        realtime: pargs.contains("--realtime"),
    };

    let mut config = match &args.config {
        Some(path) => CurriculumConfig::from_file(path)?,
        None => CurriculumConfig::default(),
    };
    config.apply_env()?;
    if let Some(stats) = args.stats {
        config.stats_path = stats;
    }
    if let Some(max_games) = args.max_games {
        config.session.max_games = max_games;
    }
    if let Some(map) = args.map {
        config.game.maps = vec![map];
    }
    config.game.realtime |= args.realtime;
    config.validate()?;

    let store = JsonFileStore::new(&config.stats_path, config.retry_policy());
    let controller = CurriculumController::new(config.ladder()?, config.thresholds, store);

    if args.status {
        let snapshot = serde_json::to_string_pretty(&controller.progress())
            .context("rendering progress")?;
        println!("{snapshot}");
        return Ok(());
    }

    println!("{}", readout::render_progress(&controller.progress(), None));
    info!("Progress is kept in {}", config.stats_path.display());

    let runner = Sc2Runner {
        maps: config.game.maps.clone(),
        opponent_races: config.opponent_races()?,
        bot_race: config.bot_race()?,
        realtime: config.game.realtime,
        replay_dir: config.game.replay_dir.clone(),
    };
    let mut session = TrainingSession::new(
        controller,
        runner,
        config.recent_window(),
        config.session_limits(),
    );
    let stats = session.run()?;

    println!(
        "{}",
        readout::render_progress(&session.controller().progress(), Some(&stats))
    );
    Ok(())
}
