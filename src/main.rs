//! Clutch-time analysis CLI
//!
//! Rebuilds game-state tables from play-by-play files, filters the clutch
//! window, and runs the hypothesis battery.

use clap::{Parser, Subcommand};
use clutch::{Config, Result};

#[derive(Parser)]
#[command(name = "clutch")]
#[command(about = "NBA clutch-time game-state reconstruction and hypothesis testing", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default config file and data directories
    Init,
    /// Build game-state tables from raw play-by-play files
    Build {
        /// Process at most this many games
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the clutch-window subset of stored tables
    Clutch {
        /// Restrict to a single game id
        #[arg(long)]
        game: Option<String>,
    },
    /// Run the hypothesis battery over the clutch window
    Analyze {
        /// Write the report to this file as well as stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Show database status
    Status,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Build { limit } => commands::build(&config, limit),
        Commands::Clutch { game } => commands::clutch(&config, game),
        Commands::Analyze { output } => commands::analyze(&config, output),
        Commands::Status => commands::status(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use clutch::data::ingest;
    use clutch::data::Database;
    use clutch::engine::table::{DataQualityFlags, GameBuildResult};
    use clutch::engine::{select_clutch, GameStateTable, TableBuilder};
    use clutch::stats::{report, run_battery};
    use std::path::Path;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all(&config.data.raw_dir)?;
        std::fs::create_dir_all(&config.data.boxscore_dir)?;
        println!(
            "Created {} and {} directories",
            config.data.raw_dir, config.data.boxscore_dir
        );

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!(
            "  2. Drop playbyplay_<game_id>.json files into {}",
            config.data.raw_dir
        );
        println!("  3. Run 'clutch build' to reconstruct game-state tables");
        println!("  4. Run 'clutch analyze' to run the hypothesis battery");

        Ok(())
    }

    pub fn build(config: &Config, limit: Option<usize>) -> Result<()> {
        let report = ingest::load_game_inputs(
            Path::new(&config.data.raw_dir),
            Path::new(&config.data.boxscore_dir),
        )?;
        let mut inputs = report.inputs;
        if let Some(limit) = limit {
            inputs.truncate(limit);
        }
        if inputs.is_empty() && report.unreadable.is_empty() {
            println!("No play-by-play files found in {}", config.data.raw_dir);
            return Ok(());
        }

        println!("Building game-state tables for {} games...", inputs.len());
        let builder = TableBuilder::new(&config.engine);
        let outcome = builder.build_batch(inputs);

        let mut db = Database::open(&config.data.database_path)?;
        let unreadable = report.unreadable.len();
        for (game_id, error) in report.unreadable {
            let failed = GameBuildResult::Failed { game_id, error };
            db.store_result(&failed)?;
            println!(
                "  {}: {} (unreadable file)",
                failed.game_id(),
                failed.status_label()
            );
        }
        for result in &outcome.results {
            db.store_result(result)?;
            let flags = result
                .table()
                .map(|t| format_flags(t.flags()))
                .unwrap_or_default();
            println!("  {}: {}{}", result.game_id(), result.status_label(), flags);
        }

        println!(
            "\nDone: {} success, {} partial, {} failed",
            outcome.succeeded(),
            outcome.partial(),
            outcome.failed() + unreadable
        );
        Ok(())
    }

    pub fn clutch(config: &Config, game: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        let games = match game {
            Some(id) => vec![(clutch::GameId(id), String::new())],
            None => db.list_games()?,
        };

        let mut total_events = 0usize;
        let mut total_clutch = 0usize;
        for (game_id, _) in games {
            let table = match db.load_table(&game_id)? {
                Some(table) => table,
                None => {
                    println!("  {}: no usable table", game_id);
                    continue;
                }
            };
            let window = select_clutch(
                &table,
                config.engine.regulation_period_count,
                config.engine.clutch_window_seconds,
            );
            println!(
                "  {}: {} of {} events in the clutch window, final diff {:+}",
                game_id,
                window.len(),
                table.len(),
                table.final_score_diff()
            );
            total_events += table.len();
            total_clutch += window.len();
        }

        println!("\nTotal: {} clutch events of {}", total_clutch, total_events);
        Ok(())
    }

    pub fn analyze(config: &Config, output: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        let mut clutch_tables: Vec<GameStateTable> = Vec::new();
        for (game_id, _) in db.list_games()? {
            if let Some(table) = db.load_table(&game_id)? {
                clutch_tables.push(select_clutch(
                    &table,
                    config.engine.regulation_period_count,
                    config.engine.clutch_window_seconds,
                ));
            }
        }
        if clutch_tables.is_empty() {
            println!("No tables available. Run 'clutch build' first.");
            return Ok(());
        }

        let refs: Vec<&GameStateTable> = clutch_tables.iter().collect();
        let event_count: usize = refs.iter().map(|t| t.len()).sum();
        println!(
            "Running hypothesis battery over {} clutch events from {} games",
            event_count,
            refs.len()
        );

        let outcomes = run_battery(&refs, &config.stats);
        let rendered = report::render_report(&outcomes, config.stats.alpha);
        println!("{}", rendered);

        if let Some(path) = output {
            std::fs::write(&path, &rendered)?;
            println!("Report saved to {}", path);
        }
        Ok(())
    }

    pub fn status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database: {}", config.data.database_path);
        println!("  Games:  {} ({} failed)", stats.game_count, stats.failed_count);
        println!("  Events: {}", stats.event_count);

        for (game_id, status) in db.list_games()? {
            println!("  {}: {}", game_id, status);
        }
        Ok(())
    }

    fn format_flags(flags: DataQualityFlags) -> String {
        let mut parts = Vec::new();
        if flags.malformed_skipped > 0 {
            parts.push(format!("{} malformed skipped", flags.malformed_skipped));
        }
        if flags.missing_top_scorer {
            parts.push("top scorer missing".to_string());
        }
        if flags.shot_clock_anomalies > 0 {
            parts.push(format!("{} shot-clock anomalies", flags.shot_clock_anomalies));
        }
        if flags.clocks_clamped > 0 {
            parts.push(format!("{} clocks clamped", flags.clocks_clamped));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}
