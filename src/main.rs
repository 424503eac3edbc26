use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use itertools::Itertools;
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use sqlquest::engine::QueryOutcome;
use sqlquest::game::{Advanced, AutoMount, LoadReport, QueryReport, Transition};
use sqlquest::progression::{NextAction, Phase};
use sqlquest::{Game, GameConfig, MissionCatalog, SchemaLoader, SqliteEngine};

#[derive(Debug, StructOpt)]
#[structopt(name = "sqlquest", about = "Learn SQL by exploring toy databases")]
struct Options {
    /// Mission data
    #[structopt(long, parse(from_os_str), default_value = "data/missions.json")]
    missions: PathBuf,

    /// Database pack
    #[structopt(long, parse(from_os_str), default_value = "data/databases.json")]
    databases: PathBuf,

    /// Mission to start with
    #[structopt(long, default_value = "0")]
    start: u32,

    /// Pause before the next mission is loaded, in milliseconds
    #[structopt(long, default_value = "1500")]
    advance_delay_ms: u64,
}

const HELP: &str = "\
Type SQL ending with ';' to run it. Commands:
  .missions          list missions
  .mission <id>      switch mission
  .hint / .solution  help with the current step
  .next              advance once the step is solved
  .mount <db>        mount a database
  .unmount <db>      unmount a database
  .databases         list databases
  .tables            list mounted tables
  .diagram           redraw the last query's diagram
  .status            show progress
  .reset             start over
  .quit              leave";

fn print_rows(outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::Affected(n) => println!("{} row(s) affected", n),
        QueryOutcome::Rows(rows) if rows.is_empty() => println!("(no rows)"),
        QueryOutcome::Rows(rows) => {
            let columns = rows[0].keys().join(" | ");
            println!("{}", columns);
            for row in rows {
                println!("{}", row.values().map(|v| v.to_string()).join(" | "));
            }
            println!("({} row(s))", rows.len());
        }
    }
}

fn print_action(action: Option<NextAction>) {
    match action {
        Some(NextAction::AdvanceSubmission) => println!("Step solved! Type .next for the next step."),
        Some(NextAction::CompleteMission) => println!("Mission solved! Type .next to complete it."),
        None => {}
    }
}

fn print_step(game: &Game) {
    let (mission, step) = match (game.current_mission(), game.current_step()) {
        (Some(mission), Some(step)) => (mission, step),
        _ => {
            println!("No mission loaded.");
            return;
        }
    };
    println!(
        "\n== Mission {}: {} (difficulty {}, {} points) ==",
        mission.id,
        mission.title(),
        mission.difficulty,
        mission.points
    );
    if mission.step_count() > 1 {
        println!(
            "-- Step {}/{}: {} --",
            game.progress().submission_index() + 1,
            mission.step_count(),
            step.title
        );
    }
    println!("{}", step.description);
}

fn print_load(game: &Game, report: &LoadReport) {
    match &report.auto_mount {
        AutoMount::Mounted(mounted) => println!("Mounted {}.", mounted.alias),
        AutoMount::Failed(err) => println!("Could not mount the mission database: {}", err),
        AutoMount::AlreadyMounted | AutoMount::Skipped => {}
    }
    print_step(game);
    print_action(report.action);
}

fn print_query(report: &QueryReport) {
    match &report.result {
        Ok(outcome) => print_rows(outcome),
        Err(err) => println!("Error: {}", err),
    }
    if !report.diagram.is_cleared() {
        print!("{}", report.diagram);
    }
    if let Some(verdict) = &report.verdict {
        for failure in &verdict.failures {
            println!("  - {}", failure);
        }
    }
    print_action(report.action);
}

fn advance(game: &mut Game) {
    match game.advance() {
        Ok(Advanced::Submission(_)) => print_step(game),
        Ok(Advanced::MissionComplete {
            points_awarded,
            ticket,
            ..
        }) => {
            if let Some(step) = game.current_step() {
                println!("{}", step.success_message);
            }
            if points_awarded {
                println!("Score: {}", game.progress().score());
            }
            std::thread::sleep(ticket.due.saturating_duration_since(Instant::now()));
            match game.poll(Instant::now()) {
                Some(Transition::Loaded(report)) => print_load(game, &report),
                Some(Transition::AllComplete) => {
                    println!("Every mission is complete. Final score: {}", game.progress().score())
                }
                Some(Transition::NoMission) => println!("No mission left to load."),
                None => {}
            }
        }
        Err(err) => println!("{}", err),
    }
}

/// Returns false when the player wants to leave.
fn handle_command(game: &mut Game, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        (".quit", _) | (".exit", _) => return false,
        (".help", _) => println!("{}", HELP),
        (".missions", _) => {
            for mission in game.missions().iter() {
                let mark = if game.progress().is_completed(mission.id) { "x" } else { " " };
                println!("[{}] {:>2} {} ({} pts)", mark, mission.id, mission.title(), mission.points);
            }
        }
        (".mission", Some(id)) => match id.parse() {
            Ok(id) => match game.load_mission(id) {
                Ok(report) => print_load(game, &report),
                Err(err) => println!("{}", err),
            },
            Err(_) => println!("Not a mission id: {}", id),
        },
        (".hint", _) => match game.current_step() {
            Some(step) => println!("{}", step.hint),
            None => println!("No mission loaded."),
        },
        (".solution", _) => match game.current_step() {
            Some(step) => println!("{}", step.solution),
            None => println!("No mission loaded."),
        },
        (".next", _) => advance(game),
        (".mount", Some(alias)) => match game.mount(alias) {
            Ok(mounted) => {
                println!("Mounted {}: {}", alias, mounted.report.tables.join(", "));
                for collision in &mounted.report.collisions {
                    println!(
                        "Warning: table {} from {} is now replaced by {}'s",
                        collision.table, collision.previous_db, alias
                    );
                }
                print_action(mounted.action);
            }
            Err(err) => println!("{}", err),
        },
        (".unmount", Some(alias)) => match game.unmount(alias) {
            Ok(tables) => println!("Unmounted {} ({} tables)", alias, tables.len()),
            Err(err) => println!("{}", err),
        },
        (".databases", _) => {
            for schema in game.loader().all() {
                let mark = if game.catalog().is_mounted(&schema.alias) { "*" } else { " " };
                println!("{} {} - {}", mark, schema.alias, schema.title);
            }
        }
        (".tables", _) => {
            for table in game.catalog().tables() {
                println!("{}.{}({})", table.db_alias, table.name, table.columns.join(", "));
            }
        }
        (".diagram", _) => println!("{}", game.diagram()),
        (".status", _) => {
            let progress = game.progress();
            println!(
                "Score {}, {} of {} missions complete",
                progress.score(),
                progress.completed().len(),
                game.missions().len()
            );
            match game.catalog().mounted_databases() {
                [] => println!("No database mounted."),
                mounted => println!("Mounted: {}", mounted.join(", ")),
            }
            match progress.phase() {
                Phase::AllComplete => println!("Every mission is complete."),
                _ => print_step(game),
            }
        }
        (".reset", _) => match game.reset() {
            Ok(()) => println!("Game reset. Use .mission <id> to start again."),
            Err(err) => println!("Reset failed: {}", err),
        },
        _ => println!("Unknown command, try .help"),
    }
    true
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::from_args();

    let loader = SchemaLoader::load(&options.databases)
        .with_context(|| format!("Failed to load {}", options.databases.display()))?;
    let missions = MissionCatalog::load(&options.missions)
        .with_context(|| format!("Failed to load {}", options.missions.display()))?;
    let engine = SqliteEngine::open_in_memory().context("Failed to start the SQL engine")?;
    let config = GameConfig {
        advance_delay: Duration::from_millis(options.advance_delay_ms),
    };

    let mut game = Game::new(engine, loader, missions, config);
    println!("SQL Quest. Type .help for commands.");
    match game.load_mission(options.start) {
        Ok(report) => print_load(&game, &report),
        Err(err) => println!("{}", err),
    }

    let mut editor = Editor::<()>::new();
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "sql> " } else { "...> " };
        let readline = editor.readline(prompt);
        match readline {
            Ok(line) => {
                editor.add_history_entry(line.as_str());

                let trimmed = line.trim();
                if buffer.is_empty() && trimmed.is_empty() {
                    continue;
                }
                if buffer.is_empty() && trimmed.starts_with('.') {
                    if !handle_command(&mut game, trimmed) {
                        break;
                    }
                    continue;
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if trimmed.ends_with(';') {
                    let sql = std::mem::take(&mut buffer);
                    print_query(&game.run_query(&sql));
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}
