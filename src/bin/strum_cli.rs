use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use strum_trainer::practice::{JsonFileStore, ProgressLedger, ProgressStore};
use strum_trainer::{AppConfig, ChordCatalog, PracticeEngine, PracticeEvent, SessionConfig};
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Parser, Debug)]
#[command(
    name = "strum_cli",
    about = "Chord strumming practice: live sessions, offline replay and progress"
)]
struct Cli {
    /// App config JSON (defaults to assets/strum_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Chord catalog JSON replacing the built-in tones and presets
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SessionArgs {
    #[arg(long, default_value = "C / Am")]
    tone: String,
    #[arg(long, default_value = "I-V-vi-IV")]
    progression: String,
    #[arg(long, default_value_t = 80)]
    bpm: u32,
    #[arg(long, default_value_t = 4)]
    time_signature: u32,
    /// Number of chord slots in the cycle
    #[arg(long, default_value_t = 20)]
    chords: usize,
    #[arg(long)]
    no_click: bool,
    #[arg(long, default_value_t = 0.8)]
    volume: f32,
}

impl SessionArgs {
    fn to_config(&self) -> SessionConfig {
        SessionConfig {
            bpm: self.bpm,
            time_signature: self.time_signature,
            tone: self.tone.clone(),
            progression_preset: self.progression.clone(),
            chord_target: self.chords,
            click_enabled: !self.no_click,
            click_volume: self.volume,
            ..SessionConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a live session on the default audio devices
    Practice {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Score a WAV recording as if it were played live
    Replay {
        #[arg(long)]
        wav: PathBuf,
        /// Write the result to the progress ledger
        #[arg(long)]
        record: bool,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Print best accuracies from the progress ledger
    Progress,
    /// List tones and progression presets
    Catalog,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);
    let catalog = match cli.catalog.as_deref() {
        Some(path) => ChordCatalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => ChordCatalog::builtin().clone(),
    };

    match cli.command {
        Commands::Practice { session } => run_practice(config, catalog, &session),
        Commands::Replay {
            wav,
            record,
            session,
        } => run_replay(&config, &catalog, &wav, record, &session),
        Commands::Progress => run_progress(&config),
        Commands::Catalog => run_catalog(&catalog),
    }
}

fn run_practice(
    config: AppConfig,
    catalog: ChordCatalog,
    args: &SessionArgs,
) -> Result<ExitCode> {
    let engine = PracticeEngine::from_config(config).with_catalog(catalog);
    let mut events = engine.subscribe_events();

    engine
        .start_session(args.to_config())
        .context("starting practice session")?;

    let mut last_line = String::new();
    while engine.is_active() {
        let hud = engine.hud_snapshot();
        let line = if hud.is_counting_down {
            format!("count-in {} ms", hud.countdown_ms_left)
        } else {
            format!(
                "bar {} beat {} | {} -> {} | {}/{} correct ({}%)",
                hud.current_bar_index + 1,
                hud.current_beat_index + 1,
                hud.current_chord.as_deref().unwrap_or("-"),
                hud.next_chord.as_deref().unwrap_or("-"),
                hud.correct_count,
                hud.attempts_count,
                hud.accuracy_percent
            )
        };
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }

        drain_events(&mut events);
        thread::sleep(Duration::from_millis(100));
    }

    let summary = engine
        .stop_session()
        .context("stopping practice session")?;
    drain_events(&mut events);

    match summary {
        Some(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::from(0))
        }
        None => Ok(ExitCode::from(2)),
    }
}

fn drain_events(events: &mut tokio::sync::broadcast::Receiver<PracticeEvent>) {
    loop {
        match events.try_recv() {
            Ok(PracticeEvent::PassNotice(notice)) => println!(
                "Passed {} / {} at {}%",
                notice.tone, notice.progression, notice.accuracy
            ),
            Ok(PracticeEvent::MicError { details }) => eprintln!("Microphone error: {}", details),
            Ok(PracticeEvent::SessionFinished(_)) => println!("Session finished"),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn run_replay(
    config: &AppConfig,
    catalog: &ChordCatalog,
    wav: &Path,
    record: bool,
    args: &SessionArgs,
) -> Result<ExitCode> {
    let ledger = if record {
        PracticeEngine::open_ledger(config)
    } else {
        ProgressLedger::in_memory()
    };
    let report = strum_trainer::replay_wav(
        wav,
        args.to_config(),
        config,
        catalog,
        Arc::new(Mutex::new(ledger)),
    )
    .with_context(|| format!("replaying {}", wav.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_progress(config: &AppConfig) -> Result<ExitCode> {
    let mut store = JsonFileStore::new(&config.progress.store_path);
    let record = store
        .load()
        .with_context(|| format!("reading {}", store.path().display()))?;

    if record.is_empty() {
        println!("No progress recorded in {}", store.path().display());
        return Ok(ExitCode::from(0));
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(ExitCode::from(0))
}

fn run_catalog(catalog: &ChordCatalog) -> Result<ExitCode> {
    println!("Tones:");
    for tone in catalog.tones() {
        let chords = catalog.chords_for(tone).unwrap_or(&[]);
        println!("  {:<10} {}", tone, chords.join(" "));
    }
    println!("Progressions:");
    for preset in catalog.presets() {
        println!("  {}", preset);
    }
    Ok(ExitCode::from(0))
}
