use std::sync::Arc;

use clap::Subcommand;
use primepath_core::storage::{PersistenceStore, SnapshotStore, SqliteStore, TimerSnapshot};
use primepath_core::{format_time, SystemClock, TimerConfig, TimerEngine, TimerState};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start (or recover) a countdown for a session
    Start {
        /// Session identifier; generated if omitted
        #[arg(long)]
        session: Option<String>,
        /// Allotted duration in seconds
        #[arg(long)]
        total: u64,
    },
    /// Pause the countdown
    Pause {
        #[arg(long)]
        session: String,
    },
    /// Resume a paused countdown
    Resume {
        #[arg(long)]
        session: String,
    },
    /// Advance the countdown by whole seconds (for scripting)
    Tick {
        #[arg(long)]
        session: String,
        #[arg(long, default_value = "1")]
        count: u32,
    },
    /// Add seconds to the remaining time
    Add {
        #[arg(long)]
        session: String,
        #[arg(long)]
        secs: u64,
    },
    /// Stop the countdown and restore the full duration
    Reset {
        #[arg(long)]
        session: String,
        /// Replacement duration in seconds
        #[arg(long)]
        total: Option<u64>,
    },
    /// Stop the countdown and discard saved state
    Stop {
        #[arg(long)]
        session: String,
    },
    /// Print saved timer state as JSON
    Status {
        #[arg(long)]
        session: String,
    },
}

fn timer_key(session: &str) -> String {
    format!("exam_timer:{session}")
}

fn open_store() -> Result<Arc<dyn SnapshotStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open_default()?))
}

/// Read the persisted snapshot without constructing an engine.
fn read_snapshot(
    store: Arc<dyn SnapshotStore>,
    session: &str,
    config: &TimerConfig,
) -> Option<TimerSnapshot> {
    let persistence = PersistenceStore::new(
        store,
        timer_key(session),
        Arc::new(SystemClock),
        config.max_snapshot_age_ms(),
        config.persistence_enabled,
    );
    persistence.restore()
}

fn build_engine(
    store: Arc<dyn SnapshotStore>,
    session: &str,
    total: u64,
    config: TimerConfig,
) -> Result<TimerEngine, Box<dyn std::error::Error>> {
    let engine = TimerEngine::builder(timer_key(session), total)
        .store(store)
        .config(config)
        .build()?;
    Ok(engine)
}

/// Load a previously saved session into an engine, or fail with a
/// user-facing error.
fn load_engine(
    store: Arc<dyn SnapshotStore>,
    session: &str,
    config: TimerConfig,
) -> Result<TimerEngine, Box<dyn std::error::Error>> {
    let engine = build_engine(store, session, 0, config)?;
    if !engine.was_restored() {
        return Err(format!("no saved timer for session '{session}'").into());
    }
    Ok(engine)
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = TimerConfig::load_or_default();
    let store = open_store()?;

    match action {
        TimerAction::Start { session, total } => {
            let session =
                session.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            let mut engine = build_engine(store, &session, total, config.clone())?;
            let recovered = engine.was_restored();
            engine.start();

            if engine.state() == TimerState::GracePending {
                // Recovered an already-expired exam: honor the grace
                // delay, then let expiry fire.
                println!("Session {session}: time expired");
                std::thread::sleep(std::time::Duration::from_secs(config.grace_delay_secs));
                engine.tick();
                println!("Session {session}: submitted after grace delay");
                return Ok(());
            }

            let verb = if recovered { "recovered" } else { "started" };
            println!(
                "Session {session}: {verb}, {} remaining",
                format_time(engine.remaining_secs(), config.show_hours)
            );
            Ok(())
        }
        TimerAction::Pause { session } => {
            let mut engine = load_engine(store, &session, config.clone())?;
            engine.start();
            engine.pause();
            println!(
                "Session {session}: paused at {}",
                format_time(engine.remaining_secs(), config.show_hours)
            );
            Ok(())
        }
        TimerAction::Resume { session } => {
            let mut engine = load_engine(store, &session, config.clone())?;
            engine.start();
            println!(
                "Session {session}: running, {} remaining",
                format_time(engine.remaining_secs(), config.show_hours)
            );
            Ok(())
        }
        TimerAction::Tick { session, count } => {
            let snapshot = read_snapshot(store.clone(), &session, &config)
                .ok_or_else(|| format!("no saved timer for session '{session}'"))?;
            let mut engine = load_engine(store, &session, config)?;
            engine.start();
            let mut expired = false;
            for _ in 0..count {
                if let Some(ev) = engine.tick() {
                    if ev.kind() == "expired" {
                        expired = true;
                        break;
                    }
                }
            }
            if expired {
                println!("Session {session}: expired");
            } else {
                if snapshot.is_paused {
                    engine.pause();
                } else {
                    engine.save_now();
                }
                println!("{}", serde_json::to_string_pretty(&engine.stats())?);
            }
            Ok(())
        }
        TimerAction::Add { session, secs } => {
            let snapshot = read_snapshot(store.clone(), &session, &config)
                .ok_or_else(|| format!("no saved timer for session '{session}'"))?;
            let mut engine = load_engine(store, &session, config.clone())?;
            engine.start();
            engine.add_time(secs);
            if snapshot.is_paused {
                engine.pause();
            } else {
                engine.save_now();
            }
            println!(
                "Session {session}: added {secs}s, {} remaining",
                format_time(engine.remaining_secs(), config.show_hours)
            );
            Ok(())
        }
        TimerAction::Reset { session, total } => {
            let mut engine = load_engine(store, &session, config.clone())?;
            engine.reset(total);
            engine.save_now();
            println!(
                "Session {session}: reset to {}",
                format_time(engine.remaining_secs(), config.show_hours)
            );
            Ok(())
        }
        TimerAction::Stop { session } => {
            let mut engine = load_engine(store, &session, config)?;
            engine.stop();
            println!(
                "Session {session}: stopped after {}s elapsed",
                engine.elapsed_secs()
            );
            Ok(())
        }
        TimerAction::Status { session } => {
            match read_snapshot(store, &session, &config) {
                Some(snapshot) => {
                    let status = serde_json::json!({
                        "session": session,
                        "display": format_time(snapshot.time_remaining, config.show_hours),
                        "timeRemaining": snapshot.time_remaining,
                        "totalTime": snapshot.total_time,
                        "isRunning": snapshot.is_running,
                        "isPaused": snapshot.is_paused,
                    });
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                None => println!("No saved timer for session '{session}'"),
            }
            Ok(())
        }
    }
}
