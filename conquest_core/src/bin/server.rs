use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use conquest_core::{
    load_settings_from_env, ConquestServer, ConquestSettings, ConquestState, FrameServer,
    InMemoryWorld, Scheduler, SchedulerError, ThreadScheduler,
};

type SharedServer = Arc<Mutex<ConquestServer<InMemoryWorld, FrameServer>>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (settings, metadata) = load_settings_from_env();

    let state = match ConquestState::load(settings.state_path()) {
        Ok(state) => state,
        Err(err) => {
            warn!(
                target: "conquest::server",
                path = %settings.state_path().display(),
                error = %err,
                "state.restore_failed"
            );
            ConquestState::default()
        }
    };

    let world = match env::var("CONQUEST_WORLD_PATH") {
        Ok(path) => {
            let path = PathBuf::from(path);
            match InMemoryWorld::from_file(&path) {
                Ok(world) => {
                    info!(target: "conquest::server", path = %path.display(), "world.loaded=file");
                    world
                }
                Err(err) => {
                    error!(
                        target: "conquest::server",
                        path = %path.display(),
                        error = %err,
                        "world.load_failed"
                    );
                    process::exit(1);
                }
            }
        }
        Err(_) => {
            info!(target: "conquest::server", "world.loaded=empty");
            InMemoryWorld::new()
        }
    };

    let frames = match FrameServer::start(settings.bind()) {
        Ok(frames) => frames,
        Err(err) => {
            error!(
                target: "conquest::server",
                bind = %settings.bind(),
                error = %err,
                "frame_server.bind_failed"
            );
            process::exit(1);
        }
    };
    let inbound = frames.inbound().clone();

    let server: SharedServer = Arc::new(Mutex::new(ConquestServer::new(
        Arc::clone(&settings),
        state,
        world,
        frames,
    )));

    let mut scheduler = ThreadScheduler::new();
    if let Err(err) = schedule_timers(&mut scheduler, &server, &settings) {
        error!(target: "conquest::server", error = %err, "timers.schedule_failed");
        process::exit(1);
    }

    info!(
        target: "conquest::server",
        bind = %settings.bind(),
        settings = ?metadata.path(),
        control_points = settings.control_points().len(),
        period_secs = settings.period().as_secs(),
        "conquest server ready"
    );

    while let Ok(frame) = inbound.recv() {
        lock(&server).on_message(&frame);
    }

    scheduler.shutdown();
}

fn schedule_timers(
    scheduler: &mut ThreadScheduler,
    server: &SharedServer,
    settings: &ConquestSettings,
) -> Result<(), SchedulerError> {
    let round_server = Arc::clone(server);
    scheduler.schedule_periodic(
        "round",
        settings.period(),
        Box::new(move || {
            lock(&round_server).on_round_timer();
        }),
    )?;

    let save_server = Arc::clone(server);
    scheduler.schedule_periodic(
        "save",
        settings.save_interval(),
        Box::new(move || {
            let _ = lock(&save_server).on_save_timer();
        }),
    )
}

/// A pass that panicked leaves the server usable; the next round starts clean.
fn lock(server: &SharedServer) -> MutexGuard<'_, ConquestServer<InMemoryWorld, FrameServer>> {
    server.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!(target: "conquest::server", "server.lock_recovered");
        poisoned.into_inner()
    })
}
