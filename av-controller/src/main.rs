//! AV Room Controller
//!
//! Runs the room controller against simulated panels and a simulated matrix
//! switcher. The room is read from a JSON file given as the first argument,
//! or the built-in desk room is used.
//!
//! ```text
//! av-controller [ROOM.json]
//! av-controller --dump-config
//! ```

use std::time::Duration;

use anyhow::{bail, Context};
use av_route::{OutputState, RoomConfig, RoomEvent};
use av_sim::SimRoom;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to keep logging events after each scripted press
const SETTLE: Duration = Duration::from_millis(250);

fn load_config(arg: Option<&str>) -> anyhow::Result<RoomConfig> {
    match arg {
        Some(path) => {
            RoomConfig::load(path).with_context(|| format!("failed to load room from {}", path))
        }
        None => {
            info!("No room file given, using the built-in desk room");
            Ok(RoomConfig::default())
        }
    }
}

fn log_event(event: &RoomEvent) {
    match event {
        RoomEvent::SelectionChanged {
            output,
            state: OutputState::SelectedTo(source),
            surfaces_synced,
        } => info!("{} now shows {} on {} surfaces", output, source, surfaces_synced),
        RoomEvent::SelectionChanged {
            output,
            surfaces_synced,
            ..
        } => info!("{} cleared on {} surfaces", output, surfaces_synced),
        RoomEvent::RouteFailed { command, error } => warn!("{:?} failed: {}", command, error),
        RoomEvent::SignalRejected { endpoint, error } => {
            warn!("Input from {} rejected: {}", endpoint, error)
        }
        other => info!("{:?}", other),
    }
}

async fn drain_events(room: &mut SimRoom) {
    while let Some(event) = room.next_event(SETTLE).await {
        log_event(&event);
    }
}

/// Walk through select, reselect and clear from both panels
async fn run_walkthrough(room: &mut SimRoom, config: &RoomConfig) -> anyhow::Result<()> {
    let Some(first) = config.surfaces.first() else {
        bail!("room has no surfaces");
    };
    let last = config.surfaces.last().unwrap_or(first);
    let Some(group) = first.groups.first() else {
        bail!("surface {} has no button groups", first.name);
    };

    let a = room.surface(&first.name)?;
    let b = room.surface(&last.name)?;
    let joins: Vec<u32> = group.select_joins().collect();
    let pick = |slot: usize| joins.get(slot).copied().unwrap_or(group.select_range[0]);

    let script = [
        (a, pick(1)),
        (b, pick(3)),
        (a, pick(3)),
        (b, group.clear_button),
        (a, pick(0)),
    ];

    for (surface, join) in script {
        info!("Pressing join {} on {}", join, surface);
        room.press(surface, join).await?;
        drain_events(room).await;
    }

    for (output, state) in room.selection().await? {
        info!("Final state of {}: {:?}", output, state);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "av_controller=info,av_route=info,av_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--dump-config") {
        println!("{}", RoomConfig::default().to_json()?);
        return Ok(());
    }

    let config = load_config(arg.as_deref())?;

    info!("Starting AV room controller");

    let mut room = SimRoom::start(&config).await?;
    room.bring_all_online().await?;
    drain_events(&mut room).await;

    run_walkthrough(&mut room, &config).await?;

    info!("Walkthrough complete, press Ctrl-C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            event = room.next_event(Duration::from_secs(3600)) => {
                if let Some(event) = event {
                    log_event(&event);
                }
            }
        }
    }

    room.shutdown().await;
    Ok(())
}
