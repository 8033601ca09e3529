use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::*;
use wakeword_state_sync::{
    configuration::get_configuration, error::WakeWordError, logging::setup_tracing,
    publisher::SILENCE_CHECK_INTERVAL, PhasePublisher, WakeWordPhase, WakeWordStateTracker,
    ZenohChannel,
};
use zenoh::prelude::r#async::*;

/// Wake word state monitor
/// Follows the phase of a remote wake word detector
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// application configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log as json
    #[arg(long)]
    json_logs: bool,
    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log every phase change until ctrl-c
    Watch,
    /// Publish a phase. `active` is held until the silence timeout
    Publish {
        #[arg(value_parser = parse_phase)]
        phase: WakeWordPhase,
    },
}

fn parse_phase(value: &str) -> Result<WakeWordPhase, String> {
    WakeWordPhase::from_wire_label(value)
        .ok_or_else(|| format!("expected \"listening\" or \"active\", got {:?}", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = Args::parse();
    setup_tracing(args.verbose, args.json_logs);
    info!("Started wake word monitor");

    let app_config = get_configuration(&args.config)?;

    let zenoh_config = app_config.zenoh.get_zenoh_config()?;
    let zenoh_session = Arc::new(
        zenoh::open(zenoh_config)
            .res()
            .await
            .map_err(WakeWordError::ZenohError)?,
    );

    let channel = Arc::new(ZenohChannel::new(
        zenoh_session,
        &app_config.tracker.topic_prefix,
    ));

    match args.command {
        Command::Watch => watch(channel).await?,
        Command::Publish { phase } => {
            publish(channel, phase, app_config.tracker.silence_timeout()).await?
        }
    }
    Ok(())
}

/// Active conversations are held until the silence timeout sends them back
/// to listening
async fn publish(
    channel: Arc<ZenohChannel>,
    phase: WakeWordPhase,
    silence_timeout: Duration,
) -> Result<()> {
    let publisher = Arc::new(PhasePublisher::new(channel));
    publisher.set_phase(phase).await?;
    info!("Published wake word state {}", phase);
    if phase != WakeWordPhase::Active {
        return Ok(());
    }

    let silence_monitor = publisher.start_silence_monitor(silence_timeout);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(SILENCE_CHECK_INTERVAL) => {
                if publisher.last_published().await == WakeWordPhase::Listening {
                    info!("Silence timeout, published wake word state listening");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Got ctrl-c");
                break;
            }
        }
    }
    silence_monitor.abort();
    Ok(())
}

async fn watch(channel: Arc<ZenohChannel>) -> Result<()> {
    let mut tracker = WakeWordStateTracker::new();
    tracker.attach(Some(channel.clone()))?;
    let mut phase_receiver = tracker.watch();
    info!(
        "Watching wake word state on {}/{}",
        channel.topic_prefix(),
        wakeword_state_sync::topics::WAKEWORD_STATE_TOPIC
    );

    loop {
        tokio::select! {
            changed = phase_receiver.changed() => {
                changed?;
                let snapshot = tracker.snapshot();
                info!("Wake word state {} at {:?}", snapshot.phase, snapshot.updated_at);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Got ctrl-c");
                break;
            }
        }
    }

    tracker.detach();
    info!("Exiting wake word monitor");
    Ok(())
}
