use clap::Subcommand;
use serde_json::Value;

use crate::{Res, cli::Context, spotify::RepeatMode, success};

#[derive(Subcommand, Debug, Clone)]
pub enum PlayerAction {
    /// Show the current playback state
    State,
    /// List available devices
    Devices,
    /// Resume playback, or start a track, album or playlist URI
    Play { uri: Option<String> },
    /// Pause playback
    Pause,
    /// Skip to the next track
    Next,
    /// Skip to the previous track
    Previous,
    /// Set the volume in percent
    Volume {
        #[clap(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Set the repeat mode
    Repeat { mode: RepeatMode },
    /// Add a track or episode URI to the queue
    Queue { uri: String },
}

pub async fn player(ctx: &Context, action: PlayerAction) -> Res<()> {
    let playback = ctx.playback();

    let (value, done) = match action {
        PlayerAction::State => (playback.state().await?, None),
        PlayerAction::Devices => (playback.devices().await?, None),
        PlayerAction::Play { uri } => (playback.play(uri.as_deref()).await?, Some("Playing")),
        PlayerAction::Pause => (playback.pause().await?, Some("Paused")),
        PlayerAction::Next => (playback.next().await?, Some("Skipped to next track")),
        PlayerAction::Previous => (playback.previous().await?, Some("Back to previous track")),
        PlayerAction::Volume { percent } => {
            (playback.set_volume(percent).await?, Some("Volume set"))
        }
        PlayerAction::Repeat { mode } => (playback.set_repeat(mode).await?, Some("Repeat mode set")),
        PlayerAction::Queue { uri } => (playback.queue(&uri).await?, Some("Queued")),
    };

    match (done, value) {
        (Some(message), Value::Bool(true)) => success!("{}", message),
        (None, Value::Bool(true)) => success!("Nothing is playing"),
        (_, value) => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}
