use std::net::SocketAddr;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use super::covers::CoverStore;
use super::engine::ProtocolEngine;
use super::error::MediaError;
use super::registry::PlayerRegistry;
use super::types::{PlaybackState, Player, PlayerCommand};

/// Default adapter protocol port.
pub const DEFAULT_PORT: u16 = 8974;

/// Configuration for the media service.
pub struct Config {
    /// Port the adapter protocol server binds on 127.0.0.1; 0 picks an
    /// ephemeral port.
    pub port: u16,
    /// Directory cover art blobs are written into.
    pub cover_dir: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cover_dir: CoverStore::default_dir(),
        }
    }
}

/// Media adapter service: protocol server, player registry and controls.
///
/// User intents are translated into protocol commands for the active player.
/// Every control method silently does nothing when there is no active player,
/// when the player does not support the control, or when no adapter transport
/// is attached; a control surface has nothing useful to do with those errors.
#[derive(Clone)]
pub struct MediaService {
    engine: Arc<ProtocolEngine>,
    registry: PlayerRegistry,
    local_addr: SocketAddr,
    accept_task: Arc<JoinHandle<()>>,
}

impl MediaService {
    /// Start the media service with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::InitializationFailed`] if the cover directory
    /// cannot be created or the protocol port cannot be bound.
    pub async fn start(config: Config) -> Result<Self, MediaError> {
        info!(port = config.port, "starting media service");

        let covers = CoverStore::new(config.cover_dir)?;
        let registry = PlayerRegistry::new();
        let (engine, local_addr, accept_task) =
            ProtocolEngine::start(config.port, registry.clone(), covers).await?;

        Ok(Self {
            engine,
            registry,
            local_addr,
            accept_task: Arc::new(accept_task),
        })
    }

    /// Address the protocol server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Subscribe to active-player snapshots.
    ///
    /// A snapshot is published after every registry mutation while some
    /// player is active; nothing is published when none is.
    pub fn subscribe(&self) -> broadcast::Receiver<Player> {
        self.registry.subscribe()
    }

    /// Stream of active-player snapshots.
    ///
    /// Lagged subscribers skip ahead to the freshest snapshot.
    pub fn updates_stream(&self) -> impl Stream<Item = Player> + Send {
        BroadcastStream::new(self.registry.subscribe()).filter_map(|update| async { update.ok() })
    }

    /// Snapshot of the currently active player, if any.
    pub async fn active_player(&self) -> Option<Player> {
        self.registry.active_player().await
    }

    /// Ids of all players currently reporting.
    pub async fn player_ids(&self) -> Vec<u32> {
        self.registry.player_ids().await
    }

    /// Send a raw command to a specific player, bypassing capability gating.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::NotConnected`] when no adapter transport is
    /// attached.
    pub async fn send_command(
        &self,
        player_id: u32,
        command: PlayerCommand,
    ) -> Result<(), MediaError> {
        self.engine.send_command(player_id, command).await
    }

    /// Stop accepting connections and drop the live transport.
    pub async fn shutdown(&self) {
        info!("shutting down media service");
        self.accept_task.abort();
        self.engine.disconnect().await;
        self.registry.clear().await;
    }

    /// Start playback on the active player.
    ///
    /// # Errors
    ///
    /// Only future transport-level failures; absence of a player, capability
    /// or connection is a silent no-op.
    pub async fn play(&self) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_state
                .then_some(PlayerCommand::SetState(PlaybackState::Playing))
        })
        .await
    }

    /// Pause playback on the active player.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn pause(&self) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_state
                .then_some(PlayerCommand::SetState(PlaybackState::Paused))
        })
        .await
    }

    /// Toggle between playing and paused.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn toggle_play_pause(&self) -> Result<(), MediaError> {
        self.dispatch(|player| {
            let next = match player.state {
                PlaybackState::Playing => PlaybackState::Paused,
                PlaybackState::Paused | PlaybackState::Stopped => PlaybackState::Playing,
            };
            player.can_set_state.then_some(PlayerCommand::SetState(next))
        })
        .await
    }

    /// Skip to the next track.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn next_track(&self) -> Result<(), MediaError> {
        self.dispatch(|player| player.can_skip_next.then_some(PlayerCommand::SkipNext))
            .await
    }

    /// Skip to the previous track.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn previous_track(&self) -> Result<(), MediaError> {
        self.dispatch(|player| player.can_skip_previous.then_some(PlayerCommand::SkipPrevious))
            .await
    }

    /// Toggle shuffle on the active player.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn toggle_shuffle(&self) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_shuffle
                .then_some(PlayerCommand::SetShuffle(!player.shuffle))
        })
        .await
    }

    /// Cycle the repeat mode: None -> All -> One -> None.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn cycle_repeat(&self) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_repeat
                .then_some(PlayerCommand::SetRepeat(player.repeat.next()))
        })
        .await
    }

    /// Seek to a position in seconds.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn seek(&self, seconds: u32) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_position
                .then_some(PlayerCommand::SetPosition(seconds))
        })
        .await
    }

    /// Set the volume, clamped to 0-100.
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn set_volume(&self, volume: u8) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_volume
                .then_some(PlayerCommand::SetVolume(volume.min(100)))
        })
        .await
    }

    /// Set the rating for the current track (0 = none, 1 = dislike, 5 = like).
    ///
    /// # Errors
    ///
    /// See [`MediaService::play`].
    pub async fn set_rating(&self, rating: u8) -> Result<(), MediaError> {
        self.dispatch(|player| {
            player
                .can_set_rating
                .then_some(PlayerCommand::SetRating(rating))
        })
        .await
    }

    async fn dispatch(
        &self,
        command_for: impl FnOnce(&Player) -> Option<PlayerCommand>,
    ) -> Result<(), MediaError> {
        let Some(player) = self.registry.active_player().await else {
            debug!("no active player, ignoring control request");
            return Ok(());
        };
        let Some(command) = command_for(&player) else {
            debug!(player_id = player.id, "control unsupported by player, ignoring");
            return Ok(());
        };

        match self.engine.send_command(player.id, command).await {
            Err(MediaError::NotConnected) => {
                debug!("no adapter transport, ignoring control request");
                Ok(())
            }
            other => other,
        }
    }
}
