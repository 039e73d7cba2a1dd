use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::types::{Player, PlayerPatch};

/// How many active-player snapshots may queue per subscriber before the
/// slowest one starts lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 32;

struct RegistryState {
    players: HashMap<u32, Player>,
    active_id: Option<u32>,
}

/// Mapping of player id to player state, with active-player arbitration.
///
/// Mutated from the protocol engine's single receive path, read from command
/// dispatch; one shared-read/exclusive-write lock guards both the map and the
/// active id so arbitration never observes a torn registry. Every successful
/// mutation publishes the current active player's snapshot; when no player is
/// active, nothing is published.
#[derive(Clone)]
pub struct PlayerRegistry {
    state: Arc<RwLock<RegistryState>>,
    updates: broadcast::Sender<Player>,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                players: HashMap::new(),
                active_id: None,
            })),
            updates,
        }
    }

    /// Subscribe to active-player snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<Player> {
        self.updates.subscribe()
    }

    /// Create or sparsely update a player.
    ///
    /// An unknown id creates a player holding only the supplied fields; a
    /// known id merges just the fields present in the patch and refreshes
    /// `updated_at`. A patch reporting `active_at > 0` makes this player the
    /// active one, unconditionally and immediately.
    pub async fn upsert(&self, player_id: u32, patch: &PlayerPatch) {
        let now = chrono::Utc::now().timestamp_millis();
        let snapshot = {
            let mut state = self.state.write().await;
            let player = state
                .players
                .entry(player_id)
                .or_insert_with(|| Player::new(player_id, now));
            player.apply(patch);
            player.updated_at = now;

            if patch.active_at.unwrap_or(0) > 0 {
                state.active_id = Some(player_id);
            }
            active_snapshot(&state)
        };
        self.notify(snapshot);
    }

    /// Remove a player.
    ///
    /// When the active player is removed, the remaining player with the
    /// largest `active_at` takes over (ties broken by lowest id); with no
    /// players left there is no active player. An unknown id is a no-op.
    pub async fn remove(&self, player_id: u32) {
        let snapshot = {
            let mut state = self.state.write().await;
            if state.players.remove(&player_id).is_none() {
                debug!(player_id, "remove for unknown player ignored");
                return;
            }
            if state.active_id == Some(player_id) {
                state.active_id = state
                    .players
                    .values()
                    .max_by(|a, b| {
                        a.active_at
                            .cmp(&b.active_at)
                            .then_with(|| b.id.cmp(&a.id))
                    })
                    .map(|player| player.id);
            }
            active_snapshot(&state)
        };
        self.notify(snapshot);
    }

    /// Attach a cover art content path to a player.
    ///
    /// Returns false when the player is unknown, in which case nothing
    /// changes and nothing is published.
    pub async fn attach_cover(&self, player_id: u32, path: &Path) -> bool {
        let snapshot = {
            let mut state = self.state.write().await;
            let Some(player) = state.players.get_mut(&player_id) else {
                return false;
            };
            player.cover = path.to_string_lossy().into_owned();
            player.updated_at = chrono::Utc::now().timestamp_millis();
            active_snapshot(&state)
        };
        self.notify(snapshot);
        true
    }

    /// Drop every player, for when the adapter transport goes away.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.players.clear();
        state.active_id = None;
    }

    /// Snapshot of the currently active player, if any.
    pub async fn active_player(&self) -> Option<Player> {
        let state = self.state.read().await;
        active_snapshot(&state)
    }

    /// Ids of all present players, ascending.
    pub async fn player_ids(&self) -> Vec<u32> {
        let state = self.state.read().await;
        let mut ids: Vec<u32> = state.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn notify(&self, snapshot: Option<Player>) {
        if let Some(player) = snapshot {
            let _ = self.updates.send(player);
        }
    }
}

fn active_snapshot(state: &RegistryState) -> Option<Player> {
    state
        .active_id
        .and_then(|id| state.players.get(&id))
        .cloned()
}
