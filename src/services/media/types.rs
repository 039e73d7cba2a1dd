use bitflags::bitflags;
use serde::{Serialize, Serializer};

/// Current playback state of a media player.
///
/// Adapters report states numerically: 0 = Playing, 1 = Paused, 2 = Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is stopped
    Stopped,
}

impl PlaybackState {
    /// Decode the numeric state code used in inbound player payloads.
    pub fn from_report_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Playing),
            1 => Some(Self::Paused),
            2 => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Numeric code used in inbound player payloads and snapshots.
    pub fn report_code(self) -> u8 {
        match self {
            Self::Playing => 0,
            Self::Paused => 1,
            Self::Stopped => 2,
        }
    }

    /// Numeric code used in the outbound `SetState` command payload.
    ///
    /// The command revision numbers states differently from the report
    /// direction: 0 = Stopped, 1 = Playing, 2 = Paused.
    pub fn command_code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Playing => 1,
            Self::Paused => 2,
        }
    }
}

impl Serialize for PlaybackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.report_code())
    }
}

/// Repeat mode of a media player.
///
/// The numeric values form a bitmask so adapters can also advertise which
/// modes they support (see [`AvailableRepeat`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// No repetition
    None,

    /// Repeat the whole queue
    All,

    /// Repeat the current track
    One,
}

impl RepeatMode {
    /// Decode the numeric repeat code (1, 2 or 4).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::None),
            2 => Some(Self::All),
            4 => Some(Self::One),
            _ => None,
        }
    }

    /// Numeric bitmask value of this mode.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 1,
            Self::All => 2,
            Self::One => 4,
        }
    }

    /// Name used in the outbound `SetRepeat` command payload.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::All => "ALL",
            Self::One => "ONE",
        }
    }

    /// The next mode in the user-facing cycle: None -> All -> One -> None.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }
}

impl Serialize for RepeatMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Rating scheme a player exposes for the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingSystem {
    /// No rating support
    None,

    /// Like only
    Like,

    /// Like and dislike
    LikeDislike,

    /// Numeric scale
    Scale,
}

impl RatingSystem {
    /// Decode the numeric rating-system code (0-3).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Like),
            2 => Some(Self::LikeDislike),
            3 => Some(Self::Scale),
            _ => None,
        }
    }

    /// Numeric code of this rating system.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Like => 1,
            Self::LikeDislike => 2,
            Self::Scale => 3,
        }
    }
}

impl Serialize for RatingSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

bitflags! {
    /// Repeat modes an adapter advertises as supported.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AvailableRepeat: u8 {
        /// Repeat off is selectable
        const NONE = 1;
        /// Whole-queue repeat is selectable
        const ALL = 2;
        /// Single-track repeat is selectable
        const ONE = 4;
    }
}

fn serialize_repeat_mask<S: Serializer>(
    mask: &AvailableRepeat,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(mask.bits())
}

/// One reporting media source and everything known about it.
///
/// Snapshots of this record are what the presentation layer receives; cover
/// art is referenced by content path only, raw blob bytes are never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Adapter-assigned session identifier, unique while the player is present
    pub id: u32,
    /// Reporting application name
    pub name: String,
    /// Current track title
    pub title: String,
    /// Current track artist
    pub artist: String,
    /// Current track album
    pub album: String,
    /// Cover art reference (URL from the adapter or a local content path)
    pub cover: String,
    /// Playback state
    pub state: PlaybackState,
    /// Playback position in seconds
    pub position: u32,
    /// Track duration in seconds
    pub duration: u32,
    /// Volume, 0-100
    pub volume: u8,
    /// Rating: 0 = none, 1 = dislike, 5 = like
    pub rating: u8,
    /// Repeat mode
    pub repeat: RepeatMode,
    /// Shuffle enabled
    pub shuffle: bool,
    /// Rating scheme of this player
    pub rating_system: RatingSystem,
    /// Repeat modes this player supports
    #[serde(serialize_with = "serialize_repeat_mask")]
    pub available_repeat: AvailableRepeat,
    /// Whether playback state can be set remotely
    pub can_set_state: bool,
    /// Whether skipping to the previous track is supported
    pub can_skip_previous: bool,
    /// Whether skipping to the next track is supported
    pub can_skip_next: bool,
    /// Whether seeking is supported
    pub can_set_position: bool,
    /// Whether volume can be set remotely
    pub can_set_volume: bool,
    /// Whether rating can be set remotely
    pub can_set_rating: bool,
    /// Whether repeat mode can be set remotely
    pub can_set_repeat: bool,
    /// Whether shuffle can be toggled remotely
    pub can_set_shuffle: bool,
    /// Wall-clock milliseconds when the registry first saw this player
    pub created_at: i64,
    /// Wall-clock milliseconds of the last registry mutation
    pub updated_at: i64,
    /// Adapter-reported foreground-focus claim, milliseconds; 0 = never
    pub active_at: i64,
}

impl Player {
    /// Create a player with only identity and timestamps populated.
    pub(crate) fn new(id: u32, now: i64) -> Self {
        Self {
            id,
            name: String::new(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            cover: String::new(),
            state: PlaybackState::Stopped,
            position: 0,
            duration: 0,
            volume: 0,
            rating: 0,
            repeat: RepeatMode::None,
            shuffle: false,
            rating_system: RatingSystem::None,
            available_repeat: AvailableRepeat::default(),
            can_set_state: false,
            can_skip_previous: false,
            can_skip_next: false,
            can_set_position: false,
            can_set_volume: false,
            can_set_rating: false,
            can_set_repeat: false,
            can_set_shuffle: false,
            created_at: now,
            updated_at: now,
            active_at: 0,
        }
    }

    /// Merge a sparse patch into this player, field by field.
    ///
    /// Only fields present in the patch change; an explicitly blank field
    /// becomes an empty string, an omitted one keeps its previous value.
    pub(crate) fn apply(&mut self, patch: &PlayerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(artist) = &patch.artist {
            self.artist = artist.clone();
        }
        if let Some(album) = &patch.album {
            self.album = album.clone();
        }
        if let Some(cover) = &patch.cover {
            self.cover = cover.clone();
        }
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(repeat) = patch.repeat {
            self.repeat = repeat;
        }
        if let Some(shuffle) = patch.shuffle {
            self.shuffle = shuffle;
        }
        if let Some(rating_system) = patch.rating_system {
            self.rating_system = rating_system;
        }
        if let Some(available_repeat) = patch.available_repeat {
            self.available_repeat = available_repeat;
        }
        if let Some(can_set_state) = patch.can_set_state {
            self.can_set_state = can_set_state;
        }
        if let Some(can_skip_previous) = patch.can_skip_previous {
            self.can_skip_previous = can_skip_previous;
        }
        if let Some(can_skip_next) = patch.can_skip_next {
            self.can_skip_next = can_skip_next;
        }
        if let Some(can_set_position) = patch.can_set_position {
            self.can_set_position = can_set_position;
        }
        if let Some(can_set_volume) = patch.can_set_volume {
            self.can_set_volume = can_set_volume;
        }
        if let Some(can_set_rating) = patch.can_set_rating {
            self.can_set_rating = can_set_rating;
        }
        if let Some(can_set_repeat) = patch.can_set_repeat {
            self.can_set_repeat = can_set_repeat;
        }
        if let Some(can_set_shuffle) = patch.can_set_shuffle {
            self.can_set_shuffle = can_set_shuffle;
        }
        if let Some(active_at) = patch.active_at {
            self.active_at = active_at;
        }
    }
}

/// Sparse, typed update for a player.
///
/// Each field is `None` when the payload omitted it; string fields carry
/// `Some("")` when the adapter marked them explicitly blank. Malformed
/// numeric fields decode to `None` so the merge leaves the existing value
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerPatch {
    /// Reporting application name
    pub name: Option<String>,
    /// Track title
    pub title: Option<String>,
    /// Track artist
    pub artist: Option<String>,
    /// Track album
    pub album: Option<String>,
    /// Cover art reference
    pub cover: Option<String>,
    /// Playback state
    pub state: Option<PlaybackState>,
    /// Position in seconds
    pub position: Option<u32>,
    /// Duration in seconds
    pub duration: Option<u32>,
    /// Volume, 0-100
    pub volume: Option<u8>,
    /// Rating value
    pub rating: Option<u8>,
    /// Repeat mode
    pub repeat: Option<RepeatMode>,
    /// Shuffle enabled
    pub shuffle: Option<bool>,
    /// Rating scheme
    pub rating_system: Option<RatingSystem>,
    /// Supported repeat modes
    pub available_repeat: Option<AvailableRepeat>,
    /// State control supported
    pub can_set_state: Option<bool>,
    /// Previous-track control supported
    pub can_skip_previous: Option<bool>,
    /// Next-track control supported
    pub can_skip_next: Option<bool>,
    /// Seek control supported
    pub can_set_position: Option<bool>,
    /// Volume control supported
    pub can_set_volume: Option<bool>,
    /// Rating control supported
    pub can_set_rating: Option<bool>,
    /// Repeat control supported
    pub can_set_repeat: Option<bool>,
    /// Shuffle control supported
    pub can_set_shuffle: Option<bool>,
    /// Foreground-focus claim, milliseconds
    pub active_at: Option<i64>,
}

/// A remote control command for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Set the playback state
    SetState(PlaybackState),

    /// Skip to the previous track
    SkipPrevious,

    /// Skip to the next track
    SkipNext,

    /// Seek to a position in seconds
    SetPosition(u32),

    /// Set the volume, 0-100
    SetVolume(u8),

    /// Set the track rating
    SetRating(u8),

    /// Set the repeat mode
    SetRepeat(RepeatMode),

    /// Enable or disable shuffle
    SetShuffle(bool),
}

/// Outcome of a previously sent command, echoed back by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Command executed
    Success,

    /// The player does not support the command
    NotSupported,

    /// The adapter timed out or was unable to execute the command
    Failed,

    /// Status code outside the protocol revision
    Unknown,
}

impl From<u32> for EventStatus {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::NotSupported,
            2 => Self::Failed,
            _ => Self::Unknown,
        }
    }
}
