//! Codec for the adapter wire protocol.
//!
//! Inbound text frames are whitespace-delimited with at most three tokens:
//! `<messageType> <playerId-or-eventId> <rest-of-line>`. Player payloads are
//! pipe-separated with `\|` escaping and a 0x01 marker for explicitly blank
//! fields. Inbound binary frames carry a little-endian u32 player id followed
//! by a cover art blob. Outbound commands are
//! `<playerId> <eventId> <eventType>[ <payload>]`.

use super::error::MediaError;
use super::types::{
    AvailableRepeat, EventStatus, PlaybackState, PlayerCommand, PlayerPatch, RatingSystem,
    RepeatMode,
};

/// Version announcement sent to the adapter immediately on connect.
pub const HANDSHAKE: &str = "ADAPTER_VERSION 1.0.0;WNPLIB_REVISION 3";

/// Marks a field the adapter deliberately blanked, as opposed to omitted.
const EMPTY_MARKER: &str = "\u{1}";

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A player started reporting (message type 0)
    PlayerAdded {
        /// Adapter-assigned player id
        player_id: u32,
        /// Initial field values
        patch: PlayerPatch,
    },

    /// A player updated some of its fields (message type 1)
    PlayerUpdated {
        /// Adapter-assigned player id
        player_id: u32,
        /// Changed field values
        patch: PlayerPatch,
    },

    /// A player stopped reporting (message type 2)
    PlayerRemoved {
        /// Adapter-assigned player id
        player_id: u32,
    },

    /// Acknowledgement of a previously sent command (message type 3)
    EventResult {
        /// Event id echoed from the command
        event_id: String,
        /// Execution outcome
        status: EventStatus,
    },
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`MediaError::ProtocolDecode`] when the frame has too few tokens,
/// a non-numeric id where one is required, or an unknown message type. The
/// caller drops the frame and keeps the connection open.
pub fn decode_text_frame(line: &str) -> Result<InboundMessage, MediaError> {
    let mut parts = line.splitn(3, ' ');
    let message_type = parts
        .next()
        .filter(|token| !token.is_empty())
        .and_then(|token| token.parse::<u8>().ok())
        .ok_or_else(|| MediaError::ProtocolDecode(format!("invalid message type in {line:?}")))?;

    let second = parts
        .next()
        .ok_or_else(|| MediaError::ProtocolDecode(format!("missing id token in {line:?}")))?;
    let rest = parts.next();

    // Event results carry an opaque event id, not a player id.
    if message_type == 3 {
        let status = rest
            .and_then(|token| token.parse::<u32>().ok())
            .ok_or_else(|| {
                MediaError::ProtocolDecode(format!("missing or non-numeric event status in {line:?}"))
            })?;
        return Ok(InboundMessage::EventResult {
            event_id: second.to_string(),
            status: EventStatus::from(status),
        });
    }

    let player_id = second
        .parse::<u32>()
        .map_err(|_| MediaError::ProtocolDecode(format!("non-numeric player id in {line:?}")))?;

    match message_type {
        0 | 1 => {
            let data = rest.ok_or_else(|| {
                MediaError::ProtocolDecode(format!("missing player data in {line:?}"))
            })?;
            let patch = decode_player_payload(data);
            Ok(if message_type == 0 {
                InboundMessage::PlayerAdded { player_id, patch }
            } else {
                InboundMessage::PlayerUpdated { player_id, patch }
            })
        }
        2 => Ok(InboundMessage::PlayerRemoved { player_id }),
        other => Err(MediaError::ProtocolDecode(format!(
            "unknown message type {other} in {line:?}"
        ))),
    }
}

/// Decode a binary cover art frame into its player id and blob.
///
/// # Errors
///
/// Returns [`MediaError::ProtocolDecode`] when the frame is shorter than the
/// 4-byte id prefix.
pub fn decode_cover_frame(data: &[u8]) -> Result<(u32, &[u8]), MediaError> {
    if data.len() < 4 {
        return Err(MediaError::ProtocolDecode(format!(
            "cover frame too short ({} bytes)",
            data.len()
        )));
    }
    let player_id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Ok((player_id, &data[4..]))
}

/// Split a pipe-separated payload into fields, honoring `\|` escapes.
///
/// A zero-length segment decodes to `None` (field omitted this update);
/// the 0x01 marker decodes to `Some("")` (field deliberately blank).
fn split_fields(data: &str) -> Vec<Option<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = data.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                current.push('|');
            }
            '|' => fields.push(finish_field(std::mem::take(&mut current))),
            other => current.push(other),
        }
    }
    fields.push(finish_field(current));
    fields
}

fn finish_field(raw: String) -> Option<String> {
    if raw.is_empty() {
        None
    } else if raw == EMPTY_MARKER {
        Some(String::new())
    } else {
        Some(raw)
    }
}

/// Escape a field value for the pipe-separated payload encoding.
///
/// The inverse of the unescaping done by the decoder; empty strings become
/// the 0x01 explicit-blank marker.
pub fn escape_field(value: &str) -> String {
    if value.is_empty() {
        EMPTY_MARKER.to_string()
    } else {
        value.replace('|', "\\|")
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Decode a player payload into a sparse patch.
///
/// Fields map positionally from `name` onward; the player id travels in the
/// frame header, never in the payload. A payload with fewer segments than
/// the field list leaves the trailing fields unset; extra segments are
/// ignored, as are the createdAt/updatedAt positions (those timestamps are
/// assigned locally).
pub fn decode_player_payload(data: &str) -> PlayerPatch {
    let fields = split_fields(data);
    let field = |index: usize| fields.get(index).and_then(Option::as_deref);

    PlayerPatch {
        name: field(0).map(str::to_string),
        title: field(1).map(str::to_string),
        artist: field(2).map(str::to_string),
        album: field(3).map(str::to_string),
        cover: field(4).map(str::to_string),
        state: field(5)
            .and_then(|f| f.parse::<u8>().ok())
            .and_then(PlaybackState::from_report_code),
        position: field(6).and_then(|f| f.parse().ok()),
        duration: field(7).and_then(|f| f.parse().ok()),
        volume: field(8).and_then(|f| f.parse::<u8>().ok()).map(|v| v.min(100)),
        rating: field(9).and_then(|f| f.parse().ok()),
        repeat: field(10)
            .and_then(|f| f.parse::<u8>().ok())
            .and_then(RepeatMode::from_code),
        shuffle: field(11).and_then(parse_bool),
        rating_system: field(12)
            .and_then(|f| f.parse::<u8>().ok())
            .and_then(RatingSystem::from_code),
        available_repeat: field(13)
            .and_then(|f| f.parse::<u8>().ok())
            .map(AvailableRepeat::from_bits_truncate),
        can_set_state: field(14).and_then(parse_bool),
        can_skip_previous: field(15).and_then(parse_bool),
        can_skip_next: field(16).and_then(parse_bool),
        can_set_position: field(17).and_then(parse_bool),
        can_set_volume: field(18).and_then(parse_bool),
        can_set_rating: field(19).and_then(parse_bool),
        can_set_repeat: field(20).and_then(parse_bool),
        can_set_shuffle: field(21).and_then(parse_bool),
        // 22 = createdAt, 23 = updatedAt: local clocks win.
        active_at: field(24).and_then(|f| f.parse().ok()),
    }
}

impl PlayerCommand {
    /// Event type code of this command in the rev-3 protocol.
    pub fn event_type(self) -> u8 {
        match self {
            Self::SetState(_) => 0,
            Self::SkipPrevious => 1,
            Self::SkipNext => 2,
            Self::SetPosition(_) => 3,
            Self::SetVolume(_) => 4,
            Self::SetRating(_) => 5,
            Self::SetRepeat(_) => 6,
            Self::SetShuffle(_) => 7,
        }
    }

    /// Payload segment of this command, if it carries one.
    pub fn payload(self) -> Option<String> {
        match self {
            Self::SetState(state) => Some(state.command_code().to_string()),
            Self::SkipPrevious | Self::SkipNext => None,
            Self::SetPosition(seconds) => Some(seconds.to_string()),
            Self::SetVolume(volume) => Some(volume.to_string()),
            Self::SetRating(rating) => Some(rating.to_string()),
            Self::SetRepeat(mode) => Some(mode.wire_name().to_string()),
            Self::SetShuffle(enabled) => Some(if enabled { "1" } else { "0" }.to_string()),
        }
    }
}

/// Encode an outbound command line.
///
/// The payload segment is omitted entirely when the command carries no data,
/// with no trailing space.
pub fn encode_command(player_id: u32, event_id: &str, command: PlayerCommand) -> String {
    let event_type = command.event_type();
    match command.payload() {
        Some(payload) => format!("{player_id} {event_id} {event_type} {payload}"),
        None => format!("{player_id} {event_id} {event_type}"),
    }
}

/// Generate a fresh correlation id for an outbound command.
///
/// Nanosecond-derived so two commands in the same session practically never
/// collide, and later ids sort after earlier ones.
pub fn next_event_id() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
    format!("evt_{nanos}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn escaped_pipes_do_not_split_fields() {
        let fields = split_fields("Artist \\| Band|Song");
        assert_eq!(fields[0].as_deref(), Some("Artist | Band"));
        assert_eq!(fields[1].as_deref(), Some("Song"));
    }

    #[test]
    fn field_escaping_round_trips() {
        for original in ["plain", "with|pipe", "trailing|", "|leading", ""] {
            let escaped = escape_field(original);
            let fields = split_fields(&escaped);
            assert_eq!(fields.len(), 1, "escaped form must stay one field");
            assert_eq!(fields[0].as_deref(), Some(original));
        }
    }

    #[test]
    fn empty_marker_decodes_to_blank_and_empty_segment_to_omitted() {
        let fields = split_fields("a|\u{1}||b");
        assert_eq!(fields[0].as_deref(), Some("a"));
        assert_eq!(fields[1].as_deref(), Some(""));
        assert_eq!(fields[2], None);
        assert_eq!(fields[3].as_deref(), Some("b"));
    }

    #[test]
    fn player_added_scenario_decodes_fully() {
        let message = decode_text_frame(
            "0 5 MyApp|Song A|Artist A|||1|30|200|80|0|1|0|3|3|1|1|1|1|1|0|0|0|0|0|99",
        )
        .unwrap();

        let InboundMessage::PlayerAdded { player_id, patch } = message else {
            panic!("expected PlayerAdded, got {message:?}");
        };
        assert_eq!(player_id, 5);
        assert_eq!(patch.name.as_deref(), Some("MyApp"));
        assert_eq!(patch.title.as_deref(), Some("Song A"));
        assert_eq!(patch.artist.as_deref(), Some("Artist A"));
        assert_eq!(patch.album, None);
        assert_eq!(patch.cover, None);
        assert_eq!(patch.state, Some(PlaybackState::Paused));
        assert_eq!(patch.position, Some(30));
        assert_eq!(patch.duration, Some(200));
        assert_eq!(patch.volume, Some(80));
        assert_eq!(patch.rating, Some(0));
        assert_eq!(patch.repeat, Some(RepeatMode::None));
        assert_eq!(patch.shuffle, Some(false));
        assert_eq!(patch.rating_system, Some(RatingSystem::Scale));
        assert_eq!(
            patch.available_repeat,
            Some(AvailableRepeat::NONE | AvailableRepeat::ALL)
        );
        assert_eq!(patch.can_set_state, Some(true));
        assert_eq!(patch.can_set_volume, Some(true));
        assert_eq!(patch.can_set_rating, Some(false));
        assert_eq!(patch.active_at, Some(99));
    }

    #[test]
    fn short_payload_leaves_trailing_fields_unset() {
        let patch = decode_player_payload("Spotify|Title");
        assert_eq!(patch.name.as_deref(), Some("Spotify"));
        assert_eq!(patch.title.as_deref(), Some("Title"));
        assert_eq!(patch.artist, None);
        assert_eq!(patch.active_at, None);
    }

    #[test]
    fn extra_segments_are_ignored() {
        let data = format!("App{}", "|1".repeat(40));
        let patch = decode_player_payload(&data);
        assert_eq!(patch.name.as_deref(), Some("App"));
    }

    #[test]
    fn malformed_numeric_fields_are_skipped_not_zeroed() {
        let patch = decode_player_payload("App||||||abc|xyz|notanum");
        assert_eq!(patch.position, None);
        assert_eq!(patch.duration, None);
        assert_eq!(patch.volume, None);
    }

    #[test]
    fn event_result_frame_never_parses_a_player_id() {
        let message = decode_text_frame("3 evt_1234 1").unwrap();
        assert_eq!(
            message,
            InboundMessage::EventResult {
                event_id: "evt_1234".to_string(),
                status: EventStatus::NotSupported,
            }
        );
    }

    #[test]
    fn structural_garbage_is_rejected() {
        assert!(decode_text_frame("").is_err());
        assert!(decode_text_frame("hello").is_err());
        assert!(decode_text_frame("0 abc data").is_err());
        assert!(decode_text_frame("9 1 data").is_err());
        assert!(decode_text_frame("0 1").is_err());
        assert!(decode_text_frame("3 evt_1").is_err());
    }

    #[test]
    fn player_removed_needs_no_payload() {
        assert_eq!(
            decode_text_frame("2 12").unwrap(),
            InboundMessage::PlayerRemoved { player_id: 12 }
        );
    }

    #[test]
    fn cover_frame_splits_id_and_blob() {
        let mut frame = 7u32.to_le_bytes().to_vec();
        frame.extend_from_slice(b"PNGDATA");
        let (player_id, blob) = decode_cover_frame(&frame).unwrap();
        assert_eq!(player_id, 7);
        assert_eq!(blob, b"PNGDATA");

        assert!(decode_cover_frame(&[1, 2, 3]).is_err());
    }

    #[test]
    fn command_lines_match_the_event_table() {
        assert_eq!(
            encode_command(7, "evt_1", PlayerCommand::SetVolume(55)),
            "7 evt_1 4 55"
        );
        assert_eq!(
            encode_command(1, "evt_2", PlayerCommand::SkipNext),
            "1 evt_2 2"
        );
        assert_eq!(
            encode_command(1, "evt_3", PlayerCommand::SetState(PlaybackState::Playing)),
            "1 evt_3 0 1"
        );
        assert_eq!(
            encode_command(1, "evt_4", PlayerCommand::SetRepeat(RepeatMode::One)),
            "1 evt_4 6 ONE"
        );
        assert_eq!(
            encode_command(1, "evt_5", PlayerCommand::SetShuffle(true)),
            "1 evt_5 7 1"
        );
        assert_eq!(
            encode_command(2, "evt_6", PlayerCommand::SetPosition(90)),
            "2 evt_6 3 90"
        );
    }

    #[test]
    fn event_ids_are_distinct_within_a_burst() {
        let a = next_event_id();
        std::thread::sleep(std::time::Duration::from_micros(10));
        let b = next_event_id();
        assert!(a.starts_with("evt_"));
        assert_ne!(a, b);
    }
}
