//! End-to-end tests of the adapter protocol server against a real websocket
//! client.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use soundring::services::media::{Config, MediaError, MediaService, Player, PlayerCommand};

type Adapter = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

const PLAYER_FIVE: &str =
    "0 5 MyApp|Song A|Artist A|||1|30|200|80|0|1|0|3|3|1|1|1|1|1|0|0|0|0|0|99";

async fn start_service() -> MediaService {
    let dir = std::env::temp_dir().join(format!("soundring-test-{}", std::process::id()));
    MediaService::start(Config {
        port: 0,
        cover_dir: dir,
    })
    .await
    .unwrap()
}

/// Connect a fake adapter and consume the version handshake.
async fn connect_adapter(service: &MediaService) -> Adapter {
    let url = format!("ws://{}", service.local_addr());
    let (mut ws, _) = timeout(WAIT, connect_async(url.as_str()))
        .await
        .unwrap()
        .unwrap();
    let handshake = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(
        handshake,
        Message::Text("ADAPTER_VERSION 1.0.0;WNPLIB_REVISION 3".to_string())
    );
    ws
}

async fn next_snapshot(updates: &mut broadcast::Receiver<Player>) -> Player {
    timeout(WAIT, updates.recv()).await.unwrap().unwrap()
}

async fn next_text(ws: &mut Adapter) -> String {
    match timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap() {
        Message::Text(text) => text,
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn player_added_becomes_the_active_snapshot() {
    let service = start_service().await;
    let mut updates = service.subscribe();
    let mut ws = connect_adapter(&service).await;

    ws.send(Message::Text(PLAYER_FIVE.to_string())).await.unwrap();

    let player = next_snapshot(&mut updates).await;
    assert_eq!(player.id, 5);
    assert_eq!(player.name, "MyApp");
    assert_eq!(player.title, "Song A");
    assert_eq!(player.artist, "Artist A");
    assert_eq!(player.position, 30);
    assert_eq!(player.duration, 200);
    assert_eq!(player.volume, 80);
    assert_eq!(player.active_at, 99);
    assert!(player.can_set_volume);
    assert!(!player.can_set_rating);

    assert_eq!(service.player_ids().await, vec![5]);
    service.shutdown().await;
}

#[tokio::test]
async fn volume_control_reaches_the_adapter_as_a_command_line() {
    let service = start_service().await;
    let mut updates = service.subscribe();
    let mut ws = connect_adapter(&service).await;

    ws.send(Message::Text(PLAYER_FIVE.to_string())).await.unwrap();
    next_snapshot(&mut updates).await;

    service.set_volume(55).await.unwrap();

    let line = next_text(&mut ws).await;
    assert!(line.starts_with("5 evt_"), "unexpected command line {line:?}");
    assert!(line.ends_with(" 4 55"), "unexpected command line {line:?}");

    // The adapter's acknowledgement is consumed without breaking anything.
    let event_id = line.split(' ').nth(1).unwrap();
    ws.send(Message::Text(format!("3 {event_id} 0"))).await.unwrap();

    service.shutdown().await;
}

#[tokio::test]
async fn controls_without_an_active_player_are_silent() {
    let service = start_service().await;
    let mut ws = connect_adapter(&service).await;

    service.set_volume(55).await.unwrap();
    service.toggle_play_pause().await.unwrap();

    // Nothing reaches the adapter.
    let quiet = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(quiet.is_err(), "unexpected frame {quiet:?}");

    service.shutdown().await;
}

#[tokio::test]
async fn raw_send_without_a_transport_is_not_connected() {
    let service = start_service().await;

    let result = service.send_command(1, PlayerCommand::SetVolume(10)).await;
    assert!(matches!(result, Err(MediaError::NotConnected)));

    service.shutdown().await;
}

#[tokio::test]
async fn cover_blob_attaches_to_the_player() {
    let service = start_service().await;
    let mut updates = service.subscribe();
    let mut ws = connect_adapter(&service).await;

    ws.send(Message::Text(PLAYER_FIVE.to_string())).await.unwrap();
    next_snapshot(&mut updates).await;

    let mut frame = 5u32.to_le_bytes().to_vec();
    frame.extend_from_slice(b"\x89PNG fake cover bytes");
    ws.send(Message::Binary(frame)).await.unwrap();

    let player = next_snapshot(&mut updates).await;
    assert!(player.cover.ends_with("5.png"), "cover path {:?}", player.cover);
    let written = std::fs::read(&player.cover).unwrap();
    assert_eq!(written, b"\x89PNG fake cover bytes");

    service.shutdown().await;
}

#[tokio::test]
async fn removing_the_active_player_falls_back_to_the_most_recent_claim() {
    let service = start_service().await;
    let mut updates = service.subscribe();
    let mut ws = connect_adapter(&service).await;

    ws.send(Message::Text(PLAYER_FIVE.to_string())).await.unwrap();
    assert_eq!(next_snapshot(&mut updates).await.id, 5);

    ws.send(Message::Text(
        "0 6 OtherApp|Song B||||0|0|100|50|0|1|0|0|3|1|1|1|1|1|1|1|1|0|0|120".to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(next_snapshot(&mut updates).await.id, 6);

    ws.send(Message::Text("2 6".to_string())).await.unwrap();
    let player = next_snapshot(&mut updates).await;
    assert_eq!(player.id, 5);

    service.shutdown().await;
}

#[tokio::test]
async fn a_new_connection_replaces_the_previous_one() {
    let service = start_service().await;
    let mut first = connect_adapter(&service).await;
    let _second = connect_adapter(&service).await;

    // The replaced transport is closed from the server side.
    let ended = timeout(WAIT, async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "replaced connection never closed");

    service.shutdown().await;
}

#[tokio::test]
async fn transport_loss_empties_the_registry() {
    let service = start_service().await;
    let mut updates = service.subscribe();
    let mut ws = connect_adapter(&service).await;

    ws.send(Message::Text(PLAYER_FIVE.to_string())).await.unwrap();
    next_snapshot(&mut updates).await;

    ws.close(None).await.unwrap();

    timeout(WAIT, async {
        while !service.player_ids().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(service.active_player().await.is_none());

    service.shutdown().await;
}
