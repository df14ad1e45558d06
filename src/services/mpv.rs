use dashmap::DashMap;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::config::settings::PlayerConfig;
use crate::error::{AppError, AppResult};
use crate::models::PlayerEvent;
use crate::services::player_events::PlayerEvents;

/// How long to keep retrying the IPC socket after spawning the player
const IPC_CONNECT_ATTEMPTS: u32 = 50;
const IPC_CONNECT_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on waiting for a command reply
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Properties observed for the event stream
const OBSERVED_PROPERTIES: &[(u64, &str)] = &[
    (1, "pause"),
    (2, "volume"),
    (3, "mute"),
    (4, "duration"),
    (5, "time-pos"),
];

#[derive(Debug, thiserror::Error)]
pub enum MpvError {
    #[error("failed to spawn player process: {0}")]
    Spawn(std::io::Error),
    #[error("failed to connect to player IPC socket: {0}")]
    Connect(String),
    #[error("player IPC write failed: {0}")]
    Io(std::io::Error),
    #[error("player rejected command: {0}")]
    Command(String),
    #[error("player connection closed")]
    ConnectionClosed,
    #[error("player command timed out")]
    Timeout,
}

/// Playlist insertion modes accepted by `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    Replace,
    Append,
    AppendPlay,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Replace => "replace",
            LoadMode::Append => "append",
            LoadMode::AppendPlay => "append-play",
        }
    }
}

/// Seek interpretation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeekMode {
    Relative,
    Absolute,
}

impl SeekMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeekMode::Relative => "relative",
            SeekMode::Absolute => "absolute",
        }
    }
}

struct PlayerConn {
    id: u64,
    child: Child,
    writer: OwnedWriteHalf,
}

/// Facade over a local mpv instance controlled through its JSON IPC socket.
///
/// The player process is started lazily on the first operation and respawned
/// after a crash or quit. Lifecycle events are republished through
/// [`PlayerEvents`]. After a `stopped` event the player is shut down once a
/// fixed idle window elapses, unless a subsequent start supersedes it; the
/// generation counter collapses stacked stop events into a single pending
/// shutdown.
#[derive(Clone)]
pub struct MpvService {
    config: PlayerConfig,
    events: PlayerEvents,
    conn: Arc<Mutex<Option<PlayerConn>>>,
    pending: Arc<DashMap<u64, oneshot::Sender<JsonValue>>>,
    next_request_id: Arc<AtomicU64>,
    next_conn_id: Arc<AtomicU64>,
    playback_generation: Arc<AtomicU64>,
}

impl MpvService {
    pub fn new(config: PlayerConfig, events: PlayerEvents) -> Self {
        Self {
            config,
            events,
            conn: Arc::new(Mutex::new(None)),
            pending: Arc::new(DashMap::new()),
            next_request_id: Arc::new(AtomicU64::new(1)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
            playback_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    // --- Public operations ---

    pub async fn load(&self, uri: &str, mode: LoadMode, options: Option<Vec<String>>) -> AppResult<()> {
        // A new load supersedes any pending idle shutdown
        self.playback_generation.fetch_add(1, Ordering::SeqCst);
        let mut cmd = vec![json!("loadfile"), json!(uri), json!(mode.as_str())];
        if let Some(options) = options {
            if !options.is_empty() {
                cmd.push(json!(options.join(",")));
            }
        }
        self.command(cmd).await.map(|_| ()).map_err(|e| self.op_err("load media", e))
    }

    pub async fn play(&self) -> AppResult<()> {
        self.command(vec![json!("set_property"), json!("pause"), json!(false)])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("resume playback", e))
    }

    pub async fn pause(&self) -> AppResult<()> {
        self.command(vec![json!("set_property"), json!("pause"), json!(true)])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("pause playback", e))
    }

    pub async fn toggle_pause(&self) -> AppResult<()> {
        self.command(vec![json!("cycle"), json!("pause")])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("toggle pause", e))
    }

    pub async fn stop(&self) -> AppResult<()> {
        self.command(vec![json!("stop")])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("stop playback", e))
    }

    pub async fn next(&self) -> AppResult<()> {
        self.command(vec![json!("playlist-next")])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("skip to next track", e))
    }

    pub async fn prev(&self) -> AppResult<()> {
        self.command(vec![json!("playlist-prev")])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("skip to previous track", e))
    }

    /// Seek within the current track, in seconds
    pub async fn seek(&self, position: f64, mode: SeekMode) -> AppResult<()> {
        self.command(vec![json!("seek"), json!(position), json!(mode.as_str())])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("seek", e))
    }

    /// Set playback volume, 0-100
    pub async fn volume(&self, level: u32) -> AppResult<()> {
        self.command(vec![json!("set_property"), json!("volume"), json!(level)])
            .await
            .map(|_| ())
            .map_err(|e| self.op_err("set volume", e))
    }

    /// Set mute explicitly, or toggle it when no flag is given
    pub async fn mute(&self, flag: Option<bool>) -> AppResult<()> {
        let cmd = match flag {
            Some(flag) => vec![json!("set_property"), json!("mute"), json!(flag)],
            None => vec![json!("cycle"), json!("mute")],
        };
        self.command(cmd).await.map(|_| ()).map_err(|e| self.op_err("set mute", e))
    }

    /// Duration of the current track in seconds; None while nothing is loaded
    pub async fn get_duration(&self) -> AppResult<Option<f64>> {
        match self.command(vec![json!("get_property"), json!("duration")]).await {
            Ok(value) => Ok(value.as_f64()),
            // mpv reports "property unavailable" while idle
            Err(MpvError::Command(_)) => Ok(None),
            Err(e) => Err(self.op_err("query duration", e)),
        }
    }

    pub async fn get_property(&self, name: &str) -> AppResult<JsonValue> {
        match self.command(vec![json!("get_property"), json!(name)]).await {
            Ok(value) => Ok(value),
            Err(MpvError::Command(_)) => Ok(JsonValue::Null),
            Err(e) => Err(self.op_err("query property", e)),
        }
    }

    /// Batch property query; unavailable properties come back as null rather
    /// than failing the whole batch.
    pub async fn get_all_properties(&self, names: &[String]) -> AppResult<JsonMap<String, JsonValue>> {
        let mut properties = JsonMap::new();
        for name in names {
            let value = self.get_property(name).await?;
            properties.insert(name.clone(), value);
        }
        Ok(properties)
    }

    /// Whether the player process is currently alive. Does not start it.
    pub async fn is_running(&self) -> bool {
        let mut guard = self.conn.lock().await;
        match guard.as_mut() {
            Some(conn) => matches!(conn.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    // --- Process lifecycle ---

    /// Spawn the player and connect its IPC socket if not already running
    async fn ensure_started(&self) -> Result<(), MpvError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_mut() {
            if matches!(conn.child.try_wait(), Ok(None)) {
                return Ok(());
            }
            *guard = None;
        }

        // Stale socket from a previous run would make mpv fail to bind
        let _ = std::fs::remove_file(&self.config.socket_path);

        let child = Command::new(&self.config.binary)
            .arg("--idle=yes")
            .arg("--no-video")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", self.config.socket_path))
            .kill_on_drop(true)
            .spawn()
            .map_err(MpvError::Spawn)?;

        let stream = self.connect_with_retry().await?;
        let (read_half, mut write_half) = stream.into_split();

        for (id, property) in OBSERVED_PROPERTIES {
            let line = format!("{}\n", json!({"command": ["observe_property", id, property]}));
            write_half.write_all(line.as_bytes()).await.map_err(MpvError::Io)?;
        }

        info!("Media player started ({})", self.config.binary);
        self.playback_generation.fetch_add(1, Ordering::SeqCst);
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        *guard = Some(PlayerConn {
            id: conn_id,
            child,
            writer: write_half,
        });
        self.spawn_reader(conn_id, read_half);
        Ok(())
    }

    async fn connect_with_retry(&self) -> Result<UnixStream, MpvError> {
        for _ in 0..IPC_CONNECT_ATTEMPTS {
            match UnixStream::connect(&self.config.socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(_) => tokio::time::sleep(IPC_CONNECT_DELAY).await,
            }
        }
        Err(MpvError::Connect(format!(
            "socket {} did not come up",
            self.config.socket_path
        )))
    }

    /// Read IPC lines until the socket closes, routing command replies to
    /// their waiters and republishing player events.
    fn spawn_reader(&self, conn_id: u64, read_half: OwnedReadHalf) {
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);
        let conn = Arc::clone(&self.conn);
        let generation = Arc::clone(&self.playback_generation);
        let idle_shutdown = Duration::from_secs(self.config.idle_shutdown_secs);

        tokio::spawn(async move {
            let mut lines = FramedRead::new(read_half, LinesCodec::new());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Player IPC read failed: {}", e);
                        break;
                    }
                };
                let value: JsonValue = match serde_json::from_str(&line) {
                    Ok(value) => value,
                    Err(e) => {
                        debug!("Ignoring unparseable IPC line: {}", e);
                        continue;
                    }
                };

                if let Some(request_id) = value.get("request_id").and_then(JsonValue::as_u64) {
                    if let Some((_, tx)) = pending.remove(&request_id) {
                        let _ = tx.send(value);
                    }
                    continue;
                }

                if let Some(event) = map_event(&value) {
                    match event {
                        PlayerEvent::Started => {
                            generation.fetch_add(1, Ordering::SeqCst);
                        }
                        PlayerEvent::Stopped => {
                            arm_idle_shutdown(
                                Arc::clone(&conn),
                                Arc::clone(&generation),
                                idle_shutdown,
                            );
                        }
                        _ => {}
                    }
                    events.publish(event);
                }
            }

            // Socket closed: the player is gone. Fail outstanding waiters and
            // report whether it died or left cleanly. Only clear the slot if
            // it still holds this reader's connection; a respawn may already
            // have replaced it.
            pending.clear();
            let crashed = {
                let mut guard = conn.lock().await;
                match guard.take_if(|player| player.id == conn_id) {
                    Some(mut player) => {
                        match tokio::time::timeout(Duration::from_secs(2), player.child.wait()).await {
                            Ok(Ok(status)) => !status.success(),
                            Ok(Err(_)) => false,
                            Err(_) => {
                                let _ = player.child.start_kill();
                                false
                            }
                        }
                    }
                    None => false,
                }
            };
            if crashed {
                warn!("Media player crashed");
                events.publish(PlayerEvent::Crashed);
            } else {
                info!("Media player quit");
                events.publish(PlayerEvent::Quit);
            }
        });
    }

    /// Send one IPC command and await its reply
    async fn command(&self, cmd: Vec<JsonValue>) -> Result<JsonValue, MpvError> {
        self.ensure_started().await?;

        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        let line = format!("{}\n", json!({"command": cmd, "request_id": request_id}));
        {
            let mut guard = self.conn.lock().await;
            let Some(conn) = guard.as_mut() else {
                self.pending.remove(&request_id);
                return Err(MpvError::ConnectionClosed);
            };
            if let Err(e) = conn.writer.write_all(line.as_bytes()).await {
                self.pending.remove(&request_id);
                return Err(MpvError::Io(e));
            }
        }

        let reply = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(MpvError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(&request_id);
                return Err(MpvError::Timeout);
            }
        };

        let status = reply.get("error").and_then(JsonValue::as_str).unwrap_or("unknown");
        if status != "success" {
            return Err(MpvError::Command(status.to_string()));
        }
        Ok(reply.get("data").cloned().unwrap_or(JsonValue::Null))
    }

    fn op_err(&self, what: &str, e: MpvError) -> AppError {
        error!("Player operation failed: {}: {}", what, e);
        AppError::Internal(format!("Failed to {}: {}", what, e))
    }

    #[cfg(test)]
    async fn attach_for_test(&self, child: Child, stream: UnixStream) {
        let (read_half, write_half) = stream.into_split();
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        *self.conn.lock().await = Some(PlayerConn {
            id: conn_id,
            child,
            writer: write_half,
        });
        self.spawn_reader(conn_id, read_half);
    }
}

/// Map a raw mpv IPC event object onto the dashboard event vocabulary
fn map_event(value: &JsonValue) -> Option<PlayerEvent> {
    match value.get("event")?.as_str()? {
        "start-file" => Some(PlayerEvent::Started),
        "seek" => Some(PlayerEvent::Seek),
        "end-file" => Some(PlayerEvent::Stopped),
        "property-change" => {
            let name = value.get("name")?.as_str()?;
            let data = value.get("data").cloned().unwrap_or(JsonValue::Null);
            match name {
                "pause" => Some(if data == JsonValue::Bool(true) {
                    PlayerEvent::Paused
                } else {
                    PlayerEvent::Resumed
                }),
                "time-pos" => data.as_f64().map(PlayerEvent::TimePosition),
                _ => Some(PlayerEvent::Status {
                    property: name.to_string(),
                    value: data,
                }),
            }
        }
        // "shutdown" and friends are covered by the socket closing
        _ => None,
    }
}

/// Arm the deferred shutdown after a stop. The timer only fires if the
/// playback generation is unchanged, so any subsequent start cancels it and
/// stacked stops collapse into one effective timer.
fn arm_idle_shutdown(
    conn: Arc<Mutex<Option<PlayerConn>>>,
    generation: Arc<AtomicU64>,
    idle_window: Duration,
) {
    let armed_generation = generation.load(Ordering::SeqCst);
    tokio::spawn(async move {
        tokio::time::sleep(idle_window).await;
        if generation.load(Ordering::SeqCst) != armed_generation {
            return;
        }
        info!("Player idle for {:?}, shutting it down", idle_window);
        let mut guard = conn.lock().await;
        if let Some(player) = guard.as_mut() {
            // Polite quit; the reader task emits the Quit event when the
            // socket goes away.
            let line = format!("{}\n", json!({"command": ["quit"]}));
            let _ = player.writer.write_all(line.as_bytes()).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn test_service(idle_shutdown_secs: u64) -> MpvService {
        MpvService::new(
            PlayerConfig {
                binary: "mpv".to_string(),
                socket_path: "/tmp/homehub-mpv-test.sock".to_string(),
                idle_shutdown_secs,
            },
            PlayerEvents::new(),
        )
    }

    /// A long-lived stand-in for the player process
    fn fake_player_process() -> Child {
        Command::new("sleep")
            .arg("120")
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sleep")
    }

    #[test]
    fn load_modes_map_to_mpv_strings() {
        assert_eq!(LoadMode::Replace.as_str(), "replace");
        assert_eq!(LoadMode::Append.as_str(), "append");
        assert_eq!(LoadMode::AppendPlay.as_str(), "append-play");
        let parsed: LoadMode = serde_json::from_str("\"append-play\"").unwrap();
        assert_eq!(parsed, LoadMode::AppendPlay);
    }

    #[test]
    fn raw_events_map_to_dashboard_vocabulary() {
        assert_eq!(map_event(&json!({"event": "start-file"})), Some(PlayerEvent::Started));
        assert_eq!(map_event(&json!({"event": "end-file"})), Some(PlayerEvent::Stopped));
        assert_eq!(map_event(&json!({"event": "seek"})), Some(PlayerEvent::Seek));
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "pause", "data": true})),
            Some(PlayerEvent::Paused)
        );
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "pause", "data": false})),
            Some(PlayerEvent::Resumed)
        );
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "time-pos", "data": 4.5})),
            Some(PlayerEvent::TimePosition(4.5))
        );
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "volume", "data": 55.0})),
            Some(PlayerEvent::Status {
                property: "volume".to_string(),
                value: json!(55.0)
            })
        );
        // Unknown events and null time-pos are dropped
        assert_eq!(map_event(&json!({"event": "file-loaded"})), None);
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "time-pos", "data": null})),
            None
        );
    }

    #[tokio::test]
    async fn command_replies_route_by_request_id() {
        let service = test_service(600);
        let (client_side, server_side) = UnixStream::pair().unwrap();
        service.attach_for_test(fake_player_process(), client_side).await;

        // Fake player: answer every command, interleaving an event in between
        let fake = tokio::spawn(async move {
            let (read, mut write) = server_side.into_split();
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: JsonValue = serde_json::from_str(&line).unwrap();
                let id = req["request_id"].as_u64().unwrap();
                let event = "{\"event\":\"seek\"}\n";
                write.write_all(event.as_bytes()).await.unwrap();
                let reply = format!("{{\"request_id\":{},\"error\":\"success\",\"data\":42.0}}\n", id);
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let duration = service.get_duration().await.unwrap();
        assert_eq!(duration, Some(42.0));
        let value = service.get_property("volume").await.unwrap();
        assert_eq!(value, json!(42.0));

        fake.abort();
    }

    #[tokio::test]
    async fn rejected_command_surfaces_as_unavailable() {
        let service = test_service(600);
        let (client_side, server_side) = UnixStream::pair().unwrap();
        service.attach_for_test(fake_player_process(), client_side).await;

        let fake = tokio::spawn(async move {
            let (read, mut write) = server_side.into_split();
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: JsonValue = serde_json::from_str(&line).unwrap();
                let id = req["request_id"].as_u64().unwrap();
                let reply = format!(
                    "{{\"request_id\":{},\"error\":\"property unavailable\"}}\n",
                    id
                );
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        // get_duration treats a rejected query as "nothing loaded"
        assert_eq!(service.get_duration().await.unwrap(), None);
        // a mutation propagates the failure
        assert!(service.stop().await.is_err());

        fake.abort();
    }

    #[tokio::test]
    async fn player_events_reach_subscribers_in_order() {
        let service = test_service(600);
        let mut rx = service.events.subscribe();
        let (client_side, server_side) = UnixStream::pair().unwrap();
        service.attach_for_test(fake_player_process(), client_side).await;

        let (_read, mut write) = server_side.into_split();
        write
            .write_all(
                b"{\"event\":\"start-file\"}\n{\"event\":\"property-change\",\"name\":\"pause\",\"data\":true}\n",
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::Started);
        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::Paused);
    }

    #[tokio::test]
    async fn stop_event_arms_idle_shutdown() {
        let service = test_service(0);
        let (client_side, server_side) = UnixStream::pair().unwrap();
        service.attach_for_test(fake_player_process(), client_side).await;

        let (read, mut write) = server_side.into_split();
        write.write_all(b"{\"event\":\"end-file\"}\n").await.unwrap();

        // The zero-length idle window fires immediately and sends quit
        let mut lines = BufReader::new(read).lines();
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .expect("expected a quit command")
            .unwrap()
            .unwrap();
        assert!(line.contains("quit"), "got {}", line);
    }

    #[tokio::test]
    async fn subsequent_start_supersedes_idle_shutdown() {
        let service = test_service(1);
        let (client_side, server_side) = UnixStream::pair().unwrap();
        service.attach_for_test(fake_player_process(), client_side).await;

        let (read, mut write) = server_side.into_split();
        write
            .write_all(b"{\"event\":\"end-file\"}\n{\"event\":\"start-file\"}\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(read).lines();
        let quit = tokio::time::timeout(Duration::from_millis(1500), lines.next_line()).await;
        assert!(quit.is_err(), "shutdown should have been superseded");
    }

    #[tokio::test]
    async fn closed_socket_emits_quit_and_fails_waiters() {
        let service = test_service(600);
        let mut rx = service.events.subscribe();
        let (client_side, server_side) = UnixStream::pair().unwrap();

        let mut child = fake_player_process();
        child.start_kill().unwrap();
        service.attach_for_test(child, client_side).await;

        drop(server_side);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("expected a lifecycle event")
            .unwrap();
        assert!(matches!(event, PlayerEvent::Quit | PlayerEvent::Crashed));
        assert!(!service.is_running().await);
    }
}
