use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use lanfire_core::net::messages::{ClientMessage, ServerMessage};
use lanfire_core::net::protocol::encode_server_message;
use lanfire_core::player::PlayerId;
use lanfire_sim::{Outbound, Recipient, Simulation};

/// Commands sent from WebSocket handlers to the game loop.
#[derive(Debug)]
pub enum GameCommand {
    /// A socket was accepted. The loop allocates a player, queues the
    /// welcome on `sender` and replies with the new id.
    Connect {
        sender: mpsc::Sender<Utf8Bytes>,
        reply: oneshot::Sender<PlayerId>,
    },
    Client {
        player_id: PlayerId,
        msg: ClientMessage,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Stop,
}

/// Spawn the task that owns the simulation.
pub fn spawn_game_loop(sim: Simulation) -> (mpsc::UnboundedSender<GameCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_game_loop(sim, cmd_rx));
    (cmd_tx, handle)
}

/// Per-connection outbound queues.
#[derive(Default)]
struct Connections {
    senders: BTreeMap<PlayerId, mpsc::Sender<Utf8Bytes>>,
}

impl Connections {
    /// Encode each message once and queue it for every recipient. Full or
    /// closed queues are skipped; a slow client never stalls the loop.
    fn dispatch(&self, out: Vec<Outbound>) {
        for Outbound { to, msg } in out {
            let frame = match encode_server_message(&msg) {
                Ok(text) => Utf8Bytes::from(text),
                Err(e) => {
                    tracing::error!(kind = msg.kind(), error = %e, "Failed to encode message");
                    continue;
                },
            };
            self.send(to, &frame, &msg);
        }
    }

    fn send(&self, to: Recipient, frame: &Utf8Bytes, msg: &ServerMessage) {
        for (&id, sender) in &self.senders {
            if !to.includes(id) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = sender.try_send(frame.clone()) {
                tracing::debug!(player_id = %id, kind = msg.kind(), "Outbound queue full, frame dropped");
            }
        }
    }
}

/// The server-authoritative loop: broadcasts state on a fixed interval,
/// applies client commands in arrival order, and fires scheduled effects
/// when they come due.
async fn run_game_loop(mut sim: Simulation, mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>) {
    let start = Instant::now();
    let now_ms = || start.elapsed().as_millis() as u64;

    let tick_interval = Duration::from_millis(sim.config().tick_interval_ms());
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut connections = Connections::default();

    tracing::info!(
        tick_ms = tick_interval.as_millis() as u64,
        "Game loop started"
    );

    loop {
        let deadline = sim
            .next_deadline()
            .map(|ms| start + Duration::from_millis(ms));

        tokio::select! {
            _ = interval.tick() => {
                connections.dispatch(sim.advance(now_ms()));
                connections.dispatch(vec![Outbound {
                    to: Recipient::All,
                    msg: sim.state_message(),
                }]);
            }
            _ = sleep_until(deadline) => {
                connections.dispatch(sim.advance(now_ms()));
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Connect { sender, reply }) => {
                        let (player_id, out) = sim.connect();
                        connections.senders.insert(player_id, sender);
                        connections.dispatch(out);
                        if reply.send(player_id).is_err() {
                            // Socket went away before learning its id.
                            connections.senders.remove(&player_id);
                            connections.dispatch(sim.disconnect(player_id));
                        }
                    },
                    Some(GameCommand::Client { player_id, msg }) => {
                        let now = now_ms();
                        let mut out = sim.advance(now);
                        out.extend(sim.handle(player_id, msg, now));
                        connections.dispatch(out);
                    },
                    Some(GameCommand::Disconnect { player_id }) => {
                        connections.senders.remove(&player_id);
                        connections.dispatch(sim.disconnect(player_id));
                    },
                    Some(GameCommand::Stop) | None => break,
                }
            }
        }
    }

    tracing::info!("Game loop stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
