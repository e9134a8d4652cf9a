//! Liveness heartbeat
//!
//! A connection that misses a pong gets one more ping. Missing the second
//! one ends the connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::packet::{Packet, PacketType};
use super::session::ConnectionHandle;
use crate::game::MatchCommand;

/// Pings that may go unanswered before the connection is dropped
pub const MAX_MISSED_PONGS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// Nothing outstanding, a ping should be sent
    Idle,
    /// Waiting for the pong
    Waiting,
    /// The pong is late, ping again
    Resend,
    Dead,
}

#[derive(Debug, Default)]
pub struct Heartbeat {
    sent_at: Option<Instant>,
    missed: u32,
    last_rtt: Option<Duration>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, now: Instant, timeout: Duration) -> HeartbeatStatus {
        let Some(sent_at) = self.sent_at else {
            return HeartbeatStatus::Idle;
        };
        if now.duration_since(sent_at) < timeout {
            return HeartbeatStatus::Waiting;
        }

        self.missed += 1;
        if self.missed >= MAX_MISSED_PONGS {
            HeartbeatStatus::Dead
        } else {
            HeartbeatStatus::Resend
        }
    }

    pub fn ping_sent(&mut self, now: Instant) {
        self.sent_at = Some(now);
    }

    /// Round trip of the outstanding ping, `None` for an unsolicited pong
    pub fn pong_received(&mut self, now: Instant) -> Option<Duration> {
        let sent_at = self.sent_at.take()?;
        self.missed = 0;
        let rtt = now.duration_since(sent_at);
        self.last_rtt = Some(rtt);
        Some(rtt)
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }
}

/// Drive the heartbeat of one player connection until it dies or closes
pub async fn run_heartbeat(
    connection: Arc<ConnectionHandle>,
    commands: mpsc::Sender<MatchCommand>,
    timeout: Duration,
) {
    let mut ticker = interval((timeout / 2).max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ping = Packet::new(PacketType::Ping);

    loop {
        ticker.tick().await;
        if commands.is_closed() {
            break;
        }

        let now = Instant::now();
        let status = connection.heartbeat.lock().check(now, timeout);
        match status {
            HeartbeatStatus::Waiting => {}
            HeartbeatStatus::Idle | HeartbeatStatus::Resend => {
                if status == HeartbeatStatus::Resend {
                    debug!(connection_id = %connection.id, "pong overdue, pinging again");
                }
                connection.heartbeat.lock().ping_sent(now);
                if connection.send(&ping) == 0 && connection.is_closed() {
                    break;
                }
            }
            HeartbeatStatus::Dead => {
                info!(connection_id = %connection.id, "no pong received, dropping connection");
                let _ = commands
                    .send(MatchCommand::Leave {
                        connection: connection.id,
                    })
                    .await;
                connection.close();
                break;
            }
        }
    }
}
