//! Relays one agent run to an HTTP client.
//!
//! [`stream_agent`] forwards every upstream message as a `progress` event in
//! arrival order, sends keepalive comments while the upstream is quiet, and
//! finishes with exactly one terminal event (`complete` or `error`).
//! [`collect_agent`] buffers the run for a single JSON response.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::{StreamExt, TryStreamExt};
use skillgate_agent::{AgentClient, QueryOptions};
use skillgate_core::{AgentError, OutcomeTracker, RelayOutcome, UpstreamMessage, Usage};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::dto::SseData;

/// One event on the relay channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Progress(UpstreamMessage),
    Complete {
        response: String,
        usage: Option<Usage>,
        cost_usd: Option<f64>,
    },
    Error {
        errors: Vec<String>,
    },
    Keepalive,
}

impl RelayEvent {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            errors: vec![message.into()],
        }
    }

    fn from_outcome(outcome: RelayOutcome) -> Self {
        match outcome {
            RelayOutcome::Success { response, usage, cost_usd } => Self::Complete {
                response,
                usage,
                cost_usd,
            },
            RelayOutcome::Failure { errors } => Self::Error { errors },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Encodes the event for the SSE body.
    pub fn into_sse(self) -> Result<Event, Infallible> {
        let (name, data) = match self {
            Self::Keepalive => return Ok(Event::default().comment("keepalive")),
            Self::Progress(msg) => ("progress", SseData::Progress { data: msg.to_value() }),
            Self::Complete { response, usage, cost_usd } => (
                "complete",
                SseData::Complete { response, usage, cost_usd },
            ),
            Self::Error { errors } => ("error", SseData::Error { errors }),
        };

        match Event::default().event(name).json_data(&data) {
            Ok(event) => Ok(event),
            Err(e) => {
                error!("Failed to encode {} event: {}", name, e);
                Ok(Event::default().event("error").data(r#"{"type":"error","errors":["Failed to encode event"]}"#))
            }
        }
    }
}

/// Streams one agent run into `tx`.
///
/// The keepalive timer lives in this task only, so it stops with the relay
/// and never fires after the terminal event. A failed send means the client
/// is gone: the upstream stream is dropped and no terminal event is sent.
pub async fn stream_agent(
    agent: &dyn AgentClient,
    prompt: &str,
    options: &QueryOptions,
    tx: mpsc::Sender<RelayEvent>,
    keepalive: Duration,
) {
    let mut upstream = match agent.query(prompt, options).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Agent query failed to start: {}", e);
            let _ = tx.send(RelayEvent::error(e.to_string())).await;
            return;
        }
    };

    let mut ticker = time::interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = OutcomeTracker::default();

    loop {
        tokio::select! {
            item = upstream.next() => match item {
                Some(Ok(msg)) => {
                    debug!("Relaying {} message", msg.message_type());
                    tracker.observe(&msg);
                    if tx.send(RelayEvent::Progress(msg)).await.is_err() {
                        info!("Client disconnected, cancelling agent run");
                        return;
                    }
                }
                Some(Err(e)) => {
                    error!("Agent stream error: {}", e);
                    let _ = tx.send(RelayEvent::error(e.to_string())).await;
                    return;
                }
                None => break,
            },
            _ = ticker.tick() => {
                if tx.send(RelayEvent::Keepalive).await.is_err() {
                    info!("Client disconnected during keepalive, cancelling agent run");
                    return;
                }
            }
        }
    }

    if tracker.results_seen() > 1 {
        warn!("Agent emitted {} result messages, using the last", tracker.results_seen());
    }
    let terminal = RelayEvent::from_outcome(tracker.finish());
    let verdict = match terminal {
        RelayEvent::Complete { .. } => "complete",
        _ => "error",
    };
    info!("Agent run finished ({})", verdict);
    let _ = tx.send(terminal).await;
}

/// Runs the agent to completion and derives the outcome.
pub async fn collect_agent(
    agent: &dyn AgentClient,
    prompt: &str,
    options: &QueryOptions,
) -> Result<RelayOutcome, AgentError> {
    let stream = agent.query(prompt, options).await?;
    let messages: Vec<UpstreamMessage> = stream.try_collect().await?;
    debug!("Collected {} agent messages", messages.len());
    Ok(RelayOutcome::from_messages(&messages))
}
