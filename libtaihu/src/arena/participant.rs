use super::event::{GameEvent, Request};
use crate::action::{Action, ActionPayload};
use crate::tile::Suit;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, after, select};
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// One seat at the table, human or bot, local or remote.
///
/// `request` must return within `timeout`, answering `default` when the
/// participant has nothing to say. The engine validates whatever comes back.
pub trait Participant: Send + Sync {
    fn request(&self, req: &Request, default: Value, timeout: Duration) -> Value;
    fn notify(&self, event: &GameEvent);
}

impl<T: Participant + ?Sized> Participant for Arc<T> {
    #[inline]
    fn request(&self, req: &Request, default: Value, timeout: Duration) -> Value {
        (**self).request(req, default, timeout)
    }

    #[inline]
    fn notify(&self, event: &GameEvent) {
        (**self).notify(event);
    }
}

/// Asks every `(seat, request, default)` at once and waits for all of them.
/// A participant that panics answers its default.
pub fn request_concurrently(
    participants: &[Box<dyn Participant>],
    requests: Vec<(u8, Request, Value)>,
    timeout: Duration,
) -> Vec<(u8, Value)> {
    if requests.is_empty() {
        return vec![];
    }
    let fallback: Vec<_> = requests.iter().map(|(seat, _, default)| (*seat, default.clone())).collect();

    let joined = crossbeam::thread::scope(|s| {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|(seat, req, default)| {
                let participant = &participants[seat as usize];
                let on_panic = default.clone();
                let handle = s.spawn(move |_| participant.request(&req, default, timeout));
                (seat, on_panic, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(seat, on_panic, handle)| match handle.join() {
                Ok(reply) => (seat, reply),
                Err(_) => {
                    warn!("seat {seat} panicked while deciding, using its default");
                    (seat, on_panic)
                }
            })
            .collect::<Vec<_>>()
    });
    joined.unwrap_or_else(|_| {
        warn!("request scope panicked, every seat uses its default");
        fallback
    })
}

/// What a [`ChannelParticipant`] hands to its client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Answer on the reply channel tagged with the same sequence number.
    Request { seq: u64, request: Request },
    Event(GameEvent),
}

/// The client side of a [`ChannelParticipant`].
#[derive(Debug)]
pub struct ClientEnd {
    pub outgoing: Receiver<Outgoing>,
    pub replies: Sender<(u64, Value)>,
}

/// Bridges the engine to a client thread, e.g. a socket session. Replies are
/// matched by sequence number so a late answer to an earlier request is
/// never taken for the current one.
#[derive(Debug)]
pub struct ChannelParticipant {
    seq: AtomicU64,
    outgoing: Sender<Outgoing>,
    replies: Receiver<(u64, Value)>,
}

impl ChannelParticipant {
    #[must_use]
    pub fn pair() -> (Self, ClientEnd) {
        let (out_tx, out_rx) = channel::unbounded();
        let (reply_tx, reply_rx) = channel::unbounded();
        let participant = Self {
            seq: AtomicU64::new(0),
            outgoing: out_tx,
            replies: reply_rx,
        };
        let client = ClientEnd {
            outgoing: out_rx,
            replies: reply_tx,
        };
        (participant, client)
    }
}

impl Participant for ChannelParticipant {
    fn request(&self, req: &Request, default: Value, timeout: Duration) -> Value {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = Outgoing::Request {
            seq,
            request: req.clone(),
        };
        if self.outgoing.send(msg).is_err() {
            debug!("client gone, answering {} with default", req.name());
            return default;
        }

        let deadline = after(timeout);
        loop {
            select! {
                recv(self.replies) -> msg => match msg {
                    Ok((s, reply)) if s == seq => return reply,
                    Ok((s, _)) => debug!("dropping stale reply #{s}, waiting for #{seq}"),
                    Err(_) => return default,
                },
                recv(deadline) -> _ => {
                    warn!("{} #{seq} timed out, using the default", req.name());
                    return default;
                }
            }
        }
    }

    fn notify(&self, event: &GameEvent) {
        // a disconnected client just stops hearing about the hand
        let _ = self.outgoing.send(Outgoing::Event(event.clone()));
    }
}

/// A bot that always takes the strongest offer and keeps every event it is
/// told.
#[derive(Debug, Default)]
pub struct AutoParticipant {
    events: Mutex<Vec<GameEvent>>,
}

impl AutoParticipant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything this seat has been told so far.
    #[must_use]
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().clone()
    }
}

impl Participant for AutoParticipant {
    fn request(&self, req: &Request, default: Value, _timeout: Duration) -> Value {
        match req {
            Request::Discard { hand } => {
                // lone honors first, they can only ever pair up
                hand.distinct()
                    .find(|&t| t.suit() == Suit::Honors && hand.get(t) == 1)
                    .map_or(default, |t| json!(t.to_string()))
            }
            Request::Command { offers, .. } | Request::RobKong { offers, .. } => {
                let actions: Vec<_> = offers.iter().filter_map(Action::from_payload).collect();
                let best = actions.iter().copied().rev().max_by_key(|a| a.priority()).unwrap_or_default();
                let score = offers
                    .iter()
                    .find(|p| Action::from_payload(p) == Some(best))
                    .map_or(0, |p: &ActionPayload| p.score);
                serde_json::to_value(best.to_payload(score)).unwrap_or(default)
            }
            Request::ChangeTiles { .. } => default,
            Request::ShortSuit { hand } => {
                let fewest = (0..3).min_by_key(|&i| hand.suit_count(Suit::NUMBERS[i])).unwrap_or(0);
                json!(fewest)
            }
        }
    }

    fn notify(&self, event: &GameEvent) {
        self.events.lock().push(event.clone());
    }
}
