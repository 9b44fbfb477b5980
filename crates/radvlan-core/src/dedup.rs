// ── Retransmission cache ──
//
// A NAS that hears nothing resends the same request: same source, same
// identifier, same authenticator. Such a duplicate must not be resolved
// or audited twice. While the first copy is still in flight duplicates
// are dropped; once it completes they get the cached reply bytes.
//
// A new authenticator under a reused (source, identifier) pair is a new
// request and replaces the entry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use radvlan_proto::Authenticator;
use tokio::time::Instant;

use crate::model::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub source: SocketAddr,
    pub identifier: u8,
}

/// What to do with an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First sighting: process it.
    New,
    /// Same request is being processed right now: drop this copy.
    InFlight,
    /// Same request already answered: resend the cached reply, if any.
    Replay {
        outcome: Outcome,
        reply: Option<Arc<[u8]>>,
    },
}

#[derive(Debug)]
enum State {
    InFlight,
    Completed {
        outcome: Outcome,
        reply: Option<Arc<[u8]>>,
    },
}

#[derive(Debug)]
struct CacheEntry {
    authenticator: Authenticator,
    first_seen: Instant,
    state: State,
}

impl CacheEntry {
    fn in_flight(authenticator: Authenticator, now: Instant) -> Self {
        Self {
            authenticator,
            first_seen: now,
            state: State::InFlight,
        }
    }
}

pub struct ReplayCache {
    entries: DashMap<RequestKey, CacheEntry>,
    window: Duration,
}

impl ReplayCache {
    /// `window` of zero disables duplicate detection entirely.
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// Classify a request and, if it is new, mark it in flight.
    pub fn admit(&self, key: RequestKey, authenticator: Authenticator, now: Instant) -> Admission {
        if !self.is_enabled() {
            return Admission::New;
        }

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get();
                let fresh = now.saturating_duration_since(entry.first_seen) < self.window;
                if fresh && entry.authenticator == authenticator {
                    match &entry.state {
                        State::InFlight => Admission::InFlight,
                        State::Completed { outcome, reply } => Admission::Replay {
                            outcome: outcome.clone(),
                            reply: reply.clone(),
                        },
                    }
                } else {
                    occupied.insert(CacheEntry::in_flight(authenticator, now));
                    Admission::New
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::in_flight(authenticator, now));
                Admission::New
            }
        }
    }

    /// Record the answer for an admitted request.
    ///
    /// Ignored if the entry has since been replaced by a newer request.
    pub fn complete(
        &self,
        key: RequestKey,
        authenticator: Authenticator,
        outcome: Outcome,
        reply: Option<Vec<u8>>,
    ) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.authenticator == authenticator {
                entry.state = State::Completed {
                    outcome,
                    reply: reply.map(Arc::from),
                };
            }
        }
    }

    /// Drop entries older than the window. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.first_seen) < self.window);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
