//! Collectors for multi-line WHOIS and NAMES replies.
//!
//! Concurrent queries for the same nick or channel share one request on
//! the wire; every waiter gets the collected result.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::types::{Identity, Member};

use super::message::split_rank;

/// Channels listed in a WHOIS reply, or `None` if the nick does not exist.
pub type WhoisResult = Option<Vec<String>>;

#[derive(Debug)]
struct Collector<T, R> {
    items: Vec<T>,
    waiters: Vec<oneshot::Sender<R>>,
}

impl<T, R> Default for Collector<T, R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            waiters: Vec::new(),
        }
    }
}

impl<T, R> Collector<T, R> {
    /// Add a waiter. Waiters whose receiver is gone (timed out or dropped)
    /// are pruned first; if none are left the query starts over and the
    /// caller has to send it again.
    fn join(&mut self, waiter: oneshot::Sender<R>) -> bool {
        self.waiters.retain(|w| !w.is_closed());
        let first = self.waiters.is_empty();
        if first {
            self.items.clear();
        }
        self.waiters.push(waiter);
        first
    }
}

/// Outstanding WHOIS and NAMES queries, keyed by lowercased nick/channel.
#[derive(Debug, Default)]
pub struct PendingQueries {
    whois: HashMap<String, Collector<String, WhoisResult>>,
    names: HashMap<String, Collector<Member, Vec<Member>>>,
}

impl PendingQueries {
    /// Register a WHOIS waiter. Returns `true` when a new `WHOIS` has to be
    /// sent.
    pub fn add_whois(&mut self, nick: &str, waiter: oneshot::Sender<WhoisResult>) -> bool {
        self.whois.entry(nick.to_lowercase()).or_default().join(waiter)
    }

    /// `319`: channels the nick is in.
    pub fn whois_channels(&mut self, nick: &str, channels: &str) {
        if let Some(entry) = self.whois.get_mut(&nick.to_lowercase()) {
            entry
                .items
                .extend(channels.split_whitespace().map(str::to_owned));
        }
    }

    /// `318`: end of WHOIS.
    pub fn finish_whois(&mut self, nick: &str) {
        if let Some(entry) = self.whois.remove(&nick.to_lowercase()) {
            for waiter in entry.waiters {
                let _ = waiter.send(Some(entry.items.clone()));
            }
        }
    }

    /// `401`: no such nick.
    pub fn no_such_nick(&mut self, nick: &str) {
        if let Some(entry) = self.whois.remove(&nick.to_lowercase()) {
            for waiter in entry.waiters {
                let _ = waiter.send(None);
            }
        }
    }

    /// Register a NAMES waiter. Returns `true` when a new `NAMES` has to be
    /// sent.
    pub fn add_names(&mut self, channel: &str, waiter: oneshot::Sender<Vec<Member>>) -> bool {
        self.names.entry(channel.to_lowercase()).or_default().join(waiter)
    }

    /// `353`: a batch of names. Unsolicited replies (after JOIN) are ignored.
    pub fn names_reply(&mut self, channel: &str, names: &str) {
        if let Some(entry) = self.names.get_mut(&channel.to_lowercase()) {
            entry.items.extend(names.split_whitespace().map(|name| {
                let (rank, nick) = split_rank(name);
                Member {
                    identity: Identity::irc(nick),
                    rank,
                }
            }));
        }
    }

    /// `366`: end of NAMES.
    pub fn finish_names(&mut self, channel: &str) {
        if let Some(entry) = self.names.remove(&channel.to_lowercase()) {
            for waiter in entry.waiters {
                let _ = waiter.send(entry.items.clone());
            }
        }
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub fn clear(&mut self) {
        self.whois.clear();
        self.names.clear();
    }
}
