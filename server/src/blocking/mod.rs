/*
 * Created on Fri Mar 24 2023
 *
 * This file is a part of Stratus
 * Stratus is a free and open-source in-memory datastore written by
 * Sayan Nandan ("the Author") with the vision to provide speed and
 * reliability in volatile data handling without compromising on
 * consistency or simplicity.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # The blocking-client coordinator
//!
//! Clients that issue `BLPOP`/`BRPOP`/`XREAD BLOCK` against unavailable data
//! are registered here as [`BlockedWaiter`]s: one registration per
//! connection, indexed under every key the waiter watches, in FIFO arrival
//! order per key. The engine walks the FIFO on every `dataAdded` event and
//! serves the earliest waiter whose context can consume the fresh data; the
//! sweeper service collects waiters whose deadline has passed. Either way a
//! waiter receives exactly one reply frame over its oneshot channel


use {
    crate::corestore::{stream::StreamId, Data},
    bytes::Bytes,
    std::{
        collections::{HashMap, VecDeque},
        time::Instant,
    },
    tokio::sync::oneshot,
};

/// The longest admissible blocking timeout (one year)
pub const MAX_TIMEOUT_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// What a suspended client is waiting to do
pub enum WaitContext {
    /// A BLPOP/BRPOP: pop from whichever watched list fills first
    ListPop { left: bool },
    /// An XREAD BLOCK: per-stream resolved start IDs and an optional cap
    StreamRead {
        from: Vec<(Data, StreamId)>,
        count: Option<usize>,
    },
}

pub struct BlockedWaiter {
    pub conn: u64,
    pub keys: Vec<Data>,
    pub ctx: WaitContext,
    pub deadline: Option<Instant>,
    /// completing this channel is the waiter's single reply
    pub tx: oneshot::Sender<Bytes>,
}

#[derive(Default)]
pub struct BlockingCoordinator {
    /// key → FIFO of connection IDs waiting on it
    queues: HashMap<Data, VecDeque<u64>>,
    /// connection → its single active registration
    index: HashMap<u64, BlockedWaiter>,
}

impl BlockingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn blocked_count(&self) -> usize {
        self.index.len()
    }
    pub fn is_blocked(&self, conn: u64) -> bool {
        self.index.contains_key(&conn)
    }
    /// Register a waiter under every key it watches. A connection can hold
    /// at most one registration; the caller guarantees it isn't blocked yet
    pub fn register(&mut self, waiter: BlockedWaiter) {
        debug_assert!(!self.index.contains_key(&waiter.conn));
        for key in waiter.keys.iter() {
            self.queues
                .entry(key.clone())
                .or_default()
                .push_back(waiter.conn);
        }
        self.index.insert(waiter.conn, waiter);
    }
    /// Remove a connection's registration from the index and from every key
    /// queue it sits in
    pub fn unregister(&mut self, conn: u64) -> Option<BlockedWaiter> {
        let waiter = self.index.remove(&conn)?;
        for key in waiter.keys.iter() {
            if let Some(queue) = self.queues.get_mut(key) {
                queue.retain(|&c| c != conn);
                if queue.is_empty() {
                    self.queues.remove(key);
                }
            }
        }
        Some(waiter)
    }
    /// The FIFO of connections currently waiting on `key`, earliest first
    pub fn fifo(&self, key: &[u8]) -> Vec<u64> {
        self.queues
            .get(key)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }
    pub fn waiter(&self, conn: u64) -> Option<&BlockedWaiter> {
        self.index.get(&conn)
    }
    /// Pull out every waiter whose deadline has passed. Each receives its
    /// null reply from the caller
    pub fn take_expired(&mut self, now: Instant) -> Vec<BlockedWaiter> {
        let expired: Vec<u64> = self
            .index
            .iter()
            .filter(|(_, w)| matches!(w.deadline, Some(at) if at <= now))
            .map(|(&conn, _)| conn)
            .collect();
        expired
            .into_iter()
            .filter_map(|conn| self.unregister(conn))
            .collect()
    }
}
