/*
 * Created on Sun Apr 30 2023
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

//! The leader's follower registry, offset tracking and `WAIT` bookkeeping.
//! Fan-out itself happens in the engine (which owns the connection push
//! channels); this module owns the arithmetic

use {
    bytes::Bytes,
    std::{collections::HashMap, time::Instant},
    tokio::sync::oneshot,
};

/// A registered follower (a connection that completed PSYNC)
#[derive(Debug)]
pub struct Follower {
    /// the highest offset this follower has acknowledged
    pub ack_offset: u64,
    /// the port the follower announced via REPLCONF listening-port
    pub listening_port: Option<u16>,
}

/// A client blocked on `WAIT numReplicas timeoutMs`
pub struct PendingWait {
    pub conn: u64,
    pub required: usize,
    /// the leader offset captured when the WAIT was issued
    pub target: u64,
    pub deadline: Instant,
    pub tx: oneshot::Sender<Bytes>,
}

pub struct ReplLeader {
    /// this instance's replication ID, sent in FULLRESYNC
    pub replid: String,
    /// cumulative byte length of all propagated command frames
    pub offset: u64,
    followers: HashMap<u64, Follower>,
    pending: Vec<PendingWait>,
}

impl ReplLeader {
    pub fn new() -> Self {
        Self {
            replid: uuid::Uuid::new_v4().simple().to_string(),
            offset: 0,
            followers: HashMap::new(),
            pending: Vec::new(),
        }
    }
    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }
    pub fn follower_conns(&self) -> Vec<u64> {
        self.followers.keys().copied().collect()
    }
    pub fn followers(&self) -> impl Iterator<Item = &Follower> {
        self.followers.values()
    }
    pub fn register(&mut self, conn: u64, listening_port: Option<u16>) {
        self.followers.insert(
            conn,
            Follower {
                ack_offset: 0,
                listening_port,
            },
        );
    }
    pub fn remove(&mut self, conn: u64) -> bool {
        self.followers.remove(&conn).is_some()
    }
    /// Record a `REPLCONF ACK <offset>`. Acks never move backwards and
    /// never overtake what was actually sent
    pub fn record_ack(&mut self, conn: u64, offset: u64) {
        let offset = offset.min(self.offset);
        if let Some(follower) = self.followers.get_mut(&conn) {
            if offset > follower.ack_offset {
                follower.ack_offset = offset;
            }
        }
    }
    /// How many followers have acknowledged at least `target`
    pub fn sync_count(&self, target: u64) -> usize {
        self.followers
            .values()
            .filter(|f| f.ack_offset >= target)
            .count()
    }
    pub fn add_pending(&mut self, wait: PendingWait) {
        self.pending.push(wait);
    }
    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
    pub fn drop_pending_for(&mut self, conn: u64) {
        self.pending.retain(|w| w.conn != conn);
    }
    /// Pull out every pending wait whose replica quorum is now satisfied,
    /// along with its current sync count
    pub fn take_satisfied(&mut self) -> Vec<(PendingWait, usize)> {
        let mut satisfied = Vec::new();
        let mut keep = Vec::new();
        for wait in self.pending.drain(..) {
            let count = self
                .followers
                .values()
                .filter(|f| f.ack_offset >= wait.target)
                .count();
            if count >= wait.required {
                satisfied.push((wait, count));
            } else {
                keep.push(wait);
            }
        }
        self.pending = keep;
        satisfied
    }
    /// Pull out every pending wait whose deadline has passed, along with its
    /// current sync count
    pub fn take_expired(&mut self, now: Instant) -> Vec<(PendingWait, usize)> {
        let mut expired = Vec::new();
        let mut keep = Vec::new();
        for wait in self.pending.drain(..) {
            if wait.deadline <= now {
                let count = self
                    .followers
                    .values()
                    .filter(|f| f.ack_offset >= wait.target)
                    .count();
                expired.push((wait, count));
            } else {
                keep.push(wait);
            }
        }
        self.pending = keep;
        expired
    }
}

impl Default for ReplLeader {
    fn default() -> Self {
        Self::new()
    }
}
