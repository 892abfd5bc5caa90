/*
 * Created on Sat Apr 22 2023
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

//! # The statistics registry
//!
//! The engine publishes counted events here; readers (INFO, logs) observe
//! them without touching the engine lock. All counters are relaxed atomics:
//! they are monotonic tallies and gauges, not synchronization points

use std::sync::atomic::{AtomicU64, Ordering};

const ORD: Ordering = Ordering::Relaxed;

#[derive(Debug, Default)]
pub struct Statistics {
    connections_accepted: AtomicU64,
    connected_clients: AtomicU64,
    commands_processed: AtomicU64,
    expired_keys: AtomicU64,
    messages_published: AtomicU64,
    replicas_connected: AtomicU64,
    keyspace_hits: AtomicU64,
    keyspace_misses: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn accept_connection(&self) {
        self.connections_accepted.fetch_add(1, ORD);
        self.connected_clients.fetch_add(1, ORD);
    }
    pub fn drop_connection(&self) {
        self.connected_clients.fetch_sub(1, ORD);
    }
    pub fn incr_commands(&self) {
        self.commands_processed.fetch_add(1, ORD);
    }
    pub fn incr_expired(&self, by: u64) {
        self.expired_keys.fetch_add(by, ORD);
    }
    pub fn incr_published(&self, by: u64) {
        self.messages_published.fetch_add(by, ORD);
    }
    pub fn replica_joined(&self) {
        self.replicas_connected.fetch_add(1, ORD);
    }
    pub fn replica_left(&self) {
        self.replicas_connected.fetch_sub(1, ORD);
    }
    pub fn keyspace_hit(&self) {
        self.keyspace_hits.fetch_add(1, ORD);
    }
    pub fn keyspace_miss(&self) {
        self.keyspace_misses.fetch_add(1, ORD);
    }
    pub fn connections_accepted(&self) -> u64 {
        self.connections_accepted.load(ORD)
    }
    pub fn connected_clients(&self) -> u64 {
        self.connected_clients.load(ORD)
    }
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(ORD)
    }
    pub fn expired_keys(&self) -> u64 {
        self.expired_keys.load(ORD)
    }
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(ORD)
    }
    pub fn replicas_connected(&self) -> u64 {
        self.replicas_connected.load(ORD)
    }
    pub fn keyspace_hits(&self) -> u64 {
        self.keyspace_hits.load(ORD)
    }
    pub fn keyspace_misses(&self) -> u64 {
        self.keyspace_misses.load(ORD)
    }
}
