/*
 * Created on Sun Apr 09 2023
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

//! # The optimistic transaction machine
//!
//! `MULTI` opens a per-connection queue; everything but the control commands
//! lands in it as a `(name, args)` pair and is re-resolved against the
//! catalog at `EXEC` time. `WATCH`ed keys live in a reverse index so that any
//! write anywhere (propagated writes included) marks every watching
//! connection dirty in O(1); a dirty connection's `EXEC` answers the null
//! array without executing anything

use {
    crate::corestore::Data,
    std::collections::{HashMap, HashSet},
};

/// The queued body of an open `MULTI`
#[derive(Default)]
pub struct Transaction {
    /// `(command name, full argument vector)` in arrival order
    pub queued: Vec<(String, Vec<Data>)>,
    /// a queue-time error (unknown command, bad arity) poisons the EXEC
    pub aborted: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The reverse index `key → watching connections`
#[derive(Default)]
pub struct WatchIndex {
    map: HashMap<Data, HashSet<u64>>,
}

impl WatchIndex {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn watch(&mut self, key: Data, conn: u64) {
        self.map.entry(key).or_default().insert(conn);
    }
    /// Remove the connection from the given keys (its own watched set)
    pub fn unwatch(&mut self, keys: &HashSet<Data>, conn: u64) {
        for key in keys {
            if let Some(watchers) = self.map.get_mut(key) {
                watchers.remove(&conn);
                if watchers.is_empty() {
                    self.map.remove(key);
                }
            }
        }
    }
    /// Everyone watching `key` (the write path flags them dirty)
    pub fn watchers(&self, key: &[u8]) -> Vec<u64> {
        self.map
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
    /// Everyone watching anything (store-clear invalidates them all)
    pub fn all_watchers(&self) -> Vec<u64> {
        let mut all: Vec<u64> = self.map.values().flatten().copied().collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}
