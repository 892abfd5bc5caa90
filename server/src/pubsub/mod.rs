/*
 * Created on Sat Apr 15 2023
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

//! # The pub/sub bus
//!
//! Tracks exact-channel and glob-pattern subscriptions per connection.
//! Publishing resolves the set of receiving connections; the engine owns the
//! actual delivery through each connection's push channel

use {
    crate::{corestore::Data, resp::writer, util::pattern},
    bytes::{Bytes, BytesMut},
    std::collections::{HashMap, HashSet},
};

/// The `("message", channel, payload)` push frame for exact subscribers
pub fn message_frame(channel: &[u8], payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(channel.len() + payload.len() + 32);
    writer::array_header(&mut out, 3);
    writer::bulk(&mut out, b"message");
    writer::bulk(&mut out, channel);
    writer::bulk(&mut out, payload);
    out.freeze()
}

/// The `("pmessage", pattern, channel, payload)` push frame for pattern
/// subscribers
pub fn pmessage_frame(pattern: &[u8], channel: &[u8], payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(pattern.len() + channel.len() + payload.len() + 40);
    writer::array_header(&mut out, 4);
    writer::bulk(&mut out, b"pmessage");
    writer::bulk(&mut out, pattern);
    writer::bulk(&mut out, channel);
    writer::bulk(&mut out, payload);
    out.freeze()
}

#[derive(Default)]
pub struct PubSub {
    channels: HashMap<Data, HashSet<u64>>,
    patterns: HashMap<Data, HashSet<u64>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }
    /// Subscribe to an exact channel. Returns false if already subscribed
    pub fn subscribe(&mut self, channel: Data, conn: u64) -> bool {
        self.channels.entry(channel).or_default().insert(conn)
    }
    pub fn unsubscribe(&mut self, channel: &[u8], conn: u64) -> bool {
        match self.channels.get_mut(channel) {
            Some(subs) => {
                let removed = subs.remove(&conn);
                if subs.is_empty() {
                    self.channels.remove(channel);
                }
                removed
            }
            None => false,
        }
    }
    /// Subscribe to a glob pattern. Returns false if already subscribed
    pub fn psubscribe(&mut self, pattern: Data, conn: u64) -> bool {
        self.patterns.entry(pattern).or_default().insert(conn)
    }
    pub fn punsubscribe(&mut self, pattern: &[u8], conn: u64) -> bool {
        match self.patterns.get_mut(pattern) {
            Some(subs) => {
                let removed = subs.remove(&conn);
                if subs.is_empty() {
                    self.patterns.remove(pattern);
                }
                removed
            }
            None => false,
        }
    }
    /// Resolve the receivers of a message on `channel`: exact subscribers
    /// (pattern `None`) and every pattern subscriber whose pattern matches
    /// (carrying the pattern for the `pmessage` framing)
    pub fn receivers(&self, channel: &[u8]) -> Vec<(u64, Option<Data>)> {
        let mut out = Vec::new();
        if let Some(subs) = self.channels.get(channel) {
            out.extend(subs.iter().map(|&conn| (conn, None)));
        }
        for (pattern, subs) in self.patterns.iter() {
            if pattern::matches(pattern, channel) {
                out.extend(subs.iter().map(|&conn| (conn, Some(pattern.clone()))));
            }
        }
        out
    }
    /// Drop every subscription a connection holds
    pub fn drop_conn(&mut self, subs: &HashSet<Data>, psubs: &HashSet<Data>, conn: u64) {
        for channel in subs {
            self.unsubscribe(channel, conn);
        }
        for pattern in psubs {
            self.punsubscribe(pattern, conn);
        }
    }
}
