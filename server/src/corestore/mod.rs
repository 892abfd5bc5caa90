/*
 * Created on Thu Mar 02 2023
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

//! # The typed keyspace
//!
//! [`Corestore`] maps opaque byte-string keys to typed values with optional
//! expiry. It is the single mutation point for all data: type-mismatched
//! operations fail with [`WrongType`] without mutating anything, and any key
//! found expired during an access is removed before the operation proceeds.
//! Keys removed by lazy expiry are recorded in an internal journal that the
//! engine drains after every command (to invalidate watchers and propagate
//! the eviction to followers)

pub mod list;
pub mod stream;
pub mod zset;
#[cfg(test)]
mod tests;

use {
    self::{
        list::SegList,
        stream::{RequestedId, Stream, StreamEntry, StreamId, StreamIdError},
        zset::SortedSet,
    },
    crate::util::{compiler, pattern},
    bytes::Bytes,
    std::{
        collections::HashMap,
        time::Instant,
    },
};

/// The raw byte-string type used for keys, values, members, channels and
/// everything else that travels the wire
pub type Data = Bytes;

#[derive(Debug)]
pub enum Value {
    Str(Data),
    List(SegList),
    Zset(SortedSet),
    Stream(Stream),
}

impl Value {
    /// The name reported by `TYPE`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Zset(_) => "zset",
            Value::Stream(_) => "stream",
        }
    }
}

#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Marker for a type-mismatched operation. The keyspace is left untouched
#[derive(Debug, PartialEq, Eq)]
pub struct WrongType;

#[derive(Debug, PartialEq, Eq)]
pub enum IncrError {
    WrongType,
    /// The stored value is not a decimal integer
    NotAnInteger,
    /// The result would leave the signed 64-bit range
    Overflow,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StreamWriteError {
    WrongType,
    Id(StreamIdError),
}

#[derive(Debug, Default)]
pub struct Corestore {
    map: HashMap<Data, Entry>,
    /// side index of keys carrying an expiry, scanned by the sweeper
    expiring: HashMap<Data, Instant>,
    /// keys removed by lazy expiry since the journal was last drained
    expired_log: Vec<Data>,
}

impl Corestore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Keys removed by lazy expiry since the last drain
    pub fn drain_expired(&mut self) -> Vec<Data> {
        std::mem::take(&mut self.expired_log)
    }
    /// Remove the key if it has outlived its expiry. Returns true if it was
    /// removed
    fn purge_expired(&mut self, key: &[u8], now: Instant) -> bool {
        let expired = match self.map.get(key) {
            Some(entry) => entry.is_expired(now),
            None => false,
        };
        // almost every access lands on a live (or vacant) key
        if compiler::likely(!expired) {
            return false;
        }
        if let Some((owned_key, _)) = self.map.remove_entry(key) {
            self.expiring.remove(&owned_key);
            self.expired_log.push(owned_key);
        }
        true
    }
    fn live_entry(&mut self, key: &[u8], now: Instant) -> Option<&Entry> {
        self.purge_expired(key, now);
        self.map.get(key)
    }
    fn live_entry_mut(&mut self, key: &[u8], now: Instant) -> Option<&mut Entry> {
        self.purge_expired(key, now);
        self.map.get_mut(key)
    }
    /// Drop a key and its expiry index entry
    fn remove_key(&mut self, key: &[u8]) {
        self.map.remove(key);
        self.expiring.remove(key);
    }

    // byte strings

    pub fn get(&mut self, key: &[u8], now: Instant) -> Result<Option<Data>, WrongType> {
        match self.live_entry(key, now) {
            Some(Entry {
                value: Value::Str(data),
                ..
            }) => Ok(Some(data.clone())),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }
    /// Unconditional overwrite; any previous value (of any type) and its
    /// expiry are replaced
    pub fn set(&mut self, key: Data, value: Data, expires_at: Option<Instant>) {
        match expires_at {
            Some(at) => {
                self.expiring.insert(key.clone(), at);
            }
            None => {
                self.expiring.remove(&key);
            }
        }
        self.map.insert(
            key,
            Entry {
                value: Value::Str(value),
                expires_at,
            },
        );
    }
    pub fn incr_by(&mut self, key: &[u8], delta: i64, now: Instant) -> Result<i64, IncrError> {
        let current = match self.live_entry(key, now) {
            Some(Entry {
                value: Value::Str(data),
                ..
            }) => {
                let text = std::str::from_utf8(data).map_err(|_| IncrError::NotAnInteger)?;
                text.trim().parse::<i64>().map_err(|_| IncrError::NotAnInteger)?
            }
            Some(_) => return Err(IncrError::WrongType),
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or(IncrError::Overflow)?;
        let canonical = Data::from(updated.to_string().into_bytes());
        match self.map.get_mut(key) {
            Some(entry) => entry.value = Value::Str(canonical),
            None => self.set(Data::copy_from_slice(key), canonical, None),
        }
        Ok(updated)
    }

    // generic keyspace operations

    pub fn del(&mut self, key: &[u8], now: Instant) -> bool {
        if self.purge_expired(key, now) {
            return false;
        }
        if self.map.remove(key).is_some() {
            self.expiring.remove(key);
            true
        } else {
            false
        }
    }
    pub fn exists(&mut self, key: &[u8], now: Instant) -> bool {
        self.live_entry(key, now).is_some()
    }
    pub fn type_of(&mut self, key: &[u8], now: Instant) -> Option<&'static str> {
        self.live_entry(key, now).map(|entry| entry.value.type_name())
    }
    pub fn keys_matching(&mut self, pat: &[u8], now: Instant) -> Vec<Data> {
        let mut expired = Vec::new();
        let mut hits = Vec::new();
        for (key, entry) in self.map.iter() {
            if entry.is_expired(now) {
                expired.push(key.clone());
            } else if pattern::matches(pat, key) {
                hits.push(key.clone());
            }
        }
        for key in expired {
            self.expiring.remove(&key);
            self.map.remove(&key);
            self.expired_log.push(key);
        }
        hits
    }
    /// The number of live keys
    pub fn len(&self, now: Instant) -> usize {
        self.map.values().filter(|e| !e.is_expired(now)).count()
    }
    /// Drop everything. Returns the number of keys removed
    pub fn clear(&mut self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        self.expiring.clear();
        removed
    }
    /// Remove up to `limit` expired keys, scanning the expiry side index.
    /// Returns the evicted keys
    pub fn sweep(&mut self, now: Instant, limit: usize) -> Vec<Data> {
        let evicted: Vec<Data> = self
            .expiring
            .iter()
            .filter(|(_, at)| **at <= now)
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect();
        for key in evicted.iter() {
            self.expiring.remove(key);
            self.map.remove(key);
        }
        evicted
    }
    /// Iterate live entries (used by the snapshot encoder)
    pub fn iter_live(&self, now: Instant) -> impl Iterator<Item = (&Data, &Entry)> {
        self.map
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now))
    }

    // lists

    fn list_mut(&mut self, key: &[u8], now: Instant) -> Result<Option<&mut SegList>, WrongType> {
        match self.live_entry_mut(key, now) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }
    /// Push values at the given end, creating the list if the key is vacant.
    /// Returns the resulting length
    pub fn list_push(
        &mut self,
        key: &[u8],
        values: Vec<Data>,
        left: bool,
        now: Instant,
    ) -> Result<usize, WrongType> {
        if self.list_mut(key, now)?.is_none() {
            self.map.insert(
                Data::copy_from_slice(key),
                Entry {
                    value: Value::List(SegList::new()),
                    expires_at: None,
                },
            );
        }
        // UNWRAP OK: just inserted or verified above
        let list = self.list_mut(key, now)?.unwrap();
        for value in values {
            if left {
                list.push_front(value);
            } else {
                list.push_back(value);
            }
        }
        Ok(list.len())
    }
    /// Pop a value off the given end. An emptied list releases its key
    pub fn list_pop(
        &mut self,
        key: &[u8],
        left: bool,
        now: Instant,
    ) -> Result<Option<Data>, WrongType> {
        let (popped, emptied) = match self.list_mut(key, now)? {
            Some(list) => {
                let popped = if left {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                (popped, list.is_empty())
            }
            None => (None, false),
        };
        if emptied {
            self.remove_key(key);
        }
        Ok(popped)
    }
    pub fn list_len(&mut self, key: &[u8], now: Instant) -> Result<usize, WrongType> {
        Ok(self.list_mut(key, now)?.map(|list| list.len()).unwrap_or(0))
    }
    pub fn list_range(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
        now: Instant,
    ) -> Result<Vec<Data>, WrongType> {
        Ok(self
            .list_mut(key, now)?
            .map(|list| list.range(start, stop))
            .unwrap_or_default())
    }

    // sorted sets

    fn zset_mut(&mut self, key: &[u8], now: Instant) -> Result<Option<&mut SortedSet>, WrongType> {
        match self.live_entry_mut(key, now) {
            Some(Entry {
                value: Value::Zset(zset),
                ..
            }) => Ok(Some(zset)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }
    /// Add (or update) members. Returns the number of *new* members
    pub fn zset_add(
        &mut self,
        key: &[u8],
        pairs: Vec<(f64, Data)>,
        now: Instant,
    ) -> Result<usize, WrongType> {
        if self.zset_mut(key, now)?.is_none() {
            self.map.insert(
                Data::copy_from_slice(key),
                Entry {
                    value: Value::Zset(SortedSet::new()),
                    expires_at: None,
                },
            );
        }
        let zset = self.zset_mut(key, now)?.unwrap();
        let mut added = 0;
        for (score, member) in pairs {
            if zset.insert(score, member) {
                added += 1;
            }
        }
        Ok(added)
    }
    /// Remove members. An emptied set releases its key
    pub fn zset_remove(
        &mut self,
        key: &[u8],
        members: &[Data],
        now: Instant,
    ) -> Result<usize, WrongType> {
        let (removed, emptied) = match self.zset_mut(key, now)? {
            Some(zset) => {
                let mut removed = 0;
                for member in members {
                    if zset.remove(member) {
                        removed += 1;
                    }
                }
                (removed, zset.is_empty())
            }
            None => (0, false),
        };
        if emptied {
            self.remove_key(key);
        }
        Ok(removed)
    }
    pub fn zset_score(
        &mut self,
        key: &[u8],
        member: &[u8],
        now: Instant,
    ) -> Result<Option<f64>, WrongType> {
        Ok(self.zset_mut(key, now)?.and_then(|z| z.score(member)))
    }
    pub fn zset_rank(
        &mut self,
        key: &[u8],
        member: &[u8],
        now: Instant,
    ) -> Result<Option<usize>, WrongType> {
        Ok(self.zset_mut(key, now)?.and_then(|z| z.rank(member)))
    }
    pub fn zset_card(&mut self, key: &[u8], now: Instant) -> Result<usize, WrongType> {
        Ok(self.zset_mut(key, now)?.map(|z| z.len()).unwrap_or(0))
    }
    pub fn zset_range(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
        now: Instant,
    ) -> Result<Vec<(Data, f64)>, WrongType> {
        Ok(self
            .zset_mut(key, now)?
            .map(|z| z.range(start, stop))
            .unwrap_or_default())
    }

    // streams

    fn stream_mut(&mut self, key: &[u8], now: Instant) -> Result<Option<&mut Stream>, WrongType> {
        match self.live_entry_mut(key, now) {
            Some(Entry {
                value: Value::Stream(stream),
                ..
            }) => Ok(Some(stream)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }
    pub fn stream_add(
        &mut self,
        key: &[u8],
        requested: &RequestedId,
        fields: StreamEntry,
        now_ms: u64,
        now: Instant,
    ) -> Result<StreamId, StreamWriteError> {
        if self
            .stream_mut(key, now)
            .map_err(|_| StreamWriteError::WrongType)?
            .is_none()
        {
            self.map.insert(
                Data::copy_from_slice(key),
                Entry {
                    value: Value::Stream(Stream::new()),
                    expires_at: None,
                },
            );
        }
        let stream = self
            .stream_mut(key, now)
            .map_err(|_| StreamWriteError::WrongType)?
            .unwrap();
        stream
            .add(requested, fields, now_ms)
            .map_err(StreamWriteError::Id)
    }
    pub fn stream_range(
        &mut self,
        key: &[u8],
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
        now: Instant,
    ) -> Result<Vec<(StreamId, StreamEntry)>, WrongType> {
        Ok(self
            .stream_mut(key, now)?
            .map(|s| s.range(start, end, count))
            .unwrap_or_default())
    }
    pub fn stream_get_after(
        &mut self,
        key: &[u8],
        after: StreamId,
        limit: i64,
        now: Instant,
    ) -> Result<Vec<(StreamId, StreamEntry)>, WrongType> {
        Ok(self
            .stream_mut(key, now)?
            .map(|s| s.get_after(after, limit))
            .unwrap_or_default())
    }
    /// The stream's top ID, or `None` if the key is vacant (callers resolve
    /// `$` against this)
    pub fn stream_last_id(
        &mut self,
        key: &[u8],
        now: Instant,
    ) -> Result<Option<StreamId>, WrongType> {
        Ok(self.stream_mut(key, now)?.map(|s| s.last_id()))
    }
    pub fn stream_len(&mut self, key: &[u8], now: Instant) -> Result<usize, WrongType> {
        Ok(self.stream_mut(key, now)?.map(|s| s.len()).unwrap_or(0))
    }
}
