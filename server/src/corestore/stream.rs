/*
 * Created on Sun Mar 12 2023
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

//! # Streams
//!
//! An ordered map from [`StreamId`] to an entry (an ordered field/value
//! list). IDs inserted into a stream are strictly increasing; the allocator
//! that guarantees it is the pure function [`allocate_id`] over
//! `(last_id, requested, now_ms)` so tests can drive it with literal values

use {
    crate::corestore::Data,
    std::{collections::BTreeMap, fmt},
};

/// A stream entry identifier: a millisecond timestamp paired with a sequence
/// number, ordered lexicographically on the pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, PartialEq)]
/// The ID requested by an XADD
pub enum RequestedId {
    /// `*`: both parts chosen by the allocator
    Auto,
    /// `<ms>-*`: timestamp fixed, sequence chosen by the allocator
    Partial(u64),
    /// `<ms>-<seq>`: fully explicit
    Explicit(StreamId),
}

impl RequestedId {
    pub fn parse(raw: &[u8]) -> Result<Self, StreamIdError> {
        if raw == b"*" {
            return Ok(Self::Auto);
        }
        let text = std::str::from_utf8(raw).map_err(|_| StreamIdError::IdSyntax)?;
        match text.split_once('-') {
            Some((ms, "*")) => Ok(Self::Partial(
                ms.parse().map_err(|_| StreamIdError::IdSyntax)?,
            )),
            Some((ms, seq)) => Ok(Self::Explicit(StreamId {
                ms: ms.parse().map_err(|_| StreamIdError::IdSyntax)?,
                seq: seq.parse().map_err(|_| StreamIdError::IdSyntax)?,
            })),
            // a lone millisecond part means sequence 0
            None => Ok(Self::Explicit(StreamId {
                ms: text.parse().map_err(|_| StreamIdError::IdSyntax)?,
                seq: 0,
            })),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamIdError {
    /// The requested ID is not strictly greater than the stream top
    IdTooSmall,
    /// The requested ID was `0-0`
    IdIsZero,
    /// The requested ID equals an existing entry
    IdExists,
    /// The ID failed to parse at all
    IdSyntax,
}

/// Choose the ID a new entry will be inserted under, or reject the request.
/// `last` is the stream's current top ID (`0-0` for an empty stream) and
/// `now_ms` the current wall clock
pub fn allocate_id(
    last: StreamId,
    requested: &RequestedId,
    now_ms: u64,
) -> Result<StreamId, StreamIdError> {
    match requested {
        RequestedId::Auto => {
            if last.ms >= now_ms {
                Ok(StreamId::new(last.ms, last.seq + 1))
            } else {
                Ok(StreamId::new(now_ms, 0))
            }
        }
        RequestedId::Partial(ms) => {
            let ms = *ms;
            if ms == last.ms {
                Ok(StreamId::new(ms, last.seq + 1))
            } else if ms > last.ms {
                Ok(StreamId::new(ms, 0))
            } else {
                Err(StreamIdError::IdTooSmall)
            }
        }
        RequestedId::Explicit(id) => {
            if *id == StreamId::ZERO {
                Err(StreamIdError::IdIsZero)
            } else if *id == last && last != StreamId::ZERO {
                Err(StreamIdError::IdExists)
            } else if *id < last {
                Err(StreamIdError::IdTooSmall)
            } else {
                Ok(*id)
            }
        }
    }
}

/// A single stream entry: the ordered field/value list
pub type StreamEntry = Vec<(Data, Data)>;

#[derive(Debug, Default)]
pub struct Stream {
    entries: BTreeMap<StreamId, StreamEntry>,
    last_id: StreamId,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn last_id(&self) -> StreamId {
        self.last_id
    }
    /// Validate the requested ID against the stream state and insert the
    /// entry under the allocated ID
    pub fn add(
        &mut self,
        requested: &RequestedId,
        fields: StreamEntry,
        now_ms: u64,
    ) -> Result<StreamId, StreamIdError> {
        let id = allocate_id(self.last_id, requested, now_ms)?;
        self.entries.insert(id, fields);
        self.last_id = id;
        Ok(id)
    }
    /// Entries within the inclusive `[start, end]` range, capped at `count`
    pub fn range(
        &self,
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> Vec<(StreamId, StreamEntry)> {
        let iter = self
            .entries
            .range(start..=end)
            .map(|(id, fields)| (*id, fields.clone()));
        match count {
            Some(count) => iter.take(count).collect(),
            None => iter.collect(),
        }
    }
    /// Entries strictly greater than `after`, up to `limit` (unbounded if
    /// `limit` is negative)
    pub fn get_after(&self, after: StreamId, limit: i64) -> Vec<(StreamId, StreamEntry)> {
        use std::ops::Bound;
        let iter = self
            .entries
            .range((Bound::Excluded(after), Bound::Unbounded))
            .map(|(id, fields)| (*id, fields.clone()));
        if limit < 0 {
            iter.collect()
        } else {
            iter.take(limit as usize).collect()
        }
    }
    /// Iterate all entries in ID order
    pub fn iter(&self) -> impl Iterator<Item = (&StreamId, &StreamEntry)> {
        self.entries.iter()
    }
}

/// Parse an XRANGE start bound: `-` is the minimum, a lone `<ms>` means
/// `<ms>-0`
pub fn parse_range_start(raw: &[u8]) -> Result<StreamId, StreamIdError> {
    if raw == b"-" {
        return Ok(StreamId::ZERO);
    }
    parse_range_bound(raw, 0)
}

/// Parse an XRANGE end bound: `+` is the maximum, a lone `<ms>` means
/// `<ms>-<max>`
pub fn parse_range_end(raw: &[u8]) -> Result<StreamId, StreamIdError> {
    if raw == b"+" {
        return Ok(StreamId::MAX);
    }
    parse_range_bound(raw, u64::MAX)
}

fn parse_range_bound(raw: &[u8], default_seq: u64) -> Result<StreamId, StreamIdError> {
    let text = std::str::from_utf8(raw).map_err(|_| StreamIdError::IdSyntax)?;
    match text.split_once('-') {
        Some((ms, seq)) => Ok(StreamId {
            ms: ms.parse().map_err(|_| StreamIdError::IdSyntax)?,
            seq: seq.parse().map_err(|_| StreamIdError::IdSyntax)?,
        }),
        None => Ok(StreamId {
            ms: text.parse().map_err(|_| StreamIdError::IdSyntax)?,
            seq: default_seq,
        }),
    }
}
