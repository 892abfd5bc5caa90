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

//! # The segmented list
//!
//! A list of byte strings stored as a chain of small fixed-capacity segments.
//! Pushing and popping at either end is amortized O(1); a range scan over
//! `[start, stop]` walks only the segments it needs. Segments are kept at
//! least half-utilized at the ends by construction: a new segment is only
//! chained when the end segment is full

use {crate::corestore::Data, std::collections::VecDeque};

/// The number of elements a single segment can hold
pub const SEGMENT_CAP: usize = 64;

#[derive(Debug, Default)]
pub struct SegList {
    segments: VecDeque<VecDeque<Data>>,
    len: usize,
}

impl SegList {
    pub fn new() -> Self {
        Self {
            segments: VecDeque::new(),
            len: 0,
        }
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    fn fresh_segment() -> VecDeque<Data> {
        VecDeque::with_capacity(SEGMENT_CAP)
    }
    /// Push an element at the head
    pub fn push_front(&mut self, data: Data) {
        let needs_segment = match self.segments.front() {
            Some(seg) => seg.len() == SEGMENT_CAP,
            None => true,
        };
        if needs_segment {
            self.segments.push_front(Self::fresh_segment());
        }
        // UNWRAP OK: we just ensured a front segment exists
        self.segments.front_mut().unwrap().push_front(data);
        self.len += 1;
    }
    /// Push an element at the tail
    pub fn push_back(&mut self, data: Data) {
        let needs_segment = match self.segments.back() {
            Some(seg) => seg.len() == SEGMENT_CAP,
            None => true,
        };
        if needs_segment {
            self.segments.push_back(Self::fresh_segment());
        }
        self.segments.back_mut().unwrap().push_back(data);
        self.len += 1;
    }
    /// Pop an element off the head
    pub fn pop_front(&mut self) -> Option<Data> {
        let popped = self.segments.front_mut()?.pop_front();
        if popped.is_some() {
            self.len -= 1;
            if self.segments.front().map(|seg| seg.is_empty()).unwrap_or(false) {
                self.segments.pop_front();
            }
        }
        popped
    }
    /// Pop an element off the tail
    pub fn pop_back(&mut self) -> Option<Data> {
        let popped = self.segments.back_mut()?.pop_back();
        if popped.is_some() {
            self.len -= 1;
            if self.segments.back().map(|seg| seg.is_empty()).unwrap_or(false) {
                self.segments.pop_back();
            }
        }
        popped
    }
    /// Resolve a possibly-negative index to an absolute offset, clamping to
    /// the list bounds. Returns `None` if the index falls before the head
    /// even after clamping the far end
    fn resolve_index(&self, idx: i64, clamp_low: bool) -> Option<usize> {
        if idx >= 0 {
            Some(idx as usize)
        } else {
            let from_tail = idx.unsigned_abs() as usize;
            if from_tail > self.len {
                if clamp_low {
                    Some(0)
                } else {
                    None
                }
            } else {
                Some(self.len - from_tail)
            }
        }
    }
    /// Copy out the inclusive range `[start, stop]` with negative indices
    /// counting from the tail
    pub fn range(&self, start: i64, stop: i64) -> Vec<Data> {
        let start = match self.resolve_index(start, true) {
            Some(s) => s,
            None => return Vec::new(),
        };
        let stop = match self.resolve_index(stop, false) {
            Some(s) => s,
            None => return Vec::new(),
        };
        if start >= self.len || stop < start {
            return Vec::new();
        }
        let stop = stop.min(self.len - 1);
        self.iter().skip(start).take(stop - start + 1).cloned().collect()
    }
    /// Iterate over all elements, head to tail
    pub fn iter(&self) -> impl Iterator<Item = &Data> {
        self.segments.iter().flat_map(|seg| seg.iter())
    }
}
