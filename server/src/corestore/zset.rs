/*
 * Created on Tue Mar 07 2023
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

//! # The sorted set
//!
//! A bijection member → score plus a score-ordered index. The two structures
//! are kept consistent by every mutation: `members` answers score lookups in
//! O(1), `index` answers rank and range queries. Ties on score order by the
//! raw member bytes

use {
    crate::corestore::Data,
    std::{
        cmp::Ordering,
        collections::{BTreeSet, HashMap},
    },
};

/// An f64 with a total order (IEEE-754 `totalOrder`), usable as a BTree key.
/// Score arguments are rejected at parse time if they are NaN, so the exotic
/// corners of the ordering never surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(pub f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
pub struct SortedSet {
    members: HashMap<Data, f64>,
    index: BTreeSet<(Score, Data)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
    /// Insert or update a member. Returns true if the member was newly
    /// inserted
    pub fn insert(&mut self, score: f64, member: Data) -> bool {
        match self.members.insert(member.clone(), score) {
            Some(old) => {
                self.index.remove(&(Score(old), member.clone()));
                self.index.insert((Score(score), member));
                false
            }
            None => {
                self.index.insert((Score(score), member));
                true
            }
        }
    }
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.members.remove(member) {
            Some(score) => {
                self.index
                    .remove(&(Score(score), Data::copy_from_slice(member)));
                true
            }
            None => false,
        }
    }
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.members.get(member).copied()
    }
    /// The 0-based position of the member in ascending score order
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.index
            .iter()
            .position(|(s, m)| *s == Score(score) && m.as_ref() == member)
    }
    /// Copy out the inclusive rank range `[start, stop]` with negative
    /// indices counting from the highest rank
    pub fn range(&self, start: i64, stop: i64) -> Vec<(Data, f64)> {
        let len = self.len() as i64;
        let resolve = |idx: i64| if idx < 0 { len + idx } else { idx };
        let start = resolve(start).max(0);
        let stop = resolve(stop);
        if start >= len || stop < start {
            return Vec::new();
        }
        let stop = stop.min(len - 1);
        self.index
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(score, member)| (member.clone(), score.0))
            .collect()
    }
    /// Iterate in ascending score order
    pub fn iter(&self) -> impl Iterator<Item = (&Data, f64)> {
        self.index.iter().map(|(score, member)| (member, score.0))
    }
}

/// Render a score the way the wire expects it: integral values print without
/// a fractional part
pub fn format_score(score: f64) -> String {
    score.to_string()
}

/// Parse a score argument. NaN and unparseable input are rejected
pub fn parse_score(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    let score: f64 = text.parse().ok()?;
    if score.is_nan() {
        None
    } else {
        Some(score)
    }
}
