/*
 * Created on Tue Feb 14 2023
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

//! Utilities for building RESP replies
//!
//! The [`writer`] module appends individual frame elements to a growable
//! buffer; the [`ResponseCache`] memoizes the hot frames (OK, PONG, QUEUED,
//! the nulls and small integers) so that the fast paths never allocate. The
//! cached frames are single allocations handed out as cheap [`Bytes`] views


use {
    crate::protocol::responses::groups,
    bytes::{Bytes, BytesMut},
};

pub mod writer {
    //! Low-level frame element writers

    use bytes::BytesMut;

    /// Append a simple string (`+...\r\n`)
    pub fn simple(out: &mut BytesMut, string: &[u8]) {
        out.extend_from_slice(b"+");
        out.extend_from_slice(string);
        out.extend_from_slice(b"\r\n");
    }
    /// Append an error (`-...\r\n`)
    pub fn error(out: &mut BytesMut, message: &[u8]) {
        out.extend_from_slice(b"-");
        out.extend_from_slice(message);
        out.extend_from_slice(b"\r\n");
    }
    /// Append an integer (`:<n>\r\n`)
    pub fn integer(out: &mut BytesMut, value: i64) {
        out.extend_from_slice(b":");
        out.extend_from_slice(value.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    /// Append a bulk string (`$<len>\r\n<payload>\r\n`)
    pub fn bulk(out: &mut BytesMut, payload: &[u8]) {
        out.extend_from_slice(b"$");
        out.extend_from_slice(payload.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(payload);
        out.extend_from_slice(b"\r\n");
    }
    /// Append the null bulk string
    pub fn null_bulk(out: &mut BytesMut) {
        out.extend_from_slice(b"$-1\r\n");
    }
    /// Append an array header (`*<n>\r\n`); the caller writes the `n`
    /// elements afterwards
    pub fn array_header(out: &mut BytesMut, len: usize) {
        out.extend_from_slice(b"*");
        out.extend_from_slice(len.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

/// One-shot: a complete bulk string frame
pub fn bulk_frame(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + 16);
    writer::bulk(&mut out, payload);
    out.freeze()
}

/// One-shot: a complete simple string frame
pub fn simple_frame(string: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(string.len() + 3);
    writer::simple(&mut out, string);
    out.freeze()
}

/// One-shot: a complete error frame
pub fn error_frame(message: &str) -> Bytes {
    let mut out = BytesMut::with_capacity(message.len() + 3);
    writer::error(&mut out, message.as_bytes());
    out.freeze()
}

/// One-shot: an array of bulk strings
pub fn array_of_bulks<T: AsRef<[u8]>>(items: &[T]) -> Bytes {
    let mut out = BytesMut::with_capacity(16 + items.iter().map(|i| i.as_ref().len() + 16).sum::<usize>());
    writer::array_header(&mut out, items.len());
    for item in items {
        writer::bulk(&mut out, item.as_ref());
    }
    out.freeze()
}

/// The lower bound of the cached integer range
const INT_CACHE_MIN: i64 = -10;
/// The upper bound of the cached integer range
const INT_CACHE_MAX: i64 = 100;

/// # The hot-frame cache
///
/// Pre-encodes the replies that dominate real workloads. Handing out a cached
/// frame is a refcount bump on a shared allocation; writers that need to
/// compose them into arrays get their own cursor via [`Bytes::clone`]
pub struct ResponseCache {
    ok: Bytes,
    pong: Bytes,
    queued: Bytes,
    nil: Bytes,
    nil_array: Bytes,
    empty_array: Bytes,
    integers: Vec<Bytes>,
}

impl ResponseCache {
    pub fn new() -> Self {
        let mut integers = Vec::with_capacity((INT_CACHE_MAX - INT_CACHE_MIN + 1) as usize);
        for value in INT_CACHE_MIN..=INT_CACHE_MAX {
            let mut out = BytesMut::with_capacity(8);
            writer::integer(&mut out, value);
            integers.push(out.freeze());
        }
        Self {
            ok: Bytes::from_static(groups::OKAY),
            pong: Bytes::from_static(groups::PONG),
            queued: Bytes::from_static(groups::QUEUED),
            nil: Bytes::from_static(groups::NIL),
            nil_array: Bytes::from_static(groups::NIL_ARRAY),
            empty_array: Bytes::from_static(groups::EMPTY_ARRAY),
            integers,
        }
    }
    pub fn ok(&self) -> Bytes {
        self.ok.clone()
    }
    pub fn pong(&self) -> Bytes {
        self.pong.clone()
    }
    pub fn queued(&self) -> Bytes {
        self.queued.clone()
    }
    pub fn nil(&self) -> Bytes {
        self.nil.clone()
    }
    pub fn nil_array(&self) -> Bytes {
        self.nil_array.clone()
    }
    pub fn empty_array(&self) -> Bytes {
        self.empty_array.clone()
    }
    /// An integer frame, served from the cache when in `[-10, 100]`
    pub fn integer(&self, value: i64) -> Bytes {
        if (INT_CACHE_MIN..=INT_CACHE_MAX).contains(&value) {
            self.integers[(value - INT_CACHE_MIN) as usize].clone()
        } else {
            let mut out = BytesMut::with_capacity(24);
            writer::integer(&mut out, value);
            out.freeze()
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
