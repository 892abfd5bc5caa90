/*
 * Created on Mon Feb 06 2023
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

//! Branch-weighting helpers for the hot paths (frame parsing, dispatch).
//! These never change semantics; routing the cold side of a condition
//! through an uninlinable cold function just tells the optimizer which arm
//! to lay out for fall-through

#[cold]
#[inline(never)]
const fn cold_path() {}

/// The condition is expected to hold almost always
pub const fn likely(b: bool) -> bool {
    if !b {
        cold_path()
    }
    b
}

/// The condition is expected to hold almost never
pub const fn unlikely(b: bool) -> bool {
    if b {
        cold_path()
    }
    b
}
