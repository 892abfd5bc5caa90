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

//! The shared library for Stratus
//!
//! This contains the few items that are shared by the `server` binary and any
//! auxiliary tooling built around it

use std::error::Error;

/// The current version of the suite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// The URL of the project
pub const URL: &str = "https://github.com/stratusdb/stratus";
/// A generic result
pub type TResult<T> = Result<T, Box<dyn Error>>;
/// The size of the per-connection read buffer in bytes
pub const BUF_CAP: usize = 8 * 1024; // 8 KB per-connection
/// The default port that the server listens on
pub const DEFAULT_PORT: u16 = 6379;
