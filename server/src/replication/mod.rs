/*
 * Created on Sun Apr 30 2023
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

//! # Replication
//!
//! The leader side ([`leader`]) tracks registered followers, the cumulative
//! replication offset and pending `WAIT`s; the follower side ([`follower`])
//! runs the outbound handshake state machine and consumes the leader's
//! command stream; [`snapshot`] encodes the keyspace as a RESP command
//! stream for the full-resync bulk payload

pub mod follower;
pub mod leader;
pub mod snapshot;

/// Information about the leader this instance follows (when running as a
/// replica)
#[derive(Debug, Clone)]
pub struct MasterInfo {
    pub host: String,
    pub port: u16,
    /// true once the handshake has completed and the link is ACTIVE
    pub link_up: bool,
    /// bytes of the leader's command stream applied locally
    pub offset: u64,
}

impl MasterInfo {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            link_up: false,
            offset: 0,
        }
    }
}
