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

//! The configuration file layout

use {serde::Deserialize, std::net::IpAddr};

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ConfigFile {
    pub server: Option<ServerSection>,
    pub auth: Option<AuthSection>,
    pub replication: Option<ReplicationSection>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ServerSection {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub maxclients: Option<usize>,
    pub noart: Option<bool>,
    pub sweep_every_ms: Option<u64>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct AuthSection {
    pub requirepass: Option<String>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ReplicationSection {
    /// `host:port` of the leader to follow
    pub replicaof: Option<String>,
}
