/*
 * Created on Sat May 06 2023
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

//! # The full-resync snapshot
//!
//! The bulk payload sent after `+FULLRESYNC` is the keyspace encoded as a
//! stream of ordinary RESP command frames (`SET`/`RPUSH`/`ZADD`/`XADD`). The
//! follower absorbs the declared number of bytes and applies the frames as
//! propagated commands before the link goes ACTIVE, so a fresh follower
//! converges without any extra serialization format. On-disk codec
//! compatibility is explicitly not a goal

use {
    crate::{
        corestore::{zset::format_score, Corestore, Data, Value},
        protocol,
    },
    bytes::Bytes,
    std::time::Instant,
};

/// How many elements a single reconstructed RPUSH/ZADD carries at most
const CHUNK: usize = 128;

/// Encode the live keyspace as a RESP command stream
pub fn encode(store: &Corestore, now: Instant) -> Bytes {
    let mut out: Vec<u8> = Vec::new();
    let mut push = |args: &[Data]| {
        out.extend_from_slice(&protocol::encode_frame(args));
    };
    for (key, entry) in store.iter_live(now) {
        match &entry.value {
            Value::Str(data) => {
                let mut args = vec![
                    Data::from_static(b"SET"),
                    key.clone(),
                    data.clone(),
                ];
                if let Some(at) = entry.expires_at {
                    let remaining = at.saturating_duration_since(now).as_millis().max(1);
                    args.push(Data::from_static(b"PX"));
                    args.push(Data::from(remaining.to_string().into_bytes()));
                }
                push(&args);
            }
            Value::List(list) => {
                let elements: Vec<&Data> = list.iter().collect();
                for chunk in elements.chunks(CHUNK) {
                    let mut args = Vec::with_capacity(chunk.len() + 2);
                    args.push(Data::from_static(b"RPUSH"));
                    args.push(key.clone());
                    args.extend(chunk.iter().map(|d| (*d).clone()));
                    push(&args);
                }
            }
            Value::Zset(zset) => {
                let pairs: Vec<(&Data, f64)> = zset.iter().collect();
                for chunk in pairs.chunks(CHUNK) {
                    let mut args = Vec::with_capacity(chunk.len() * 2 + 2);
                    args.push(Data::from_static(b"ZADD"));
                    args.push(key.clone());
                    for (member, score) in chunk {
                        args.push(Data::from(format_score(*score).into_bytes()));
                        args.push((*member).clone());
                    }
                    push(&args);
                }
            }
            Value::Stream(stream) => {
                for (id, fields) in stream.iter() {
                    let mut args = Vec::with_capacity(fields.len() * 2 + 3);
                    args.push(Data::from_static(b"XADD"));
                    args.push(key.clone());
                    args.push(Data::from(id.to_string().into_bytes()));
                    for (field, value) in fields {
                        args.push(field.clone());
                        args.push(value.clone());
                    }
                    push(&args);
                }
            }
        }
    }
    Bytes::from(out)
}
