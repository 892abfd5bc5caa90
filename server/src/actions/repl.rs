/*
 * Created on Sun Jun 18 2023
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

//! Replication-facing actions: the leader half of the handshake
//! (`REPLCONF`, `PSYNC`) and the synchronous-wait primitive (`WAIT`)

use {
    super::{parse_i64, parse_u64, ActionResult},
    crate::{
        blocking::MAX_TIMEOUT_MS,
        corestore::Data,
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        replication::{leader::PendingWait, snapshot},
        util,
    },
    bytes::BytesMut,
    std::time::Duration,
    tokio::sync::oneshot,
};

/// Run a `REPLCONF` query (`REPLCONF <option> <value> [...]`). A replica's
/// `ACK` never gets a reply; everything else is acknowledged with `+OK`
pub fn replconf(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    for pair in act.chunks(2) {
        let option = pair[0].to_ascii_uppercase();
        if option == b"LISTENING-PORT" {
            let port = parse_u64(&pair[1])?;
            if port > u16::MAX as u64 {
                return util::err(groups::SYNTAX_ERR);
            }
            if let Some(client) = engine.client_mut(ctx.conn) {
                client.replica_port = Some(port as u16);
            }
        } else if option == b"ACK" {
            let offset = parse_u64(&pair[1])?;
            engine.repl.record_ack(ctx.conn, offset);
            engine.complete_satisfied_waits();
            return Ok(Outcome::None);
        } else {
            // capa and anything newer are advisory; we only ever full-resync
        }
    }
    Ok(Outcome::Reply(engine.cache().ok()))
}

/// Run a `PSYNC` query. Whatever replication ID and offset the replica
/// claims, the answer is a full resync: the `+FULLRESYNC` header followed by
/// the snapshot as a bulk payload (no trailing CRLF), after which the
/// connection joins the follower registry and starts receiving the
/// propagated command stream
pub fn psync(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let payload = snapshot::encode(&engine.store, ctx.now);
    let mut out = BytesMut::with_capacity(payload.len() + 64);
    out.extend_from_slice(
        format!(
            "+FULLRESYNC {} {}\r\n",
            engine.repl.replid, engine.repl.offset
        )
        .as_bytes(),
    );
    out.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
    out.extend_from_slice(&payload);
    let port = engine.client(ctx.conn).and_then(|client| client.replica_port);
    engine.repl.register(ctx.conn, port);
    engine.stats().replica_joined();
    log::info!(
        "Replica attached (conn {}, announced port {:?}); sent {} byte snapshot",
        ctx.conn,
        port,
        payload.len()
    );
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `WAIT numReplicas timeoutMs` query
pub fn wait(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let required = parse_i64(&act[0])?;
    let timeout_ms = parse_i64(&act[1])?;
    if timeout_ms < 0 {
        return util::err(groups::TIMEOUT_NEGATIVE_ERR);
    }
    if required <= 0 {
        let count = engine.repl.follower_count() as i64;
        return Ok(Outcome::Reply(engine.cache().integer(count)));
    }
    let required = required as usize;
    let target = engine.repl.offset;
    let count = engine.repl.sync_count(target);
    if count >= required {
        return Ok(Outcome::Reply(engine.cache().integer(count as i64)));
    }
    if engine.repl.follower_count() > 0 {
        // nudge everyone to report their applied offset
        engine.propagate(&[
            Data::from_static(b"REPLCONF"),
            Data::from_static(b"GETACK"),
            Data::from_static(b"*"),
        ]);
    }
    let timeout_ms = if timeout_ms == 0 {
        // a zero timeout waits as long as we allow anything to wait
        MAX_TIMEOUT_MS
    } else {
        (timeout_ms as u64).min(MAX_TIMEOUT_MS)
    };
    let deadline = ctx.now + Duration::from_millis(timeout_ms);
    let (tx, rx) = oneshot::channel();
    engine.repl.add_pending(PendingWait {
        conn: ctx.conn,
        required,
        target,
        deadline,
        tx,
    });
    Ok(Outcome::Deferred(rx))
}
