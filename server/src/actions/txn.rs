/*
 * Created on Sun Jun 11 2023
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

//! Transaction control actions. The queueing of non-control commands lives
//! in the dispatcher; this module owns MULTI/EXEC/DISCARD/WATCH/UNWATCH

use {
    super::ActionResult,
    crate::{
        corestore::Data,
        engine::Engine,
        protocol::responses::groups,
        queryengine::{self, Ctx, Outcome},
        resp::writer,
        txn::Transaction,
        util,
    },
    bytes::BytesMut,
    std::collections::HashSet,
};

/// Run a `MULTI` query
pub fn multi(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let client = match engine.client_mut(ctx.conn) {
        Some(client) => client,
        None => return Ok(Outcome::None),
    };
    if client.txn.is_some() {
        return util::err(groups::MULTI_NESTED_ERR);
    }
    client.txn = Some(Transaction::new());
    Ok(Outcome::Reply(engine.cache().ok()))
}

/// Run an `EXEC` query: either the distinguished null array (a watched key
/// was touched), a transaction-abort error (queue-time failure), or the
/// replies of every queued command in insertion order
pub fn exec(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let (txn, dirty, watched) = {
        let client = match engine.client_mut(ctx.conn) {
            Some(client) => client,
            None => return Ok(Outcome::None),
        };
        let txn = match client.txn.take() {
            Some(txn) => txn,
            None => return util::err(groups::EXEC_WITHOUT_MULTI_ERR),
        };
        let dirty = client.dirty_cas;
        client.dirty_cas = false;
        (txn, dirty, std::mem::take(&mut client.watched))
    };
    engine.watch.unwatch(&watched, ctx.conn);
    if txn.aborted {
        return util::err(groups::EXECABORT_ERR);
    }
    if dirty {
        return Ok(Outcome::Reply(engine.cache().nil_array()));
    }
    if txn.queued.is_empty() {
        return Ok(Outcome::Reply(engine.cache().empty_array()));
    }
    let mut frames = Vec::with_capacity(txn.queued.len());
    for (name, args) in txn.queued.iter() {
        frames.push(queryengine::execute_queued(engine, ctx.conn, name, args));
    }
    let mut out = BytesMut::with_capacity(16 + frames.iter().map(|f| f.len()).sum::<usize>());
    writer::array_header(&mut out, frames.len());
    for frame in frames {
        out.extend_from_slice(&frame);
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `DISCARD` query
pub fn discard(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let watched = {
        let client = match engine.client_mut(ctx.conn) {
            Some(client) => client,
            None => return Ok(Outcome::None),
        };
        if client.txn.take().is_none() {
            return util::err(groups::DISCARD_WITHOUT_MULTI_ERR);
        }
        client.dirty_cas = false;
        std::mem::take(&mut client.watched)
    };
    engine.watch.unwatch(&watched, ctx.conn);
    Ok(Outcome::Reply(engine.cache().ok()))
}

/// Run a `WATCH` query. Only legal outside an open transaction
pub fn watch(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let in_txn = engine
        .client(ctx.conn)
        .map(|client| client.txn.is_some())
        .unwrap_or(false);
    if in_txn {
        return util::err(groups::WATCH_IN_MULTI_ERR);
    }
    for key in act {
        engine.watch.watch(key.clone(), ctx.conn);
        if let Some(client) = engine.client_mut(ctx.conn) {
            client.watched.insert(key.clone());
        }
    }
    Ok(Outcome::Reply(engine.cache().ok()))
}

/// Run an `UNWATCH` query
pub fn unwatch(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let watched: HashSet<Data> = {
        let client = match engine.client_mut(ctx.conn) {
            Some(client) => client,
            None => return Ok(Outcome::None),
        };
        client.dirty_cas = false;
        std::mem::take(&mut client.watched)
    };
    engine.watch.unwatch(&watched, ctx.conn);
    Ok(Outcome::Reply(engine.cache().ok()))
}
