/*
 * Created on Sat Jun 03 2023
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

//! Pub/sub actions

use {
    super::ActionResult,
    crate::{
        corestore::Data,
        engine::Engine,
        queryengine::{Ctx, Outcome},
        resp::writer,
    },
    bytes::BytesMut,
};

/// A subscribe/unsubscribe confirmation: `(kind, channel|nil, active count)`
fn confirm(out: &mut BytesMut, kind: &[u8], channel: Option<&[u8]>, count: i64) {
    writer::array_header(out, 3);
    writer::bulk(out, kind);
    match channel {
        Some(channel) => writer::bulk(out, channel),
        None => writer::null_bulk(out),
    }
    writer::integer(out, count);
}

/// Run a `SUBSCRIBE` query
pub fn subscribe(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut out = BytesMut::new();
    for channel in act {
        if engine.pubsub.subscribe(channel.clone(), ctx.conn) {
            if let Some(client) = engine.client_mut(ctx.conn) {
                client.subs.insert(channel.clone());
            }
        }
        let count = engine.subscription_count(ctx.conn);
        confirm(&mut out, b"subscribe", Some(channel.as_ref()), count);
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run an `UNSUBSCRIBE` query. With no channels given, drop them all
pub fn unsubscribe(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let targets: Vec<Data> = if act.is_empty() {
        engine
            .client(ctx.conn)
            .map(|client| client.subs.iter().cloned().collect())
            .unwrap_or_default()
    } else {
        act.to_vec()
    };
    let mut out = BytesMut::new();
    if targets.is_empty() {
        confirm(&mut out, b"unsubscribe", None, engine.subscription_count(ctx.conn));
        return Ok(Outcome::Reply(out.freeze()));
    }
    for channel in targets {
        engine.pubsub.unsubscribe(&channel, ctx.conn);
        if let Some(client) = engine.client_mut(ctx.conn) {
            client.subs.remove(&channel);
        }
        let count = engine.subscription_count(ctx.conn);
        confirm(&mut out, b"unsubscribe", Some(channel.as_ref()), count);
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `PSUBSCRIBE` query
pub fn psubscribe(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut out = BytesMut::new();
    for pattern in act {
        if engine.pubsub.psubscribe(pattern.clone(), ctx.conn) {
            if let Some(client) = engine.client_mut(ctx.conn) {
                client.psubs.insert(pattern.clone());
            }
        }
        let count = engine.subscription_count(ctx.conn);
        confirm(&mut out, b"psubscribe", Some(pattern.as_ref()), count);
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `PUNSUBSCRIBE` query. With no patterns given, drop them all
pub fn punsubscribe(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let targets: Vec<Data> = if act.is_empty() {
        engine
            .client(ctx.conn)
            .map(|client| client.psubs.iter().cloned().collect())
            .unwrap_or_default()
    } else {
        act.to_vec()
    };
    let mut out = BytesMut::new();
    if targets.is_empty() {
        confirm(&mut out, b"punsubscribe", None, engine.subscription_count(ctx.conn));
        return Ok(Outcome::Reply(out.freeze()));
    }
    for pattern in targets {
        engine.pubsub.punsubscribe(&pattern, ctx.conn);
        if let Some(client) = engine.client_mut(ctx.conn) {
            client.psubs.remove(&pattern);
        }
        let count = engine.subscription_count(ctx.conn);
        confirm(&mut out, b"punsubscribe", Some(pattern.as_ref()), count);
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `PUBLISH` query. The reply is the number of connections the
/// message was delivered to
pub fn publish(engine: &mut Engine, _ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let delivered = engine.publish(&act[0], &act[1]);
    Ok(Outcome::Reply(engine.cache().integer(delivered as i64)))
}
