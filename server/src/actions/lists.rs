/*
 * Created on Sun May 21 2023
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

//! List actions, including the blocking pops

use {
    super::{parse_i64, ActionResult},
    crate::{
        blocking::{BlockedWaiter, WaitContext, MAX_TIMEOUT_MS},
        corestore::Data,
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        resp, util,
    },
    std::{slice, time::Duration},
    tokio::sync::oneshot,
};

const fn push_name(left: bool) -> &'static [u8] {
    if left {
        b"LPUSH"
    } else {
        b"RPUSH"
    }
}

const fn pop_name(left: bool) -> &'static [u8] {
    if left {
        b"LPOP"
    } else {
        b"RPOP"
    }
}

fn push(engine: &mut Engine, ctx: &mut Ctx, act: &[Data], left: bool) -> ActionResult<Outcome> {
    let key = &act[0];
    let values: Vec<Data> = act[1..].to_vec();
    let len = engine.store.list_push(key, values, left, ctx.now)?;
    engine.did_write(ctx, slice::from_ref(key), push_name(left), act);
    // fresh data may satisfy suspended clients
    engine.wake_list(key, ctx);
    Ok(Outcome::Reply(engine.cache().integer(len as i64)))
}

/// Run an `LPUSH` query
pub fn lpush(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    push(engine, ctx, act, true)
}

/// Run an `RPUSH` query
pub fn rpush(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    push(engine, ctx, act, false)
}

fn pop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data], left: bool) -> ActionResult<Outcome> {
    let key = &act[0];
    let reply = match engine.store.list_pop(key, left, ctx.now)? {
        Some(value) => {
            engine.did_write(ctx, slice::from_ref(key), pop_name(left), act);
            resp::bulk_frame(&value)
        }
        None => engine.cache().nil(),
    };
    Ok(Outcome::Reply(reply))
}

/// Run an `LPOP` query
pub fn lpop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    pop(engine, ctx, act, true)
}

/// Run an `RPOP` query
pub fn rpop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    pop(engine, ctx, act, false)
}

/// Run an `LLEN` query
pub fn llen(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let len = engine.store.list_len(&act[0], ctx.now)? as i64;
    Ok(Outcome::Reply(engine.cache().integer(len)))
}

/// Run an `LRANGE` query
pub fn lrange(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let start = parse_i64(&act[1])?;
    let stop = parse_i64(&act[2])?;
    let elements = engine.store.list_range(&act[0], start, stop, ctx.now)?;
    Ok(Outcome::Reply(resp::array_of_bulks(&elements)))
}

/// Parse a blocking timeout in (possibly fractional) seconds. `0` means
/// block indefinitely
fn parse_timeout_secs(raw: &Data) -> ActionResult<Option<Duration>> {
    let secs: f64 = std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(super::ActionError::Static(groups::TIMEOUT_ERR))?;
    if !secs.is_finite() {
        return util::err(groups::TIMEOUT_ERR);
    }
    if secs < 0.0 {
        return util::err(groups::TIMEOUT_NEGATIVE_ERR);
    }
    if secs == 0.0 {
        return Ok(None);
    }
    let ms = secs * 1000.0;
    if ms > MAX_TIMEOUT_MS as f64 {
        return util::err(groups::TIMEOUT_ERR);
    }
    Ok(Some(Duration::from_millis(ms as u64)))
}

fn bpop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data], left: bool) -> ActionResult<Outcome> {
    let timeout = parse_timeout_secs(&act[act.len() - 1])?;
    let keys = &act[..act.len() - 1];
    // serve immediately off the first watched list that has data
    for key in keys {
        if engine.store.list_len(key, ctx.now)? > 0 {
            // UNWRAP OK: the list was non-empty a line ago and nothing else
            // can run between the two calls
            let value = engine.store.list_pop(key, left, ctx.now)?.unwrap();
            engine.did_write(ctx, slice::from_ref(key), pop_name(left), slice::from_ref(key));
            return Ok(Outcome::Reply(resp::array_of_bulks(&[
                key.as_ref(),
                value.as_ref(),
            ])));
        }
    }
    // nothing available: inside EXEC (or over the replication link) the
    // command degrades to its non-blocking variant
    if ctx.in_exec || ctx.propagated {
        return Ok(Outcome::Reply(engine.cache().nil_array()));
    }
    let (tx, rx) = oneshot::channel();
    engine.blocking.register(BlockedWaiter {
        conn: ctx.conn,
        keys: keys.to_vec(),
        ctx: WaitContext::ListPop { left },
        deadline: timeout.map(|d| ctx.now + d),
        tx,
    });
    Ok(Outcome::Deferred(rx))
}

/// Run a `BLPOP` query
pub fn blpop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    bpop(engine, ctx, act, true)
}

/// Run a `BRPOP` query
pub fn brpop(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    bpop(engine, ctx, act, false)
}
