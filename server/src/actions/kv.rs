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

//! Byte-string and generic keyspace actions

use {
    super::{parse_u64, ActionError, ActionResult},
    crate::{
        corestore::Data,
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        resp, util,
    },
    std::{slice, time::Duration},
};

fn invalid_expire(cmd: &str) -> ActionError {
    ActionError::message(&format!("ERR invalid expire time in '{}' command", cmd))
}

/// Run a `GET` query
pub fn get(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let value = engine.store.get(&act[0], ctx.now)?;
    let reply = match value {
        Some(data) => {
            engine.stats().keyspace_hit();
            resp::bulk_frame(&data)
        }
        None => {
            engine.stats().keyspace_miss();
            engine.cache().nil()
        }
    };
    Ok(Outcome::Reply(reply))
}

/// Run a `SET` query (`SET key value [PX milliseconds]`)
pub fn set(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let key = &act[0];
    let value = act[1].clone();
    let expires_at = if act.len() > 2 {
        if act.len() != 4 || !act[2].eq_ignore_ascii_case(b"PX") {
            return util::err(groups::SYNTAX_ERR);
        }
        let ms = parse_u64(&act[3])?;
        if ms == 0 {
            return Err(invalid_expire("set"));
        }
        Some(
            ctx.now
                .checked_add(Duration::from_millis(ms))
                .ok_or_else(|| invalid_expire("set"))?,
        )
    } else {
        None
    };
    engine.store.set(key.clone(), value, expires_at);
    engine.did_write(ctx, slice::from_ref(key), b"SET", act);
    Ok(Outcome::Reply(engine.cache().ok()))
}

/// Run a `DEL` query. The reply is the number of keys actually removed
pub fn del(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut removed = 0i64;
    for key in act {
        if engine.store.del(key, ctx.now) {
            removed += 1;
            engine.did_write(ctx, slice::from_ref(key), b"DEL", slice::from_ref(key));
        }
    }
    Ok(Outcome::Reply(engine.cache().integer(removed)))
}

/// Run an `EXISTS` query
pub fn exists(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut present = 0i64;
    for key in act {
        if engine.store.exists(key, ctx.now) {
            present += 1;
        }
    }
    Ok(Outcome::Reply(engine.cache().integer(present)))
}

fn incr_by(engine: &mut Engine, ctx: &mut Ctx, act: &[Data], delta: i64, name: &'static [u8]) -> ActionResult<Outcome> {
    let updated = engine.store.incr_by(&act[0], delta, ctx.now)?;
    engine.did_write(ctx, &act[..1], name, act);
    Ok(Outcome::Reply(engine.cache().integer(updated)))
}

/// Run an `INCR` query
pub fn incr(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    incr_by(engine, ctx, act, 1, b"INCR")
}

/// Run a `DECR` query
pub fn decr(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    incr_by(engine, ctx, act, -1, b"DECR")
}

/// Run a `TYPE` query
pub fn type_of(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let name = engine.store.type_of(&act[0], ctx.now).unwrap_or("none");
    Ok(Outcome::Reply(resp::simple_frame(name.as_bytes())))
}

/// Run a `KEYS` query
pub fn keys(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let hits = engine.store.keys_matching(&act[0], ctx.now);
    Ok(Outcome::Reply(resp::array_of_bulks(&hits)))
}

/// Run a `DBSIZE` query
pub fn dbsize(engine: &mut Engine, ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    let len = engine.store.len(ctx.now) as i64;
    Ok(Outcome::Reply(engine.cache().integer(len)))
}

/// Run a `FLUSHALL` query. The SYNC/ASYNC modifier is accepted for
/// compatibility; the keyspace drop is synchronous either way
pub fn flushall(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    if let Some(modifier) = act.first() {
        if !modifier.eq_ignore_ascii_case(b"SYNC") && !modifier.eq_ignore_ascii_case(b"ASYNC") {
            return util::err(groups::SYNTAX_ERR);
        }
    }
    let removed = engine.store.clear();
    log::debug!("FLUSHALL dropped {removed} keys");
    engine.store_cleared(ctx);
    Ok(Outcome::Reply(engine.cache().ok()))
}
