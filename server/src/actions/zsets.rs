/*
 * Created on Sun May 28 2023
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

//! Sorted-set actions

use {
    super::{parse_i64, ActionResult},
    crate::{
        corestore::{
            zset::{format_score, parse_score},
            Data,
        },
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        resp::{self, writer},
        util,
    },
    bytes::BytesMut,
    std::slice,
};

/// Run a `ZADD` query. The reply is the number of members newly inserted
/// (updates don't count)
pub fn zadd(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let key = &act[0];
    let mut pairs = Vec::with_capacity((act.len() - 1) / 2);
    for pair in act[1..].chunks(2) {
        let score = match parse_score(&pair[0]) {
            Some(score) => score,
            None => return util::err(groups::NOT_A_FLOAT_ERR),
        };
        pairs.push((score, pair[1].clone()));
    }
    let added = engine.store.zset_add(key, pairs, ctx.now)?;
    engine.did_write(ctx, slice::from_ref(key), b"ZADD", act);
    Ok(Outcome::Reply(engine.cache().integer(added as i64)))
}

/// Run a `ZRANGE` query (`ZRANGE key start stop [WITHSCORES]`)
pub fn zrange(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let withscores = match act.get(3) {
        Some(flag) if flag.eq_ignore_ascii_case(b"WITHSCORES") => true,
        Some(_) => return util::err(groups::SYNTAX_ERR),
        None => false,
    };
    let start = parse_i64(&act[1])?;
    let stop = parse_i64(&act[2])?;
    let members = engine.store.zset_range(&act[0], start, stop, ctx.now)?;
    let mut out = BytesMut::new();
    if withscores {
        writer::array_header(&mut out, members.len() * 2);
        for (member, score) in members {
            writer::bulk(&mut out, &member);
            writer::bulk(&mut out, format_score(score).as_bytes());
        }
    } else {
        writer::array_header(&mut out, members.len());
        for (member, _) in members {
            writer::bulk(&mut out, &member);
        }
    }
    Ok(Outcome::Reply(out.freeze()))
}

/// Run a `ZRANK` query
pub fn zrank(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let reply = match engine.store.zset_rank(&act[0], &act[1], ctx.now)? {
        Some(rank) => engine.cache().integer(rank as i64),
        None => engine.cache().nil(),
    };
    Ok(Outcome::Reply(reply))
}

/// Run a `ZSCORE` query
pub fn zscore(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let reply = match engine.store.zset_score(&act[0], &act[1], ctx.now)? {
        Some(score) => resp::bulk_frame(format_score(score).as_bytes()),
        None => engine.cache().nil(),
    };
    Ok(Outcome::Reply(reply))
}

/// Run a `ZCARD` query
pub fn zcard(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let card = engine.store.zset_card(&act[0], ctx.now)? as i64;
    Ok(Outcome::Reply(engine.cache().integer(card)))
}

/// Run a `ZREM` query
pub fn zrem(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let key = &act[0];
    let removed = engine.store.zset_remove(key, &act[1..], ctx.now)?;
    if removed > 0 {
        engine.did_write(ctx, slice::from_ref(key), b"ZREM", act);
    }
    Ok(Outcome::Reply(engine.cache().integer(removed as i64)))
}
