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

//! Stream actions, including the blocking `XREAD`

use {
    super::{parse_u64, ActionError, ActionResult},
    crate::{
        blocking::{BlockedWaiter, WaitContext, MAX_TIMEOUT_MS},
        corestore::{
            stream::{parse_range_end, parse_range_start, RequestedId, StreamEntry, StreamId},
            Data,
        },
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        resp::writer,
        util,
    },
    bytes::BytesMut,
    std::{slice, time::Duration},
    tokio::sync::oneshot,
};

fn unbalanced_streams() -> ActionError {
    ActionError::Static(
        b"-ERR Unbalanced XREAD list of streams: for each stream key an ID or '$' must be provided\r\n",
    )
}

/// Encode a run of `(id, fields)` entries as the wire expects them: each
/// entry is a two-element array of the ID and the flattened field list
pub(crate) fn write_entries(out: &mut BytesMut, entries: &[(StreamId, StreamEntry)]) {
    writer::array_header(out, entries.len());
    for (id, fields) in entries {
        writer::array_header(out, 2);
        writer::bulk(out, id.to_string().as_bytes());
        writer::array_header(out, fields.len() * 2);
        for (field, value) in fields {
            writer::bulk(out, field);
            writer::bulk(out, value);
        }
    }
}

/// Run an `XADD` query. The allocated ID is the reply, and the propagated
/// frame always carries it explicitly (followers must not re-allocate)
pub fn xadd(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let key = &act[0];
    let requested = RequestedId::parse(&act[1])?;
    let mut fields = Vec::with_capacity((act.len() - 2) / 2);
    for pair in act[2..].chunks(2) {
        fields.push((pair[0].clone(), pair[1].clone()));
    }
    let id = engine
        .store
        .stream_add(key, &requested, fields, ctx.now_ms, ctx.now)?;
    let mut frame: Vec<Data> = Vec::with_capacity(act.len());
    frame.push(key.clone());
    frame.push(Data::from(id.to_string().into_bytes()));
    frame.extend(act[2..].iter().cloned());
    engine.did_write(ctx, slice::from_ref(key), b"XADD", &frame);
    engine.wake_stream(key, ctx);
    Ok(Outcome::Reply(crate::resp::bulk_frame(
        id.to_string().as_bytes(),
    )))
}

/// Run an `XRANGE` query (`XRANGE key start end [COUNT n]`)
pub fn xrange(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let count = match act.len() {
        3 => None,
        5 => {
            if !act[3].eq_ignore_ascii_case(b"COUNT") {
                return util::err(groups::SYNTAX_ERR);
            }
            Some(parse_u64(&act[4])? as usize)
        }
        _ => return util::err(groups::SYNTAX_ERR),
    };
    let start = parse_range_start(&act[1])?;
    let end = parse_range_end(&act[2])?;
    let entries = engine
        .store
        .stream_range(&act[0], start, end, count, ctx.now)?;
    let mut out = BytesMut::new();
    write_entries(&mut out, &entries);
    Ok(Outcome::Reply(out.freeze()))
}

/// Run an `XLEN` query
pub fn xlen(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let len = engine.store.stream_len(&act[0], ctx.now)? as i64;
    Ok(Outcome::Reply(engine.cache().integer(len)))
}

/// An XREAD start ID: `<ms>` or `<ms>-<seq>` (`$` is resolved before this)
fn parse_xread_id(raw: &[u8]) -> ActionResult<StreamId> {
    let text =
        std::str::from_utf8(raw).map_err(|_| ActionError::Static(groups::STREAM_ID_SYNTAX_ERR))?;
    let parsed = match text.split_once('-') {
        Some((ms, seq)) => ms
            .parse()
            .and_then(|ms| seq.parse().map(|seq| StreamId { ms, seq })),
        None => text.parse().map(|ms| StreamId { ms, seq: 0 }),
    };
    parsed.map_err(|_| ActionError::Static(groups::STREAM_ID_SYNTAX_ERR))
}

/// Run an `XREAD` query
/// ## Syntax
/// `XREAD [COUNT n] [BLOCK ms] STREAMS key [key ...] id [id ...]`
pub fn xread(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut count: Option<usize> = None;
    // outer None: no BLOCK given; inner None: block indefinitely
    let mut block: Option<Option<Duration>> = None;
    let mut streams_at = None;
    let mut i = 0;
    while i < act.len() {
        let token = act[i].to_ascii_uppercase();
        if token == b"COUNT" {
            let value = act.get(i + 1).ok_or(ActionError::Static(groups::SYNTAX_ERR))?;
            count = Some(parse_u64(value)? as usize);
            i += 2;
        } else if token == b"BLOCK" {
            let value = act.get(i + 1).ok_or(ActionError::Static(groups::SYNTAX_ERR))?;
            let ms = parse_u64(value).map_err(|_| ActionError::Static(groups::TIMEOUT_ERR))?;
            if ms > MAX_TIMEOUT_MS {
                return util::err(groups::TIMEOUT_ERR);
            }
            block = Some(if ms == 0 {
                None
            } else {
                Some(Duration::from_millis(ms))
            });
            i += 2;
        } else if token == b"STREAMS" {
            streams_at = Some(i + 1);
            break;
        } else {
            return util::err(groups::SYNTAX_ERR);
        }
    }
    let at = streams_at.ok_or(ActionError::Static(groups::SYNTAX_ERR))?;
    let rest = &act[at..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(unbalanced_streams());
    }
    let half = rest.len() / 2;
    let keys = &rest[..half];
    let raw_ids = &rest[half..];
    // `$` resolves to the stream top at this very moment, so a subsequent
    // block only sees entries produced afterwards
    let mut from = Vec::with_capacity(half);
    for (key, raw) in keys.iter().zip(raw_ids) {
        let id = if raw.as_ref() == b"$" {
            engine
                .store
                .stream_last_id(key, ctx.now)?
                .unwrap_or(StreamId::ZERO)
        } else {
            parse_xread_id(raw)?
        };
        from.push((key.clone(), id));
    }
    let limit = count.map(|c| c as i64).unwrap_or(-1);
    let mut results: Vec<(Data, Vec<(StreamId, StreamEntry)>)> = Vec::with_capacity(half);
    let mut have_data = false;
    for (key, id) in from.iter() {
        let entries = engine.store.stream_get_after(key, *id, limit, ctx.now)?;
        have_data |= !entries.is_empty();
        results.push((key.clone(), entries));
    }
    if have_data {
        let nonempty = results.iter().filter(|(_, e)| !e.is_empty()).count();
        let mut out = BytesMut::new();
        writer::array_header(&mut out, nonempty);
        for (key, entries) in results.iter().filter(|(_, e)| !e.is_empty()) {
            writer::array_header(&mut out, 2);
            writer::bulk(&mut out, key);
            write_entries(&mut out, entries);
        }
        return Ok(Outcome::Reply(out.freeze()));
    }
    let block = match block {
        Some(block) if !ctx.in_exec && !ctx.propagated => block,
        // without BLOCK (or inside EXEC) an empty read is just null
        _ => return Ok(Outcome::Reply(engine.cache().nil_array())),
    };
    let (tx, rx) = oneshot::channel();
    engine.blocking.register(BlockedWaiter {
        conn: ctx.conn,
        keys: keys.to_vec(),
        ctx: WaitContext::StreamRead { from, count },
        deadline: block.map(|d| ctx.now + d),
        tx,
    });
    Ok(Outcome::Deferred(rx))
}
