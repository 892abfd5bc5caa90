/*
 * Created on Sun May 14 2023
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

//! # The query engine
//!
//! The command catalog and the single dispatch entry point. Every command
//! declares its arity rule and classification flags here; the dispatcher
//! applies the restricted-mode guards (auth, subscribed, open transaction,
//! propagated) in one place so individual handlers never re-check them

use {
    crate::{
        actions::{self, unknown_command, wrong_arity, ActionResult},
        corestore::Data,
        engine::Engine,
        protocol::{responses::groups, Query},
        util::compiler,
    },
    bytes::Bytes,
    std::time::Instant,
    tokio::sync::oneshot,
};

/// What the dispatcher hands back to the connection task
pub enum Outcome {
    /// Write these bytes and read the next command
    Reply(Bytes),
    /// The reply will arrive later over this channel (blocking command);
    /// don't parse further commands until it does
    Deferred(oneshot::Receiver<Bytes>),
    /// Write these bytes and close the connection
    Quit(Bytes),
    /// Nothing to write (propagated command, replica ACK)
    None,
}

/// Per-command execution context
pub struct Ctx {
    pub conn: u64,
    /// the command arrived over the replication link: suppress the reply,
    /// don't re-propagate
    pub propagated: bool,
    /// the command runs inside EXEC: blocking commands degrade to their
    /// non-blocking variants
    pub in_exec: bool,
    pub now: Instant,
    pub now_ms: u64,
}

/// An argument-count rule, checked against the full argument vector
/// (command name included)
#[derive(Debug, Clone, Copy)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    /// `base + 2k` arguments: commands taking trailing pairs
    Step(usize),
}

impl Arity {
    pub fn check(&self, len: usize) -> bool {
        match *self {
            Arity::Exact(n) => len == n,
            Arity::AtLeast(n) => len >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&len),
            Arity::Step(base) => len >= base && (len - base) % 2 == 0,
        }
    }
}

pub type ActionFn = fn(&mut Engine, &mut Ctx, &[Data]) -> ActionResult<Outcome>;

/// A named command handler with its validation and classification metadata
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub is_write: bool,
    pub is_pubsub: bool,
    pub is_replication: bool,
    pub is_blocking: bool,
    pub run: ActionFn,
}

macro_rules! catalog {
    ($($name:literal => { arity: $arity:expr, w: $w:literal, p: $p:literal, r: $r:literal, b: $b:literal, run: $run:path }),* $(,)?) => {
        pub static COMMANDS: &[CommandSpec] = &[
            $(CommandSpec {
                name: $name,
                arity: $arity,
                is_write: $w,
                is_pubsub: $p,
                is_replication: $r,
                is_blocking: $b,
                run: $run,
            }),*
        ];
    };
}

catalog! {
    "PING"         => { arity: Arity::Range(1, 2),  w: false, p: false, r: false, b: false, run: actions::server::ping },
    "ECHO"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::server::echo },
    "AUTH"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::server::auth },
    "QUIT"         => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::server::quit },
    "INFO"         => { arity: Arity::Range(1, 2),  w: false, p: false, r: false, b: false, run: actions::server::info },
    "CONFIG"       => { arity: Arity::AtLeast(3),   w: false, p: false, r: false, b: false, run: actions::server::config },
    "GET"          => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::kv::get },
    "SET"          => { arity: Arity::Range(3, 5),  w: true,  p: false, r: false, b: false, run: actions::kv::set },
    "DEL"          => { arity: Arity::AtLeast(2),   w: true,  p: false, r: false, b: false, run: actions::kv::del },
    "EXISTS"       => { arity: Arity::AtLeast(2),   w: false, p: false, r: false, b: false, run: actions::kv::exists },
    "INCR"         => { arity: Arity::Exact(2),     w: true,  p: false, r: false, b: false, run: actions::kv::incr },
    "DECR"         => { arity: Arity::Exact(2),     w: true,  p: false, r: false, b: false, run: actions::kv::decr },
    "TYPE"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::kv::type_of },
    "KEYS"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::kv::keys },
    "DBSIZE"       => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::kv::dbsize },
    "FLUSHALL"     => { arity: Arity::Range(1, 2),  w: true,  p: false, r: false, b: false, run: actions::kv::flushall },
    "LPUSH"        => { arity: Arity::AtLeast(3),   w: true,  p: false, r: false, b: false, run: actions::lists::lpush },
    "RPUSH"        => { arity: Arity::AtLeast(3),   w: true,  p: false, r: false, b: false, run: actions::lists::rpush },
    "LPOP"         => { arity: Arity::Exact(2),     w: true,  p: false, r: false, b: false, run: actions::lists::lpop },
    "RPOP"         => { arity: Arity::Exact(2),     w: true,  p: false, r: false, b: false, run: actions::lists::rpop },
    "LLEN"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::lists::llen },
    "LRANGE"       => { arity: Arity::Exact(4),     w: false, p: false, r: false, b: false, run: actions::lists::lrange },
    "BLPOP"        => { arity: Arity::AtLeast(3),   w: true,  p: false, r: false, b: true,  run: actions::lists::blpop },
    "BRPOP"        => { arity: Arity::AtLeast(3),   w: true,  p: false, r: false, b: true,  run: actions::lists::brpop },
    "ZADD"         => { arity: Arity::Step(4),      w: true,  p: false, r: false, b: false, run: actions::zsets::zadd },
    "ZRANGE"       => { arity: Arity::Range(4, 5),  w: false, p: false, r: false, b: false, run: actions::zsets::zrange },
    "ZRANK"        => { arity: Arity::Exact(3),     w: false, p: false, r: false, b: false, run: actions::zsets::zrank },
    "ZSCORE"       => { arity: Arity::Exact(3),     w: false, p: false, r: false, b: false, run: actions::zsets::zscore },
    "ZCARD"        => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::zsets::zcard },
    "ZREM"         => { arity: Arity::AtLeast(3),   w: true,  p: false, r: false, b: false, run: actions::zsets::zrem },
    "XADD"         => { arity: Arity::Step(5),      w: true,  p: false, r: false, b: false, run: actions::streams::xadd },
    "XRANGE"       => { arity: Arity::Range(4, 6),  w: false, p: false, r: false, b: false, run: actions::streams::xrange },
    "XLEN"         => { arity: Arity::Exact(2),     w: false, p: false, r: false, b: false, run: actions::streams::xlen },
    "XREAD"        => { arity: Arity::AtLeast(4),   w: false, p: false, r: false, b: true,  run: actions::streams::xread },
    "PUBLISH"      => { arity: Arity::Exact(3),     w: false, p: true,  r: false, b: false, run: actions::pubsub::publish },
    "SUBSCRIBE"    => { arity: Arity::AtLeast(2),   w: false, p: true,  r: false, b: false, run: actions::pubsub::subscribe },
    "UNSUBSCRIBE"  => { arity: Arity::AtLeast(1),   w: false, p: true,  r: false, b: false, run: actions::pubsub::unsubscribe },
    "PSUBSCRIBE"   => { arity: Arity::AtLeast(2),   w: false, p: true,  r: false, b: false, run: actions::pubsub::psubscribe },
    "PUNSUBSCRIBE" => { arity: Arity::AtLeast(1),   w: false, p: true,  r: false, b: false, run: actions::pubsub::punsubscribe },
    "MULTI"        => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::txn::multi },
    "EXEC"         => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::txn::exec },
    "DISCARD"      => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::txn::discard },
    "WATCH"        => { arity: Arity::AtLeast(2),   w: false, p: false, r: false, b: false, run: actions::txn::watch },
    "UNWATCH"      => { arity: Arity::Exact(1),     w: false, p: false, r: false, b: false, run: actions::txn::unwatch },
    "REPLCONF"     => { arity: Arity::Step(3),      w: false, p: false, r: true,  b: false, run: actions::repl::replconf },
    "PSYNC"        => { arity: Arity::Exact(3),     w: false, p: false, r: true,  b: false, run: actions::repl::psync },
    "WAIT"         => { arity: Arity::Exact(3),     w: false, p: false, r: false, b: true,  run: actions::repl::wait },
}

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// The transaction control set is never queued
fn is_txn_control(name: &str) -> bool {
    matches!(name, "MULTI" | "EXEC" | "DISCARD" | "WATCH" | "UNWATCH")
}

/// The only commands a subscribed connection may issue: the subscription
/// management set (not PUBLISH) plus liveness
fn allowed_while_subscribed(spec: &CommandSpec) -> bool {
    (spec.is_pubsub && spec.name != "PUBLISH") || matches!(spec.name, "PING" | "QUIT")
}

/// The only commands an unauthenticated connection may issue
fn allowed_without_auth(name: &str) -> bool {
    matches!(name, "AUTH" | "QUIT")
}

fn now_unix_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// The single dispatch entry. All client commands and all propagated
/// commands come through here
pub fn execute(engine: &mut Engine, conn: u64, query: Query, propagated: bool) -> Outcome {
    if !propagated {
        // propagated frames were already counted on the leader
        engine.stats().incr_commands();
    }
    let name = query.name();
    let mut ctx = Ctx {
        conn,
        propagated,
        in_exec: false,
        now: Instant::now(),
        now_ms: now_unix_ms(),
    };
    let outcome = dispatch(engine, &mut ctx, &name, query);
    // lazy expiries surfaced by read paths still need their bookkeeping
    engine.flush_lazy_expiry(ctx.propagated);
    outcome
}

fn dispatch(engine: &mut Engine, ctx: &mut Ctx, name: &str, query: Query) -> Outcome {
    let spec = lookup(name);
    let in_txn = engine
        .client(ctx.conn)
        .map(|client| client.txn.is_some())
        .unwrap_or(false);
    if in_txn && !is_txn_control(name) {
        return queue_in_txn(engine, ctx, name, spec, query);
    }
    let spec = match spec {
        Some(spec) => spec,
        None => return fail(ctx, unknown_command(name)),
    };
    if compiler::unlikely(!spec.arity.check(query.len())) {
        return fail(ctx, wrong_arity(name));
    }
    if !ctx.propagated {
        if engine.auth_required(ctx.conn) && !allowed_without_auth(name) {
            return fail(ctx, groups::NOAUTH_ERR.into());
        }
        if engine.is_subscribed(ctx.conn) && !allowed_while_subscribed(spec) {
            return fail(ctx, groups::SUBSCRIBED_MODE_ERR.into());
        }
    } else if !(spec.is_write || spec.is_replication) {
        // the leader only ever streams writes; drop anything else unexecuted
        return Outcome::None;
    }
    let outcome = match (spec.run)(engine, ctx, query.payload()) {
        Ok(outcome) => outcome,
        Err(e) => fail(ctx, e),
    };
    if let Outcome::Deferred(_) = outcome {
        // only the declared blocking commands may defer a reply
        debug_assert!(spec.is_blocking);
    }
    if ctx.propagated && !spec.is_replication {
        // propagated commands never answer the source
        return Outcome::None;
    }
    outcome
}

/// Queue-time handling for an open transaction: validation errors poison the
/// EXEC, everything valid is stored as `(name, args)` for later resolution
fn queue_in_txn(
    engine: &mut Engine,
    ctx: &mut Ctx,
    name: &str,
    spec: Option<&'static CommandSpec>,
    query: Query,
) -> Outcome {
    let queued = engine.cache().queued();
    let client = match engine.client_mut(ctx.conn) {
        Some(client) => client,
        None => return Outcome::None,
    };
    // UNWRAP OK: the in_txn check just saw it
    let txn = client.txn.as_mut().unwrap();
    match spec {
        None => {
            txn.aborted = true;
            fail(ctx, unknown_command(name))
        }
        Some(spec) if !spec.arity.check(query.len()) => {
            txn.aborted = true;
            fail(ctx, wrong_arity(name))
        }
        Some(_) if name == "WAIT" => {
            txn.aborted = true;
            fail(ctx, groups::WAIT_IN_MULTI_ERR.into())
        }
        Some(_) => {
            txn.queued.push((name.to_owned(), query.into_args()));
            Outcome::Reply(queued)
        }
    }
}

/// Run one queued command at EXEC time, returning its reply frame. Guards
/// were applied at queue time; blocking commands degrade via `in_exec`
pub fn execute_queued(engine: &mut Engine, conn: u64, name: &str, args: &[Data]) -> Bytes {
    let mut ctx = Ctx {
        conn,
        propagated: false,
        in_exec: true,
        now: Instant::now(),
        now_ms: now_unix_ms(),
    };
    let spec = match lookup(name) {
        Some(spec) => spec,
        None => return unknown_command(name).into_frame(),
    };
    match (spec.run)(engine, &mut ctx, &args[1..]) {
        Ok(Outcome::Reply(frame)) | Ok(Outcome::Quit(frame)) => frame,
        // blocking commands degrade inside EXEC and never defer
        Ok(Outcome::Deferred(_)) | Ok(Outcome::None) => {
            Bytes::from_static(groups::NIL_ARRAY)
        }
        Err(e) => e.into_frame(),
    }
}

fn fail(ctx: &Ctx, e: crate::actions::ActionError) -> Outcome {
    if ctx.propagated {
        Outcome::None
    } else {
        Outcome::Reply(e.into_frame())
    }
}
