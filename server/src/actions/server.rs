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

//! Server-level actions: connection liveness, authentication and
//! introspection

use {
    super::{ActionError, ActionResult},
    crate::{
        corestore::Data,
        engine::Engine,
        protocol::responses::groups,
        queryengine::{Ctx, Outcome},
        resp::{self, writer},
        util::{self, pattern},
    },
    bytes::BytesMut,
};

/// Run a `PING` query
pub fn ping(engine: &mut Engine, _ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let reply = match act.first() {
        Some(msg) => resp::bulk_frame(msg),
        None => engine.cache().pong(),
    };
    Ok(Outcome::Reply(reply))
}

/// Run an `ECHO` query
pub fn echo(_engine: &mut Engine, _ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    Ok(Outcome::Reply(resp::bulk_frame(&act[0])))
}

/// Constant-time byte comparison for the shared secret
fn secret_matches(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Run an `AUTH` query against the optional shared secret
pub fn auth(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let secret = match engine.cfg.requirepass.clone() {
        Some(secret) => secret,
        None => return util::err(groups::AUTH_DISABLED_ERR),
    };
    if secret_matches(&act[0], secret.as_bytes()) {
        if let Some(client) = engine.client_mut(ctx.conn) {
            client.authed = true;
        }
        Ok(Outcome::Reply(engine.cache().ok()))
    } else {
        util::err(groups::BAD_SECRET_ERR)
    }
}

/// Run a `QUIT` query
pub fn quit(engine: &mut Engine, _ctx: &mut Ctx, _act: &[Data]) -> ActionResult<Outcome> {
    Ok(Outcome::Quit(engine.cache().ok()))
}

fn section_wanted(act: &[Data], name: &str) -> bool {
    match act.first() {
        Some(section) => section.eq_ignore_ascii_case(name.as_bytes()),
        None => true,
    }
}

/// Run an `INFO [section]` query
pub fn info(engine: &mut Engine, ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let mut body = String::new();
    if section_wanted(act, "server") {
        body.push_str(&format!(
            "# Server\r\nstratd_version:{}\r\ntcp_port:{}\r\nuptime_in_seconds:{}\r\n\r\n",
            libstrat::VERSION,
            engine.cfg.port,
            engine.uptime_secs(ctx.now),
        ));
    }
    if section_wanted(act, "clients") {
        body.push_str(&format!(
            "# Clients\r\nconnected_clients:{}\r\nblocked_clients:{}\r\n\r\n",
            engine.stats().connected_clients(),
            engine.blocking.blocked_count(),
        ));
    }
    if section_wanted(act, "stats") {
        body.push_str(&format!(
            "# Stats\r\ntotal_connections_received:{}\r\ntotal_commands_processed:{}\r\nexpired_keys:{}\r\npubsub_messages_delivered:{}\r\nkeyspace_hits:{}\r\nkeyspace_misses:{}\r\n\r\n",
            engine.stats().connections_accepted(),
            engine.stats().commands_processed(),
            engine.stats().expired_keys(),
            engine.stats().messages_published(),
            engine.stats().keyspace_hits(),
            engine.stats().keyspace_misses(),
        ));
    }
    if section_wanted(act, "replication") {
        match engine.master.as_ref() {
            Some(master) => {
                body.push_str(&format!(
                    "# Replication\r\nrole:slave\r\nmaster_host:{}\r\nmaster_port:{}\r\nmaster_link_status:{}\r\nslave_repl_offset:{}\r\n\r\n",
                    master.host,
                    master.port,
                    if master.link_up { "up" } else { "down" },
                    master.offset,
                ));
            }
            None => {
                body.push_str(&format!(
                    "# Replication\r\nrole:master\r\nconnected_slaves:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}\r\n",
                    engine.repl.follower_count(),
                    engine.repl.replid,
                    engine.repl.offset,
                ));
                for (idx, follower) in engine.repl.followers().enumerate() {
                    body.push_str(&format!(
                        "slave{}:port={},offset={}\r\n",
                        idx,
                        follower.listening_port.unwrap_or(0),
                        follower.ack_offset,
                    ));
                }
                body.push_str("\r\n");
            }
        }
    }
    if section_wanted(act, "keyspace") {
        body.push_str(&format!(
            "# Keyspace\r\ndb0:keys={}\r\n\r\n",
            engine.store.len(ctx.now)
        ));
    }
    if body.is_empty() {
        return util::err(groups::SYNTAX_ERR);
    }
    Ok(Outcome::Reply(resp::bulk_frame(body.as_bytes())))
}

/// Run a `CONFIG GET <pattern>` / `CONFIG SET <param> <value>` query
pub fn config(engine: &mut Engine, _ctx: &mut Ctx, act: &[Data]) -> ActionResult<Outcome> {
    let sub = act[0].to_ascii_uppercase();
    if sub == b"GET" {
        if act.len() != 2 {
            return Err(super::wrong_arity("config|get"));
        }
        let params: Vec<(&str, String)> = vec![
            ("bind", engine.cfg.host.to_string()),
            ("port", engine.cfg.port.to_string()),
            ("maxclients", engine.cfg.maxcon.to_string()),
            (
                "requirepass",
                engine.cfg.requirepass.clone().unwrap_or_default(),
            ),
            ("sweep-every-ms", engine.cfg.sweep_every_ms.to_string()),
        ];
        let mut out = BytesMut::new();
        let hits: Vec<&(&str, String)> = params
            .iter()
            .filter(|(name, _)| pattern::matches(&act[1], name.as_bytes()))
            .collect();
        writer::array_header(&mut out, hits.len() * 2);
        for (name, value) in hits {
            writer::bulk(&mut out, name.as_bytes());
            writer::bulk(&mut out, value.as_bytes());
        }
        Ok(Outcome::Reply(out.freeze()))
    } else if sub == b"SET" {
        if act.len() != 3 {
            return Err(super::wrong_arity("config|set"));
        }
        let param = act[1].to_ascii_lowercase();
        let value = String::from_utf8_lossy(&act[2]).to_string();
        if param == b"requirepass" {
            engine.cfg.requirepass = if value.is_empty() { None } else { Some(value) };
        } else if param == b"sweep-every-ms" {
            let ms: u64 = value
                .parse()
                .map_err(|_| ActionError::Static(groups::NOT_AN_INT_ERR))?;
            if ms == 0 {
                return util::err(groups::SYNTAX_ERR);
            }
            engine.cfg.sweep_every_ms = ms;
        } else {
            return util::err(groups::CONFIG_UNKNOWN_ERR);
        }
        Ok(Outcome::Reply(engine.cache().ok()))
    } else {
        Err(ActionError::message(&format!(
            "ERR Unknown CONFIG subcommand or wrong number of arguments for '{}'",
            String::from_utf8_lossy(&act[0])
        )))
    }
}
