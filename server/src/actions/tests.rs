/*
 * Created on Sun Jul 16 2023
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

use crate::{config::ConfigurationSet, tests::harness::TestDb};

#[test]
fn unknown_command_and_arity_errors() {
    let mut db = TestDb::new();
    let c = db.client();
    assert_eq!(
        db.reply(&c, &["FROBNICATE", "x"]).as_ref(),
        b"-ERR unknown command 'FROBNICATE'\r\n"
    );
    assert_eq!(
        db.reply(&c, &["GET"]).as_ref(),
        b"-ERR wrong number of arguments for 'get' command\r\n"
    );
    assert_eq!(
        db.reply(&c, &["SET", "k"]).as_ref(),
        b"-ERR wrong number of arguments for 'set' command\r\n"
    );
    // pair commands reject a dangling score
    assert_eq!(
        db.reply(&c, &["ZADD", "z", "1", "m", "2"]).as_ref(),
        b"-ERR wrong number of arguments for 'zadd' command\r\n"
    );
}

#[test]
fn ping_and_echo() {
    let mut db = TestDb::new();
    let c = db.client();
    assert_eq!(db.reply(&c, &["PING"]).as_ref(), b"+PONG\r\n");
    assert_eq!(db.reply(&c, &["PING", "hi"]).as_ref(), b"$2\r\nhi\r\n");
    assert_eq!(db.reply(&c, &["ECHO", "hello"]).as_ref(), b"$5\r\nhello\r\n");
}

#[test]
fn incr_decr_error_taxonomy() {
    let mut db = TestDb::new();
    let c = db.client();
    assert_eq!(db.reply(&c, &["INCR", "ctr"]).as_ref(), b":1\r\n");
    assert_eq!(db.reply(&c, &["DECR", "ctr"]).as_ref(), b":0\r\n");
    db.reply(&c, &["SET", "txt", "ten"]);
    assert_eq!(
        db.reply(&c, &["INCR", "txt"]).as_ref(),
        b"-ERR value is not an integer or out of range\r\n"
    );
    db.reply(&c, &["SET", "max", "9223372036854775807"]);
    assert_eq!(
        db.reply(&c, &["INCR", "max"]).as_ref(),
        b"-ERR increment or decrement would overflow\r\n"
    );
    db.reply(&c, &["LPUSH", "lst", "x"]);
    assert_eq!(
        db.reply(&c, &["INCR", "lst"]).as_ref(),
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n"
    );
}

#[test]
fn set_with_px_and_syntax_errors() {
    let mut db = TestDb::new();
    let c = db.client();
    assert_eq!(db.reply(&c, &["SET", "k", "v", "PX", "500"]).as_ref(), b"+OK\r\n");
    assert_eq!(
        db.reply(&c, &["SET", "k", "v", "EX", "5"]).as_ref(),
        b"-ERR syntax error\r\n"
    );
    assert_eq!(
        db.reply(&c, &["SET", "k", "v", "PX"]).as_ref(),
        b"-ERR syntax error\r\n"
    );
    assert_eq!(
        db.reply(&c, &["SET", "k", "v", "PX", "0"]).as_ref(),
        b"-ERR invalid expire time in 'set' command\r\n"
    );
}

#[test]
fn type_keys_del_exists() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["SET", "s", "v"]);
    db.reply(&c, &["RPUSH", "l", "v"]);
    db.reply(&c, &["ZADD", "z", "1", "m"]);
    db.reply(&c, &["XADD", "x", "*", "f", "v"]);
    assert_eq!(db.reply(&c, &["TYPE", "s"]).as_ref(), b"+string\r\n");
    assert_eq!(db.reply(&c, &["TYPE", "l"]).as_ref(), b"+list\r\n");
    assert_eq!(db.reply(&c, &["TYPE", "z"]).as_ref(), b"+zset\r\n");
    assert_eq!(db.reply(&c, &["TYPE", "x"]).as_ref(), b"+stream\r\n");
    assert_eq!(db.reply(&c, &["TYPE", "none"]).as_ref(), b"+none\r\n");
    assert_eq!(db.reply(&c, &["DBSIZE"]).as_ref(), b":4\r\n");
    assert_eq!(db.reply(&c, &["EXISTS", "s", "l", "none"]).as_ref(), b":2\r\n");
    assert_eq!(db.reply(&c, &["DEL", "s", "none"]).as_ref(), b":1\r\n");
    assert_eq!(db.reply(&c, &["EXISTS", "s"]).as_ref(), b":0\r\n");
    // glob over the keyspace
    let keys = db.reply(&c, &["KEYS", "*"]);
    assert!(keys.starts_with(b"*3\r\n"));
    let hit = db.reply(&c, &["KEYS", "z*"]);
    assert_eq!(hit.as_ref(), b"*1\r\n$1\r\nz\r\n");
}

#[test]
fn lrange_and_llen() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["RPUSH", "l", "a", "b", "c"]);
    assert_eq!(db.reply(&c, &["LLEN", "l"]).as_ref(), b":3\r\n");
    assert_eq!(
        db.reply(&c, &["LRANGE", "l", "0", "-1"]).as_ref(),
        b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(
        db.reply(&c, &["LRANGE", "l", "-2", "-1"]).as_ref(),
        b"*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(db.reply(&c, &["LPOP", "l"]).as_ref(), b"$1\r\na\r\n");
    assert_eq!(db.reply(&c, &["RPOP", "l"]).as_ref(), b"$1\r\nc\r\n");
    assert_eq!(db.reply(&c, &["LPOP", "missing"]).as_ref(), b"$-1\r\n");
}

#[test]
fn zset_replies() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["ZADD", "z", "1.5", "m"]);
    assert_eq!(db.reply(&c, &["ZSCORE", "z", "m"]).as_ref(), b"$3\r\n1.5\r\n");
    assert_eq!(db.reply(&c, &["ZSCORE", "z", "nope"]).as_ref(), b"$-1\r\n");
    assert_eq!(db.reply(&c, &["ZCARD", "z"]).as_ref(), b":1\r\n");
    // re-adding the same member counts zero new
    assert_eq!(db.reply(&c, &["ZADD", "z", "2.0", "m"]).as_ref(), b":0\r\n");
    assert_eq!(
        db.reply(&c, &["ZADD", "z", "nan", "m"]).as_ref(),
        b"-ERR value is not a valid float\r\n"
    );
    assert_eq!(db.reply(&c, &["ZREM", "z", "m", "ghost"]).as_ref(), b":1\r\n");
    assert_eq!(db.reply(&c, &["EXISTS", "z"]).as_ref(), b":0\r\n");
}

#[test]
fn stream_id_error_taxonomy() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["XADD", "s", "5-5", "f", "v"]);
    assert_eq!(
        db.reply(&c, &["XADD", "s", "5-5", "f", "v"]).as_ref(),
        b"-ERR The ID specified in XADD already exists in the target stream\r\n"
    );
    assert_eq!(
        db.reply(&c, &["XADD", "s", "4-9", "f", "v"]).as_ref(),
        b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n"
    );
    assert_eq!(
        db.reply(&c, &["XADD", "t", "0-0", "f", "v"]).as_ref(),
        b"-ERR The ID specified in XADD must be greater than 0-0\r\n"
    );
    assert_eq!(
        db.reply(&c, &["XADD", "s", "bogus", "f", "v"]).as_ref(),
        b"-ERR Invalid stream ID specified as stream command argument\r\n"
    );
    assert_eq!(db.reply(&c, &["XLEN", "s"]).as_ref(), b":1\r\n");
    // partial ID continues the current timestamp
    assert_eq!(
        db.reply(&c, &["XADD", "s", "5-*", "f", "v"]).as_ref(),
        b"$3\r\n5-6\r\n"
    );
}

#[test]
fn xrange_count_cap() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["XADD", "s", "1-1", "f", "a"]);
    db.reply(&c, &["XADD", "s", "2-1", "f", "b"]);
    db.reply(&c, &["XADD", "s", "3-1", "f", "c"]);
    let capped = db.reply(&c, &["XRANGE", "s", "-", "+", "COUNT", "2"]);
    assert!(capped.starts_with(b"*2\r\n"));
    // inclusive bounds
    let bounded = db.reply(&c, &["XRANGE", "s", "2", "3"]);
    let text = String::from_utf8_lossy(&bounded).to_string();
    assert!(text.starts_with("*2\r\n"));
    assert!(text.contains("2-1") && text.contains("3-1"));
}

#[test]
fn multi_exec_discard_flow() {
    let mut db = TestDb::new();
    let c = db.client();
    // empty transaction
    db.reply(&c, &["MULTI"]);
    assert_eq!(db.reply(&c, &["EXEC"]).as_ref(), b"*0\r\n");
    // queued commands run in insertion order
    db.reply(&c, &["MULTI"]);
    assert_eq!(db.reply(&c, &["SET", "a", "1"]).as_ref(), b"+QUEUED\r\n");
    assert_eq!(db.reply(&c, &["INCR", "a"]).as_ref(), b"+QUEUED\r\n");
    assert_eq!(db.reply(&c, &["EXEC"]).as_ref(), b"*2\r\n+OK\r\n:2\r\n");
    // DISCARD drops the queue
    db.reply(&c, &["MULTI"]);
    db.reply(&c, &["SET", "a", "99"]);
    assert_eq!(db.reply(&c, &["DISCARD"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c, &["GET", "a"]).as_ref(), b"$1\r\n2\r\n");
    // control errors
    assert_eq!(db.reply(&c, &["EXEC"]).as_ref(), b"-ERR EXEC without MULTI\r\n");
    assert_eq!(
        db.reply(&c, &["DISCARD"]).as_ref(),
        b"-ERR DISCARD without MULTI\r\n"
    );
}

#[test]
fn queue_time_errors_abort_exec() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["MULTI"]);
    db.reply(&c, &["SET", "a", "1"]);
    assert_eq!(
        db.reply(&c, &["NOSUCHCMD"]).as_ref(),
        b"-ERR unknown command 'NOSUCHCMD'\r\n"
    );
    assert_eq!(
        db.reply(&c, &["EXEC"]).as_ref(),
        b"-EXECABORT Transaction discarded because of previous errors.\r\n"
    );
    // the queued SET never ran
    assert_eq!(db.reply(&c, &["GET", "a"]).as_ref(), b"$-1\r\n");
}

#[test]
fn nested_multi_and_watch_in_multi() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["MULTI"]);
    assert_eq!(
        db.reply(&c, &["MULTI"]).as_ref(),
        b"-ERR MULTI calls can not be nested\r\n"
    );
    assert_eq!(
        db.reply(&c, &["WATCH", "k"]).as_ref(),
        b"-ERR WATCH inside MULTI is not allowed\r\n"
    );
    assert_eq!(
        db.reply(&c, &["WAIT", "1", "100"]).as_ref(),
        b"-ERR WAIT inside MULTI is not allowed\r\n"
    );
    // the WAIT poisoned the queue
    assert_eq!(
        db.reply(&c, &["EXEC"]).as_ref(),
        b"-EXECABORT Transaction discarded because of previous errors.\r\n"
    );
}

#[test]
fn blocking_pop_degrades_inside_exec() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["MULTI"]);
    db.reply(&c, &["BLPOP", "empty", "5"]);
    assert_eq!(db.reply(&c, &["EXEC"]).as_ref(), b"*1\r\n*-1\r\n");
    assert!(!db.engine.blocking.is_blocked(c.id));
}

#[test]
fn subscribed_mode_restricts_commands() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["SUBSCRIBE", "chan"]);
    assert_eq!(
        db.reply(&c, &["GET", "k"]).as_ref(),
        b"-ERR only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT allowed in this context\r\n"
    );
    assert_eq!(db.reply(&c, &["PING"]).as_ref(), b"+PONG\r\n");
    // unsubscribing everything lifts the restriction
    let bye = db.reply(&c, &["UNSUBSCRIBE"]);
    assert!(bye.starts_with(b"*3\r\n$11\r\nunsubscribe\r\n"));
    assert_eq!(db.reply(&c, &["GET", "k"]).as_ref(), b"$-1\r\n");
}

#[test]
fn auth_guard() {
    let cfg = ConfigurationSet {
        requirepass: Some("sekrit".to_owned()),
        ..Default::default()
    };
    let mut db = TestDb::with_cfg(cfg);
    let c = db.client();
    assert_eq!(
        db.reply(&c, &["GET", "k"]).as_ref(),
        b"-NOAUTH Authentication required.\r\n"
    );
    assert_eq!(
        db.reply(&c, &["AUTH", "wrong"]).as_ref(),
        b"-ERR invalid password\r\n"
    );
    assert_eq!(db.reply(&c, &["AUTH", "sekrit"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c, &["GET", "k"]).as_ref(), b"$-1\r\n");
}

#[test]
fn auth_disabled_is_an_error() {
    let mut db = TestDb::new();
    let c = db.client();
    assert_eq!(
        db.reply(&c, &["AUTH", "anything"]).as_ref(),
        b"-ERR Client sent AUTH, but no password is set\r\n"
    );
}

#[test]
fn config_get_and_set() {
    let mut db = TestDb::new();
    let c = db.client();
    let port = db.reply(&c, &["CONFIG", "GET", "port"]);
    assert_eq!(port.as_ref(), b"*2\r\n$4\r\nport\r\n$4\r\n6379\r\n");
    // glob across parameter names
    let all = db.reply(&c, &["CONFIG", "GET", "*"]);
    assert!(all.starts_with(b"*10\r\n"));
    assert_eq!(
        db.reply(&c, &["CONFIG", "SET", "requirepass", "s3"]).as_ref(),
        b"+OK\r\n"
    );
    assert_eq!(db.engine.cfg.requirepass.as_deref(), Some("s3"));
    assert_eq!(
        db.reply(&c, &["CONFIG", "SET", "port", "9999"]).as_ref(),
        b"-ERR Unknown or unsupported CONFIG parameter\r\n"
    );
}

#[test]
fn info_reports_role() {
    let mut db = TestDb::new();
    let c = db.client();
    let info = db.reply(&c, &["INFO", "replication"]);
    let text = String::from_utf8_lossy(&info).to_string();
    assert!(text.contains("role:master"));
    assert!(text.contains("connected_slaves:0"));
}

#[test]
fn flushall_clears_and_accepts_modifiers() {
    let mut db = TestDb::new();
    let c = db.client();
    db.reply(&c, &["SET", "a", "1"]);
    db.reply(&c, &["RPUSH", "l", "x"]);
    assert_eq!(db.reply(&c, &["FLUSHALL"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c, &["DBSIZE"]).as_ref(), b":0\r\n");
    assert_eq!(db.reply(&c, &["FLUSHALL", "ASYNC"]).as_ref(), b"+OK\r\n");
    assert_eq!(
        db.reply(&c, &["FLUSHALL", "NOW"]).as_ref(),
        b"-ERR syntax error\r\n"
    );
}

#[test]
fn quit_closes_after_ok() {
    let mut db = TestDb::new();
    let c = db.client();
    match db.run(&c, &["QUIT"]) {
        crate::queryengine::Outcome::Quit(frame) => assert_eq!(frame.as_ref(), b"+OK\r\n"),
        _ => panic!("QUIT must close the connection"),
    }
}
