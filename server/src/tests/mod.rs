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

//! End-to-end scenarios driven against an in-process engine. The harness
//! registers synthetic connections and runs commands through the same
//! dispatch entry the socket tasks use, so everything except raw TCP I/O is
//! exercised

pub(crate) mod harness {
    use {
        crate::{
            config::ConfigurationSet,
            engine::{Engine, NoDurability},
            protocol::Query,
            queryengine::Outcome,
            registry::Statistics,
        },
        bytes::Bytes,
        std::sync::Arc,
        tokio::sync::{mpsc, oneshot},
    };

    pub struct TestDb {
        pub engine: Engine,
    }

    /// A synthetic connection: the ID plus the push-channel receiver that a
    /// real socket task would drain
    pub struct TestConn {
        pub id: u64,
        pub push: mpsc::UnboundedReceiver<Bytes>,
    }

    pub fn query(parts: &[&str]) -> Query {
        Query::new(
            parts
                .iter()
                .map(|p| Bytes::copy_from_slice(p.as_bytes()))
                .collect(),
        )
    }

    impl TestDb {
        pub fn new() -> Self {
            Self::with_cfg(ConfigurationSet::default())
        }
        pub fn with_cfg(cfg: ConfigurationSet) -> Self {
            Self {
                engine: Engine::new(cfg, Arc::new(Statistics::new()), Box::new(NoDurability)),
            }
        }
        pub fn client(&mut self) -> TestConn {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = self.engine.register_client(tx);
            TestConn { id, push: rx }
        }
        pub fn run(&mut self, conn: &TestConn, parts: &[&str]) -> Outcome {
            self.engine.execute(conn.id, query(parts))
        }
        /// Run a command that must answer inline
        pub fn reply(&mut self, conn: &TestConn, parts: &[&str]) -> Bytes {
            match self.run(conn, parts) {
                Outcome::Reply(frame) => frame,
                _ => panic!("expected an inline reply for {parts:?}"),
            }
        }
        /// Run a command that must defer its reply
        pub fn deferred(&mut self, conn: &TestConn, parts: &[&str]) -> oneshot::Receiver<Bytes> {
            match self.run(conn, parts) {
                Outcome::Deferred(rx) => rx,
                _ => panic!("expected {parts:?} to block"),
            }
        }
    }
}

use {
    self::harness::TestDb,
    std::time::{Duration, Instant},
};

#[test]
fn scenario_basic_set_get() {
    let mut db = TestDb::new();
    let c1 = db.client();
    assert_eq!(db.reply(&c1, &["SET", "foo", "bar"]).as_ref(), b"+OK\r\n");
    assert_eq!(
        db.reply(&c1, &["GET", "foo"]).as_ref(),
        b"$3\r\nbar\r\n"
    );
    assert_eq!(db.reply(&c1, &["GET", "missing"]).as_ref(), b"$-1\r\n");
}

#[test]
fn scenario_blocking_pop_with_wake() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    let mut rx = db.deferred(&c1, &["BLPOP", "q", "30"]);
    // nothing yet
    assert!(rx.try_recv().is_err());
    assert!(db.engine.blocking.is_blocked(c1.id));
    // the push wakes the earliest waiter; its reply is the [key, value] pair
    assert_eq!(db.reply(&c2, &["LPUSH", "q", "hello"]).as_ref(), b":1\r\n");
    assert_eq!(
        rx.try_recv().unwrap().as_ref(),
        b"*2\r\n$1\r\nq\r\n$5\r\nhello\r\n"
    );
    assert!(!db.engine.blocking.is_blocked(c1.id));
    // the served element is gone, and with it the key
    assert_eq!(db.reply(&c2, &["EXISTS", "q"]).as_ref(), b":0\r\n");
}

#[test]
fn scenario_blocking_pop_fifo_order() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    let c3 = db.client();
    let mut rx1 = db.deferred(&c1, &["BLPOP", "q", "0"]);
    let mut rx2 = db.deferred(&c2, &["BLPOP", "q", "0"]);
    db.reply(&c3, &["RPUSH", "q", "one"]);
    // first-come-first-served
    assert!(rx1.try_recv().is_ok());
    assert!(rx2.try_recv().is_err());
    db.reply(&c3, &["RPUSH", "q", "two"]);
    assert_eq!(
        rx2.try_recv().unwrap().as_ref(),
        b"*2\r\n$1\r\nq\r\n$3\r\ntwo\r\n"
    );
}

#[test]
fn scenario_blocking_timeout_null_reply() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let mut rx = db.deferred(&c1, &["BLPOP", "q", "0.05"]);
    // drive the sweeper past the deadline
    db.engine.sweep(Instant::now() + Duration::from_millis(100));
    assert_eq!(rx.try_recv().unwrap().as_ref(), b"*-1\r\n");
    assert!(!db.engine.blocking.is_blocked(c1.id));
}

#[test]
fn scenario_stream_auto_id_ordering() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let first = db.reply(&c1, &["XADD", "s", "*", "a", "1"]);
    let second = db.reply(&c1, &["XADD", "s", "*", "a", "2"]);
    let parse_id = |frame: &[u8]| {
        let text = std::str::from_utf8(frame).unwrap();
        let body = text.split("\r\n").nth(1).unwrap();
        let (ms, seq) = body.split_once('-').unwrap();
        (ms.parse::<u64>().unwrap(), seq.parse::<u64>().unwrap())
    };
    let id1 = parse_id(&first);
    let id2 = parse_id(&second);
    assert!(id2 > id1, "{id2:?} must be allocated after {id1:?}");
    // both entries come back, in insertion order
    let range = db.reply(&c1, &["XRANGE", "s", "-", "+"]);
    let text = String::from_utf8_lossy(&range).to_string();
    assert!(text.starts_with("*2\r\n"));
    let pos1 = text.find(&format!("{}-{}", id1.0, id1.1)).unwrap();
    let pos2 = text.find(&format!("{}-{}", id2.0, id2.1)).unwrap();
    assert!(pos1 < pos2);
}

#[test]
fn scenario_watch_exec_invalidation() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    assert_eq!(db.reply(&c1, &["WATCH", "k"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c1, &["MULTI"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c1, &["SET", "k", "1"]).as_ref(), b"+QUEUED\r\n");
    // the conflicting write lands between WATCH and EXEC
    assert_eq!(db.reply(&c2, &["SET", "k", "9"]).as_ref(), b"+OK\r\n");
    assert_eq!(db.reply(&c1, &["EXEC"]).as_ref(), b"*-1\r\n");
    assert_eq!(db.reply(&c1, &["GET", "k"]).as_ref(), b"$1\r\n9\r\n");
}

#[test]
fn scenario_exec_applies_when_unwatched_keys_move() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    db.reply(&c1, &["WATCH", "k"]);
    db.reply(&c1, &["MULTI"]);
    db.reply(&c1, &["SET", "k", "1"]);
    // a write to an unrelated key must not invalidate
    db.reply(&c2, &["SET", "other", "9"]);
    let exec = db.reply(&c1, &["EXEC"]);
    assert_eq!(exec.as_ref(), b"*1\r\n+OK\r\n");
    assert_eq!(db.reply(&c1, &["GET", "k"]).as_ref(), b"$1\r\n1\r\n");
}

#[test]
fn scenario_wait_zero_replicas() {
    let mut db = TestDb::new();
    let c1 = db.client();
    db.reply(&c1, &["SET", "k", "v"]);
    assert_eq!(db.reply(&c1, &["WAIT", "0", "100"]).as_ref(), b":0\r\n");
}

#[test]
fn scenario_wait_times_out_with_current_count() {
    let mut db = TestDb::new();
    let c1 = db.client();
    db.reply(&c1, &["SET", "k", "v"]);
    let mut rx = db.deferred(&c1, &["WAIT", "1", "50"]);
    assert!(rx.try_recv().is_err());
    db.engine.sweep(Instant::now() + Duration::from_millis(100));
    assert_eq!(rx.try_recv().unwrap().as_ref(), b":0\r\n");
}

#[test]
fn scenario_sorted_set_rank() {
    let mut db = TestDb::new();
    let c1 = db.client();
    assert_eq!(
        db.reply(
            &c1,
            &["ZADD", "lb", "100", "alice", "200", "bob", "150", "charlie"]
        )
        .as_ref(),
        b":3\r\n"
    );
    let range = db.reply(&c1, &["ZRANGE", "lb", "0", "-1", "WITHSCORES"]);
    assert_eq!(
        range.as_ref(),
        b"*6\r\n$5\r\nalice\r\n$3\r\n100\r\n$7\r\ncharlie\r\n$3\r\n150\r\n$3\r\nbob\r\n$3\r\n200\r\n"
            .as_slice()
    );
    assert_eq!(db.reply(&c1, &["ZRANK", "lb", "charlie"]).as_ref(), b":1\r\n");
}

#[test]
fn scenario_replica_handshake_and_propagation() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let mut replica = db.client();
    assert_eq!(
        db.reply(&replica, &["REPLCONF", "listening-port", "6380"])
            .as_ref(),
        b"+OK\r\n"
    );
    let resync = db.reply(&replica, &["PSYNC", "?", "-1"]);
    assert!(resync.starts_with(b"+FULLRESYNC "));
    assert_eq!(db.engine.repl.follower_count(), 1);
    // every subsequent write fans out verbatim
    db.reply(&c1, &["SET", "k", "v"]);
    let frame = replica.push.try_recv().unwrap();
    assert_eq!(
        frame.as_ref(),
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n"
    );
    // the offset grew by exactly the frame length
    assert_eq!(db.engine.repl.offset, frame.len() as u64);
    // the replica acks and WAIT sees it
    let off = db.engine.repl.offset.to_string();
    match db.run(&replica, &["REPLCONF", "ACK", &off]) {
        crate::queryengine::Outcome::None => {}
        _ => panic!("ACK must not produce a reply"),
    }
    assert_eq!(db.reply(&c1, &["WAIT", "1", "100"]).as_ref(), b":1\r\n");
}

#[test]
fn scenario_propagated_write_invalidates_watchers() {
    let mut db = TestDb::new();
    let c1 = db.client();
    db.reply(&c1, &["WATCH", "k"]);
    db.reply(&c1, &["MULTI"]);
    db.reply(&c1, &["SET", "k", "1"]);
    // a write arriving over the replication link counts too
    db.engine.apply_replicated(harness::query(&["SET", "k", "2"]));
    assert_eq!(db.reply(&c1, &["EXEC"]).as_ref(), b"*-1\r\n");
    assert_eq!(db.reply(&c1, &["GET", "k"]).as_ref(), b"$1\r\n2\r\n");
}

#[test]
fn scenario_xread_blocks_and_wakes_past_dollar() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    // pre-existing entry that `$` must skip
    db.reply(&c2, &["XADD", "s", "5-1", "old", "1"]);
    let mut rx = db.deferred(&c1, &["XREAD", "BLOCK", "0", "STREAMS", "s", "$"]);
    assert!(rx.try_recv().is_err());
    db.reply(&c2, &["XADD", "s", "6-1", "fresh", "2"]);
    let frame = rx.try_recv().unwrap();
    let text = String::from_utf8_lossy(&frame).to_string();
    assert!(text.contains("6-1"), "woken reply must carry the new entry");
    assert!(!text.contains("5-1"), "entries before `$` must not appear");
}

#[test]
fn scenario_pubsub_delivery_and_count() {
    let mut db = TestDb::new();
    let publisher = db.client();
    let mut exact = db.client();
    let mut wild = db.client();
    let confirm = db.reply(&exact, &["SUBSCRIBE", "news.tech"]);
    assert_eq!(
        confirm.as_ref(),
        b"*3\r\n$9\r\nsubscribe\r\n$9\r\nnews.tech\r\n:1\r\n"
    );
    db.reply(&wild, &["PSUBSCRIBE", "news.*"]);
    assert_eq!(
        db.reply(&publisher, &["PUBLISH", "news.tech", "hi"]).as_ref(),
        b":2\r\n"
    );
    assert_eq!(
        exact.push.try_recv().unwrap().as_ref(),
        b"*3\r\n$7\r\nmessage\r\n$9\r\nnews.tech\r\n$2\r\nhi\r\n"
    );
    assert_eq!(
        wild.push.try_recv().unwrap().as_ref(),
        b"*4\r\n$8\r\npmessage\r\n$6\r\nnews.*\r\n$9\r\nnews.tech\r\n$2\r\nhi\r\n"
    );
    // nobody listens here
    assert_eq!(
        db.reply(&publisher, &["PUBLISH", "weather", "x"]).as_ref(),
        b":0\r\n"
    );
}

#[test]
fn scenario_disconnect_cascades() {
    let mut db = TestDb::new();
    let c1 = db.client();
    let c2 = db.client();
    let _rx = db.deferred(&c1, &["BLPOP", "q", "0"]);
    db.reply(&c2, &["WATCH", "k"]);
    db.engine.disconnect(c1.id);
    db.engine.disconnect(c2.id);
    assert!(!db.engine.blocking.is_blocked(c1.id));
    assert!(db.engine.watch.watchers(b"k").is_empty());
}
