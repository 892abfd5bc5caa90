/*
 * Created on Sun Jun 25 2023
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

//! # The engine
//!
//! [`Engine`] is the single mutation point of the server: the typed
//! keyspace, the client registry, the blocking coordinator, the transaction
//! watch index, the pub/sub bus and the replication state all live here and
//! are only ever touched under the one [`EngineHandle`] lock. That lock is
//! what serializes every mutation, wake-up, watch invalidation and
//! propagation, so the ordering guarantees need no further synchronization.
//!
//! Keyspace events fan out as plain method calls on the engine's own fields
//! (blocking wakes, watch invalidation, statistics); there is no event bus

use {
    crate::{
        blocking::{BlockingCoordinator, WaitContext},
        config::ConfigurationSet,
        corestore::{Corestore, Data},
        protocol::{self, Query},
        pubsub::{self, PubSub},
        queryengine::{self, Ctx, Outcome},
        registry::Statistics,
        replication::{leader::ReplLeader, MasterInfo},
        resp::{self, writer, ResponseCache},
        txn::{Transaction, WatchIndex},
    },
    bytes::{Bytes, BytesMut},
    parking_lot::{Mutex, MutexGuard},
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
        time::Instant,
    },
    tokio::sync::mpsc,
};

/// The reserved connection ID for the replication intake (and bootstrap
/// replay). It is registered at startup and never carries client state
pub const SYSTEM_CONN: u64 = 0;

/// Upper bound on keys evicted per sweeper tick
const SWEEP_BATCH: usize = 128;

/// # The persistence hooks
///
/// Persistence codecs are external collaborators: the engine only promises
/// to hand every propagated write frame to [`Durability::record`] and to
/// replay whatever [`Durability::bootstrap`] supplies at startup (a RESP
/// command stream, same format as the replication snapshot)
pub trait Durability: Send {
    fn record(&mut self, _frame: &[u8]) {}
    fn bootstrap(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// The shipped no-op implementation
pub struct NoDurability;
impl Durability for NoDurability {}

/// Per-connection state. Cross-component indexes only ever hold the
/// connection ID; this record is dropped exactly when the connection dies
pub struct ClientState {
    pub authed: bool,
    /// an open MULTI, if any
    pub txn: Option<Transaction>,
    /// keys WATCHed by this connection
    pub watched: HashSet<Data>,
    /// a watched key was written between WATCH and EXEC
    pub dirty_cas: bool,
    pub subs: HashSet<Data>,
    pub psubs: HashSet<Data>,
    /// the port announced via REPLCONF listening-port
    pub replica_port: Option<u16>,
}

impl ClientState {
    fn new(authed: bool) -> Self {
        Self {
            authed,
            txn: None,
            watched: HashSet::new(),
            dirty_cas: false,
            subs: HashSet::new(),
            psubs: HashSet::new(),
            replica_port: None,
        }
    }
}

struct ClientHandle {
    state: ClientState,
    /// asynchronous deliveries (pub/sub messages, propagated frames)
    push: mpsc::UnboundedSender<Bytes>,
}

pub struct Engine {
    pub store: Corestore,
    pub blocking: BlockingCoordinator,
    pub watch: WatchIndex,
    pub pubsub: PubSub,
    pub repl: ReplLeader,
    /// set if and only if this instance follows a leader
    pub master: Option<MasterInfo>,
    /// runtime view of the configuration (CONFIG GET/SET operate on this)
    pub cfg: ConfigurationSet,
    clients: HashMap<u64, ClientHandle>,
    next_conn: u64,
    cache: ResponseCache,
    stats: Arc<Statistics>,
    durability: Box<dyn Durability>,
    started_at: Instant,
    /// keeps the system pseudo-client's push channel alive
    _system_rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Engine {
    pub fn new(
        cfg: ConfigurationSet,
        stats: Arc<Statistics>,
        durability: Box<dyn Durability>,
    ) -> Self {
        let (system_tx, system_rx) = mpsc::unbounded_channel();
        let master = cfg
            .replicaof
            .as_ref()
            .map(|(host, port)| MasterInfo::new(host.clone(), *port));
        let mut clients = HashMap::new();
        clients.insert(
            SYSTEM_CONN,
            ClientHandle {
                state: ClientState::new(true),
                push: system_tx,
            },
        );
        Self {
            store: Corestore::new(),
            blocking: BlockingCoordinator::new(),
            watch: WatchIndex::new(),
            pubsub: PubSub::new(),
            repl: ReplLeader::new(),
            master,
            cfg,
            clients,
            next_conn: SYSTEM_CONN,
            cache: ResponseCache::new(),
            stats,
            durability,
            started_at: Instant::now(),
            _system_rx: system_rx,
        }
    }
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
    pub fn uptime_secs(&self, now: Instant) -> u64 {
        now.duration_since(self.started_at).as_secs()
    }
    // client registry

    pub fn register_client(&mut self, push: mpsc::UnboundedSender<Bytes>) -> u64 {
        self.next_conn += 1;
        let id = self.next_conn;
        let authed = self.cfg.requirepass.is_none();
        self.clients.insert(
            id,
            ClientHandle {
                state: ClientState::new(authed),
                push,
            },
        );
        self.stats.accept_connection();
        id
    }
    pub fn client(&self, conn: u64) -> Option<&ClientState> {
        self.clients.get(&conn).map(|handle| &handle.state)
    }
    pub fn client_mut(&mut self, conn: u64) -> Option<&mut ClientState> {
        self.clients.get_mut(&conn).map(|handle| &mut handle.state)
    }
    pub fn auth_required(&self, conn: u64) -> bool {
        self.cfg.requirepass.is_some()
            && !self.client(conn).map(|c| c.authed).unwrap_or(true)
    }
    pub fn is_subscribed(&self, conn: u64) -> bool {
        self.client(conn)
            .map(|c| !c.subs.is_empty() || !c.psubs.is_empty())
            .unwrap_or(false)
    }
    pub fn subscription_count(&self, conn: u64) -> i64 {
        self.client(conn)
            .map(|c| (c.subs.len() + c.psubs.len()) as i64)
            .unwrap_or(0)
    }
    /// Connection teardown cascades into every component that might hold
    /// the ID
    pub fn disconnect(&mut self, conn: u64) {
        let handle = match self.clients.remove(&conn) {
            Some(handle) => handle,
            None => return,
        };
        self.blocking.unregister(conn);
        self.watch.unwatch(&handle.state.watched, conn);
        self.pubsub
            .drop_conn(&handle.state.subs, &handle.state.psubs, conn);
        self.repl.drop_pending_for(conn);
        if self.repl.remove(conn) {
            self.stats.replica_left();
            log::warn!("Replica on conn {conn} detached");
        }
        self.stats.drop_connection();
    }

    // dispatch entries

    /// Execute a client command
    pub fn execute(&mut self, conn: u64, query: Query) -> Outcome {
        queryengine::execute(self, conn, query, false)
    }
    /// Execute a command received over the replication link (or replayed
    /// from the bootstrap hook): no reply, no re-propagation of the frame
    pub fn apply_replicated(&mut self, query: Query) {
        let _ = queryengine::execute(self, SYSTEM_CONN, query, true);
    }
    /// Replay the bootstrap-load hook's command stream, if any
    pub fn bootstrap_load(&mut self) {
        let payload = match self.durability.bootstrap() {
            Some(payload) => payload,
            None => return,
        };
        let mut cursor = 0;
        let mut replayed = 0usize;
        while cursor < payload.len() {
            match protocol::Parser::parse(&payload[cursor..]) {
                Ok((query, advance)) => {
                    self.apply_replicated(query);
                    cursor += advance;
                    replayed += 1;
                }
                Err(e) => {
                    log::error!("Bootstrap stream broken after {replayed} commands: {e:?}");
                    return;
                }
            }
        }
        log::info!("Bootstrap replayed {replayed} commands");
    }

    // write-path events

    /// Bookkeeping after a successful mutation: lazy-expiry fallout first,
    /// then watch invalidation for the touched keys, then propagation of
    /// the (possibly rewritten) frame
    pub fn did_write(&mut self, ctx: &Ctx, keys: &[Data], name: &'static [u8], payload: &[Data]) {
        self.flush_lazy_expiry(ctx.propagated);
        for key in keys {
            self.key_modified(key);
        }
        if !ctx.propagated {
            let mut args = Vec::with_capacity(payload.len() + 1);
            args.push(Data::from_static(name));
            args.extend(payload.iter().cloned());
            self.propagate(&args);
        }
    }
    fn key_modified(&mut self, key: &[u8]) {
        for conn in self.watch.watchers(key) {
            if let Some(client) = self.client_mut(conn) {
                client.dirty_cas = true;
            }
        }
    }
    /// FLUSHALL: every watcher is invalidated, the clear is propagated
    pub fn store_cleared(&mut self, ctx: &Ctx) {
        for conn in self.watch.all_watchers() {
            if let Some(client) = self.client_mut(conn) {
                client.dirty_cas = true;
            }
        }
        if !ctx.propagated {
            self.propagate(&[Data::from_static(b"FLUSHALL")]);
        }
    }
    /// Keys that lazy expiry removed behave like writes: watchers are
    /// invalidated and followers receive an explicit DEL
    pub fn flush_lazy_expiry(&mut self, propagated: bool) {
        let evicted = self.store.drain_expired();
        if evicted.is_empty() {
            return;
        }
        self.stats.incr_expired(evicted.len() as u64);
        for key in evicted {
            self.key_modified(&key);
            if !propagated {
                self.propagate(&[Data::from_static(b"DEL"), key]);
            }
        }
    }
    /// Fan a frame out to every follower and advance the offset by its
    /// on-wire length. A follower whose channel is gone is evicted; the
    /// others are unaffected
    pub fn propagate(&mut self, args: &[Data]) {
        let frame = protocol::encode_frame(args);
        self.repl.offset += frame.len() as u64;
        self.durability.record(&frame);
        let mut dead = Vec::new();
        for conn in self.repl.follower_conns() {
            if !self.push_to(conn, frame.clone()) {
                dead.push(conn);
            }
        }
        for conn in dead {
            if self.repl.remove(conn) {
                self.stats.replica_left();
                log::warn!("Dropping replica on conn {conn}: send failed");
            }
        }
    }
    fn push_to(&mut self, conn: u64, frame: Bytes) -> bool {
        match self.clients.get(&conn) {
            Some(handle) => handle.push.send(frame).is_ok(),
            None => false,
        }
    }

    // blocking wakes

    /// Serve list waiters on `key` while it has data: earliest eligible
    /// waiter first, one element per waiter
    pub fn wake_list(&mut self, key: &Data, ctx: &Ctx) {
        loop {
            if self.store.list_len(key, ctx.now).unwrap_or(0) == 0 {
                break;
            }
            let candidate = self.blocking.fifo(key).into_iter().find(|&conn| {
                matches!(
                    self.blocking.waiter(conn).map(|w| &w.ctx),
                    Some(WaitContext::ListPop { .. })
                )
            });
            let conn = match candidate {
                Some(conn) => conn,
                None => break,
            };
            // UNWRAP OK: the candidate came out of the index a moment ago
            let waiter = self.blocking.unregister(conn).unwrap();
            let left = match waiter.ctx {
                WaitContext::ListPop { left } => left,
                _ => continue,
            };
            let value = match self.store.list_pop(key, left, ctx.now) {
                Ok(Some(value)) => value,
                _ => break,
            };
            let reply = resp::array_of_bulks(&[key.as_ref(), value.as_ref()]);
            match waiter.tx.send(reply) {
                Ok(()) => {
                    // the served pop is a write in its own right
                    self.key_modified(key);
                    if !ctx.propagated {
                        let name: &'static [u8] = if left { b"LPOP" } else { b"RPOP" };
                        self.propagate(&[Data::from_static(name), key.clone()]);
                    }
                }
                Err(_) => {
                    // the waiter died mid-block: give the element back at
                    // the end it came from and try the next waiter
                    let _ = self.store.list_push(key, vec![value], left, ctx.now);
                }
            }
        }
    }
    /// Serve every stream waiter that can now read something. Streams are
    /// not consumed, so all eligible waiters get the fresh entries
    pub fn wake_stream(&mut self, key: &Data, ctx: &Ctx) {
        for conn in self.blocking.fifo(key) {
            let (from, count) = match self.blocking.waiter(conn) {
                Some(waiter) => match &waiter.ctx {
                    WaitContext::StreamRead { from, count } => (from.clone(), *count),
                    _ => continue,
                },
                None => continue,
            };
            let limit = count.map(|c| c as i64).unwrap_or(-1);
            let mut results = Vec::with_capacity(from.len());
            let mut have_data = false;
            for (skey, after) in from.iter() {
                let entries = self
                    .store
                    .stream_get_after(skey, *after, limit, ctx.now)
                    .unwrap_or_default();
                have_data |= !entries.is_empty();
                results.push((skey.clone(), entries));
            }
            if !have_data {
                continue;
            }
            // UNWRAP OK: the waiter was present in the line above
            let waiter = self.blocking.unregister(conn).unwrap();
            let nonempty = results.iter().filter(|(_, e)| !e.is_empty()).count();
            let mut out = BytesMut::new();
            writer::array_header(&mut out, nonempty);
            for (skey, entries) in results.iter().filter(|(_, e)| !e.is_empty()) {
                writer::array_header(&mut out, 2);
                writer::bulk(&mut out, skey);
                crate::actions::streams::write_entries(&mut out, entries);
            }
            let _ = waiter.tx.send(out.freeze());
        }
    }

    // pub/sub delivery

    pub fn publish(&mut self, channel: &[u8], payload: &[u8]) -> usize {
        let receivers = self.pubsub.receivers(channel);
        let mut delivered = 0usize;
        for (conn, pattern) in receivers {
            let frame = match pattern {
                Some(pattern) => pubsub::pmessage_frame(&pattern, channel, payload),
                None => pubsub::message_frame(channel, payload),
            };
            if self.push_to(conn, frame) {
                delivered += 1;
            }
        }
        if delivered > 0 {
            self.stats.incr_published(delivered as u64);
        }
        delivered
    }

    // deadline bookkeeping (driven by the sweeper service)

    pub fn complete_satisfied_waits(&mut self) {
        for (wait, count) in self.repl.take_satisfied() {
            let _ = wait.tx.send(self.cache.integer(count as i64));
        }
    }
    /// One sweeper tick: bounded expiry eviction, blocking deadlines, WAIT
    /// deadlines
    pub fn sweep(&mut self, now: Instant) {
        let evicted = self.store.sweep(now, SWEEP_BATCH);
        if !evicted.is_empty() {
            self.stats.incr_expired(evicted.len() as u64);
            log::debug!("Sweeper evicted {} expired keys", evicted.len());
            for key in evicted {
                self.key_modified(&key);
                self.propagate(&[Data::from_static(b"DEL"), key]);
            }
        }
        for waiter in self.blocking.take_expired(now) {
            let _ = waiter.tx.send(self.cache.nil_array());
        }
        for (wait, count) in self.repl.take_expired(now) {
            let _ = wait.tx.send(self.cache.integer(count as i64));
        }
    }
}

/// The cloneable handle to the shared engine. The mutex is the server's
/// single serialization point; the statistics block sits outside it so
/// observers never contend with the write path
pub struct EngineHandle {
    shared: Arc<Mutex<Engine>>,
    stats: Arc<Statistics>,
}

impl Clone for EngineHandle {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl EngineHandle {
    /// A handle over a fresh engine with the no-op persistence hooks.
    /// Deployments with a real persistence collaborator hand it in through
    /// [`EngineHandle::with_durability`]
    pub fn new(cfg: ConfigurationSet) -> Self {
        Self::with_durability(cfg, Box::new(NoDurability))
    }
    pub fn with_durability(cfg: ConfigurationSet, durability: Box<dyn Durability>) -> Self {
        let stats = Arc::new(Statistics::new());
        let engine = Engine::new(cfg, stats.clone(), durability);
        Self {
            shared: Arc::new(Mutex::new(engine)),
            stats,
        }
    }
    pub fn lock(&self) -> MutexGuard<'_, Engine> {
        self.shared.lock()
    }
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }
}
