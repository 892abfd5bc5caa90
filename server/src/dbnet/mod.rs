/*
 * Created on Sun Jul 02 2023
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

//! # Database networking
//!
//! The listener accepts sockets and spawns one [`ConnectionHandler`] task
//! per connection. The handler owns its socket exclusively: ordinary replies
//! are written inline, deferred replies (blocking commands, WAIT) arrive
//! over a oneshot, and asynchronous pushes (pub/sub messages, the
//! replication stream once a connection turns replica) drain from the
//! per-connection push channel. One writer per socket means frames never
//! interleave

pub mod listener;
mod tcp;

pub use self::listener::{BaseListener, Listener};

use {
    self::tcp::Connection,
    crate::{
        engine::EngineHandle,
        protocol::{responses::groups, ParseError, Query},
        queryengine::Outcome,
        IoResult,
    },
    bytes::Bytes,
    std::{
        io::ErrorKind,
        sync::{atomic::AtomicU8, Arc},
        time::Duration,
    },
    tokio::{
        sync::{broadcast, mpsc, oneshot, Semaphore},
        time,
    },
};

pub const MAXIMUM_CONNECTION_LIMIT: usize = 50000;

/// A backoff implementation that is meant to be used in connection loops
pub struct NetBackoff {
    c: AtomicU8,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    pub const fn new() -> Self {
        Self {
            c: AtomicU8::new(1),
        }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        let c = self.c.load(std::sync::atomic::Ordering::Relaxed);
        time::sleep(Duration::from_secs(c as _)).await;
        self.c.store(c << 1, std::sync::atomic::Ordering::Relaxed);
    }
    /// Should we give up on the stream?
    pub fn should_disconnect(&self) -> bool {
        self.c.load(std::sync::atomic::Ordering::Relaxed) > Self::MAX_BACKOFF
    }
}

/// Check for a shutdown broadcast
pub struct Terminator {
    terminated: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Self {
            terminated: false,
            signal,
        }
    }
    pub fn is_termination_signal(&self) -> bool {
        self.terminated
    }
    /// Wait for the signal (a closed channel counts as one)
    pub async fn receive_signal(&mut self) {
        let _ = self.signal.recv().await;
        self.terminated = true;
    }
}

/// What woke the handler loop up
enum Wake {
    /// An asynchronous push frame (or a closed push channel)
    Push(Option<Bytes>),
    /// The socket became readable; true = EOF
    Net(IoResult<bool>),
    Term,
}

/// A per-connection handler task
pub struct ConnectionHandler {
    db: EngineHandle,
    con: Connection,
    conn_id: u64,
    push_rx: mpsc::UnboundedReceiver<Bytes>,
    climit: Arc<Semaphore>,
    terminator: Terminator,
    _term_sig_tx: mpsc::Sender<()>,
}

impl ConnectionHandler {
    pub fn new(
        db: EngineHandle,
        con: Connection,
        conn_id: u64,
        push_rx: mpsc::UnboundedReceiver<Bytes>,
        climit: Arc<Semaphore>,
        terminator: Terminator,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            db,
            con,
            conn_id,
            push_rx,
            climit,
            terminator,
            _term_sig_tx,
        }
    }
    /// Run the connection to completion and then cascade the teardown
    /// through the engine
    pub async fn run_and_cleanup(mut self) {
        log::debug!("ConnectionHandler initialized for conn {}", self.conn_id);
        match self.run().await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
            Err(e) => log::error!("Connection {} error: {e}", self.conn_id),
        }
        self.db.lock().disconnect(self.conn_id);
    }
    async fn run(&mut self) -> IoResult<()> {
        loop {
            // drain every complete frame already buffered
            loop {
                match self.con.try_query() {
                    Ok((query, advance)) => {
                        self.con.advance(advance);
                        if !self.execute(query).await? {
                            return Ok(());
                        }
                    }
                    Err(ParseError::Empty) | Err(ParseError::NotEnough) => break,
                    Err(_) => {
                        // the framing is broken beyond recovery
                        let _ = self.con.write_frame(groups::PROTOCOL_ERR).await;
                        return Ok(());
                    }
                }
            }
            let wake = tokio::select! {
                _ = self.terminator.receive_signal() => Wake::Term,
                push = self.push_rx.recv() => Wake::Push(push),
                ret = self.con.read_more() => Wake::Net(ret),
            };
            match wake {
                Wake::Term => return Ok(()),
                Wake::Push(Some(frame)) => self.con.write_frame(&frame).await?,
                // a closed push channel means the engine no longer knows us
                Wake::Push(None) => return Ok(()),
                Wake::Net(Ok(false)) => {}
                Wake::Net(Ok(true)) => {
                    return if self.con.buffer_is_empty() {
                        Ok(())
                    } else {
                        Err(ErrorKind::ConnectionReset.into())
                    };
                }
                Wake::Net(Err(e)) => return Err(e),
            }
        }
    }
    /// Execute one query. Returns false when the connection should close
    async fn execute(&mut self, query: Query) -> IoResult<bool> {
        let outcome = self.db.lock().execute(self.conn_id, query);
        match outcome {
            Outcome::Reply(frame) => {
                self.con.write_frame(&frame).await?;
                Ok(true)
            }
            Outcome::None => Ok(true),
            Outcome::Quit(frame) => {
                self.con.write_frame(&frame).await?;
                Ok(false)
            }
            Outcome::Deferred(rx) => self.await_deferred(rx).await,
        }
    }
    /// A blocking command registered a waiter; hold off parsing further
    /// commands until its single reply lands (bytes that arrive meanwhile
    /// stay parked in the read buffer)
    async fn await_deferred(&mut self, mut rx: oneshot::Receiver<Bytes>) -> IoResult<bool> {
        loop {
            let wake = tokio::select! {
                reply = &mut rx => Wake::Push(reply.ok()),
                _ = self.terminator.receive_signal() => Wake::Term,
                ret = self.con.read_more() => Wake::Net(ret),
            };
            match wake {
                Wake::Push(Some(frame)) => {
                    self.con.write_frame(&frame).await?;
                    return Ok(true);
                }
                // the engine dropped our waiter (shutdown or teardown)
                Wake::Push(None) | Wake::Term => return Ok(false),
                Wake::Net(Ok(false)) => {}
                // the peer went away while blocked
                Wake::Net(Ok(true)) => return Ok(false),
                Wake::Net(Err(e)) => return Err(e),
            }
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // Make sure that the permit is returned to the semaphore
        // in the case that there is a panic inside
        self.climit.add_permits(1);
    }
}
