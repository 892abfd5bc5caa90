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

use {
    super::{tcp::Connection, ConnectionHandler, NetBackoff, Terminator},
    crate::{
        engine::EngineHandle,
        util::error::{Error, StratResult},
        IoResult,
    },
    std::{net::IpAddr, sync::Arc},
    tokio::{
        net::{TcpListener, TcpStream},
        sync::{broadcast, mpsc, Semaphore},
    },
};

/// The base TCP listener
pub struct BaseListener {
    /// the shared engine handle
    pub db: EngineHandle,
    /// The incoming connection listener (binding)
    pub listener: TcpListener,
    /// The maximum number of connections
    pub climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    pub signal: broadcast::Sender<()>,
    // When all `Sender`s are dropped - the `Receiver` gets a `None` value
    // We send a clone of `terminate_tx` to each handler
    pub terminate_tx: mpsc::Sender<()>,
    pub terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(
        db: &EngineHandle,
        host: IpAddr,
        port: u16,
        semaphore: Arc<Semaphore>,
        signal: broadcast::Sender<()>,
    ) -> StratResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {port}")))?;
        Ok(Self {
            db: db.clone(),
            listener,
            climit: semaphore,
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// Wait until every handler has dropped its terminate_tx clone
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

/// The accept loop
pub struct Listener {
    pub base: BaseListener,
}

impl Listener {
    pub fn new(base: BaseListener) -> Self {
        Self { base }
    }
    /// Accept a connection, backing off on transient failures
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.base.listener.accept().await {
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        // that's enough of your crappy connection
                        return Err(e);
                    }
                }
            }
            backoff.spin().await;
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            // wait for a connection slot before accepting
            // UNWRAP OK: the semaphore is never closed
            self.base.climit.acquire().await.unwrap().forget();
            let stream = self.accept().await?;
            let (push_tx, push_rx) = mpsc::unbounded_channel();
            let conn_id = self.base.db.lock().register_client(push_tx);
            let handler = ConnectionHandler::new(
                self.base.db.clone(),
                Connection::new(stream),
                conn_id,
                push_rx,
                self.base.climit.clone(),
                Terminator::new(self.base.signal.subscribe()),
                self.base.terminate_tx.clone(),
            );
            tokio::spawn(handler.run_and_cleanup());
        }
    }
}
