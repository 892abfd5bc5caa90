/*
 * Created on Sun Jul 09 2023
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

//! # The replication follower
//!
//! The outbound link to the leader. The handshake walks
//! `PING → REPLCONF listening-port → REPLCONF capa → PSYNC ? -1`, absorbs
//! the `+FULLRESYNC` header and the bulk snapshot, applies the snapshot's
//! command stream, and then consumes propagated frames for as long as the
//! link holds. Every applied frame advances the local offset; a
//! `REPLCONF GETACK *` is answered with `REPLCONF ACK <offset>` and nothing
//! else is ever written in the ACTIVE state.
//!
//! Any malformed response or premature EOF aborts the link; the service
//! then backs off and redoes the handshake from scratch (full resync only)

use {
    crate::{
        dbnet::{NetBackoff, Terminator},
        engine::EngineHandle,
        protocol::{ParseError, Parser, Query},
        util::error::{Error, StratResult},
    },
    bytes::{Buf, Bytes, BytesMut},
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::mpsc,
    },
};

/// The buffered leader link
struct Link {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Link {
    async fn connect(host: &str, port: u16) -> StratResult<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("connecting to leader {host}:{port}")))?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(libstrat::BUF_CAP),
        })
    }
    async fn fill(&mut self) -> StratResult<()> {
        let read = self
            .stream
            .read_buf(&mut self.buffer)
            .await
            .map_err(Error::IoError)?;
        if read == 0 {
            Err(Error::replication("leader closed the link"))
        } else {
            Ok(())
        }
    }
    async fn send_command(&mut self, args: &[&[u8]]) -> StratResult<()> {
        let args: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a)).collect();
        let frame = crate::protocol::encode_frame(&args);
        self.stream
            .write_all(&frame)
            .await
            .map_err(Error::IoError)?;
        self.stream.flush().await.map_err(Error::IoError)
    }
    /// Read one CRLF-terminated line (handshake replies)
    async fn read_line(&mut self) -> StratResult<Vec<u8>> {
        loop {
            if let Some(at) = self
                .buffer
                .windows(2)
                .position(|pair| pair == b"\r\n")
            {
                let line = self.buffer.split_to(at).to_vec();
                self.buffer.advance(2);
                return Ok(line);
            }
            self.fill().await?;
        }
    }
    /// Expect a `+<what>` simple-string reply
    async fn expect_simple(&mut self, what: &str) -> StratResult<()> {
        let line = self.read_line().await?;
        if line.first() == Some(&b'+') && line[1..].eq_ignore_ascii_case(what.as_bytes()) {
            Ok(())
        } else {
            Err(Error::replication(format!(
                "expected +{what}, leader said {:?}",
                String::from_utf8_lossy(&line)
            )))
        }
    }
    /// Read a `$<len>\r\n<len bytes>` payload (note: no trailing CRLF)
    async fn read_bulk_payload(&mut self) -> StratResult<Bytes> {
        let line = self.read_line().await?;
        if line.first() != Some(&b'$') {
            return Err(Error::replication("bulk payload header missing"));
        }
        let len: usize = std::str::from_utf8(&line[1..])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| Error::replication("bad bulk payload length"))?;
        while self.buffer.len() < len {
            self.fill().await?;
        }
        Ok(self.buffer.split_to(len).freeze())
    }
    /// Read one propagated command frame and its on-wire byte length
    async fn read_frame(&mut self) -> StratResult<(Query, usize)> {
        loop {
            match Parser::parse(&self.buffer) {
                Ok((query, advance)) => {
                    self.buffer.advance(advance);
                    return Ok((query, advance));
                }
                Err(ParseError::Empty) | Err(ParseError::NotEnough) => self.fill().await?,
                Err(e) => {
                    return Err(Error::replication(format!(
                        "broken frame in the command stream: {e:?}"
                    )))
                }
            }
        }
    }
}

/// One full handshake-and-consume cycle. Only ever returns with an error
/// (link loss); clean shutdown is handled by the caller's terminator
async fn replicate_once(
    db: &EngineHandle,
    host: &str,
    port: u16,
    listen_port: u16,
) -> StratResult<()> {
    let mut link = Link::connect(host, port).await?;
    // INITIAL → PING_SENT
    link.send_command(&[b"PING" as &[u8]]).await?;
    link.expect_simple("PONG").await?;
    // PING_SENT → PORT_SENT
    link.send_command(&[b"REPLCONF" as &[u8], b"listening-port", listen_port.to_string().as_bytes()])
        .await?;
    link.expect_simple("OK").await?;
    // PORT_SENT → CAPA_SENT
    link.send_command(&[b"REPLCONF" as &[u8], b"capa", b"eof", b"capa", b"psync2"])
        .await?;
    link.expect_simple("OK").await?;
    // CAPA_SENT → PSYNC_SENT
    link.send_command(&[b"PSYNC" as &[u8], b"?", b"-1"]).await?;
    let header = link.read_line().await?;
    let header_text = String::from_utf8_lossy(&header);
    let mut parts = header_text.trim_start_matches('+').split_whitespace();
    let (master_id, base_offset) = match (parts.next(), parts.next(), parts.next()) {
        (Some("FULLRESYNC"), Some(id), Some(offset)) => {
            let offset: u64 = offset
                .parse()
                .map_err(|_| Error::replication("bad FULLRESYNC offset"))?;
            (id.to_owned(), offset)
        }
        _ => {
            return Err(Error::replication(format!(
                "unexpected PSYNC response: {header_text:?}"
            )))
        }
    };
    // PSYNC_SENT → RDB_RECEIVING
    let payload = link.read_bulk_payload().await?;
    {
        let mut engine = db.lock();
        let mut cursor = 0;
        while cursor < payload.len() {
            match Parser::parse(&payload[cursor..]) {
                Ok((query, advance)) => {
                    engine.apply_replicated(query);
                    cursor += advance;
                }
                Err(_) => return Err(Error::replication("broken snapshot payload")),
            }
        }
        if let Some(master) = engine.master.as_mut() {
            master.link_up = true;
            master.offset = base_offset;
        }
        log::info!(
            "Full resync from {master_id} complete: {} byte snapshot, base offset {base_offset}",
            payload.len()
        );
    }
    // RDB_RECEIVING → ACTIVE
    loop {
        let (query, nbytes) = link.read_frame().await?;
        let is_getack = query.name() == "REPLCONF"
            && query
                .payload()
                .first()
                .map(|arg| arg.eq_ignore_ascii_case(b"GETACK"))
                .unwrap_or(false);
        let offset = {
            let mut engine = db.lock();
            let offset = match engine.master.as_mut() {
                Some(master) => {
                    master.offset += nbytes as u64;
                    master.offset
                }
                None => 0,
            };
            if !is_getack {
                engine.apply_replicated(query);
            }
            offset
        };
        if is_getack {
            link.send_command(&[b"REPLCONF" as &[u8], b"ACK", offset.to_string().as_bytes()])
                .await?;
        }
    }
}

/// The follower service: keeps the replication link alive until shutdown
pub async fn run_follower(
    db: EngineHandle,
    host: String,
    port: u16,
    listen_port: u16,
    mut terminator: Terminator,
    _term_sig_tx: mpsc::Sender<()>,
) {
    log::info!("Replicating from {host}:{port}");
    let mut backoff = NetBackoff::new();
    loop {
        if terminator.is_termination_signal() {
            break;
        }
        let attempt = tokio::select! {
            _ = terminator.receive_signal() => break,
            res = replicate_once(&db, &host, port, listen_port) => res,
        };
        if let Err(e) = attempt {
            log::error!("Replication link failed: {e}");
        }
        let was_up = {
            let mut engine = db.lock();
            match engine.master.as_mut() {
                Some(master) => {
                    let was_up = master.link_up;
                    master.link_up = false;
                    was_up
                }
                None => false,
            }
        };
        if was_up {
            // the link had been healthy; start the backoff over
            backoff = NetBackoff::new();
        }
        if backoff.should_disconnect() {
            log::error!("Giving up on the replication link");
            break;
        }
        tokio::select! {
            _ = terminator.receive_signal() => break,
            _ = backoff.spin() => {}
        }
    }
    log::info!("Replication service has exited");
}
