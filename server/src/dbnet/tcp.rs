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

//! The buffered client socket

use {
    crate::{
        protocol::{ParseResult, Parser, QueryWithAdvance},
        IoResult,
    },
    bytes::{Buf, BytesMut},
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt, BufWriter},
        net::{
            tcp::{OwnedReadHalf, OwnedWriteHalf},
            TcpStream,
        },
    },
};

/// A client connection: the socket halves plus the contiguous read buffer
/// that incomplete frames stay parked in between reads
pub struct Connection {
    read: OwnedReadHalf,
    write: BufWriter<OwnedWriteHalf>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            read,
            write: BufWriter::new(write),
            buffer: BytesMut::with_capacity(libstrat::BUF_CAP),
        }
    }
    /// Attempt to parse one complete query out of the buffered bytes. Never
    /// consumes anything; call [`Connection::advance`] once the query has
    /// been executed
    pub fn try_query(&self) -> ParseResult<QueryWithAdvance> {
        Parser::parse(&self.buffer)
    }
    pub fn advance(&mut self, by: usize) {
        self.buffer.advance(by);
    }
    pub fn buffer_is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
    /// Pull more bytes off the socket. `Ok(true)` means the peer closed the
    /// stream
    pub async fn read_more(&mut self) -> IoResult<bool> {
        let read = self.read.read_buf(&mut self.buffer).await?;
        Ok(read == 0)
    }
    /// Write a complete frame and flush it out
    pub async fn write_frame(&mut self, frame: &[u8]) -> IoResult<()> {
        self.write.write_all(frame).await?;
        self.write.flush().await
    }
}
