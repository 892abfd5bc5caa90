/*
 * Created on Sat Feb 11 2023
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

//! Primitives for generating RESP compatible responses

pub mod groups {
    #![allow(unused)]
    //! # Pre-compiled response frames
    //! These are complete, pre-encoded reply frames. They are handed out as
    //! immutable views and must never be mutated by writers

    /// The `+OK` simple string
    pub const OKAY: &[u8] = b"+OK\r\n";
    /// The `+PONG` simple string
    pub const PONG: &[u8] = b"+PONG\r\n";
    /// The `+QUEUED` simple string (transaction queueing acknowledgement)
    pub const QUEUED: &[u8] = b"+QUEUED\r\n";
    /// The null bulk string
    pub const NIL: &[u8] = b"$-1\r\n";
    /// The null array
    pub const NIL_ARRAY: &[u8] = b"*-1\r\n";
    /// The empty array
    pub const EMPTY_ARRAY: &[u8] = b"*0\r\n";
    /// A type-mismatched operation
    pub const WRONGTYPE_ERR: &[u8] =
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
    /// The value under the key failed decimal integer parsing
    pub const NOT_AN_INT_ERR: &[u8] = b"-ERR value is not an integer or out of range\r\n";
    /// An INCR/DECR would leave the 64-bit signed range
    pub const OVERFLOW_ERR: &[u8] = b"-ERR increment or decrement would overflow\r\n";
    /// A score argument failed float parsing
    pub const NOT_A_FLOAT_ERR: &[u8] = b"-ERR value is not a valid float\r\n";
    /// An option/argument combination the command grammar doesn't allow
    pub const SYNTAX_ERR: &[u8] = b"-ERR syntax error\r\n";
    /// A blocking timeout failed to parse
    pub const TIMEOUT_ERR: &[u8] = b"-ERR timeout is not a float or out of range\r\n";
    /// A blocking timeout was negative
    pub const TIMEOUT_NEGATIVE_ERR: &[u8] = b"-ERR timeout is negative\r\n";
    /// The connection must authenticate first
    pub const NOAUTH_ERR: &[u8] = b"-NOAUTH Authentication required.\r\n";
    /// The shared secret didn't match
    pub const BAD_SECRET_ERR: &[u8] =
        b"-ERR invalid password\r\n";
    /// AUTH was sent but no secret is configured
    pub const AUTH_DISABLED_ERR: &[u8] =
        b"-ERR Client sent AUTH, but no password is set\r\n";
    /// MULTI inside MULTI
    pub const MULTI_NESTED_ERR: &[u8] = b"-ERR MULTI calls can not be nested\r\n";
    /// EXEC with no open transaction
    pub const EXEC_WITHOUT_MULTI_ERR: &[u8] = b"-ERR EXEC without MULTI\r\n";
    /// DISCARD with no open transaction
    pub const DISCARD_WITHOUT_MULTI_ERR: &[u8] = b"-ERR DISCARD without MULTI\r\n";
    /// WATCH after MULTI
    pub const WATCH_IN_MULTI_ERR: &[u8] = b"-ERR WATCH inside MULTI is not allowed\r\n";
    /// WAIT after MULTI
    pub const WAIT_IN_MULTI_ERR: &[u8] = b"-ERR WAIT inside MULTI is not allowed\r\n";
    /// A queue-time error poisoned the transaction
    pub const EXECABORT_ERR: &[u8] =
        b"-EXECABORT Transaction discarded because of previous errors.\r\n";
    /// The requested stream ID is not strictly greater than the stream top
    pub const STREAM_ID_SMALL_ERR: &[u8] =
        b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n";
    /// The requested stream ID was 0-0
    pub const STREAM_ID_ZERO_ERR: &[u8] =
        b"-ERR The ID specified in XADD must be greater than 0-0\r\n";
    /// The requested stream ID already exists in the stream
    pub const STREAM_ID_EXISTS_ERR: &[u8] =
        b"-ERR The ID specified in XADD already exists in the target stream\r\n";
    /// A stream ID failed to parse
    pub const STREAM_ID_SYNTAX_ERR: &[u8] =
        b"-ERR Invalid stream ID specified as stream command argument\r\n";
    /// Commands other than the pub/sub set were issued while subscribed
    pub const SUBSCRIBED_MODE_ERR: &[u8] =
        b"-ERR only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT allowed in this context\r\n";
    /// The framing was irrecoverably broken; sent before closing
    pub const PROTOCOL_ERR: &[u8] = b"-ERR Protocol error\r\n";
    /// CONFIG SET on an unknown or immutable parameter
    pub const CONFIG_UNKNOWN_ERR: &[u8] =
        b"-ERR Unknown or unsupported CONFIG parameter\r\n";
}
