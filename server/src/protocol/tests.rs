/*
 * Created on Sun Feb 19 2023
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

use super::{encode_frame, frame_len, ParseError, Parser};
use bytes::Bytes;

fn args_of(q: &super::Query) -> Vec<&[u8]> {
    q.args().iter().map(|a| a.as_ref()).collect()
}

#[test]
fn parse_simple_query() {
    let buf = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
    let (query, advance) = Parser::parse(buf).unwrap();
    assert_eq!(advance, buf.len());
    assert_eq!(args_of(&query), vec![&b"SET"[..], b"foo", b"bar"]);
    assert_eq!(query.name(), "SET");
    assert_eq!(query.payload().len(), 2);
}

#[test]
fn parse_lowercase_name_is_uppercased() {
    let buf = b"*1\r\n$4\r\nping\r\n";
    let (query, _) = Parser::parse(buf).unwrap();
    assert_eq!(query.name(), "PING");
}

#[test]
fn parse_empty_buffer() {
    assert_eq!(Parser::parse(b"").unwrap_err(), ParseError::Empty);
}

#[test]
fn parse_incomplete_header() {
    assert_eq!(Parser::parse(b"*2\r").unwrap_err(), ParseError::NotEnough);
    assert_eq!(Parser::parse(b"*2\r\n$3\r\nGET\r\n").unwrap_err(), ParseError::NotEnough);
    assert_eq!(
        Parser::parse(b"*1\r\n$5\r\nhel").unwrap_err(),
        ParseError::NotEnough
    );
}

#[test]
fn parse_incomplete_then_complete() {
    // simulate the buffer growing across reads
    let full = b"*2\r\n$4\r\nLPOP\r\n$1\r\nq\r\n";
    for cut in 1..full.len() {
        assert_eq!(
            Parser::parse(&full[..cut]).unwrap_err(),
            ParseError::NotEnough,
            "cut at {cut}"
        );
    }
    let (query, advance) = Parser::parse(full).unwrap();
    assert_eq!(advance, full.len());
    assert_eq!(args_of(&query), vec![&b"LPOP"[..], b"q"]);
}

#[test]
fn parse_two_pipelined_queries() {
    let buf = b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n";
    let (first, advance) = Parser::parse(buf).unwrap();
    assert_eq!(first.name(), "PING");
    let (second, advance2) = Parser::parse(&buf[advance..]).unwrap();
    assert_eq!(second.name(), "ECHO");
    assert_eq!(advance + advance2, buf.len());
}

#[test]
fn parse_bad_prefix() {
    assert_eq!(
        Parser::parse(b"GET foo\r\n").unwrap_err(),
        ParseError::UnexpectedByte
    );
    assert_eq!(
        Parser::parse(b"*1\r\n+OK\r\n").unwrap_err(),
        ParseError::UnexpectedByte
    );
}

#[test]
fn parse_bad_sizes() {
    assert_eq!(
        Parser::parse(b"*x\r\n").unwrap_err(),
        ParseError::DatatypeParseFailure
    );
    assert_eq!(
        Parser::parse(b"*1\r\n$3x\r\nabc\r\n").unwrap_err(),
        ParseError::DatatypeParseFailure
    );
    // zero argument frames make no sense
    assert_eq!(Parser::parse(b"*0\r\n").unwrap_err(), ParseError::BadPacket);
}

#[test]
fn parse_bad_terminator() {
    assert_eq!(
        Parser::parse(b"*1\r\n$3\r\nabcXY").unwrap_err(),
        ParseError::BadPacket
    );
}

#[test]
fn parse_binary_payload() {
    let buf = b"*2\r\n$3\r\nGET\r\n$4\r\n\x00\x01\r\n\r\n";
    let (query, advance) = Parser::parse(buf).unwrap();
    assert_eq!(advance, buf.len());
    assert_eq!(query.args()[1].as_ref(), b"\x00\x01\r\n");
}

#[test]
fn frame_encoding_round_trips() {
    let args: Vec<Bytes> = vec![
        Bytes::from_static(b"ZADD"),
        Bytes::from_static(b"board"),
        Bytes::from_static(b"100"),
        Bytes::from_static(b"alice"),
    ];
    let frame = encode_frame(&args);
    assert_eq!(frame.len(), frame_len(&args));
    let (query, advance) = Parser::parse(&frame).unwrap();
    assert_eq!(advance, frame.len());
    assert_eq!(query.args(), &args[..]);
}
