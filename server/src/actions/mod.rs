/*
 * Created on Sun May 14 2023
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

//! # Actions
//!
//! Actions are the command handlers: you provide arguments, they return a
//! reply frame (or defer one). This module collects them by family along
//! with the error plumbing they share

pub mod kv;
pub mod lists;
pub mod pubsub;
pub mod repl;
pub mod server;
pub mod streams;
pub mod txn;
pub mod zsets;
#[cfg(test)]
mod tests;

use {
    crate::{
        corestore::{Data, IncrError, StreamWriteError, WrongType},
        corestore::stream::StreamIdError,
        protocol::responses::groups,
        resp,
    },
    bytes::Bytes,
};

/// A generic result for actions
pub type ActionResult<T> = Result<T, ActionError>;

/// An error reply. Most errors are pre-encoded static frames; the dynamic
/// ones (unknown command, wrong arity) carry their own allocation
#[derive(Debug, PartialEq)]
pub enum ActionError {
    Static(&'static [u8]),
    Owned(Bytes),
}

impl ActionError {
    /// Build a dynamic `-ERR`-style error from a message (sans terminator)
    pub fn message(msg: &str) -> Self {
        Self::Owned(resp::error_frame(msg))
    }
    pub fn into_frame(self) -> Bytes {
        match self {
            Self::Static(frame) => Bytes::from_static(frame),
            Self::Owned(frame) => frame,
        }
    }
}

impl From<&'static [u8]> for ActionError {
    fn from(frame: &'static [u8]) -> Self {
        Self::Static(frame)
    }
}

impl From<WrongType> for ActionError {
    fn from(_: WrongType) -> Self {
        Self::Static(groups::WRONGTYPE_ERR)
    }
}

impl From<IncrError> for ActionError {
    fn from(e: IncrError) -> Self {
        match e {
            IncrError::WrongType => Self::Static(groups::WRONGTYPE_ERR),
            IncrError::NotAnInteger => Self::Static(groups::NOT_AN_INT_ERR),
            IncrError::Overflow => Self::Static(groups::OVERFLOW_ERR),
        }
    }
}

impl From<StreamIdError> for ActionError {
    fn from(e: StreamIdError) -> Self {
        match e {
            StreamIdError::IdTooSmall => Self::Static(groups::STREAM_ID_SMALL_ERR),
            StreamIdError::IdIsZero => Self::Static(groups::STREAM_ID_ZERO_ERR),
            StreamIdError::IdExists => Self::Static(groups::STREAM_ID_EXISTS_ERR),
            StreamIdError::IdSyntax => Self::Static(groups::STREAM_ID_SYNTAX_ERR),
        }
    }
}

impl From<StreamWriteError> for ActionError {
    fn from(e: StreamWriteError) -> Self {
        match e {
            StreamWriteError::WrongType => Self::Static(groups::WRONGTYPE_ERR),
            StreamWriteError::Id(id) => id.into(),
        }
    }
}

/// `-ERR unknown command '<name>'`
pub fn unknown_command(name: &str) -> ActionError {
    ActionError::message(&format!("ERR unknown command '{}'", name))
}

/// `-ERR wrong number of arguments for '<name>' command`
pub fn wrong_arity(name: &str) -> ActionError {
    ActionError::message(&format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

/// Parse a signed 64-bit decimal argument
pub fn parse_i64(raw: &Data) -> ActionResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(ActionError::Static(groups::NOT_AN_INT_ERR))
}

/// Parse an unsigned 64-bit decimal argument
pub fn parse_u64(raw: &Data) -> ActionResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or(ActionError::Static(groups::NOT_AN_INT_ERR))
}
