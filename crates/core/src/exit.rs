// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 The Axon Authors
//
// This file is part of Axon.
//
// Axon is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Axon is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Axon. If not, see <https://www.gnu.org/licenses/>.

//! Exit reasons
//!
//! ## Purpose
//! Why an actor terminated. Reasons travel in exit and down messages, drive
//! link propagation (a non-normal reason kills linked partners that do not
//! trap exits) and are recorded permanently in the registry.
//!
//! ## Encoding
//! A `u32` so the value crosses the wire unchanged. Codes below
//! [`ExitReason::USER_DEFINED`] are reserved by the runtime; applications
//! pick their own codes at or above it.

use std::fmt;

/// Reason for actor termination, as a well-known `u32` code.
///
/// The default value is [`ExitReason::INVALID`], i.e. "not exited".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExitReason(pub u32);

impl ExitReason {
    /// Not yet exited. Never a valid termination reason.
    pub const INVALID: ExitReason = ExitReason(0);
    /// Normal termination.
    pub const NORMAL: ExitReason = ExitReason(1);
    /// The actor's handler panicked.
    pub const UNHANDLED_EXCEPTION: ExitReason = ExitReason(2);
    /// The actor called an operation it is not allowed to call.
    pub const UNALLOWED_FUNCTION_CALL: ExitReason = ExitReason(3);
    /// A response arrived for a pending request and no handler was set.
    pub const UNHANDLED_SYNC_FAILURE: ExitReason = ExitReason(4);
    /// A timed request expired and no timeout handler was set.
    pub const UNHANDLED_SYNC_TIMEOUT: ExitReason = ExitReason(5);
    /// The connection to the node hosting a linked actor was lost.
    pub const REMOTE_LINK_UNREACHABLE: ExitReason = ExitReason(0x101);
    /// First code available for application-defined reasons.
    pub const USER_DEFINED: ExitReason = ExitReason(0x10000);

    /// Whether this is [`ExitReason::NORMAL`].
    pub fn is_normal(&self) -> bool {
        *self == ExitReason::NORMAL
    }

    /// Whether this is [`ExitReason::INVALID`], i.e. "not exited".
    pub fn is_invalid(&self) -> bool {
        *self == ExitReason::INVALID
    }

    /// An application-defined reason at `USER_DEFINED + offset`.
    pub fn user_defined(offset: u32) -> Self {
        ExitReason(ExitReason::USER_DEFINED.0 + offset)
    }
}

impl From<u32> for ExitReason {
    fn from(code: u32) -> Self {
        ExitReason(code)
    }
}

impl From<ExitReason> for u32 {
    fn from(reason: ExitReason) -> Self {
        reason.0
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExitReason::INVALID => write!(f, "invalid"),
            ExitReason::NORMAL => write!(f, "normal"),
            ExitReason::UNHANDLED_EXCEPTION => write!(f, "unhandled_exception"),
            ExitReason::UNALLOWED_FUNCTION_CALL => write!(f, "unallowed_function_call"),
            ExitReason::UNHANDLED_SYNC_FAILURE => write!(f, "unhandled_sync_failure"),
            ExitReason::UNHANDLED_SYNC_TIMEOUT => write!(f, "unhandled_sync_timeout"),
            ExitReason::REMOTE_LINK_UNREACHABLE => write!(f, "remote_link_unreachable"),
            ExitReason(code) => write!(f, "user({:#x})", code),
        }
    }
}

impl fmt::Debug for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExitReason({})", self)
    }
}
