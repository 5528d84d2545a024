/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

use core::fmt;

use crate::flash::FlashError;
use crate::types::line_queue::QueueError;
use crate::types::srec::{RecordError, RecordKind};

/// Reason an update session was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum UpdateError {
    Record(RecordError),
    /// Count and reserved records are not handled
    UnsupportedRecord(RecordKind),
    /// Data record would overwrite the bootloader or its metadata
    AddressBelowBase(u32),
    Queue(QueueError),
    Flash(FlashError),
}

impl UpdateError {
    /// Whether the abort path sweeps the application area.
    ///
    /// A record aimed below the application never touched flash, so nothing is erased for it.
    pub const fn erases_image(&self) -> bool {
        !matches!(self, Self::AddressBelowBase(_))
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(e) => write!(f, "bad record: {}", e),
            Self::UnsupportedRecord(kind) => write!(f, "unsupported record S{}", *kind as u8),
            Self::AddressBelowBase(a) => write!(f, "address {:#010x} below application", a),
            Self::Queue(e) => write!(f, "line queue: {}", e),
            Self::Flash(e) => write!(f, "flash: {}", e),
        }
    }
}

impl From<RecordError> for UpdateError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

impl From<QueueError> for UpdateError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

impl From<FlashError> for UpdateError {
    fn from(value: FlashError) -> Self {
        Self::Flash(value)
    }
}
