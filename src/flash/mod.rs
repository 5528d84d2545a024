/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Program memory access used by the updater and the boot manager.
//!
//! Addresses are absolute bus addresses inside `FLASH_BASE..FLASH_END`.

use core::fmt;

use crate::types::flash_layout::{FLASH_BASE, FLASH_END, SECTOR_SIZE, WORD_SIZE};

#[cfg(test)]
pub(crate) mod mock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum FlashError {
    OutOfRange(u32),
    Unaligned(u32),
    /// Target word was not in the erased state
    NotErased(u32),
    /// Controller reported a program or erase failure
    Hardware,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(a) => write!(f, "address {:#010x} out of range", a),
            Self::Unaligned(a) => write!(f, "address {:#010x} unaligned", a),
            Self::NotErased(a) => write!(f, "word at {:#010x} not erased", a),
            Self::Hardware => write!(f, "flash controller error"),
        }
    }
}

/// Check that `len` bytes starting at `address` lie inside flash and that `address` is aligned
/// to `align`.
pub fn check_span(address: u32, len: u32, align: u32) -> Result<(), FlashError> {
    let end = address
        .checked_add(len)
        .ok_or(FlashError::OutOfRange(address))?;
    if address < FLASH_BASE || end > FLASH_END {
        return Err(FlashError::OutOfRange(address));
    }
    if address % align != 0 {
        return Err(FlashError::Unaligned(address));
    }
    Ok(())
}

pub trait FlashMemory {
    fn read_word(&mut self, address: u32) -> Result<u32, FlashError>;

    fn read_byte(&mut self, address: u32) -> Result<u8, FlashError>;

    /// Erase the sector starting at `address`.
    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError>;

    /// Erase `count` consecutive sectors starting at `address`.
    fn erase_sectors(&mut self, address: u32, count: u32) -> Result<(), FlashError> {
        for n in 0..count {
            self.erase_sector(address + n * SECTOR_SIZE)?;
        }
        Ok(())
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError>;

    fn program_double_word(&mut self, address: u32, value: &[u8; 8]) -> Result<(), FlashError> {
        check_span(address, 8, 8)?;
        let lo = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let hi = u32::from_le_bytes([value[4], value[5], value[6], value[7]]);
        self.program_word(address, lo)?;
        self.program_word(address + WORD_SIZE as u32, hi)
    }
}

impl<T: FlashMemory + ?Sized> FlashMemory for &mut T {
    fn read_word(&mut self, address: u32) -> Result<u32, FlashError> {
        T::read_word(self, address)
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, FlashError> {
        T::read_byte(self, address)
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError> {
        T::erase_sector(self, address)
    }

    fn erase_sectors(&mut self, address: u32, count: u32) -> Result<(), FlashError> {
        T::erase_sectors(self, address, count)
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        T::program_word(self, address, value)
    }

    fn program_double_word(&mut self, address: u32, value: &[u8; 8]) -> Result<(), FlashError> {
        T::program_double_word(self, address, value)
    }
}
