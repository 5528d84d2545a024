/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Program memory map of the bootloader target.
//!
//! ```text
//! FLASH_BASE                  bootloader code
//! APP_START_ADDRESS_LOCATION  u32 start address of the installed image
//! APP_SIZE_LOCATION           u32 image size in sectors
//! APP_UPDATED_FLAG_LOCATION   u32 `APP_UPDATE_SUCCESS` once the image is complete
//! APP_HEADER_LOCATION         S0 header text, `.` or 0xFF terminated
//! BASE_APP_ADDRESS            application vector table and code
//! FLASH_END
//! ```

use static_assertions::{const_assert, const_assert_eq};

pub const FLASH_BASE: u32 = 0x0800_0000;
pub const FLASH_SIZE: u32 = 64 * 1024;
pub const FLASH_END: u32 = FLASH_BASE + FLASH_SIZE;

/// Minimum erasable unit
pub const SECTOR_SIZE: u32 = 1024;
/// Programming unit used by the updater
pub const WORD_SIZE: usize = 4;

pub const APP_START_ADDRESS_LOCATION: u32 = FLASH_BASE + 0x9C00;
pub const APP_SIZE_LOCATION: u32 = APP_START_ADDRESS_LOCATION + 4;
pub const APP_UPDATED_FLAG_LOCATION: u32 = APP_SIZE_LOCATION + 4;
pub const APP_HEADER_LOCATION: u32 = APP_UPDATED_FLAG_LOCATION + 4;

pub const BASE_APP_ADDRESS: u32 = FLASH_BASE + 0xA000;

pub const APP_UPDATE_SUCCESS: u32 = 1;

pub const ERASED_WORD: u32 = 0xFFFF_FFFF;
pub const ERASED_BYTE: u8 = 0xFF;
pub const HEADER_TERMINATOR: u8 = b'.';

/// Bytes of the header region shown in the status banner.
pub const HEADER_CAPACITY: usize = 64;

/// Sectors swept from `BASE_APP_ADDRESS` when a session is aborted.
pub const ABORT_ERASE_SECTORS: u32 = (FLASH_END - BASE_APP_ADDRESS) / SECTOR_SIZE;

const_assert_eq!(APP_START_ADDRESS_LOCATION % SECTOR_SIZE, 0);
const_assert_eq!(BASE_APP_ADDRESS % SECTOR_SIZE, 0);
// metadata owns exactly the sector in front of the application
const_assert_eq!(APP_START_ADDRESS_LOCATION + SECTOR_SIZE, BASE_APP_ADDRESS);
const_assert!(APP_HEADER_LOCATION + HEADER_CAPACITY as u32 <= BASE_APP_ADDRESS);
const_assert!(BASE_APP_ADDRESS < FLASH_END);

/// Sectors reserved for an image of `bytes` bytes.
///
/// Always one sector more than strictly needed, and a full extra sector when the size is not
/// sector aligned: `0 -> 1`, `1024 -> 2`, `1025 -> 3`.
pub const fn app_size_in_sectors(bytes: u32) -> u32 {
    if bytes % SECTOR_SIZE == 0 {
        bytes / SECTOR_SIZE + 1
    } else {
        bytes / SECTOR_SIZE + 2
    }
}

/// Bus address of a record address.
///
/// Flash is also mapped at `0x0000_0000` (boot alias), so addresses below `FLASH_BASE`, which
/// is every S1 and S2 address, land at the same offset inside flash.
pub const fn flash_address(address: u32) -> u32 {
    if address < FLASH_BASE {
        FLASH_BASE + address
    } else {
        address
    }
}

/// Start address of the sector holding `address`.
pub const fn sector_of(address: u32) -> u32 {
    address - (address % SECTOR_SIZE)
}

/// Sectors between `address` and the end of flash, saturating at zero.
pub const fn sectors_until_end(address: u32) -> u32 {
    if address >= FLASH_END {
        0
    } else {
        (FLASH_END - sector_of(address)) / SECTOR_SIZE
    }
}
