/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Boot mode selection and the installed image bookkeeping around an update.

use embedded_hal::digital::InputPin;
use heapless::Vec;

use crate::flash::{FlashError, FlashMemory};
use crate::types::flash_layout::{
    sector_of, sectors_until_end, ABORT_ERASE_SECTORS, APP_HEADER_LOCATION, APP_SIZE_LOCATION,
    APP_START_ADDRESS_LOCATION, APP_UPDATED_FLAG_LOCATION, APP_UPDATE_SUCCESS, BASE_APP_ADDRESS,
    ERASED_BYTE, ERASED_WORD, FLASH_END, HEADER_CAPACITY, HEADER_TERMINATOR, SECTOR_SIZE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum BootMode {
    /// Receive a new image
    Update,
    /// Launch the installed image
    Run,
}

/// The boot button pulls low while pressed. A pin that cannot be read boots the application.
pub fn select_boot_mode<P: InputPin>(button: &mut P) -> BootMode {
    match button.is_low() {
        Ok(true) => BootMode::Update,
        _ => BootMode::Run,
    }
}

pub type AppHeader = Vec<u8, HEADER_CAPACITY>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstalledApp {
    Missing,
    Ready {
        start_address: u32,
        header: AppHeader,
    },
    /// An update started but never reached its termination record
    FailedUpdate,
}

pub fn inspect_installed_app<F: FlashMemory>(flash: &mut F) -> Result<InstalledApp, FlashError> {
    let start_address = flash.read_word(APP_START_ADDRESS_LOCATION)?;
    if start_address == ERASED_WORD {
        return Ok(InstalledApp::Missing);
    }

    if flash.read_word(APP_UPDATED_FLAG_LOCATION)? != APP_UPDATE_SUCCESS {
        return Ok(InstalledApp::FailedUpdate);
    }

    Ok(InstalledApp::Ready {
        start_address,
        header: read_header(flash)?,
    })
}

fn read_header<F: FlashMemory>(flash: &mut F) -> Result<AppHeader, FlashError> {
    let mut header = AppHeader::new();
    for offset in 0..HEADER_CAPACITY as u32 {
        match flash.read_byte(APP_HEADER_LOCATION + offset)? {
            ERASED_BYTE | HEADER_TERMINATOR => break,
            byte => {
                // capacity matches the loop bound
                let _ = header.push(byte);
            }
        }
    }
    Ok(header)
}

/// Clear the metadata sector and the previously installed image before an update.
///
/// When the recorded start or size cannot describe an image inside the application area, the
/// whole area is swept instead.
pub fn erase_installed_app<F: FlashMemory>(flash: &mut F) -> Result<(), FlashError> {
    let start_address = flash.read_word(APP_START_ADDRESS_LOCATION)?;
    let sectors = flash.read_word(APP_SIZE_LOCATION)?;

    critical_section::with(|_| {
        flash.erase_sector(APP_START_ADDRESS_LOCATION)?;

        if start_address == ERASED_WORD && sectors == ERASED_WORD {
            log_debug!("no previous image");
            return Ok(());
        }

        let recorded = (BASE_APP_ADDRESS..FLASH_END).contains(&start_address)
            && sectors != 0
            && sectors <= sectors_until_end(start_address);
        if recorded {
            log_info!("erasing previous image, {} sectors at {:#x}", sectors, start_address);
            flash.erase_sectors(sector_of(start_address), sectors)
        } else {
            log_warn!("previous image size unknown, sweeping application area");
            flash.erase_sectors(BASE_APP_ADDRESS, ABORT_ERASE_SECTORS)
        }
    })
}

/// Remove the leftovers of an interrupted update. Returns the number of application sectors
/// that held data.
pub fn erase_failed_app<F: FlashMemory>(flash: &mut F) -> Result<u32, FlashError> {
    let mut written = 0;
    while written < ABORT_ERASE_SECTORS
        && flash.read_word(BASE_APP_ADDRESS + written * SECTOR_SIZE)? != ERASED_WORD
    {
        written += 1;
    }

    log_warn!("erasing failed update, {} sectors written", written);
    // metadata sector sits right in front of the application
    critical_section::with(|_| flash.erase_sectors(APP_START_ADDRESS_LOCATION, written + 1))?;
    Ok(written)
}
