/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

use embassy_stm32::dma::NoDma;
use embassy_stm32::flash::{Blocking, Flash};
use embassy_stm32::gpio::{AnyPin, Input, Output};
use embassy_stm32::peripherals;
use embassy_stm32::usart::UartTx;
use srec_boots::flash::check_span;
use srec_boots::types::flash_layout::{ERASED_WORD, FLASH_BASE, SECTOR_SIZE, WORD_SIZE};
use srec_boots::{log_error, FlashError, FlashMemory};

#[cfg(feature = "hw_bluepill_f103")]
use self::bluepill_f103::*;

#[cfg(feature = "hw_bluepill_f103")]
mod bluepill_f103;

pub type ConsoleTx = UartTx<'static, peripherals::USART1, NoDma>;

pub struct Hardware {
    pub flash: BoardFlash,
    pub tx: ConsoleTx,
    pub led: Output<'static, AnyPin>,
    pub boot_button: Input<'static, AnyPin>,
}

impl Hardware {
    /// Initialize MCU PLL and CPU on init hardware
    pub fn mcu_pre_init() -> embassy_stm32::Peripherals {
        embassy_stm32::init(Default::default())
    }

    /// Initialize MCU peripherals and nearby components
    #[inline]
    fn hardware_init(peripherals: embassy_stm32::Peripherals) -> Hardware {
        hardware_specific_init(peripherals)
    }
}

pub struct Board {
    pub hardware: Hardware,
}

impl Board {
    pub fn init() -> Self {
        let peripherals = Hardware::mcu_pre_init();

        Self {
            hardware: Hardware::hardware_init(peripherals),
        }
    }
}

/// On-chip flash behind the [`FlashMemory`] interface. Embassy takes offsets from `FLASH_BASE`.
pub struct BoardFlash {
    inner: Flash<'static, Blocking>,
}

impl BoardFlash {
    pub fn new(inner: Flash<'static, Blocking>) -> Self {
        Self { inner }
    }
}

fn controller_error(e: embassy_stm32::flash::Error) -> FlashError {
    log_error!("flash controller: {}", e);
    FlashError::Hardware
}

impl FlashMemory for BoardFlash {
    fn read_word(&mut self, address: u32) -> Result<u32, FlashError> {
        check_span(address, WORD_SIZE as u32, WORD_SIZE as u32)?;
        let mut bytes = [0u8; WORD_SIZE];
        self.inner
            .blocking_read(address - FLASH_BASE, &mut bytes)
            .map_err(controller_error)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, FlashError> {
        check_span(address, 1, 1)?;
        let mut byte = [0u8; 1];
        self.inner
            .blocking_read(address - FLASH_BASE, &mut byte)
            .map_err(controller_error)?;
        Ok(byte[0])
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError> {
        check_span(address, SECTOR_SIZE, SECTOR_SIZE)?;
        let from = address - FLASH_BASE;
        self.inner
            .blocking_erase(from, from + SECTOR_SIZE)
            .map_err(controller_error)
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        if self.read_word(address)? != ERASED_WORD {
            return Err(FlashError::NotErased(address));
        }
        self.inner
            .blocking_write(address - FLASH_BASE, &value.to_le_bytes())
            .map_err(controller_error)
    }
}
