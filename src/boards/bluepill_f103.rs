/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Hardware initialization for the STM32F103C8 "blue pill" board
//! - USART1 console on PA9 (TX) / PA10 (RX), 115200 8N1
//! - user LED on PC13, lit while driven low
//! - boot button on PA0 to GND, internal pull-up

use embassy_stm32::dma::NoDma;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::usart::{self, UartTx};

use super::{BoardFlash, Hardware};

pub fn hardware_specific_init(p: embassy_stm32::Peripherals) -> Hardware {
    let usart1_config = {
        let mut ret = usart::Config::default();
        ret.baudrate = 115200;
        ret.assume_noise_free = false;
        ret.detect_previous_overrun = true;
        ret
    };

    // Receive side is driven by the USART1 interrupt, see `firmware::USART1`. PA10 stays the
    // floating input it is after reset.
    let tx = UartTx::new(p.USART1, p.PA9, NoDma, usart1_config).unwrap_or_else(|_| panic!());

    Hardware {
        flash: BoardFlash::new(Flash::new_blocking(p.FLASH)),
        tx,
        led: Output::new(p.PC13.degrade(), Level::High, Speed::Low),
        boot_button: Input::new(p.PA0.degrade(), Pull::Up),
    }
}
