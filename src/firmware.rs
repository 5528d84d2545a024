/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

use core::cell::RefCell;

use cortex_m_rt::entry;
use critical_section::Mutex;
use defmt_rtt as _;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::pac;
use embassy_time::{block_for, Duration};
use panic_abort as _;
use srec_boots::boot::{self, BootMode, InstalledApp};
use srec_boots::receiver::LineReceiver;
use srec_boots::types::line_queue::SharedLineQueue;
use srec_boots::updater::{SessionOutcome, Updater};
use srec_boots::{console, log_error, log_info, log_warn};

use crate::boards::{Board, Hardware};

static LINE_QUEUE: SharedLineQueue = SharedLineQueue::new();
static RECEIVER: Mutex<RefCell<Option<LineReceiver<'static>>>> = Mutex::new(RefCell::new(None));

#[entry]
fn main() -> ! {
    let mut board = Board::init();
    let hw = &mut board.hardware;

    let _ = console::write_banner(&mut hw.tx);
    let mode = boot::select_boot_mode(&mut hw.boot_button);
    log_info!("boot mode {}", mode);
    let _ = console::write_mode(&mut hw.tx, mode);

    match mode {
        BootMode::Run => run_mode(hw),
        BootMode::Update => update_mode(hw),
    }
}

fn run_mode(hw: &mut Hardware) -> ! {
    let app = match boot::inspect_installed_app(&mut hw.flash) {
        Ok(app) => app,
        Err(e) => {
            log_error!("cannot read metadata: {}", e);
            halt()
        }
    };
    let _ = console::write_app_status(&mut hw.tx, &app);

    match app {
        InstalledApp::Ready { start_address, .. } => {
            log_info!("launching application at {:#x}", start_address);
            // let the last status bytes leave the shift register
            block_for(Duration::from_millis(2));
            unsafe { jump_to_app(start_address) }
        }
        InstalledApp::FailedUpdate => {
            if let Err(e) = boot::erase_failed_app(&mut hw.flash) {
                log_error!("cleanup failed: {}", e);
            }
        }
        InstalledApp::Missing => log_warn!("no application installed"),
    }
    halt()
}

fn update_mode(hw: &mut Hardware) -> ! {
    if let Err(e) = boot::erase_installed_app(&mut hw.flash) {
        log_error!("erasing previous image failed: {}", e);
    }

    let Some((producer, consumer)) = LINE_QUEUE.split() else {
        log_error!("line queue already split");
        halt()
    };
    critical_section::with(|cs| {
        *RECEIVER.borrow_ref_mut(cs) = Some(LineReceiver::new(producer));
    });
    enable_receive_interrupt();

    hw.led.set_low();
    let outcome = Updater::new(&mut hw.flash, consumer).run();
    hw.led.set_high();

    let _ = console::write_update_result(&mut hw.tx, &outcome);
    if let SessionOutcome::Aborted(_) = outcome {
        for _ in 0..6 {
            hw.led.toggle();
            block_for(Duration::from_millis(150));
        }
    }
    halt()
}

fn enable_receive_interrupt() {
    pac::USART1.cr1().modify(|w| {
        w.set_re(true);
        w.set_rxneie(true);
    });
    interrupt::USART1.unpend();
    unsafe { interrupt::USART1.enable() };
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn USART1() {
    let usart = pac::USART1;
    let sr = usart.sr().read();
    if !sr.rxne() && !sr.ore() {
        return;
    }
    // reading DR after SR also clears an overrun
    let byte = usart.dr().read().dr() as u8;

    critical_section::with(|cs| {
        if let Some(receiver) = RECEIVER.borrow_ref_mut(cs).as_mut() {
            // faults are latched on the queue for the updater
            let _ = receiver.on_byte(byte);
        }
    });
}

/// Relocate the vector table to `vector_table` and branch to the reset handler it names.
///
/// # Safety
/// `vector_table` must point at a valid vector table of a complete image.
pub unsafe fn jump_to_app(vector_table: u32) -> ! {
    interrupt::USART1.disable();
    #[allow(unused_mut)]
    let mut p = cortex_m::Peripherals::steal();
    p.SCB.vtor.write(vector_table);

    cortex_m::asm::bootload(vector_table as *const u32)
}
