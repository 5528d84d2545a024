/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Status text for the serial console.

use embedded_io::{Write, WriteFmtError};

use crate::boot::{BootMode, InstalledApp};
use crate::updater::SessionOutcome;

type ConsoleResult<E> = Result<(), WriteFmtError<E>>;

const RULE: &str = "---------------------------------------------------------------";

pub fn write_banner<W: Write>(out: &mut W) -> ConsoleResult<W::Error> {
    write!(
        out,
        "\r\n{}\r\nsrec-boots-rs {}\r\n  + the installed application runs by default\r\n  \
         + hold the boot button during reset to enter update mode\r\n{}\r\n",
        RULE,
        env!("CARGO_PKG_VERSION"),
        RULE
    )
}

pub fn write_mode<W: Write>(out: &mut W, mode: BootMode) -> ConsoleResult<W::Error> {
    match mode {
        BootMode::Run => write!(out, "Mode   : run\r\n"),
        BootMode::Update => write!(out, "Mode   : update\r\nStatus : waiting for S-record file\r\n"),
    }
}

pub fn write_app_status<W: Write>(out: &mut W, app: &InstalledApp) -> ConsoleResult<W::Error> {
    match app {
        InstalledApp::Missing => write!(
            out,
            "Status : no application\r\nMessage: enter update mode and send an S-record file\r\n"
        ),
        InstalledApp::Ready { header, .. } => write!(
            out,
            "App    : {}\r\nStatus : running\r\n",
            core::str::from_utf8(header).unwrap_or("<binary header>")
        ),
        InstalledApp::FailedUpdate => write!(
            out,
            "Status : last update failed, erasing\r\nMessage: enter update mode and send the \
             S-record file again\r\n"
        ),
    }
}

pub fn write_update_result<W: Write>(
    out: &mut W,
    outcome: &SessionOutcome,
) -> ConsoleResult<W::Error> {
    match outcome {
        SessionOutcome::Success(summary) => write!(
            out,
            "Update finished: {} bytes in {} sectors, crc {:08X}\r\nReset to launch the new \
             application\r\n",
            summary.byte_size, summary.sectors, summary.image_crc
        ),
        SessionOutcome::Aborted(error) => write!(
            out,
            "Update failed: {}\r\nReset and send the S-record file again\r\n",
            error
        ),
        SessionOutcome::InProgress => Ok(()),
    }
}
