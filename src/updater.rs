/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Update session state machine.
//!
//! ```text
//!                  +--> ApplyingHeader --+
//! WaitingForLine --+--> ApplyingData ----+--> WaitingForLine
//!        ^         +--> Terminating ---------> Success
//!        |                                    (any error) --> Aborted
//! ```
//!
//! Every line is decoded and validated before anything is written. A single bad line ends the
//! session: there is no retransmission, the host restarts the whole transfer.

use crate::error::UpdateError;
use crate::flash::{FlashError, FlashMemory};
use crate::types::flash_layout::{
    app_size_in_sectors, flash_address, ABORT_ERASE_SECTORS, APP_HEADER_LOCATION, APP_SIZE_LOCATION,
    APP_START_ADDRESS_LOCATION, APP_UPDATED_FLAG_LOCATION, APP_UPDATE_SUCCESS, BASE_APP_ADDRESS,
    FLASH_END, WORD_SIZE,
};
use crate::types::image_crc::{image_digest, ImageDigest};
use crate::types::line_queue::{Line, LineConsumer, QUEUE_CAPACITY};
use crate::types::srec::{self, Record, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SessionState {
    WaitingForLine,
    ApplyingHeader,
    ApplyingData,
    Terminating,
    Success,
    Aborted,
}

/// What the host learns about a finished image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct UpdateSummary {
    /// `None` when the transfer carried no data record
    pub start_address: Option<u32>,
    pub byte_size: u32,
    /// Value persisted at `APP_SIZE_LOCATION`
    pub sectors: u32,
    /// Data records programmed
    pub records: u32,
    /// CRC-32/MPEG-2 over the programmed bytes in arrival order
    pub image_crc: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SessionOutcome {
    InProgress,
    Success(UpdateSummary),
    Aborted(UpdateError),
}

impl SessionOutcome {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Bookkeeping of one transfer.
#[derive(Clone)]
pub struct UpdateSession {
    new_app_start_address: Option<u32>,
    new_app_byte_size: u32,
    records: u32,
    header_written: bool,
    digest: ImageDigest,
}

impl UpdateSession {
    fn new() -> Self {
        Self {
            new_app_start_address: None,
            new_app_byte_size: 0,
            records: 0,
            header_written: false,
            digest: image_digest(),
        }
    }

    pub fn new_app_start_address(&self) -> Option<u32> {
        self.new_app_start_address
    }

    pub fn new_app_byte_size(&self) -> u32 {
        self.new_app_byte_size
    }

    pub fn sectors(&self) -> u32 {
        app_size_in_sectors(self.new_app_byte_size)
    }

    fn summary(&self) -> UpdateSummary {
        UpdateSummary {
            start_address: self.new_app_start_address,
            byte_size: self.new_app_byte_size,
            sectors: self.sectors(),
            records: self.records,
            image_crc: self.digest.clone().finalize(),
        }
    }
}

enum Step {
    Continue,
    Done,
}

pub struct Updater<'a, F: FlashMemory, const N: usize = QUEUE_CAPACITY> {
    flash: F,
    lines: LineConsumer<'a, N>,
    line: Line,
    state: SessionState,
    session: UpdateSession,
    finished: Option<SessionOutcome>,
}

impl<'a, F: FlashMemory, const N: usize> Updater<'a, F, N> {
    /// The application area and metadata sector are expected to be erased already.
    pub fn new(flash: F, lines: LineConsumer<'a, N>) -> Self {
        log_info!("update session started");
        Self {
            flash,
            lines,
            line: Line::new(),
            state: SessionState::WaitingForLine,
            session: UpdateSession::new(),
            finished: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Handle at most one queued line.
    ///
    /// Once the session has finished the same outcome is returned on every call.
    pub fn poll(&mut self) -> SessionOutcome {
        if let Some(outcome) = self.finished {
            return outcome;
        }

        if let Some(fault) = self.lines.take_fault() {
            return self.abort(fault.into());
        }

        if !self.lines.receive_line(&mut self.line) {
            return SessionOutcome::InProgress;
        }

        match self.apply_line() {
            Ok(Step::Continue) => {
                self.lines.release();
                self.state = SessionState::WaitingForLine;
                SessionOutcome::InProgress
            }
            Ok(Step::Done) => {
                let summary = self.session.summary();
                log_info!(
                    "update done: {} bytes, {} sectors, crc {:#x}",
                    summary.byte_size,
                    summary.sectors,
                    summary.image_crc
                );
                self.state = SessionState::Success;
                self.finish(SessionOutcome::Success(summary))
            }
            Err(e) => self.abort(e),
        }
    }

    /// Poll until the session ends. Blocks for as long as the host keeps the line idle.
    pub fn run(&mut self) -> SessionOutcome {
        loop {
            let outcome = self.poll();
            if outcome.is_finished() {
                return outcome;
            }
        }
    }

    fn finish(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        self.finished = Some(outcome);
        outcome
    }

    fn apply_line(&mut self) -> Result<Step, UpdateError> {
        let record = srec::parse_record(&self.line)?;

        match record.kind {
            RecordKind::Header => {
                self.state = SessionState::ApplyingHeader;
                self.apply_header(&record)?;
                Ok(Step::Continue)
            }
            kind if kind.is_data() => {
                self.state = SessionState::ApplyingData;
                self.apply_data(&record)?;
                Ok(Step::Continue)
            }
            kind if kind.is_termination() => {
                self.state = SessionState::Terminating;
                self.terminate()?;
                Ok(Step::Done)
            }
            kind => Err(UpdateError::UnsupportedRecord(kind)),
        }
    }

    fn apply_header(&mut self, record: &Record) -> Result<(), UpdateError> {
        if self.session.header_written {
            log_warn!("extra header record skipped");
            return Ok(());
        }

        for (n, word) in record.words().enumerate() {
            self.program_word(APP_HEADER_LOCATION + (n * WORD_SIZE) as u32, word)?;
        }
        self.session.header_written = true;
        log_debug!("header stored, {} words", record.data_word_count());
        Ok(())
    }

    fn apply_data(&mut self, record: &Record) -> Result<(), UpdateError> {
        let base = flash_address(record.address);
        if base < BASE_APP_ADDRESS {
            return Err(UpdateError::AddressBelowBase(record.address));
        }

        let written = record.data_word_count() * WORD_SIZE;
        // whole record must fit before anything about it is persisted
        match base.checked_add(written as u32) {
            Some(end) if end <= FLASH_END => {}
            _ => return Err(FlashError::OutOfRange(base).into()),
        }

        if self.session.new_app_start_address.is_none() {
            self.program_word(APP_START_ADDRESS_LOCATION, base)?;
            self.session.new_app_start_address = Some(base);
            log_info!("image starts at {:#x}", base);
        }

        for (n, word) in record.words().enumerate() {
            self.program_word(base + (n * WORD_SIZE) as u32, word)?;
        }

        self.session.digest.update(&record.data[..written]);
        self.session.new_app_byte_size += written as u32;
        self.session.records += 1;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), UpdateError> {
        let sectors = self.session.sectors();
        self.program_word(APP_SIZE_LOCATION, sectors)?;
        self.program_word(APP_UPDATED_FLAG_LOCATION, APP_UPDATE_SUCCESS)?;
        Ok(())
    }

    /// One word per critical section, so the receive interrupt never runs mid-program.
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        let flash = &mut self.flash;
        critical_section::with(|_| flash.program_word(address, value))
    }

    fn abort(&mut self, error: UpdateError) -> SessionOutcome {
        self.state = SessionState::Aborted;
        log_error!("update aborted: {}", error);

        if error.erases_image() {
            log_warn!(
                "erasing application area, {} sectors were in use",
                self.session.sectors()
            );
            let flash = &mut self.flash;
            let erased = critical_section::with(|_| {
                flash.erase_sectors(BASE_APP_ADDRESS, ABORT_ERASE_SECTORS)
            });
            if let Err(e) = erased {
                log_error!("erase after abort failed: {}", e);
            }
        }

        self.finish(SessionOutcome::Aborted(error))
    }
}
