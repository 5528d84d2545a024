/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! S-record firmware update engine.
//!
//! A receive interrupt feeds bytes to a [`receiver::LineReceiver`], which publishes complete
//! lines into a [`types::line_queue::SharedLineQueue`]. The foreground [`updater::Updater`]
//! pulls lines, decodes them with [`types::srec`] and programs flash through
//! [`flash::FlashMemory`]. [`boot`] decides between update and run mode and keeps the installed
//! image metadata consistent.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod logging;

pub mod boot;
pub mod console;
pub mod error;
pub mod flash;
pub mod receiver;
pub mod types;
pub mod updater;

pub use error::UpdateError;
pub use flash::{FlashError, FlashMemory};
