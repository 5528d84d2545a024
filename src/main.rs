/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boards;

#[cfg(target_os = "none")]
mod firmware;

/// The firmware only exists for the bare-metal target. The update engine itself is the
/// `srec_boots` library, tested on the host.
#[cfg(not(target_os = "none"))]
fn main() {}
