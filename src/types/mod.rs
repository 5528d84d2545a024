/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

pub mod flash_layout;
pub mod image_crc;
pub mod line_queue;
pub mod srec;
