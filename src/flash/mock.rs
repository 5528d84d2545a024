/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! RAM backed flash with NOR semantics for host tests.

use super::{check_span, FlashError, FlashMemory};
use crate::types::flash_layout::{
    sector_of, ERASED_BYTE, ERASED_WORD, FLASH_BASE, FLASH_SIZE, SECTOR_SIZE, WORD_SIZE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashOp {
    Erase(u32),
    Program(u32, u32),
}

pub struct MemoryFlash {
    memory: Vec<u8>,
    ops: Vec<FlashOp>,
    /// Fail the n-th program or erase call (0 based) with `FlashError::Hardware`
    fail_at: Option<usize>,
    calls: usize,
}

impl MemoryFlash {
    pub fn new() -> Self {
        Self {
            memory: vec![ERASED_BYTE; FLASH_SIZE as usize],
            ops: Vec::new(),
            fail_at: None,
            calls: 0,
        }
    }

    pub fn fail_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    pub fn erases(&self) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                FlashOp::Erase(a) => Some(*a),
                FlashOp::Program(..) => None,
            })
            .collect()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Write bytes directly, bypassing NOR rules and the op log.
    pub fn preload(&mut self, address: u32, bytes: &[u8]) {
        let start = (address - FLASH_BASE) as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn preload_word(&mut self, address: u32, value: u32) {
        self.preload(address, &value.to_le_bytes());
    }

    fn offset(address: u32) -> usize {
        (address - FLASH_BASE) as usize
    }

    fn mutation(&mut self) -> Result<(), FlashError> {
        let call = self.calls;
        self.calls += 1;
        match self.fail_at {
            Some(n) if n == call => Err(FlashError::Hardware),
            _ => Ok(()),
        }
    }
}

impl FlashMemory for MemoryFlash {
    fn read_word(&mut self, address: u32) -> Result<u32, FlashError> {
        check_span(address, WORD_SIZE as u32, WORD_SIZE as u32)?;
        let at = Self::offset(address);
        let mut bytes = [0u8; WORD_SIZE];
        bytes.copy_from_slice(&self.memory[at..at + WORD_SIZE]);
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, FlashError> {
        check_span(address, 1, 1)?;
        Ok(self.memory[Self::offset(address)])
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError> {
        check_span(address, SECTOR_SIZE, SECTOR_SIZE)?;
        self.mutation()?;
        let at = Self::offset(sector_of(address));
        self.memory[at..at + SECTOR_SIZE as usize].fill(ERASED_BYTE);
        self.ops.push(FlashOp::Erase(address));
        Ok(())
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        check_span(address, WORD_SIZE as u32, WORD_SIZE as u32)?;
        if self.read_word(address)? != ERASED_WORD {
            return Err(FlashError::NotErased(address));
        }
        self.mutation()?;
        let at = Self::offset(address);
        self.memory[at..at + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        self.ops.push(FlashOp::Program(address, value));
        Ok(())
    }
}
