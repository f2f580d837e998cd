//! Verifier Utility Functions
//!
//! This module contains utility functions used to convert the 0, 1, 2 or 4 data bytes of a short item into integer
//! types.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
pub fn u32_from_bytes(bytes: &[u8]) -> u32 {
  let mut u32_bytes: [u8; 4] = [0; 4];
  let len = bytes.len().min(4);
  u32_bytes[..len].copy_from_slice(&bytes[..len]);
  u32::from_le_bytes(u32_bytes)
}

pub fn i32_from_bytes(bytes: &[u8]) -> i32 {
  let mut i32_bytes: [u8; 4] = [0; 4];
  //sign-extend from the width of the item data.
  if let Some(msb) = bytes.last() {
    if (msb & 0x80) != 0 {
      i32_bytes.fill(0xff);
    }
  }
  let len = bytes.len().min(4);
  i32_bytes[..len].copy_from_slice(&bytes[..len]);
  i32::from_le_bytes(i32_bytes)
}
