//! HID Report Descriptor Item Tokenization Support
//!
//! This module walks a report descriptor given as a byte slice and splits it into the prefixed items described in HID
//! spec 1.11 sections 6.2.2.1 through 6.2.2.3. Each item carries the byte offset of its header so that structural
//! errors can be reported against the exact position in the descriptor.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::{
  report_descriptor_verifier::ReportDescriptorError,
  utils::{i32_from_bytes, u32_from_bytes},
};

const LONG_ITEM_PREFIX: u8 = 0xFE;

/// Identifies the type for descriptor report items. See HID spec 1.11 section 6.2.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportItemType {
  Main,
  Global,
  Local,
  Reserved,
  /// Long item (HID spec 1.11 section 6.2.2.3). No long item tags are defined, so these carry opaque data.
  Long,
}

/// Tokenized HID report descriptor item.
#[derive(Debug, PartialEq, Eq)]
pub struct ReportItem<'a> {
  /// Offset of the item header byte within the descriptor.
  pub offset: usize,
  pub item_type: ReportItemType,
  pub tag: u8,
  pub data: &'a [u8],
}

impl ReportItem<'_> {
  /// Returns the item data as a zero-extended little-endian value.
  pub fn unsigned_value(&self) -> u32 {
    u32_from_bytes(self.data)
  }

  /// Returns the item data as a little-endian value sign-extended from the width of the data.
  pub fn signed_value(&self) -> i32 {
    i32_from_bytes(self.data)
  }
}

/// Item tokenizer - produces an iterator over a byte slice that returns ReportItems.
///
/// Iteration ends after the first error, so a truncated descriptor yields exactly one `Err`.
pub struct DescriptorItemTokenizer<'a> {
  descriptor: &'a [u8],
  position: usize,
  failed: bool,
}

impl<'a> DescriptorItemTokenizer<'a> {
  /// Instantiates a new HID Report Descriptor Item Tokenizer.
  pub fn new(descriptor: &'a [u8]) -> Self {
    DescriptorItemTokenizer { descriptor, position: 0, failed: false }
  }

  fn truncated(&mut self, offset: usize, needed: usize, available: usize) -> ReportDescriptorError {
    self.failed = true;
    ReportDescriptorError::TruncatedItem { offset, needed, available }
  }
}

impl<'a> Iterator for DescriptorItemTokenizer<'a> {
  type Item = Result<ReportItem<'a>, ReportDescriptorError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }

    let offset = self.position;
    let item_header = *self.descriptor.get(offset)?;

    let mut size = match item_header & 0x3 {
      3 => 4, //short item size of 4 bytes is encoded as "3"
      size => size as usize,
    };
    let mut item_type = match (item_header & 0xC) >> 2 {
      0 => ReportItemType::Main,
      1 => ReportItemType::Global,
      2 => ReportItemType::Local,
      _ => ReportItemType::Reserved,
    };
    let mut tag = (item_header & 0xF0) >> 4;
    let mut data_start = offset + 1;

    if item_header == LONG_ITEM_PREFIX {
      // long item: bDataSize and bLongItemTag follow the prefix.
      let Some(&[data_size, long_tag]) = self.descriptor.get(data_start..data_start + 2) else {
        let available = self.descriptor.len() - data_start;
        return Some(Err(self.truncated(offset, 2, available)));
      };
      size = data_size as usize;
      tag = long_tag;
      item_type = ReportItemType::Long;
      data_start += 2;
    }

    let available = self.descriptor.len() - data_start;
    if available < size {
      return Some(Err(self.truncated(offset, size, available)));
    }

    let data = &self.descriptor[data_start..data_start + size];
    self.position = data_start + size;

    Some(Ok(ReportItem { offset, item_type, tag, data }))
  }
}
