//! Report Descriptor Verifier Core
//!
//! This module walks a report descriptor given as a byte slice in a single linear scan, checks it against the
//! structural rules of HID spec 1.11 and accumulates the number of bits each Input, Output and Feature main item
//! contributes to its report. After the scan the accumulated totals are rounded up to whole bytes.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{collections::BTreeMap, vec::Vec};
use core::{fmt, ops::Range};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
  item_tokenizer::{DescriptorItemTokenizer, ReportItem, ReportItemType},
  report_data_types::{
    CollectionKind, LogicalMaximum, LogicalMinimum, ReportAttributes, ReportCount, ReportId, ReportKey, ReportSize,
    ReportType, Usage, UsagePage, UsageRange,
  },
  ReportCollection, ReportField, ReportLength, VerifiedDescriptor,
};

/// Why a collection is considered unbalanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionImbalance {
  /// END_COLLECTION with no open COLLECTION.
  UnmatchedEnd,
  /// COLLECTION still open at the end of the descriptor.
  Unterminated,
}

impl fmt::Display for CollectionImbalance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CollectionImbalance::UnmatchedEnd => f.write_str("end collection without a matching collection"),
      CollectionImbalance::Unterminated => f.write_str("collection is never closed"),
    }
  }
}

/// Defines errors generated during report descriptor verification. Every error carries the byte offset of the item
/// that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportDescriptorError {
  #[error("item at offset {offset} declares {needed} data bytes but only {available} remain")]
  TruncatedItem { offset: usize, needed: usize, available: usize },
  #[error("unbalanced collection at offset {offset}: {reason}")]
  UnbalancedCollection { offset: usize, reason: CollectionImbalance },
  #[error("logical minimum {minimum} exceeds logical maximum {maximum} for main item at offset {offset}")]
  MalformedNumericRange { offset: usize, minimum: i64, maximum: i64 },
  #[error("report id {value} at offset {offset} is outside 1..=255")]
  InvalidReportId { offset: usize, value: u32 },
  #[error("pop at offset {offset} without a matching push")]
  InvalidPop { offset: usize },
  #[error("unsupported {item_type:?} item with tag {tag:#x} at offset {offset}")]
  InvalidItem { offset: usize, item_type: ReportItemType, tag: u8 },
}

impl ReportDescriptorError {
  /// Byte offset of the item that caused the error.
  pub fn offset(&self) -> usize {
    match *self {
      ReportDescriptorError::TruncatedItem { offset, .. }
      | ReportDescriptorError::UnbalancedCollection { offset, .. }
      | ReportDescriptorError::MalformedNumericRange { offset, .. }
      | ReportDescriptorError::InvalidReportId { offset, .. }
      | ReportDescriptorError::InvalidPop { offset }
      | ReportDescriptorError::InvalidItem { offset, .. } => offset,
    }
  }
}

/// Controls how long REPORT_SIZE and REPORT_COUNT stay in effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReportFieldScope {
  /// REPORT_SIZE and REPORT_COUNT are cleared after every main item, along with the local items. Every main item must
  /// then restate both values, otherwise it contributes 0 bits.
  #[default]
  Local,
  /// REPORT_SIZE and REPORT_COUNT persist until overwritten (or restored by POP), as global items do in HID 1.11.
  Global,
}

/// Verifier configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifierOptions {
  pub report_field_scope: ReportFieldScope,
  /// Reject Input/Output/Feature items whose logical minimum exceeds their logical maximum.
  pub validate_logical_range: bool,
}

// Global items tracked while scanning. PUSH/POP save and restore a copy of this table.
#[derive(Debug, Clone, Default)]
struct GlobalItemStateTable {
  usage_page: Option<UsagePage>,
  logical_minimum: Option<LogicalMinimum>,
  logical_maximum: Option<LogicalMaximum>,
  report_size: Option<ReportSize>,
  report_count: Option<ReportCount>,
  report_id: ReportId,
}

// Local items tracked while scanning. Reset to defaults after every main item.
#[derive(Debug, Clone, Default)]
struct LocalItemStateTable {
  usages: Vec<UsageRange>,
  usage_minimum: Option<u32>,
  usage_maximum: Option<u32>,
}

#[derive(Debug, Default)]
struct ParserState {
  global_state: GlobalItemStateTable,
  global_stack: Vec<GlobalItemStateTable>,
  local_state: LocalItemStateTable,
  // indices into the verifier's collection list, innermost last.
  open_collections: Vec<usize>,
}

// Running bit totals per report. Totals only ever grow during a walk.
#[derive(Debug, Default)]
struct ReportAccumulator {
  totals: BTreeMap<ReportKey, u64>,
}

impl ReportAccumulator {
  // Adds bits to the report and returns the bit range they occupy within it.
  fn add(&mut self, key: ReportKey, bits: u64) -> Range<u64> {
    let total = self.totals.entry(key).or_insert(0);
    let start = *total;
    *total = total.saturating_add(bits);
    start..*total
  }

  fn finish(self) -> BTreeMap<ReportKey, ReportLength> {
    self
      .totals
      .into_iter()
      .map(|(key, bits)| {
        let prefix = if key.report_id.has_prefix_byte() { 1 } else { 0 };
        let length = ReportLength { bits, bytes: bits.div_ceil(8) + prefix };
        debug!(report = %key, bits = length.bits, bytes = length.bytes, "report length");
        (key, length)
      })
      .collect()
  }
}

/// Verifies Report Descriptors and computes the length of the reports they define.
pub struct ReportDescriptorVerifier<'o> {
  options: &'o VerifierOptions,
  state: ParserState,
  accumulator: ReportAccumulator,
  fields: Vec<ReportField>,
  collections: Vec<ReportCollection>,
}

impl<'o> ReportDescriptorVerifier<'o> {
  // Instantiates a new verifier with fresh state.
  fn new(options: &'o VerifierOptions) -> Self {
    ReportDescriptorVerifier {
      options,
      state: Default::default(),
      accumulator: Default::default(),
      fields: Vec::new(),
      collections: Vec::new(),
    }
  }

  // handles "main" items (Input/Output/Feature/Collection/End Collection)
  fn parse_main(&mut self, item: &ReportItem) -> Result<(), ReportDescriptorError> {
    match item.tag {
      0b1000 => self.add_field(item, ReportType::Input)?,
      0b1001 => self.add_field(item, ReportType::Output)?,
      0b1011 => self.add_field(item, ReportType::Feature)?,
      0b1010 => {
        //Collection
        let collection = ReportCollection {
          offset: item.offset,
          kind: CollectionKind::from(item.data),
          usage: self.state.local_state.usages.first().map(|range| self.usage(range.start())),
          depth: self.state.open_collections.len(),
        };
        trace!(offset = item.offset, kind = ?collection.kind, depth = collection.depth, "collection");
        self.state.open_collections.push(self.collections.len());
        self.collections.push(collection);
      }
      0b1100 => {
        //End Collection
        self.state.open_collections.pop().ok_or(ReportDescriptorError::UnbalancedCollection {
          offset: item.offset,
          reason: CollectionImbalance::UnmatchedEnd,
        })?;
      }
      _ => return Err(invalid_item(item)),
    }
    //reset local state after processing a main item.
    self.state.local_state = Default::default();
    if self.options.report_field_scope == ReportFieldScope::Local {
      self.state.global_state.report_size = None;
      self.state.global_state.report_count = None;
    }
    Ok(())
  }

  // handles "global" items
  fn parse_global(&mut self, item: &ReportItem) -> Result<(), ReportDescriptorError> {
    let global_state = &mut self.state.global_state;
    match item.tag {
      0b0000 => global_state.usage_page = Some(UsagePage::from(item.data)),
      0b0001 => global_state.logical_minimum = Some(LogicalMinimum::from(item.data)),
      0b0010 => global_state.logical_maximum = Some(LogicalMaximum::from(item.data)),
      // physical extent, unit exponent and unit do not affect report layout.
      0b0011..=0b0110 => trace!(offset = item.offset, tag = item.tag, value = item.signed_value(), "ignored global"),
      0b0111 => global_state.report_size = Some(ReportSize::from(item.data)),
      0b1000 => {
        let value = item.unsigned_value();
        let id = u8::try_from(value)
          .ok()
          .filter(|&id| id != 0)
          .ok_or(ReportDescriptorError::InvalidReportId { offset: item.offset, value })?;
        global_state.report_id = ReportId::from(id);
      }
      0b1001 => global_state.report_count = Some(ReportCount::from(item.data)),
      0b1010 => self.state.global_stack.push(global_state.clone()),
      0b1011 => {
        *global_state = self.state.global_stack.pop().ok_or(ReportDescriptorError::InvalidPop { offset: item.offset })?;
      }
      _ => return Err(invalid_item(item)),
    };
    Ok(())
  }

  // handles "local" items
  fn parse_local(&mut self, item: &ReportItem) -> Result<(), ReportDescriptorError> {
    let local_state = &mut self.state.local_state;
    match item.tag {
      0b0000 => {
        //Usage
        let usage = item.unsigned_value();
        local_state.usages.push(UsageRange::from(usage..=usage));
      }
      0b0001 => {
        //Usage Minimum
        let min = item.unsigned_value();
        if let Some(max) = local_state.usage_maximum.take() {
          local_state.usages.push(UsageRange::from(min..=max));
        } else {
          local_state.usage_minimum = Some(min);
        }
      }
      0b0010 => {
        //Usage Maximum
        let max = item.unsigned_value();
        if let Some(min) = local_state.usage_minimum.take() {
          local_state.usages.push(UsageRange::from(min..=max));
        } else {
          local_state.usage_maximum = Some(max);
        }
      }
      // designators, strings and delimiters do not affect report layout.
      0b0011..=0b0101 | 0b0111..=0b1010 => trace!(offset = item.offset, tag = item.tag, "ignored local"),
      _ => return Err(invalid_item(item)),
    }
    Ok(())
  }

  // Processes the given item and updates verifier state.
  fn parse_item(&mut self, item: &ReportItem) -> Result<(), ReportDescriptorError> {
    trace!(offset = item.offset, item_type = ?item.item_type, tag = item.tag, data = ?item.data, "item");
    match item.item_type {
      ReportItemType::Main => self.parse_main(item),
      ReportItemType::Global => self.parse_global(item),
      ReportItemType::Local => self.parse_local(item),
      ReportItemType::Long => {
        debug!(offset = item.offset, tag = item.tag, len = item.data.len(), "skipping long item");
        Ok(())
      }
      ReportItemType::Reserved => Err(invalid_item(item)),
    }
  }

  // Adds the bits of an Input/Output/Feature item to the report selected by the current report id.
  fn add_field(&mut self, item: &ReportItem, report_type: ReportType) -> Result<(), ReportDescriptorError> {
    if self.options.validate_logical_range {
      self.check_logical_range(item.offset)?;
    }

    let global_state = &self.state.global_state;
    let (report_size, report_count) = match (global_state.report_size, global_state.report_count) {
      (Some(size), Some(count)) => (u32::from(size), u32::from(count)),
      (size, count) => {
        warn!(offset = item.offset, ?size, ?count, "main item without report size and count contributes no bits");
        (size.map_or(0, u32::from), count.map_or(0, u32::from))
      }
    };
    if report_size == 0 && report_count != 0 {
      warn!(offset = item.offset, report_count, "zero report size");
    }

    let report = ReportKey { report_id: global_state.report_id, report_type };
    let bits = self.accumulator.add(report, report_size as u64 * report_count as u64);
    debug!(offset = item.offset, %report, report_size, report_count, start = bits.start, end = bits.end, "field");

    let usages = self
      .state
      .local_state
      .usages
      .iter()
      .map(|range| UsageRange::from(self.usage(range.start()).into()..=self.usage(range.end()).into()))
      .collect();

    self.fields.push(ReportField {
      offset: item.offset,
      report,
      bits,
      report_size,
      report_count,
      attributes: ReportAttributes::from(item.data),
      usages,
      collection_depth: self.state.open_collections.len(),
    });
    Ok(())
  }

  // If the logical minimum is negative the maximum is signed, otherwise it is treated as unsigned.
  fn check_logical_range(&self, offset: usize) -> Result<(), ReportDescriptorError> {
    let global_state = &self.state.global_state;
    let (Some(min), Some(max)) = (global_state.logical_minimum, global_state.logical_maximum) else {
      return Ok(());
    };
    let minimum = i32::from(min) as i64;
    let maximum = if minimum.is_negative() { i32::from(max) as i64 } else { u32::from(max) as i64 };
    if minimum > maximum {
      return Err(ReportDescriptorError::MalformedNumericRange { offset, minimum, maximum });
    }
    Ok(())
  }

  fn usage(&self, id: u32) -> Usage {
    Usage::from_page_and_id(self.state.global_state.usage_page, Usage::from(id))
  }

  fn finish(self) -> Result<VerifiedDescriptor, ReportDescriptorError> {
    if let Some(&innermost) = self.state.open_collections.last() {
      return Err(ReportDescriptorError::UnbalancedCollection {
        offset: self.collections[innermost].offset,
        reason: CollectionImbalance::Unterminated,
      });
    }
    Ok(VerifiedDescriptor { reports: self.accumulator.finish(), fields: self.fields, collections: self.collections })
  }

  /// Verifies the given report_descriptor byte slice and produces a VerifiedDescriptor that describes the length of
  /// every report it defines, or an Error identifying the first structural problem found.
  pub fn verify(
    report_descriptor: &[u8],
    options: &VerifierOptions,
  ) -> Result<VerifiedDescriptor, ReportDescriptorError> {
    let mut verifier = ReportDescriptorVerifier::new(options);
    for item in DescriptorItemTokenizer::new(report_descriptor) {
      verifier.parse_item(&item?)?;
    }
    verifier.finish()
  }
}

fn invalid_item(item: &ReportItem) -> ReportDescriptorError {
  ReportDescriptorError::InvalidItem { offset: item.offset, item_type: item.item_type, tag: item.tag }
}

#[cfg(test)]
mod tests {
  use alloc::{collections::BTreeMap, vec::Vec};

  use proptest::prelude::*;

  use super::{CollectionImbalance, ReportDescriptorError, ReportDescriptorVerifier, ReportFieldScope, VerifierOptions};
  use crate::{
    item_tokenizer::ReportItemType,
    report_data_types::{CollectionKind, ReportAttributes, ReportKey, ReportType, Usage, UsageRange},
    ReportLength,
  };

  // 4 axes, hat switch and 25 buttons, plus a 7 byte output report.
  static JOYSTICK_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x04, // USAGE (Joystick)
    0xa1, 0x01, // COLLECTION (Application)
    0xa1, 0x02, //   COLLECTION (Logical)
    0x09, 0x01, //     USAGE (Pointer)
    0xa1, 0x00, //     COLLECTION (Physical)
    0x09, 0x30, //       USAGE (X)
    0x09, 0x31, //       USAGE (Y)
    0x09, 0x32, //       USAGE (Z)
    0x09, 0x35, //       USAGE (Rz)
    0x15, 0x00, //       LOGICAL_MINIMUM (0)
    0x27, 0xff, 0xff, 0x00, 0x00, //       LOGICAL_MAXIMUM (65535)
    0x35, 0x00, //       PHYSICAL_MINIMUM (0)
    0x47, 0xff, 0xff, 0x00, 0x00, //       PHYSICAL_MAXIMUM (65535)
    0x75, 0x10, //       REPORT_SIZE (16)
    0x95, 0x04, //       REPORT_COUNT (4)
    0x81, 0x02, //       INPUT (Data,Var,Abs)
    0xc0, //     END_COLLECTION
    0x09, 0x39, //     USAGE (Hat switch)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x25, 0x07, //     LOGICAL_MAXIMUM (7)
    0x35, 0x00, //     PHYSICAL_MINIMUM (0)
    0x46, 0x3b, 0x01, //     PHYSICAL_MAXIMUM (315)
    0x65, 0x14, //     UNIT (Degrees)
    0x75, 0x04, //     REPORT_SIZE (4)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x81, 0x42, //     INPUT (Data,Var,Abs,Null)
    0x75, 0x04, //     REPORT_SIZE (4)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x81, 0x03, //     INPUT (Cnst,Var,Abs)
    0x05, 0x09, //     USAGE_PAGE (Button)
    0x19, 0x01, //     USAGE_MINIMUM (1)
    0x29, 0x19, //     USAGE_MAXIMUM (25)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x25, 0x01, //     LOGICAL_MAXIMUM (1)
    0x75, 0x01, //     REPORT_SIZE (1)
    0x95, 0x19, //     REPORT_COUNT (25)
    0x81, 0x02, //     INPUT (Data,Var,Abs)
    0x75, 0x07, //     REPORT_SIZE (7)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x81, 0x03, //     INPUT (Cnst,Var,Abs)
    0xc0, //   END_COLLECTION
    0xa1, 0x02, //   COLLECTION (Logical)
    0x09, 0x02, //     USAGE (0x02)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x26, 0xff, 0x00, //     LOGICAL_MAXIMUM (255)
    0x95, 0x07, //     REPORT_COUNT (7)
    0x75, 0x08, //     REPORT_SIZE (8)
    0x91, 0x02, //     OUTPUT (Data,Var,Abs)
    0xc0, //   END_COLLECTION
    0xc0, // END_COLLECTION
  ];

  // Vendor defined device with numbered input, output and feature reports.
  static VENDOR_REPORT_DESCRIPTOR: &[u8] = &[
    0x06, 0x00, 0xff, // USAGE_PAGE (Vendor Defined 0xFF00)
    0x09, 0x01, // USAGE (0x01)
    0xa1, 0x01, // COLLECTION (Application)
    0x85, 0x01, //   REPORT_ID (1)
    0x09, 0x02, //   USAGE (0x02)
    0x15, 0x00, //   LOGICAL_MINIMUM (0)
    0x26, 0xff, 0x00, //   LOGICAL_MAXIMUM (255)
    0x75, 0x08, //   REPORT_SIZE (8)
    0x95, 0x3f, //   REPORT_COUNT (63)
    0x81, 0x02, //   INPUT (Data,Var,Abs)
    0x85, 0x02, //   REPORT_ID (2)
    0x09, 0x03, //   USAGE (0x03)
    0x75, 0x08, //   REPORT_SIZE (8)
    0x95, 0x04, //   REPORT_COUNT (4)
    0xb1, 0x02, //   FEATURE (Data,Var,Abs)
    0x09, 0x04, //   USAGE (0x04)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x95, 0x03, //   REPORT_COUNT (3)
    0x91, 0x02, //   OUTPUT (Data,Var,Abs)
    0xc0, // END_COLLECTION
  ];

  // Mouse whose padding item relies on REPORT_SIZE carrying over from the button item.
  static MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x02, // USAGE (Mouse)
    0xa1, 0x01, // COLLECTION (Application)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x95, 0x03, //   REPORT_COUNT (3)
    0x05, 0x09, //   USAGE_PAGE (Button)
    0x19, 0x01, //   USAGE_MINIMUM (1)
    0x29, 0x03, //   USAGE_MAXIMUM (3)
    0x81, 0x02, //   INPUT (Data,Var,Abs)
    0x95, 0x05, //   REPORT_COUNT (5)
    0x81, 0x03, //   INPUT (Cnst,Var,Abs)
    0x75, 0x08, //   REPORT_SIZE (8)
    0x95, 0x02, //   REPORT_COUNT (2)
    0x05, 0x01, //   USAGE_PAGE (Generic Desktop)
    0x09, 0x30, //   USAGE (X)
    0x09, 0x31, //   USAGE (Y)
    0x15, 0x81, //   LOGICAL_MINIMUM (-127)
    0x25, 0x7f, //   LOGICAL_MAXIMUM (127)
    0x81, 0x06, //   INPUT (Data,Var,Rel)
    0xc0, // END_COLLECTION
  ];

  fn verify(descriptor: &[u8]) -> Result<super::VerifiedDescriptor, ReportDescriptorError> {
    ReportDescriptorVerifier::verify(descriptor, &VerifierOptions::default())
  }

  fn global_scope() -> VerifierOptions {
    VerifierOptions { report_field_scope: ReportFieldScope::Global, ..Default::default() }
  }

  #[test]
  fn joystick_descriptor_should_produce_13_byte_input_and_7_byte_output() {
    assert_eq!(JOYSTICK_REPORT_DESCRIPTOR.len(), 106);

    let descriptor = verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap();

    assert_eq!(
      descriptor.byte_lengths(),
      BTreeMap::from([(ReportKey::new(0, ReportType::Input), 13), (ReportKey::new(0, ReportType::Output), 7)])
    );
    assert_eq!(descriptor.bit_length(0, ReportType::Input), Some(4 * 16 + 4 + 4 + 25 + 7));
    assert_eq!(descriptor.bit_length(0, ReportType::Output), Some(56));
    assert_eq!(descriptor.byte_length(0, ReportType::Feature), None);
  }

  #[test]
  fn joystick_descriptor_fields_should_be_laid_out_in_order() {
    let descriptor = verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap();
    let input = ReportKey::new(0, ReportType::Input);

    let layout: Vec<_> = descriptor.fields_of(input).map(|field| (field.offset, field.bits.clone())).collect();
    assert_eq!(layout, [(38, 0..64), (58, 64..68), (64, 68..72), (80, 72..97), (86, 97..104)]);

    let manual_bits: u64 = descriptor.fields_of(input).map(|f| f.report_size as u64 * f.report_count as u64).sum();
    assert_eq!(manual_bits, 104);

    let axes = &descriptor.fields()[0];
    assert_eq!(axes.attributes, ReportAttributes { variable: true, ..Default::default() });
    assert_eq!(axes.collection_depth, 3);
    assert_eq!(
      axes.usages,
      [
        UsageRange::from(0x00010030..=0x00010030),
        UsageRange::from(0x00010031..=0x00010031),
        UsageRange::from(0x00010032..=0x00010032),
        UsageRange::from(0x00010035..=0x00010035),
      ]
    );

    let hat_padding = &descriptor.fields()[2];
    assert!(hat_padding.is_padding());

    let buttons = &descriptor.fields()[3];
    assert_eq!(buttons.usages, [UsageRange::from(0x00090001..=0x00090019)]);
    assert!(!buttons.is_padding());

    let output: Vec<_> = descriptor.fields_of(ReportKey::new(0, ReportType::Output)).collect();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].offset, 102);
    assert_eq!(output[0].bits, 0..56);
  }

  #[test]
  fn joystick_descriptor_collections_should_be_recorded() {
    let descriptor = verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap();
    let collections: Vec<_> = descriptor.collections().iter().map(|c| (c.offset, c.kind, c.usage, c.depth)).collect();
    assert_eq!(
      collections,
      [
        (4, CollectionKind::Application, Some(Usage::from(0x00010004)), 0),
        (6, CollectionKind::Logical, None, 1),
        (10, CollectionKind::Physical, Some(Usage::from(0x00010001)), 2),
        (89, CollectionKind::Logical, None, 1),
      ]
    );
  }

  #[test]
  fn verification_should_be_deterministic() {
    let first = verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap();
    let second = verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn report_count_zero_should_contribute_no_bits() {
    let descriptor: &[u8] = &[
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x00, // REPORT_COUNT (0)
      0x81, 0x03, // INPUT (Cnst,Var,Abs)
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x02, // REPORT_COUNT (2)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    let verified = verify(descriptor).unwrap();
    assert_eq!(verified.fields()[0].bits, 0..0);
    assert_eq!(verified.report(ReportKey::new(0, ReportType::Input)), Some(ReportLength { bits: 16, bytes: 2 }));

    let only_zero = verify(&[0x75, 0x08, 0x95, 0x00, 0xb1, 0x03]).unwrap();
    assert_eq!(only_zero.report(ReportKey::new(0, ReportType::Feature)), Some(ReportLength { bits: 0, bytes: 0 }));
  }

  #[test]
  fn unmatched_end_collection_should_fail_at_its_offset() {
    assert_eq!(
      verify(&[0xc0]),
      Err(ReportDescriptorError::UnbalancedCollection { offset: 0, reason: CollectionImbalance::UnmatchedEnd })
    );

    let mut descriptor = JOYSTICK_REPORT_DESCRIPTOR.to_vec();
    descriptor.push(0xc0);
    assert_eq!(
      verify(&descriptor),
      Err(ReportDescriptorError::UnbalancedCollection { offset: 106, reason: CollectionImbalance::UnmatchedEnd })
    );
  }

  #[test]
  fn unterminated_collection_should_fail() {
    let descriptor = &JOYSTICK_REPORT_DESCRIPTOR[..JOYSTICK_REPORT_DESCRIPTOR.len() - 1];
    assert_eq!(
      verify(descriptor),
      Err(ReportDescriptorError::UnbalancedCollection { offset: 4, reason: CollectionImbalance::Unterminated })
    );

    // innermost open collection is reported.
    let nested: &[u8] = &[0xa1, 0x01, 0xa1, 0x00];
    assert_eq!(verify(nested).unwrap_err().offset(), 2);
  }

  #[test]
  fn truncated_item_should_fail_at_item_start() {
    // PHYSICAL_MAXIMUM (315) with only one of its two data bytes.
    assert_eq!(
      verify(&JOYSTICK_REPORT_DESCRIPTOR[..51]),
      Err(ReportDescriptorError::TruncatedItem { offset: 49, needed: 2, available: 1 })
    );
    // LOGICAL_MAXIMUM (65535) with one of four data bytes.
    assert_eq!(
      verify(&JOYSTICK_REPORT_DESCRIPTOR[..24]),
      Err(ReportDescriptorError::TruncatedItem { offset: 22, needed: 4, available: 1 })
    );
  }

  #[test]
  fn numbered_reports_should_include_id_prefix_byte() {
    let descriptor = verify(VENDOR_REPORT_DESCRIPTOR).unwrap();
    assert_eq!(
      descriptor.byte_lengths(),
      BTreeMap::from([
        (ReportKey::new(1, ReportType::Input), 64),
        (ReportKey::new(2, ReportType::Output), 2),
        (ReportKey::new(2, ReportType::Feature), 5),
      ])
    );
    assert_eq!(descriptor.bit_length(2, ReportType::Output), Some(3));
  }

  #[test]
  fn report_id_zero_should_be_rejected() {
    assert_eq!(verify(&[0x85, 0x00]), Err(ReportDescriptorError::InvalidReportId { offset: 0, value: 0 }));
    assert_eq!(verify(&[0x84]), Err(ReportDescriptorError::InvalidReportId { offset: 0, value: 0 }));
    assert_eq!(
      verify(&[0x05, 0x01, 0x86, 0x00, 0x01]),
      Err(ReportDescriptorError::InvalidReportId { offset: 2, value: 256 })
    );
  }

  #[test]
  fn local_scope_should_clear_report_size_after_main_items() {
    let descriptor = verify(MOUSE_REPORT_DESCRIPTOR).unwrap();
    let input = ReportKey::new(0, ReportType::Input);
    // padding item restates only REPORT_COUNT, so it contributes nothing.
    assert_eq!(descriptor.bit_length(0, ReportType::Input), Some(3 + 16));
    assert_eq!(descriptor.byte_length(0, ReportType::Input), Some(3));
    let padding = descriptor.fields_of(input).nth(1).unwrap();
    assert_eq!((padding.report_size, padding.report_count), (0, 5));
  }

  #[test]
  fn global_scope_should_keep_report_size_across_main_items() {
    let descriptor = ReportDescriptorVerifier::verify(MOUSE_REPORT_DESCRIPTOR, &global_scope()).unwrap();
    assert_eq!(descriptor.bit_length(0, ReportType::Input), Some(3 + 5 + 16));
    assert_eq!(descriptor.byte_length(0, ReportType::Input), Some(3));

    // the joystick restates every size and count, so scoping makes no difference.
    let joystick = ReportDescriptorVerifier::verify(JOYSTICK_REPORT_DESCRIPTOR, &global_scope()).unwrap();
    assert_eq!(joystick.byte_lengths(), verify(JOYSTICK_REPORT_DESCRIPTOR).unwrap().byte_lengths());
  }

  #[test]
  fn push_and_pop_should_restore_global_state() {
    let descriptor: &[u8] = &[
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x02, // REPORT_COUNT (2)
      0xa4, // PUSH
      0x85, 0x07, // REPORT_ID (7)
      0x75, 0x01, // REPORT_SIZE (1)
      0x95, 0x04, // REPORT_COUNT (4)
      0x81, 0x02, // INPUT (Data,Var,Abs)
      0xb4, // POP
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    let verified = ReportDescriptorVerifier::verify(descriptor, &global_scope()).unwrap();
    assert_eq!(
      verified.byte_lengths(),
      BTreeMap::from([(ReportKey::new(7, ReportType::Input), 2), (ReportKey::new(0, ReportType::Input), 2)])
    );

    assert_eq!(verify(&[0x75, 0x08, 0xb4]), Err(ReportDescriptorError::InvalidPop { offset: 2 }));
  }

  #[test]
  fn long_items_should_be_skipped() {
    let descriptor: &[u8] = &[
      0xfe, 0x02, 0x10, 0xaa, 0xbb, // long item
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x01, // REPORT_COUNT (1)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    assert_eq!(verify(descriptor).unwrap().byte_length(0, ReportType::Input), Some(1));
  }

  #[test]
  fn unknown_items_should_not_verify() {
    // reserved main item tag.
    assert_eq!(
      verify(&[0xd0]),
      Err(ReportDescriptorError::InvalidItem { offset: 0, item_type: ReportItemType::Main, tag: 0x0d })
    );
    // reserved global item tag.
    assert_eq!(
      verify(&[0x75, 0x08, 0xc4]),
      Err(ReportDescriptorError::InvalidItem { offset: 2, item_type: ReportItemType::Global, tag: 0x0c })
    );
    // reserved local item tag.
    assert_eq!(
      verify(&[0x69, 0x00]),
      Err(ReportDescriptorError::InvalidItem { offset: 0, item_type: ReportItemType::Local, tag: 0x06 })
    );
    // reserved item type.
    assert_eq!(
      verify(&[0x0c]),
      Err(ReportDescriptorError::InvalidItem { offset: 0, item_type: ReportItemType::Reserved, tag: 0x00 })
    );
  }

  #[test]
  fn logical_range_validation_is_optional() {
    let descriptor: &[u8] = &[
      0x15, 0x05, // LOGICAL_MINIMUM (5)
      0x25, 0x01, // LOGICAL_MAXIMUM (1)
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x01, // REPORT_COUNT (1)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    assert_eq!(verify(descriptor).unwrap().byte_length(0, ReportType::Input), Some(1));

    let options = VerifierOptions { validate_logical_range: true, ..Default::default() };
    assert_eq!(
      ReportDescriptorVerifier::verify(descriptor, &options),
      Err(ReportDescriptorError::MalformedNumericRange { offset: 8, minimum: 5, maximum: 1 })
    );

    // signed ranges compare signed; the joystick and mouse ranges are fine.
    assert!(ReportDescriptorVerifier::verify(MOUSE_REPORT_DESCRIPTOR, &options).is_ok());
    assert!(ReportDescriptorVerifier::verify(JOYSTICK_REPORT_DESCRIPTOR, &options).is_ok());
    let inverted: &[u8] = &[0x15, 0xff, 0x25, 0x81, 0x75, 0x08, 0x95, 0x01, 0x91, 0x02];
    assert_eq!(
      ReportDescriptorVerifier::verify(inverted, &options),
      Err(ReportDescriptorError::MalformedNumericRange { offset: 8, minimum: -1, maximum: -127 })
    );
  }

  #[test]
  fn non_negative_minimum_should_compare_maximum_unsigned() {
    let descriptor: &[u8] = &[
      0x15, 0x00, // LOGICAL_MINIMUM (0)
      0x25, 0xff, // LOGICAL_MAXIMUM (255), -1 if read signed
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x01, // REPORT_COUNT (1)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    let options = VerifierOptions { validate_logical_range: true, ..Default::default() };
    let verified = ReportDescriptorVerifier::verify(descriptor, &options).unwrap();
    assert_eq!(verified.byte_length(0, ReportType::Input), Some(1));
  }

  #[test]
  fn delimiter_and_string_items_should_not_change_widths() {
    let plain: &[u8] = &[
      0x09, 0x30, // USAGE (X)
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x01, // REPORT_COUNT (1)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    let annotated: &[u8] = &[
      0xa9, 0x01, // DELIMITER (Open)
      0x09, 0x30, // USAGE (X)
      0xa9, 0x00, // DELIMITER (Close)
      0x79, 0x04, // STRING_INDEX (4)
      0x89, 0x01, // STRING_MINIMUM (1)
      0x99, 0x02, // STRING_MAXIMUM (2)
      0x75, 0x08, // REPORT_SIZE (8)
      0x95, 0x01, // REPORT_COUNT (1)
      0x81, 0x02, // INPUT (Data,Var,Abs)
    ];
    let plain = verify(plain).unwrap();
    let annotated = verify(annotated).unwrap();
    assert_eq!(annotated.byte_lengths(), plain.byte_lengths());
    assert_eq!(annotated.fields()[0].bits, 0..8);
    assert_eq!(annotated.fields()[0].usages, plain.fields()[0].usages);
  }

  #[test]
  fn empty_descriptor_should_verify_to_no_reports() {
    let descriptor = verify(&[]).unwrap();
    assert!(descriptor.byte_lengths().is_empty());
    assert!(descriptor.fields().is_empty());
  }

  // (report size, report count) pairs for a run of INPUT items.
  fn field_dimensions() -> impl Strategy<Value = Vec<(u8, u8)>> {
    proptest::collection::vec((0u8..=32, any::<u8>()), 0..16)
  }

  fn build_descriptor(dimensions: &[(u8, u8)]) -> Vec<u8> {
    let mut descriptor = Vec::from([0x05, 0x01, 0x09, 0x04, 0xa1, 0x01]);
    for &(size, count) in dimensions {
      descriptor.extend_from_slice(&[0x75, size, 0x95, count, 0x81, 0x02]);
    }
    descriptor.push(0xc0);
    descriptor
  }

  proptest! {
    #[test]
    fn prop_verification_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
      prop_assert_eq!(verify(&bytes), verify(&bytes));
    }

    #[test]
    fn prop_input_bits_are_the_sum_of_size_times_count(dimensions in field_dimensions()) {
      let descriptor = verify(&build_descriptor(&dimensions)).unwrap();
      let expected: u64 = dimensions.iter().map(|&(size, count)| size as u64 * count as u64).sum();
      if dimensions.is_empty() {
        prop_assert_eq!(descriptor.bit_length(0, ReportType::Input), None);
      } else {
        prop_assert_eq!(descriptor.bit_length(0, ReportType::Input), Some(expected));
        prop_assert_eq!(descriptor.byte_length(0, ReportType::Input), Some(expected.div_ceil(8)));
      }
    }

    #[test]
    fn prop_report_count_zero_contributes_nothing(size in 1u8..=32, dimensions in field_dimensions()) {
      let with_zero: Vec<_> = dimensions.iter().copied().chain([(size, 0)]).collect();
      let plain = verify(&build_descriptor(&dimensions)).unwrap();
      let padded = verify(&build_descriptor(&with_zero)).unwrap();
      prop_assert_eq!(
        padded.bit_length(0, ReportType::Input),
        Some(plain.bit_length(0, ReportType::Input).unwrap_or(0))
      );
    }
  }
}
