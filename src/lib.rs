//! HID Report Descriptor Verifier
//!
//! This crate walks a raw HID report descriptor, checks it against the structural rules of the item format and
//! computes the length of every Input, Output and Feature report it defines, keyed by report id and report type.
//!
//! Refer to the USB Device Class Definition for Human Interface Devices (HID) Version 1.11
//! <https://www.usb.org/sites/default/files/hid1_11.pdf>
//!
//! ## Example
//! ```
//! # use hidverifier::verify_report_descriptor;
//! # use hidverifier::report_data_types::{ReportKey, ReportType};
//!
//!   let GAMEPAD_REPORT_DESCRIPTOR: &[u8] = &[
//!     0x05, 0x01, // USAGE_PAGE (Generic Desktop)
//!     0x09, 0x05, // USAGE (Game Pad)
//!     0xa1, 0x01, // COLLECTION (Application)
//!     0x09, 0x30, //   USAGE (X)
//!     0x09, 0x31, //   USAGE (Y)
//!     0x15, 0x81, //   LOGICAL_MINIMUM (-127)
//!     0x25, 0x7f, //   LOGICAL_MAXIMUM (127)
//!     0x75, 0x08, //   REPORT_SIZE (8)
//!     0x95, 0x02, //   REPORT_COUNT (2)
//!     0x81, 0x02, //   INPUT (Data,Var,Abs)
//!     0x05, 0x09, //   USAGE_PAGE (Button)
//!     0x19, 0x01, //   USAGE_MINIMUM (1)
//!     0x29, 0x0a, //   USAGE_MAXIMUM (10)
//!     0x15, 0x00, //   LOGICAL_MINIMUM (0)
//!     0x25, 0x01, //   LOGICAL_MAXIMUM (1)
//!     0x75, 0x01, //   REPORT_SIZE (1)
//!     0x95, 0x0a, //   REPORT_COUNT (10)
//!     0x81, 0x02, //   INPUT (Data,Var,Abs)
//!     0x75, 0x06, //   REPORT_SIZE (6)
//!     0x95, 0x01, //   REPORT_COUNT (1)
//!     0x81, 0x03, //   INPUT (Cnst,Var,Abs)
//!     0xc0, // END_COLLECTION
//!   ];
//!
//!   let descriptor = verify_report_descriptor(GAMEPAD_REPORT_DESCRIPTOR).unwrap();
//!
//!   // 2 axes of 8 bits, 10 buttons and 6 bits of padding: 32 bits.
//!   assert_eq!(descriptor.bit_length(0, ReportType::Input), Some(32));
//!   assert_eq!(descriptor.byte_length(0, ReportType::Input), Some(4));
//!
//!   // no report id was declared, so there is a single unnumbered input report and nothing else.
//!   assert_eq!(descriptor.byte_lengths().len(), 1);
//!
//!   // the buttons occupy bits 16 through 25 of the input report.
//!   let buttons = descriptor.fields_of(ReportKey::new(0, ReportType::Input)).nth(1).unwrap();
//!   assert_eq!(buttons.bits, 16..26);
//! ```
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

#![no_std]
pub mod item_tokenizer;
pub mod report_data_types;
pub mod report_descriptor_verifier;
mod utils;

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

use alloc::{collections::BTreeMap, vec::Vec};
use core::ops::Range;

pub use report_descriptor_verifier::{
  CollectionImbalance, ReportDescriptorError, ReportDescriptorVerifier, ReportFieldScope, VerifierOptions,
};
use report_data_types::{CollectionKind, ReportAttributes, ReportKey, ReportType, Usage, UsageRange};

/// Length of one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLength {
  /// Sum of report size x report count over every main item of the report.
  pub bits: u64,
  /// Bits rounded up to whole bytes, plus the report id prefix byte for numbered reports.
  pub bytes: u64,
}

/// Describes the bits contributed by one Input/Output/Feature main item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportField {
  /// Offset of the main item within the descriptor.
  pub offset: usize,
  /// The report the bits were added to.
  pub report: ReportKey,
  /// The bit range the item occupies in the report, excluding any report id prefix byte.
  pub bits: Range<u64>,
  pub report_size: u32,
  pub report_count: u32,
  pub attributes: ReportAttributes,
  /// Usages declared for the item, with the usage page applied.
  pub usages: Vec<UsageRange>,
  /// Number of collections open around the item.
  pub collection_depth: usize,
}

impl ReportField {
  /// Constant fields without usages only pad the report.
  pub fn is_padding(&self) -> bool {
    self.attributes.constant && self.usages.is_empty()
  }
}

/// Describes a collection found in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCollection {
  /// Offset of the COLLECTION item.
  pub offset: usize,
  pub kind: CollectionKind,
  /// First usage declared before the collection, if any.
  pub usage: Option<Usage>,
  /// Number of collections enclosing this one.
  pub depth: usize,
}

/// The result of verifying a report descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDescriptor {
  reports: BTreeMap<ReportKey, ReportLength>,
  fields: Vec<ReportField>,
  collections: Vec<ReportCollection>,
}

impl VerifiedDescriptor {
  /// Returns the length of every report, ordered by report id then report type.
  pub fn reports(&self) -> impl Iterator<Item = (ReportKey, ReportLength)> + '_ {
    self.reports.iter().map(|(key, length)| (*key, *length))
  }

  pub fn report(&self, key: ReportKey) -> Option<ReportLength> {
    self.reports.get(&key).copied()
  }

  /// Returns the byte length of the given report, including the id prefix byte for numbered reports.
  pub fn byte_length(&self, report_id: u8, report_type: ReportType) -> Option<u64> {
    self.report(ReportKey::new(report_id, report_type)).map(|length| length.bytes)
  }

  pub fn bit_length(&self, report_id: u8, report_type: ReportType) -> Option<u64> {
    self.report(ReportKey::new(report_id, report_type)).map(|length| length.bits)
  }

  /// Returns the mapping from (report id, report type) to byte length.
  pub fn byte_lengths(&self) -> BTreeMap<ReportKey, u64> {
    self.reports().map(|(key, length)| (key, length.bytes)).collect()
  }

  /// Returns every field in descriptor order.
  pub fn fields(&self) -> &[ReportField] {
    &self.fields
  }

  /// Returns the fields of a single report in the order they are laid out.
  pub fn fields_of(&self, key: ReportKey) -> impl Iterator<Item = &ReportField> + '_ {
    self.fields.iter().filter(move |field| field.report == key)
  }

  /// Returns every collection in descriptor order.
  pub fn collections(&self) -> &[ReportCollection] {
    &self.collections
  }
}

/// Verify the raw report descriptor in the given byte slice with the default options.
pub fn verify_report_descriptor(report_descriptor: &[u8]) -> Result<VerifiedDescriptor, ReportDescriptorError> {
  ReportDescriptorVerifier::verify(report_descriptor, &VerifierOptions::default())
}

/// Verify the raw report descriptor in the given byte slice with explicit options.
pub fn verify_report_descriptor_with(
  report_descriptor: &[u8],
  options: &VerifierOptions,
) -> Result<VerifiedDescriptor, ReportDescriptorError> {
  ReportDescriptorVerifier::verify(report_descriptor, options)
}
