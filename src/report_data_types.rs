//! Report Descriptor Data Types
//!
//! This module contains the value types tracked while verifying a report descriptor and the keys used to identify
//! the reports it defines.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::{fmt, ops::RangeInclusive};

use crate::utils::{i32_from_bytes, u32_from_bytes};

/// Usage page global item data type.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePage(u16);
impl From<&[u8]> for UsagePage {
  fn from(bytes: &[u8]) -> Self {
    UsagePage(u32_from_bytes(bytes) as u16)
  }
}
impl From<u16> for UsagePage {
  fn from(val: u16) -> Self {
    UsagePage(val)
  }
}
impl From<UsagePage> for u16 {
  fn from(val: UsagePage) -> Self {
    val.0
  }
}

/// Logical minimum global item data type. Decoded as signed, sign-extended from the width of the item data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogicalMinimum(i32);
impl From<&[u8]> for LogicalMinimum {
  fn from(bytes: &[u8]) -> Self {
    LogicalMinimum(i32_from_bytes(bytes))
  }
}
impl From<i32> for LogicalMinimum {
  fn from(val: i32) -> Self {
    LogicalMinimum(val)
  }
}
impl From<LogicalMinimum> for i32 {
  fn from(val: LogicalMinimum) -> Self {
    val.0
  }
}

/// Logical maximum global item data type. Decoded as signed, sign-extended from the width of the item data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogicalMaximum(i32);
impl From<&[u8]> for LogicalMaximum {
  fn from(bytes: &[u8]) -> Self {
    LogicalMaximum(i32_from_bytes(bytes))
  }
}
impl From<i32> for LogicalMaximum {
  fn from(val: i32) -> Self {
    LogicalMaximum(val)
  }
}
impl From<LogicalMaximum> for i32 {
  fn from(val: LogicalMaximum) -> Self {
    val.0
  }
}
impl From<LogicalMaximum> for u32 {
  fn from(val: LogicalMaximum) -> Self {
    val.0 as u32
  }
}

/// Report Size global item data type (bits per field).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSize(u32);
impl From<&[u8]> for ReportSize {
  fn from(bytes: &[u8]) -> Self {
    ReportSize(u32_from_bytes(bytes))
  }
}
impl From<u32> for ReportSize {
  fn from(val: u32) -> Self {
    ReportSize(val)
  }
}
impl From<ReportSize> for u32 {
  fn from(val: ReportSize) -> Self {
    val.0
  }
}

/// Report count global item data type (number of fields).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportCount(u32);
impl From<&[u8]> for ReportCount {
  fn from(bytes: &[u8]) -> Self {
    ReportCount(u32_from_bytes(bytes))
  }
}
impl From<u32> for ReportCount {
  fn from(val: u32) -> Self {
    ReportCount(val)
  }
}
impl From<ReportCount> for u32 {
  fn from(val: ReportCount) -> Self {
    val.0
  }
}

/// Report Id. Id 0 is reserved by HID and stands for "unnumbered reports", i.e. reports sent without an id prefix
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ReportId(u8);

impl ReportId {
  /// The id used for reports of a descriptor that never declares a REPORT_ID item.
  pub const UNNUMBERED: ReportId = ReportId(0);

  /// Returns true if reports with this id are transmitted with a leading id byte.
  pub fn has_prefix_byte(&self) -> bool {
    self.0 != 0
  }
}
impl Default for ReportId {
  fn default() -> Self {
    ReportId::UNNUMBERED
  }
}
impl From<u8> for ReportId {
  fn from(val: u8) -> Self {
    ReportId(val)
  }
}
impl From<ReportId> for u8 {
  fn from(val: ReportId) -> Self {
    val.0
  }
}
impl From<ReportId> for u32 {
  fn from(val: ReportId) -> Self {
    val.0 as u32
  }
}
impl fmt::Display for ReportId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The three kinds of report a descriptor can define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportType {
  Input,
  Output,
  Feature,
}

impl fmt::Display for ReportType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ReportType::Input => "Input",
      ReportType::Output => "Output",
      ReportType::Feature => "Feature",
    };
    f.write_str(name)
  }
}

/// Identifies one report: the report id together with the report type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportKey {
  pub report_id: ReportId,
  pub report_type: ReportType,
}

impl ReportKey {
  pub fn new(report_id: impl Into<ReportId>, report_type: ReportType) -> Self {
    ReportKey { report_id: report_id.into(), report_type }
  }
}

impl From<(u8, ReportType)> for ReportKey {
  fn from((report_id, report_type): (u8, ReportType)) -> Self {
    ReportKey::new(report_id, report_type)
  }
}

impl fmt::Display for ReportKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} report {}", self.report_type, self.report_id)
  }
}

/// Usage data type. This type can represent either the full 32-bit usage (if page is non-zero) or just the id (if page
/// is zero).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Usage(u32);

impl Usage {
  /// Creates a Usage from the optional UsagePage and Id.
  pub fn from_page_and_id(page: Option<UsagePage>, id: Usage) -> Self {
    let mut usage = id.0;
    if let Some(page) = page {
      if usage & 0xFFFF0000 == 0 {
        usage |= (u16::from(page) as u32) << 16;
      }
    }
    Usage(usage)
  }

  pub fn page(&self) -> u16 {
    (self.0 >> 16) as u16
  }
  pub fn id(&self) -> u16 {
    (self.0 & 0xFFFF) as u16
  }
}
impl From<u32> for Usage {
  fn from(val: u32) -> Self {
    Usage(val)
  }
}
impl From<Usage> for u32 {
  fn from(val: Usage) -> Self {
    val.0
  }
}

/// Represents a range of usages. This is computed using the USAGE_MINIMUM and USAGE_MAXIMUM local items in the
/// descriptor, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRange(RangeInclusive<u32>);

impl UsageRange {
  pub fn start(&self) -> u32 {
    *self.0.start()
  }
  pub fn end(&self) -> u32 {
    *self.0.end()
  }
}

impl From<RangeInclusive<u32>> for UsageRange {
  fn from(val: RangeInclusive<u32>) -> Self {
    UsageRange(val)
  }
}

/// Collection types, from the data of a COLLECTION main item. See HID spec 1.11 section 6.2.2.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
  Physical,
  Application,
  Logical,
  Report,
  NamedArray,
  UsageSwitch,
  UsageModifier,
  Reserved(u8),
  VendorDefined(u8),
}

impl From<&[u8]> for CollectionKind {
  fn from(bytes: &[u8]) -> Self {
    match u32_from_bytes(bytes) as u8 {
      0x00 => CollectionKind::Physical,
      0x01 => CollectionKind::Application,
      0x02 => CollectionKind::Logical,
      0x03 => CollectionKind::Report,
      0x04 => CollectionKind::NamedArray,
      0x05 => CollectionKind::UsageSwitch,
      0x06 => CollectionKind::UsageModifier,
      kind @ 0x07..=0x7f => CollectionKind::Reserved(kind),
      kind => CollectionKind::VendorDefined(kind),
    }
  }
}

/// Describes the attributes of an Input/Output/Feature main item.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportAttributes {
  pub constant: bool,
  pub variable: bool,
  pub relative: bool,
  pub wrap: bool,
  pub nonlinear: bool,
  pub no_preferred: bool,
  pub null_state: bool,
  pub volatile: bool,
  pub buffered_bytes: bool,
}

impl From<&[u8]> for ReportAttributes {
  fn from(data: &[u8]) -> Self {
    let attributes = u32_from_bytes(data);
    ReportAttributes {
      constant: (attributes & 0b000000001) != 0,       //0
      variable: (attributes & 0b000000010) != 0,       //1
      relative: (attributes & 0b000000100) != 0,       //2
      wrap: (attributes & 0b000001000) != 0,           //3
      nonlinear: (attributes & 0b000010000) != 0,      //4
      no_preferred: (attributes & 0b000100000) != 0,   //5
      null_state: (attributes & 0b001000000) != 0,     //6
      volatile: (attributes & 0b010000000) != 0,       //7
      buffered_bytes: (attributes & 0b100000000) != 0, //8
    }
  }
}
