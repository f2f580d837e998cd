//! Expected Report Lengths
//!
//! Parses `TYPE:ID=BYTES` arguments (for example `input:0=13`) and compares them with the lengths computed for a
//! verified descriptor.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use std::str::FromStr;

use hidverifier::{
  report_data_types::{ReportKey, ReportType},
  VerifiedDescriptor,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpectationError {
  #[error("expected TYPE:ID=BYTES, got {0:?}")]
  Syntax(String),
  #[error("unknown report type {0:?}, expected input, output or feature")]
  ReportType(String),
  #[error("invalid report id {0:?}, expected 0..=255")]
  ReportId(String),
  #[error("invalid byte length {0:?}")]
  Length(String),
}

/// An expected byte length for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
  pub report: ReportKey,
  pub bytes: u64,
}

impl FromStr for Expectation {
  type Err = ExpectationError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    let (report, bytes) = value.split_once('=').ok_or_else(|| ExpectationError::Syntax(value.to_string()))?;
    let (report_type, report_id) = report.split_once(':').ok_or_else(|| ExpectationError::Syntax(value.to_string()))?;

    let report_type = match report_type.trim().to_ascii_lowercase().as_str() {
      "input" => ReportType::Input,
      "output" => ReportType::Output,
      "feature" => ReportType::Feature,
      _ => return Err(ExpectationError::ReportType(report_type.to_string())),
    };
    let report_id: u8 = report_id.trim().parse().map_err(|_| ExpectationError::ReportId(report_id.to_string()))?;
    let bytes = bytes.trim().parse().map_err(|_| ExpectationError::Length(bytes.to_string()))?;

    Ok(Expectation { report: ReportKey::from((report_id, report_type)), bytes })
  }
}

/// A report whose computed length differs from the expectation. `actual` is `None` if the descriptor does not define
/// the report at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}: expected {} bytes, {}", .expected.report, .expected.bytes, describe_actual(.actual))]
pub struct Mismatch {
  pub expected: Expectation,
  pub actual: Option<u64>,
}

fn describe_actual(actual: &Option<u64>) -> String {
  match actual {
    Some(bytes) => format!("descriptor defines {bytes}"),
    None => "descriptor does not define it".to_string(),
  }
}

impl Expectation {
  pub fn check(&self, descriptor: &VerifiedDescriptor) -> Result<(), Mismatch> {
    let actual = descriptor.report(self.report).map(|length| length.bytes);
    if actual == Some(self.bytes) {
      Ok(())
    } else {
      Err(Mismatch { expected: *self, actual })
    }
  }
}
