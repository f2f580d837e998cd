//! HID Report Descriptor Verification Utility
//!
//! Simple command line utility that verifies a report descriptor and prints the length and layout of the reports it
//! defines. Expected lengths can be given on the command line to turn the run into a check.
//!
//! Demonstrates the usage of the [`hidverifier`] crate.
//!
//! # Usage
//!
//! `hidverify --path samples/joystick.hex --expect input:0=13 --expect output:0=7`
//!
//! or
//!
//! `cargo run -p hidverify -- --path hidverify/samples/joystick.hex --json`
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
mod descriptor_source;
mod expectation;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use hidverifier::{
  report_data_types::{ReportKey, ReportType, Usage, UsageRange},
  verify_report_descriptor_with, ReportField, ReportFieldScope, VerifiedDescriptor, VerifierOptions,
};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use descriptor_source::{load_descriptor, DescriptorFormat};
use expectation::{Expectation, Mismatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportTypeArg {
  Input,
  Output,
  Feature,
}

impl From<ReportTypeArg> for ReportType {
  fn from(arg: ReportTypeArg) -> Self {
    match arg {
      ReportTypeArg::Input => ReportType::Input,
      ReportTypeArg::Output => ReportType::Output,
      ReportTypeArg::Feature => ReportType::Feature,
    }
  }
}

/// Verifies a HID report descriptor and prints the length of every report it defines.
#[derive(Parser, Debug)]
#[command(version)]
struct Arguments {
  /// The path containing the descriptor.
  #[arg(short, long)]
  path: PathBuf,

  /// How the descriptor file is encoded.
  #[arg(short, long, value_enum, default_value_t = DescriptorFormat::Auto)]
  format: DescriptorFormat,

  /// Type of report to list
  #[arg(short, long, value_enum)]
  report_type: Option<ReportTypeArg>,

  /// Id of report to list
  #[arg(short = 'i', long)]
  report_id: Option<u8>,

  /// Keep REPORT_SIZE and REPORT_COUNT in effect across main items (HID 1.11 global item behavior).
  #[arg(long)]
  global_report_fields: bool,

  /// Reject main items whose logical minimum exceeds their logical maximum.
  #[arg(long)]
  validate_ranges: bool,

  /// Expected report length, e.g. `input:0=13`. May be repeated.
  #[arg(short, long = "expect", value_name = "TYPE:ID=BYTES")]
  expect: Vec<Expectation>,

  /// Print the result as JSON.
  #[arg(long)]
  json: bool,

  /// Increase log verbosity. RUST_LOG overrides this.
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

impl Arguments {
  fn verifier_options(&self) -> VerifierOptions {
    VerifierOptions {
      report_field_scope: if self.global_report_fields { ReportFieldScope::Global } else { ReportFieldScope::Local },
      validate_logical_range: self.validate_ranges,
    }
  }

  fn selects(&self, key: ReportKey) -> bool {
    match (self.report_type, self.report_id) {
      (Some(requested_type), _) if ReportType::from(requested_type) != key.report_type => false,
      (_, Some(requested_id)) if requested_id != u8::from(key.report_id) => false,
      _ => true,
    }
  }
}

#[derive(Serialize)]
struct JsonField {
  offset: usize,
  bit_start: u64,
  bit_end: u64,
  report_size: u32,
  report_count: u32,
  constant: bool,
  variable: bool,
  padding: bool,
}

#[derive(Serialize)]
struct JsonReport {
  report_id: u8,
  report_type: String,
  bits: u64,
  bytes: u64,
  fields: Vec<JsonField>,
}

#[derive(Serialize)]
struct JsonOutput {
  descriptor_len: usize,
  reports: Vec<JsonReport>,
  mismatches: Vec<String>,
}

fn init_logging(verbose: u8) {
  let filter = match verbose {
    0 => "hidverify=warn,hidverifier=warn",
    1 => "hidverify=info,hidverifier=info",
    2 => "hidverify=debug,hidverifier=debug",
    _ => "hidverify=trace,hidverifier=trace",
  };

  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

  if let Err(err) = tracing_subscriber::registry()
    .with(env_filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .try_init()
  {
    eprintln!("failed to initialize tracing: {err}");
  }
}

fn bit_span(field: &ReportField) -> String {
  match field.bits.end - field.bits.start {
    0 => format!("bits: none (at {})", field.bits.start),
    1 => format!("bit: {}", field.bits.start),
    _ => format!("bits: {}..={}", field.bits.start, field.bits.end - 1),
  }
}

fn usage_span(range: &UsageRange) -> String {
  let (start, end) = (Usage::from(range.start()), Usage::from(range.end()));
  if start.page() == end.page() {
    format!("{:#06x}:{:#06x}..={:#06x}", start.page(), start.id(), end.id())
  } else {
    format!("{:#06x}:{:#06x}..={:#06x}:{:#06x}", start.page(), start.id(), end.page(), end.id())
  }
}

fn print_text(descriptor: &VerifiedDescriptor, args: &Arguments) {
  for (key, length) in descriptor.reports().filter(|(key, _)| args.selects(*key)) {
    println!("{} id: {}\tbits: {}\tbytes: {}", key.report_type, key.report_id, length.bits, length.bytes);
    for field in descriptor.fields_of(key) {
      let bits = bit_span(field);
      let description = if field.is_padding() {
        "padding".to_string()
      } else {
        let kind = if field.attributes.variable { "variable" } else { "array" };
        let usages: Vec<_> = field.usages.iter().map(usage_span).collect();
        format!("{kind} {}x{}\tusages: [{}]", field.report_count, field.report_size, usages.join(", "))
      };
      println!("\t{bits}\t{description}\t(offset {})", field.offset);
    }
  }
}

fn json_output(
  descriptor: &VerifiedDescriptor,
  descriptor_len: usize,
  args: &Arguments,
  mismatches: &[String],
) -> JsonOutput {
  let reports = descriptor
    .reports()
    .filter(|(key, _)| args.selects(*key))
    .map(|(key, length)| JsonReport {
      report_id: key.report_id.into(),
      report_type: key.report_type.to_string(),
      bits: length.bits,
      bytes: length.bytes,
      fields: descriptor
        .fields_of(key)
        .map(|field| JsonField {
          offset: field.offset,
          bit_start: field.bits.start,
          bit_end: field.bits.end,
          report_size: field.report_size,
          report_count: field.report_count,
          constant: field.attributes.constant,
          variable: field.attributes.variable,
          padding: field.is_padding(),
        })
        .collect(),
    })
    .collect();
  JsonOutput { descriptor_len, reports, mismatches: mismatches.to_vec() }
}

/// Verifies the descriptor, prints the result and returns the expectations it failed.
fn run(args: &Arguments) -> anyhow::Result<Vec<Mismatch>> {
  let raw_descriptor = load_descriptor(&args.path, args.format)?;
  info!(path = %args.path.display(), len = raw_descriptor.len(), "loaded descriptor");

  let descriptor = verify_report_descriptor_with(&raw_descriptor, &args.verifier_options())
    .with_context(|| format!("{} is not a valid report descriptor", args.path.display()))?;

  let mismatches: Vec<Mismatch> =
    args.expect.iter().filter_map(|expected| expected.check(&descriptor).err()).collect();

  if args.json {
    let messages: Vec<String> = mismatches.iter().map(|mismatch| mismatch.to_string()).collect();
    let output = json_output(&descriptor, raw_descriptor.len(), args, &messages);
    println!("{}", serde_json::to_string_pretty(&output)?);
  } else {
    println!("Descriptor size: {} bytes", raw_descriptor.len());
    print_text(&descriptor, args);
    for mismatch in &mismatches {
      println!("MISMATCH {mismatch}");
    }
  }

  for mismatch in &mismatches {
    error!(%mismatch, "report length mismatch");
  }
  Ok(mismatches)
}

fn main() -> ExitCode {
  let args = Arguments::parse();
  init_logging(args.verbose);

  match run(&args) {
    Ok(mismatches) if mismatches.is_empty() => ExitCode::SUCCESS,
    Ok(_) => ExitCode::FAILURE,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}
