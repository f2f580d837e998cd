//! Descriptor Loading
//!
//! Reads a report descriptor from disk either as raw bytes or as a hex listing, i.e. a text file of byte tokens such as
//! `0x05, 0x01, # Usage Page (Generic Desktop)`.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use std::{fs, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::debug;

/// On-disk encoding of a descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescriptorFormat {
  /// Hex listing if the file parses as one, raw bytes otherwise.
  Auto,
  Binary,
  Hex,
}

pub fn load_descriptor(path: &Path, format: DescriptorFormat) -> Result<Vec<u8>> {
  let raw = fs::read(path).with_context(|| format!("failed to read descriptor {}", path.display()))?;
  decode_descriptor(&raw, format).with_context(|| format!("failed to decode descriptor {}", path.display()))
}

pub fn decode_descriptor(raw: &[u8], format: DescriptorFormat) -> Result<Vec<u8>> {
  match format {
    DescriptorFormat::Binary => Ok(raw.to_vec()),
    DescriptorFormat::Hex => parse_hex_listing(std::str::from_utf8(raw).context("hex listing is not valid UTF-8")?),
    DescriptorFormat::Auto => match std::str::from_utf8(raw).ok().filter(|text| looks_like_hex_listing(text)) {
      Some(text) => {
        let bytes = parse_hex_listing(text)?;
        debug!(len = bytes.len(), "decoded hex listing");
        Ok(bytes)
      }
      None => {
        debug!(len = raw.len(), "treating descriptor as binary");
        Ok(raw.to_vec())
      }
    },
  }
}

/// Parses byte tokens separated by whitespace or commas. Tokens are hex with an optional `0x` prefix; `#` and `//`
/// start a comment that runs to the end of the line.
pub fn parse_hex_listing(text: &str) -> Result<Vec<u8>> {
  let mut bytes = Vec::new();
  for (index, line) in text.lines().enumerate() {
    let line = strip_comment(line);
    for token in line.split(|c: char| c.is_whitespace() || c == ',').filter(|token| !token.is_empty()) {
      let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
      if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("line {}: {token:?} is not a hex byte", index + 1);
      }
      bytes.push(u8::from_str_radix(digits, 16)?);
    }
  }
  Ok(bytes)
}

/// Text counts as a hex listing only if it parses to at least one byte and carries a `0x` token, a comma or a comment.
fn looks_like_hex_listing(text: &str) -> bool {
  let marked = text.lines().any(|line| {
    let code = strip_comment(line);
    code.len() != line.len() || code.contains(',') || code.contains("0x") || code.contains("0X")
  });
  marked && parse_hex_listing(text).is_ok_and(|bytes| !bytes.is_empty())
}

fn strip_comment(line: &str) -> &str {
  let end = [line.find('#'), line.find("//")].into_iter().flatten().min().unwrap_or(line.len());
  &line[..end]
}
