// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Input parsers for the two line-oriented file formats.
//!
//! The mixture description file names one distribution per line:
//!
//! ```text
//! <name> (<mu_min>,<mu_max>) (<sigma_min>,<sigma_max>) <mu_var> <sigma_var>
//! ```
//!
//! The sample file is one number per line. Blank lines and `#` comments are
//! skipped in both.

use crate::problem::Normal;
use std::io;
use std::path::Path;

fn bad_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Parse `(a,b)` into a pair of floats.
fn parse_pair(field: &str, lineno: usize) -> io::Result<(f64, f64)> {
    let inner = field
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| bad_data(format!("line {}: expected (a,b), got {:?}", lineno, field)))?;
    let (a, b) = inner
        .split_once(',')
        .ok_or_else(|| bad_data(format!("line {}: expected (a,b), got {:?}", lineno, field)))?;
    let a = a
        .trim()
        .parse()
        .map_err(|e| bad_data(format!("line {}: bad number {:?}: {}", lineno, a, e)))?;
    let b = b
        .trim()
        .parse()
        .map_err(|e| bad_data(format!("line {}: bad number {:?}: {}", lineno, b, e)))?;
    Ok((a, b))
}

/// Parse a mixture description.
pub fn parse_norms(text: &str) -> io::Result<Vec<Normal>> {
    let mut norms = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(bad_data(format!(
                "line {}: expected 5 fields (name (mu) (sigma) mu_var sigma_var), got {}",
                lineno,
                fields.len()
            )));
        }
        let (mu_min, mu_max) = parse_pair(fields[1], lineno)?;
        let (sigma_min, sigma_max) = parse_pair(fields[2], lineno)?;
        let mu_var = fields[3]
            .parse()
            .map_err(|e| bad_data(format!("line {}: bad mu_var: {}", lineno, e)))?;
        let sigma_var = fields[4]
            .parse()
            .map_err(|e| bad_data(format!("line {}: bad sigma_var: {}", lineno, e)))?;

        norms.push(Normal {
            name: fields[0].to_string(),
            mu_min,
            mu_max,
            sigma_min,
            sigma_max,
            mu_var,
            sigma_var,
        });
    }
    if norms.is_empty() {
        return Err(bad_data("mixture file describes no distributions".into()));
    }
    Ok(norms)
}

/// Parse the sample file: one value per line.
pub fn parse_samples(text: &str) -> io::Result<Vec<f64>> {
    let mut samples = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let v = line
            .parse()
            .map_err(|e| bad_data(format!("line {}: bad sample {:?}: {}", idx + 1, line, e)))?;
        samples.push(v);
    }
    if samples.is_empty() {
        return Err(bad_data("sample file contains no data".into()));
    }
    Ok(samples)
}

pub fn read_norms_file(path: &Path) -> io::Result<Vec<Normal>> {
    parse_norms(&std::fs::read_to_string(path)?)
}

pub fn read_samples_file(path: &Path) -> io::Result<Vec<f64>> {
    parse_samples(&std::fs::read_to_string(path)?)
}
