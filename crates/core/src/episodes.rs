//! Season/episode selection parsing for the `--season` and `--episode` flags.
//!
//! Accepted forms, comma separated: `3`, `1-5`, `5-1`, `7~` (open ended),
//! and a bare `~` (everything).

use std::collections::BTreeSet;

use crate::CoreError;

/// Upper bound used for open-ended ranges.
pub const OPEN_RANGE_END: u32 = 999;

/// Parse a number list like `"1-3, 5, 8~"` into sorted, deduplicated numbers.
pub fn parse_number_list(spec: &str) -> Result<Vec<u32>, CoreError> {
    let mut numbers = BTreeSet::new();
    for part in spec.split(',') {
        numbers.extend(parse_part(part.trim())?);
    }
    Ok(numbers.into_iter().collect())
}

fn parse_part(part: &str) -> Result<Vec<u32>, CoreError> {
    if part.is_empty() || part == "~" {
        return Ok(number_range(1, OPEN_RANGE_END));
    }

    if part.chars().all(|c| c.is_ascii_digit()) {
        return Ok(vec![parse_u32(part)?]);
    }

    if let Some((start, end)) = part.split_once('-') {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return Err(CoreError::InvalidRange(part.to_string()));
        }
        return Ok(number_range(parse_u32(start)?, parse_u32(end)?));
    }

    if let Some((start, _)) = part.split_once('~') {
        let start = start.trim();
        if start.is_empty() {
            return Err(CoreError::InvalidRange(part.to_string()));
        }
        return Ok(number_range(parse_u32(start)?, OPEN_RANGE_END));
    }

    Err(CoreError::InvalidRange(part.to_string()))
}

/// Inclusive range in either direction.
fn number_range(start: u32, end: u32) -> Vec<u32> {
    if start <= end {
        (start..=end).collect()
    } else {
        (end..=start).collect()
    }
}

fn parse_u32(s: &str) -> Result<u32, CoreError> {
    s.parse()
        .map_err(|_| CoreError::InvalidRange(s.to_string()))
}
