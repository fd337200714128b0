// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use chrono::Utc;

/// Number of decimal digits in a segment timestamp (`yyyyMMddHHmmssfff`).
pub const TIMESTAMP_DIGITS: usize = 17;

/// Gets the current UTC wall clock as a 17-digit `yyyyMMddHHmmssfff` number.
///
/// Digit strings of this shape sort lexicographically in chronological order,
/// which is what segment file names rely on.
pub fn timestamp_now() -> u64 {
    #[cfg(test)]
    {
        if let Some(cell) = NOW_OVERRIDE.get() {
            if let Some(override_val) = *cell.lock().expect("lock is poisoned") {
                return override_val;
            }
        }
    }

    let formatted = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();

    // NOTE: The format string always yields 17 ASCII digits
    #[allow(clippy::expect_used)]
    formatted.parse::<u64>().expect("timestamp should be numeric")
}

#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
static NOW_OVERRIDE: OnceLock<Mutex<Option<u64>>> = OnceLock::new();

#[cfg(test)]
pub(crate) fn set_timestamp_for_test(value: Option<u64>) {
    let cell = NOW_OVERRIDE.get_or_init(|| Mutex::new(None));
    *cell.lock().expect("lock is poisoned") = value;
}
