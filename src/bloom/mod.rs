// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bit_array;

use crate::hash::{murmur3, xxh32};
use bit_array::BitArray;

/// Two hashes that are used for double hashing
pub type CompositeHash = (u32, u32);

/// A standard bloom filter over key byte projections
///
/// Sized from an expected element count and a target false positive rate.
/// Uses double hashing instead of `k` independent hash functions: the i-th
/// probe position is derived from two base hashes as `(h1 + i * h2) mod m`.
///
/// May report a key that was never added (false positive), but never misses
/// a key that was.
#[derive(Debug, Eq, PartialEq)]
pub struct BloomFilter {
    /// Raw bytes exposed as bit array
    inner: BitArray,

    /// Bit count
    m: usize,

    /// Number of hash functions
    k: usize,
}

impl BloomFilter {
    /// Constructs a bloom filter that can hold `expected_items` items
    /// while maintaining the false positive rate `fp_rate`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` unless `expected_items > 0` and
    /// `0 < fp_rate < 1`.
    pub fn new(expected_items: usize, fp_rate: f64) -> crate::Result<Self> {
        if expected_items == 0 {
            return Err(crate::Error::InvalidArgument(
                "bloom filter needs a positive expected element count",
            ));
        }
        if !(fp_rate > 0.0 && fp_rate < 1.0) {
            return Err(crate::Error::InvalidArgument(
                "bloom filter false positive rate must be in (0, 1)",
            ));
        }

        let m = Self::calculate_m(expected_items, fp_rate);

        #[allow(clippy::cast_precision_loss)]
        let bits_per_key = m as f64 / expected_items as f64;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = ((bits_per_key * std::f64::consts::LN_2).round() as usize).max(1);

        Ok(Self {
            inner: BitArray::with_capacity(m.div_ceil(8)),
            m,
            k,
        })
    }

    /// `m = ceil(-n * ln(p) / ln(2)^2)`
    fn calculate_m(n: usize, fp_rate: f64) -> usize {
        let ln2_squared = std::f64::consts::LN_2.powi(2);

        #[allow(clippy::cast_precision_loss)]
        let numerator = n as f64 * fp_rate.ln();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            (-(numerator / ln2_squared)).ceil() as usize
        }
    }

    /// Size of the bit array in bits.
    #[must_use]
    pub fn bit_count(&self) -> usize {
        self.m
    }

    /// Amount of probes per lookup.
    #[must_use]
    pub fn hash_fn_count(&self) -> usize {
        self.k
    }

    /// Adds a key's byte projection to the filter.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty projection.
    pub fn add(&mut self, key: &[u8]) -> crate::Result<()> {
        if key.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "bloom filter keys must not be empty",
            ));
        }

        let (h1, h2) = Self::get_hash(key);

        for i in 0..self.k as u64 {
            let idx = (u64::from(h1) + i * u64::from(h2)) % self.m as u64;

            #[allow(clippy::cast_possible_truncation)]
            self.inner.enable(idx as usize);
        }

        Ok(())
    }

    /// Returns `true` if the key may be contained.
    ///
    /// Will never have a false negative. The empty projection was never
    /// added, so it reports `false`.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        if key.is_empty() {
            return false;
        }

        let (h1, h2) = Self::get_hash(key);

        for i in 0..self.k as u64 {
            let idx = (u64::from(h1) + i * u64::from(h2)) % self.m as u64;

            #[allow(clippy::cast_possible_truncation)]
            if !self.inner.get(idx as usize) {
                return false;
            }
        }

        true
    }

    /// Zeroes the bit array, forgetting all added keys.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Gets the composite hash of a key.
    #[must_use]
    pub fn get_hash(key: &[u8]) -> CompositeHash {
        (murmur3(key), xxh32(key))
    }
}
