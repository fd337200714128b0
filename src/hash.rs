// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::Cursor;

/// Seed for the Murmur3 base hash.
const MURMUR_SEED: u32 = 0xC58F_1A7B;

const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
///
/// Provided as an alternate base hash; not wired into the bloom filter by
/// default.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;

    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

/// 32-bit xxHash with seed 0.
#[must_use]
pub fn xxh32(bytes: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(bytes, 0)
}

/// 32-bit Murmur3 with the engine seed.
#[must_use]
pub fn murmur3(bytes: &[u8]) -> u32 {
    // NOTE: Reading from an in-memory cursor cannot fail
    #[allow(clippy::expect_used)]
    murmur3::murmur3_32(&mut Cursor::new(bytes), MURMUR_SEED).expect("cannot fail")
}
