// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use std::io::{Cursor, Read, Write};

/// One serialized key-value record inside a log file.
///
/// On disk an entry is `encode(key) ++ encode(value)` with no separator and
/// no per-entry header; both encodings are length-self-describing, so reading
/// an entry consumes exactly the bytes written for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry<K, V> {
    /// Record key
    pub key: K,

    /// Record value
    pub value: V,
}

impl<K: Encode, V: Encode> Encode for Entry<K, V> {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        self.key.encode_into(writer)?;
        self.value.encode_into(writer)?;
        Ok(())
    }
}

impl<K: Decode, V: Decode> Decode for Entry<K, V> {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let key = K::decode_from(reader)?;
        let value = V::decode_from(reader)?;
        Ok(Self { key, value })
    }
}

/// Byte range of one entry inside a specific log file.
///
/// Locators are append-stable: the bytes they point to never move or change
/// until the file itself is replaced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RecordLocator {
    /// Byte offset of the entry's first byte
    pub offset: u64,

    /// Length of the entry in bytes
    pub len: u64,
}

impl RecordLocator {
    /// Offset one past the entry's last byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Streaming reader over the entries of one log buffer.
///
/// Yields entries in write order together with their locators. A decode
/// failure that is a clean truncation of the trailing bytes ends the stream
/// with a warning (a process may have died mid-append); any other malformed
/// entry is surfaced as an error.
pub struct LogReader<'a, K, V> {
    cursor: Cursor<&'a [u8]>,
    done: bool,
    torn: bool,
    phantom: std::marker::PhantomData<(K, V)>,
}

impl<'a, K, V> LogReader<'a, K, V> {
    /// Starts reading at the beginning of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            done: false,
            torn: false,
            phantom: std::marker::PhantomData,
        }
    }

    /// Returns `true` while the read position is before the end of the log.
    #[must_use]
    pub fn can_read(&self) -> bool {
        !self.done && self.cursor.position() < self.cursor.get_ref().len() as u64
    }

    /// Returns `true` once the reader stopped at a truncated trailing entry.
    ///
    /// Engines use this on startup to cut the torn bytes off the file, so
    /// later appends cannot land behind unreadable garbage.
    #[must_use]
    pub fn found_torn_tail(&self) -> bool {
        self.torn
    }
}

impl<K: Decode, V: Decode> Iterator for LogReader<'_, K, V> {
    type Item = crate::Result<(Entry<K, V>, RecordLocator)>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.can_read() {
            return None;
        }

        let offset = self.cursor.position();

        match Entry::<K, V>::decode_from(&mut self.cursor) {
            Ok(entry) => {
                let locator = RecordLocator {
                    offset,
                    len: self.cursor.position() - offset,
                };
                Some(Ok((entry, locator)))
            }
            Err(e) if e.is_eof() => {
                log::warn!(
                    "log has a truncated trailing entry at offset {offset}, treating as end of log",
                );
                self.done = true;
                self.torn = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}
