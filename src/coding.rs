// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),

    /// The value cannot be represented in the wire format
    UnsupportedValue(&'static str),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                Self::UnsupportedValue(reason) => (*reason).to_string(),
            }
        )
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::UnsupportedValue(_) => None,
        }
    }
}

/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// Invalid UTF-8 string payload
    Utf8(std::string::FromUtf8Error),

    /// Invalid enum tag
    InvalidTag((&'static str, u8)),

    /// A UTF-16 code unit that is not a scalar value (surrogate half)
    InvalidCodeUnit(u16),
}

impl DecodeError {
    /// Whether this failure is a clean truncation of the input stream.
    ///
    /// Used to distinguish a torn trailing entry from corrupted bytes.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                e => format!("{e:?}"),
            }
        )
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

/// Trait to serialize stuff
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector.
    fn encode_into_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut v = vec![];
        self.encode_into(&mut v)?;
        Ok(v)
    }
}

/// Trait to deserialize stuff
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

macro_rules! impl_fixed_width {
    ($t:ty, $write:ident, $read:ident) => {
        impl Encode for $t {
            fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
                writer.$write::<LittleEndian>(*self)?;
                Ok(())
            }
        }

        impl Decode for $t {
            fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
                Ok(reader.$read::<LittleEndian>()?)
            }
        }
    };
}

impl_fixed_width!(i32, write_i32, read_i32);
impl_fixed_width!(i64, write_i64, read_i64);
impl_fixed_width!(f32, write_f32, read_f32);
impl_fixed_width!(f64, write_f64, read_f64);

impl Encode for u8 {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(*self)?;
        Ok(())
    }
}

impl Decode for u8 {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(reader.read_u8()?)
    }
}

impl Encode for bool {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(u8::from(*self))?;
        Ok(())
    }
}

impl Decode for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidTag(("bool", tag))),
        }
    }
}

// A char is stored as a single UTF-16 code unit, so characters outside
// the basic multilingual plane are not representable.
impl Encode for char {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let mut units = [0u16; 2];

        if self.encode_utf16(&mut units).len() != 1 {
            return Err(EncodeError::UnsupportedValue(
                "char outside the basic multilingual plane",
            ));
        }

        writer.write_u16::<LittleEndian>(units[0])?;

        Ok(())
    }
}

impl Decode for char {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let unit = reader.read_u16::<LittleEndian>()?;
        char::from_u32(u32::from(unit)).ok_or(DecodeError::InvalidCodeUnit(unit))
    }
}

impl Encode for String {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let bytes = self.as_bytes();

        let len = u32::try_from(bytes.len())
            .map_err(|_| EncodeError::UnsupportedValue("string longer than 2^32 bytes"))?;

        writer.write_u32_varint(len)?;
        writer.write_all(bytes)?;

        Ok(())
    }
}

impl Decode for String {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let len = reader.read_u32_varint()? as usize;

        let mut bytes = vec![0; len];
        reader.read_exact(&mut bytes)?;

        Ok(Self::from_utf8(bytes)?)
    }
}
