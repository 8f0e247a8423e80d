//! Built-in serializers

use crate::error::{PageWalError, Result};
use crate::record_id::RecordId;

use super::{read_len_prefix, slice_at, BinarySerializer, SerializerId};

macro_rules! fixed_width_serializer {
    ($name:ident, $ty:ty, $id:expr, $width:expr) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl BinarySerializer for $name {
            type Value = $ty;

            const ID: SerializerId = $id;

            fn serialized_size(&self, _value: &$ty) -> usize {
                $width
            }

            fn serialize(&self, value: &$ty) -> Vec<u8> {
                value.to_le_bytes().to_vec()
            }

            fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<$ty> {
                let raw = slice_at(bytes, offset, $width)?;
                let mut buf = [0u8; $width];
                buf.copy_from_slice(raw);
                Ok(<$ty>::from_le_bytes(buf))
            }

            fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
                slice_at(bytes, offset, $width)?;
                Ok($width)
            }
        }
    };
}

fixed_width_serializer!(ByteSerializer, i8, SerializerId::Byte, 1);
fixed_width_serializer!(ShortSerializer, i16, SerializerId::Short, 2);
fixed_width_serializer!(IntegerSerializer, i32, SerializerId::Integer, 4);
fixed_width_serializer!(LongSerializer, i64, SerializerId::Long, 8);

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanSerializer;

impl BinarySerializer for BooleanSerializer {
    type Value = bool;

    const ID: SerializerId = SerializerId::Boolean;

    fn serialized_size(&self, _value: &bool) -> usize {
        1
    }

    fn serialize(&self, value: &bool) -> Vec<u8> {
        vec![u8::from(*value)]
    }

    fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<bool> {
        match slice_at(bytes, offset, 1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PageWalError::Decode(format!("invalid boolean byte {}", other))),
        }
    }

    fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
        slice_at(bytes, offset, 1)?;
        Ok(1)
    }
}

/// UTF-8 string with a 4-byte length prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl BinarySerializer for StringSerializer {
    type Value = String;

    const ID: SerializerId = SerializerId::String;

    fn serialized_size(&self, value: &String) -> usize {
        4 + value.len()
    }

    fn serialize(&self, value: &String) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + value.len());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
        out
    }

    fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<String> {
        let len = read_len_prefix(bytes, offset)?;
        let raw = slice_at(bytes, offset + 4, len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| PageWalError::Decode(format!("invalid UTF-8 key: {}", e)))
    }

    fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
        let len = read_len_prefix(bytes, offset)?;
        slice_at(bytes, offset + 4, len)?;
        Ok(4 + len)
    }
}

/// Opaque byte string with a 4-byte length prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl BinarySerializer for BytesSerializer {
    type Value = Vec<u8>;

    const ID: SerializerId = SerializerId::Binary;

    fn serialized_size(&self, value: &Vec<u8>) -> usize {
        4 + value.len()
    }

    fn serialize(&self, value: &Vec<u8>) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + value.len());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<Vec<u8>> {
        let len = read_len_prefix(bytes, offset)?;
        Ok(slice_at(bytes, offset + 4, len)?.to_vec())
    }

    fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
        let len = read_len_prefix(bytes, offset)?;
        slice_at(bytes, offset + 4, len)?;
        Ok(4 + len)
    }
}

/// Record id in its 10-byte native-order form
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkSerializer;

impl BinarySerializer for LinkSerializer {
    type Value = RecordId;

    const ID: SerializerId = SerializerId::Link;

    fn serialized_size(&self, _value: &RecordId) -> usize {
        RecordId::SIZE
    }

    fn serialize(&self, value: &RecordId) -> Vec<u8> {
        value.to_bytes().to_vec()
    }

    fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<RecordId> {
        RecordId::from_bytes(bytes, offset)
    }

    fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
        slice_at(bytes, offset, RecordId::SIZE)?;
        Ok(RecordId::SIZE)
    }
}
