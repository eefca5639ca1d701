//! Registry value types and the payload codec.
//!
//! Backends store a value as raw bytes tagged with a type code. This module
//! converts between that form and [`RegistryData`]:
//!
//! | Type | Data | Encoding |
//! |------|------|----------|
//! | `REG_SZ`, `REG_EXPAND_SZ` | `String` | UTF-16LE, NUL terminated |
//! | `REG_MULTI_SZ` | `MultiString` | NUL-terminated strings, then one more NUL |
//! | `REG_DWORD` | `U32` | 4 bytes little endian |
//! | `REG_DWORD_BIG_ENDIAN` | `U32` | 4 bytes big endian |
//! | `REG_QWORD` | `U64` | 8 bytes little endian |
//! | `REG_NONE` | `None` or `Binary` | as is |
//! | everything else | `Binary` | as is |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Error as IoError, ErrorKind};

/// Registry value type codes (`REG_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ValueType {
    None,
    String,
    ExpandString,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiString,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
}

impl ValueType {
    pub const DWORD_LITTLE_ENDIAN: ValueType = ValueType::Dword;
    pub const QWORD_LITTLE_ENDIAN: ValueType = ValueType::Qword;

    pub fn code(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
        }
    }

    pub fn from_code(code: u32) -> Option<ValueType> {
        let ty = match code {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "REG_NONE",
            ValueType::String => "REG_SZ",
            ValueType::ExpandString => "REG_EXPAND_SZ",
            ValueType::Binary => "REG_BINARY",
            ValueType::Dword => "REG_DWORD",
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            ValueType::Link => "REG_LINK",
            ValueType::MultiString => "REG_MULTI_SZ",
            ValueType::ResourceList => "REG_RESOURCE_LIST",
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            ValueType::Qword => "REG_QWORD",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ValueType> for u32 {
    fn from(ty: ValueType) -> Self {
        ty.code()
    }
}

impl TryFrom<u32> for ValueType {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        ValueType::from_code(code).ok_or_else(|| format!("unknown value type code {code}"))
    }
}

/// Decoded value payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RegistryData {
    None,
    String(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
    U32(u32),
    U64(u64),
}

impl RegistryData {
    fn kind(&self) -> &'static str {
        match self {
            RegistryData::None => "none",
            RegistryData::String(_) => "string",
            RegistryData::MultiString(_) => "multi-string",
            RegistryData::Binary(_) => "binary",
            RegistryData::U32(_) => "32-bit integer",
            RegistryData::U64(_) => "64-bit integer",
        }
    }

    /// Encode for storage as `value_type`.
    ///
    /// # Errors
    /// - `InvalidInput` if this data cannot be stored as `value_type`
    pub fn encode(&self, value_type: ValueType) -> std::io::Result<Vec<u8>> {
        use ValueType as T;
        let bytes = match (value_type, self) {
            (T::String | T::ExpandString, RegistryData::String(s)) => encode_utf16z(s),
            (T::MultiString, RegistryData::MultiString(items)) => {
                // an empty item would read back as the end of the list
                if items.iter().any(String::is_empty) {
                    return Err(IoError::new(
                        ErrorKind::InvalidInput,
                        "multi-string items cannot be empty",
                    ));
                }
                let mut bytes = Vec::new();
                for item in items {
                    bytes.extend(encode_utf16z(item));
                }
                bytes.extend([0, 0]);
                bytes
            }
            (T::Dword, RegistryData::U32(n)) => n.to_le_bytes().to_vec(),
            (T::DwordBigEndian, RegistryData::U32(n)) => n.to_be_bytes().to_vec(),
            (T::Qword, RegistryData::U64(n)) => n.to_le_bytes().to_vec(),
            (T::None, RegistryData::None) => Vec::new(),
            (
                T::None
                | T::Binary
                | T::Link
                | T::ResourceList
                | T::FullResourceDescriptor
                | T::ResourceRequirementsList,
                RegistryData::Binary(bytes),
            ) => bytes.clone(),
            (ty, data) => {
                return Err(IoError::new(
                    ErrorKind::InvalidInput,
                    format!("{} data cannot be stored as {ty}", data.kind()),
                ));
            }
        };
        Ok(bytes)
    }

    /// Decode raw bytes stored as `value_type`.
    ///
    /// # Errors
    /// - `InvalidData` if an integer payload is shorter than its type
    pub fn decode(value_type: ValueType, bytes: &[u8]) -> std::io::Result<RegistryData> {
        use ValueType as T;
        let data = match value_type {
            T::String | T::ExpandString => RegistryData::String(decode_utf16z(bytes)),
            T::MultiString => RegistryData::MultiString(decode_multi(bytes)),
            T::Dword => RegistryData::U32(u32::from_le_bytes(fixed(bytes, value_type)?)),
            T::DwordBigEndian => RegistryData::U32(u32::from_be_bytes(fixed(bytes, value_type)?)),
            T::Qword => RegistryData::U64(u64::from_le_bytes(fixed(bytes, value_type)?)),
            T::None if bytes.is_empty() => RegistryData::None,
            _ => RegistryData::Binary(bytes.to_vec()),
        };
        Ok(data)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegistryData::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RegistryData::U32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RegistryData::U64(n) => Some(*n),
            _ => None,
        }
    }
}

fn encode_utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn utf16_units(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    // A trailing odd byte is not part of any code unit.
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

fn decode_utf16z(bytes: &[u8]) -> String {
    let units: Vec<u16> = utf16_units(bytes).take_while(|&u| u != 0).collect();
    String::from_utf16_lossy(&units)
}

fn decode_multi(bytes: &[u8]) -> Vec<String> {
    let units: Vec<u16> = utf16_units(bytes).collect();
    units
        .split(|&u| u == 0)
        .take_while(|item| !item.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

fn fixed<const N: usize>(bytes: &[u8], value_type: ValueType) -> std::io::Result<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or_else(|| {
            IoError::new(
                ErrorKind::InvalidData,
                format!("{value_type} payload has {} bytes, expected {N}", bytes.len()),
            )
        })
}

impl From<&str> for RegistryData {
    fn from(s: &str) -> Self {
        RegistryData::String(s.to_string())
    }
}

impl From<String> for RegistryData {
    fn from(s: String) -> Self {
        RegistryData::String(s)
    }
}

impl From<Vec<String>> for RegistryData {
    fn from(items: Vec<String>) -> Self {
        RegistryData::MultiString(items)
    }
}

impl From<Vec<u8>> for RegistryData {
    fn from(bytes: Vec<u8>) -> Self {
        RegistryData::Binary(bytes)
    }
}

impl From<&[u8]> for RegistryData {
    fn from(bytes: &[u8]) -> Self {
        RegistryData::Binary(bytes.to_vec())
    }
}

impl From<u32> for RegistryData {
    fn from(n: u32) -> Self {
        RegistryData::U32(n)
    }
}

impl From<u64> for RegistryData {
    fn from(n: u64) -> Self {
        RegistryData::U64(n)
    }
}

/// A named value as read from a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryValue {
    pub name: String,
    pub data: RegistryData,
    pub value_type: ValueType,
}

impl RegistryValue {
    /// Decode a raw value.
    ///
    /// # Errors
    /// - `InvalidData` for an unknown type code or a truncated integer payload
    pub fn from_raw(name: impl Into<String>, type_code: u32, bytes: &[u8]) -> std::io::Result<Self> {
        let value_type = ValueType::from_code(type_code).ok_or_else(|| {
            IoError::new(
                ErrorKind::InvalidData,
                format!("unknown value type code {type_code}"),
            )
        })?;
        Ok(Self {
            name: name.into(),
            data: RegistryData::decode(value_type, bytes)?,
            value_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_utf16_nul_terminated() {
        let bytes = RegistryData::from("hi").encode(ValueType::String).unwrap();
        assert_eq!(bytes, vec![b'h', 0, b'i', 0, 0, 0]);
        assert_eq!(
            RegistryData::decode(ValueType::String, &bytes).unwrap(),
            RegistryData::from("hi")
        );
    }

    #[test]
    fn test_string_decode_stops_at_first_nul() {
        let bytes = [b'a', 0, 0, 0, b'b', 0];
        assert_eq!(
            RegistryData::decode(ValueType::ExpandString, &bytes).unwrap(),
            RegistryData::String("a".into())
        );
    }

    #[test]
    fn test_multi_string_layout() {
        let data = RegistryData::MultiString(vec!["a".into(), "bc".into()]);
        let bytes = data.encode(ValueType::MultiString).unwrap();
        assert_eq!(bytes, vec![b'a', 0, 0, 0, b'b', 0, b'c', 0, 0, 0, 0, 0]);
        assert_eq!(
            RegistryData::decode(ValueType::MultiString, &bytes).unwrap(),
            data
        );
    }

    #[test]
    fn test_multi_string_rejects_empty_item() {
        let data = RegistryData::MultiString(vec!["a".into(), String::new(), "b".into()]);
        let err = data.encode(ValueType::MultiString).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let empty_list = RegistryData::MultiString(Vec::new());
        let bytes = empty_list.encode(ValueType::MultiString).unwrap();
        assert_eq!(
            RegistryData::decode(ValueType::MultiString, &bytes).unwrap(),
            empty_list
        );
    }

    #[test]
    fn test_dword_endianness() {
        let data = RegistryData::U32(0x0102_0304);
        assert_eq!(data.encode(ValueType::Dword).unwrap(), vec![4, 3, 2, 1]);
        assert_eq!(
            data.encode(ValueType::DwordBigEndian).unwrap(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            RegistryData::decode(ValueType::DwordBigEndian, &[1, 2, 3, 4]).unwrap(),
            data
        );
    }

    #[test]
    fn test_mismatched_type_is_invalid_input() {
        let err = RegistryData::U32(1).encode(ValueType::String).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = RegistryData::from("x").encode(ValueType::Qword).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_truncated_integer_is_invalid_data() {
        let err = RegistryData::decode(ValueType::Qword, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_reg_none() {
        assert_eq!(
            RegistryData::decode(ValueType::None, &[]).unwrap(),
            RegistryData::None
        );
        assert_eq!(
            RegistryData::decode(ValueType::None, &[7]).unwrap(),
            RegistryData::Binary(vec![7])
        );
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(ValueType::DWORD_LITTLE_ENDIAN.code(), 4);
        assert_eq!(ValueType::QWORD_LITTLE_ENDIAN.code(), 11);
        assert_eq!(ValueType::from_code(7), Some(ValueType::MultiString));
        assert_eq!(ValueType::from_code(12), None);
        assert!(RegistryValue::from_raw("x", 42, &[]).is_err());
    }
}
