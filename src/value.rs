use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};

use crate::array::Array;
use crate::data_type::{DataType, Endianness};
use crate::error::{SpeadError, SpeadResult};

/// A dynamically-typed decoded field value.
///
/// Packed bitfields have arbitrary widths, so integers widen to 64 bits on
/// decode; floats keep their encoded precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Unsigned integer of any field width.
    Uint(u64),
    /// Two's-complement signed integer of any field width.
    Int(i64),
    /// 32-bit IEEE floating point.
    Float32(f32),
    /// 64-bit IEEE floating point.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// Single ASCII character.
    Char(char),
}

impl Scalar {
    /// The value as an unsigned integer, if it is a nonnegative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Scalar::Uint(value) => Some(value),
            Scalar::Int(value) => u64::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as a signed integer, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Int(value) => Some(value),
            Scalar::Uint(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as a double, widening integers and 32-bit floats.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Float64(value) => Some(value),
            Scalar::Float32(value) => Some(value.into()),
            Scalar::Int(value) => Some(value as f64),
            Scalar::Uint(value) => Some(value as f64),
            _ => None,
        }
    }

    /// Decode one native-order element of `data_type` from `bytes`.
    ///
    /// `bytes` must be exactly `data_type.size()` long.
    pub(crate) fn from_native_bytes(data_type: DataType, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), data_type.size());
        match data_type {
            DataType::Bool => Scalar::Bool(bytes[0] != 0),
            DataType::Str1 => Scalar::Char(bytes[0] as char),
            DataType::UInt8 => Scalar::Uint(bytes[0].into()),
            DataType::UInt16 => Scalar::Uint(NativeEndian::read_u16(bytes).into()),
            DataType::UInt32 => Scalar::Uint(NativeEndian::read_u32(bytes).into()),
            DataType::UInt64 => Scalar::Uint(NativeEndian::read_u64(bytes)),
            DataType::Int8 => Scalar::Int((bytes[0] as i8).into()),
            DataType::Int16 => Scalar::Int(NativeEndian::read_i16(bytes).into()),
            DataType::Int32 => Scalar::Int(NativeEndian::read_i32(bytes).into()),
            DataType::Int64 => Scalar::Int(NativeEndian::read_i64(bytes)),
            DataType::Float32 => Scalar::Float32(NativeEndian::read_f32(bytes)),
            DataType::Float64 => Scalar::Float64(NativeEndian::read_f64(bytes)),
        }
    }

    /// Append one element of `data_type` in `byte_order` to `out`,
    /// range-checking integers against the element width.
    pub(crate) fn write_bytes(
        &self,
        data_type: DataType,
        byte_order: Endianness,
        out: &mut Vec<u8>,
    ) -> SpeadResult<()> {
        match byte_order {
            Endianness::LittleEndian => self.write_bytes_endian::<LittleEndian>(data_type, out),
            Endianness::BigEndian => self.write_bytes_endian::<BigEndian>(data_type, out),
        }
    }

    fn write_bytes_endian<E: ByteOrder>(
        &self,
        data_type: DataType,
        out: &mut Vec<u8>,
    ) -> SpeadResult<()> {
        let out_of_range = || SpeadError::ValueOutOfRange {
            value: format!("{self:?}"),
            field: format!("dtype {data_type:?}"),
        };
        let mut scratch = [0u8; 8];
        let size = data_type.size();
        match data_type {
            DataType::Bool => {
                let value = match *self {
                    Scalar::Bool(b) => u8::from(b),
                    Scalar::Uint(0) | Scalar::Int(0) => 0,
                    Scalar::Uint(1) | Scalar::Int(1) => 1,
                    _ => return Err(out_of_range()),
                };
                scratch[0] = value;
            }
            DataType::Str1 => {
                let c = match *self {
                    Scalar::Char(c) => c,
                    _ => return Err(out_of_range()),
                };
                scratch[0] = u8::try_from(u32::from(c)).map_err(|_| out_of_range())?;
            }
            DataType::UInt8 => {
                let value = self.as_u64().ok_or_else(out_of_range)?;
                scratch[0] = u8::try_from(value).map_err(|_| out_of_range())?;
            }
            DataType::UInt16 => {
                let value = self.as_u64().ok_or_else(out_of_range)?;
                E::write_u16(
                    &mut scratch,
                    u16::try_from(value).map_err(|_| out_of_range())?,
                );
            }
            DataType::UInt32 => {
                let value = self.as_u64().ok_or_else(out_of_range)?;
                E::write_u32(
                    &mut scratch,
                    u32::try_from(value).map_err(|_| out_of_range())?,
                );
            }
            DataType::UInt64 => {
                E::write_u64(&mut scratch, self.as_u64().ok_or_else(out_of_range)?);
            }
            DataType::Int8 => {
                let value = self.as_i64().ok_or_else(out_of_range)?;
                scratch[0] = i8::try_from(value).map_err(|_| out_of_range())? as u8;
            }
            DataType::Int16 => {
                let value = self.as_i64().ok_or_else(out_of_range)?;
                E::write_i16(
                    &mut scratch,
                    i16::try_from(value).map_err(|_| out_of_range())?,
                );
            }
            DataType::Int32 => {
                let value = self.as_i64().ok_or_else(out_of_range)?;
                E::write_i32(
                    &mut scratch,
                    i32::try_from(value).map_err(|_| out_of_range())?,
                );
            }
            DataType::Int64 => {
                E::write_i64(&mut scratch, self.as_i64().ok_or_else(out_of_range)?);
            }
            DataType::Float32 => {
                let value = self.as_f64().ok_or_else(out_of_range)?;
                E::write_f32(&mut scratch, value as f32);
            }
            DataType::Float64 => {
                E::write_f64(&mut scratch, self.as_f64().ok_or_else(out_of_range)?);
            }
        }
        out.extend_from_slice(&scratch[..size]);
        Ok(())
    }
}

/// A decoded item value.
///
/// Dtype-mode decoding produces [`Value::Array`], specialized to
/// [`Value::Scalar`]/[`Value::Record`] for zero-dimensional shapes and to
/// [`Value::String`] for rank-1 single-byte string arrays. Format-mode
/// decoding produces nested [`Value::List`]s of records.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single scalar.
    Scalar(Scalar),
    /// An ASCII string.
    String(String),
    /// One multi-field packed record.
    Record(Vec<Scalar>),
    /// A sequence of values along one array dimension.
    List(Vec<Value>),
    /// A typed n-dimensional array.
    Array(Array),
}

impl Value {
    /// The contained scalar, if this value is one.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// The contained string, if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string),
            _ => None,
        }
    }

    /// The contained array, if this value is one.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Value::String(string.to_owned())
    }
}

impl From<String> for Value {
    fn from(string: String) -> Self {
        Value::String(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(Scalar::Uint(7).as_i64(), Some(7));
        assert_eq!(Scalar::Int(-1).as_u64(), None);
        assert_eq!(Scalar::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(Scalar::Char('a').as_u64(), None);
    }

    #[test]
    fn test_write_bytes_range_check() {
        let mut out = Vec::new();
        let err = Scalar::Uint(300)
            .write_bytes(DataType::UInt8, Endianness::BigEndian, &mut out)
            .unwrap_err();
        assert!(matches!(err, SpeadError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_write_bytes_endianness() {
        let mut out = Vec::new();
        Scalar::Uint(0x0102)
            .write_bytes(DataType::UInt16, Endianness::BigEndian, &mut out)
            .unwrap();
        Scalar::Uint(0x0102)
            .write_bytes(DataType::UInt16, Endianness::LittleEndian, &mut out)
            .unwrap();
        assert_eq!(out, vec![0x01, 0x02, 0x02, 0x01]);
    }

    #[test]
    fn test_native_bytes_round_trip() {
        let mut out = Vec::new();
        Scalar::Int(-5)
            .write_bytes(DataType::Int32, Endianness::native(), &mut out)
            .unwrap();
        assert_eq!(Scalar::from_native_bytes(DataType::Int32, &out), Scalar::Int(-5));
    }
}
