use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::bitstream::{BitReader, BitWriter, MAX_FIELD_BITS};
use crate::data_type::{DType, DataType, Endianness};
use crate::error::{SpeadError, SpeadResult};
use crate::value::{Scalar, Value};

/// Type code of one field in a packed format.
///
/// The discriminants are the ASCII code letters used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FieldCode {
    /// Unsigned integer.
    Unsigned = b'u',
    /// Two's-complement signed integer.
    Signed = b'i',
    /// Boolean; any nonzero bit pattern decodes to true.
    Boolean = b'b',
    /// Single ASCII character; always 8 bits.
    Char = b'c',
    /// IEEE-754 float; 32 or 64 bits.
    Float = b'f',
}

impl FieldCode {
    /// The wire code letter.
    pub fn as_char(self) -> char {
        u8::from(self) as char
    }
}

/// One typed bitfield of a packed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// The field type code.
    pub code: FieldCode,
    /// The field width in bits.
    pub bits: u32,
}

/// A packed record schema: a nonempty ordered sequence of typed bitfields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Format {
    fields: Vec<Field>,
}

impl Format {
    /// Validate a raw `(code, length)` list into a format.
    pub fn new(raw: &[(char, u32)]) -> SpeadResult<Self> {
        if raw.is_empty() {
            return Err(SpeadError::EmptyFormat);
        }
        let mut fields = Vec::with_capacity(raw.len());
        for &(code_char, bits) in raw {
            let code = u8::try_from(code_char)
                .ok()
                .and_then(|c| FieldCode::try_from(c).ok())
                .ok_or(SpeadError::UnhandledFormat {
                    code: code_char,
                    bits,
                })?;
            let supported = match code {
                FieldCode::Unsigned | FieldCode::Signed | FieldCode::Boolean => {
                    bits >= 1 && bits <= MAX_FIELD_BITS
                }
                FieldCode::Char => bits == 8,
                FieldCode::Float => bits == 32 || bits == 64,
            };
            if !supported {
                return Err(SpeadError::UnhandledFormat {
                    code: code.as_char(),
                    bits,
                });
            }
            fields.push(Field { code, bits });
        }
        Ok(Self { fields })
    }

    /// The ordered fields of one record.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The raw `(code, length)` pairs, as carried by a raw descriptor.
    pub fn raw_fields(&self) -> Vec<(char, u32)> {
        self.fields
            .iter()
            .map(|field| (field.code.as_char(), field.bits))
            .collect()
    }

    /// Total bits of one record.
    pub fn bits_per_record(&self) -> u64 {
        self.fields.iter().map(|field| u64::from(field.bits)).sum()
    }

    /// Reduce to a big-endian numeric dtype when every field is
    /// byte-aligned: `u`/`i` of 8/16/32/64 bits, `f` of 32/64, `b` of 8,
    /// `c` of 8. Returns `None` if any field prevents reduction.
    pub fn to_dtype(&self) -> Option<DType> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let data_type = match (field.code, field.bits) {
                (FieldCode::Unsigned, 8) => DataType::UInt8,
                (FieldCode::Unsigned, 16) => DataType::UInt16,
                (FieldCode::Unsigned, 32) => DataType::UInt32,
                (FieldCode::Unsigned, 64) => DataType::UInt64,
                (FieldCode::Signed, 8) => DataType::Int8,
                (FieldCode::Signed, 16) => DataType::Int16,
                (FieldCode::Signed, 32) => DataType::Int32,
                (FieldCode::Signed, 64) => DataType::Int64,
                (FieldCode::Float, 32) => DataType::Float32,
                (FieldCode::Float, 64) => DataType::Float64,
                (FieldCode::Boolean, 8) => DataType::Bool,
                (FieldCode::Char, 8) => DataType::Str1,
                _ => return None,
            };
            fields.push(data_type);
        }
        Some(DType::compound(fields, Endianness::BigEndian))
    }

    /// Decode one record. Single-field records decode to a scalar,
    /// multi-field records to a [`Value::Record`].
    pub(crate) fn decode_record(&self, reader: &mut BitReader<'_>) -> SpeadResult<Value> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            fields.push(decode_field(*field, reader)?);
        }
        if fields.len() == 1 {
            Ok(Value::Scalar(fields.remove(0)))
        } else {
            Ok(Value::Record(fields))
        }
    }

    /// Encode one record: a scalar for single-field formats, a
    /// [`Value::Record`] of matching arity otherwise.
    pub(crate) fn encode_record(&self, value: &Value, writer: &mut BitWriter) -> SpeadResult<()> {
        match (&self.fields[..], value) {
            ([field], Value::Scalar(scalar)) => encode_field(*field, scalar, writer),
            (fields, Value::Record(scalars)) if fields.len() == scalars.len() => {
                for (field, scalar) in fields.iter().zip(scalars) {
                    encode_field(*field, scalar, writer)?;
                }
                Ok(())
            }
            (fields, Value::Record(scalars)) => Err(SpeadError::ValueShape(format!(
                "record has {} fields, format has {}",
                scalars.len(),
                fields.len()
            ))),
            _ => Err(SpeadError::TypeMismatch(format!(
                "cannot encode {value:?} as a packed record"
            ))),
        }
    }
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 64 {
        return raw as i64;
    }
    if raw >> (bits - 1) & 1 == 1 {
        ((raw as i128) - (1i128 << bits)) as i64
    } else {
        raw as i64
    }
}

fn decode_field(field: Field, reader: &mut BitReader<'_>) -> SpeadResult<Scalar> {
    let raw = reader.take(field.bits)?;
    Ok(match field.code {
        FieldCode::Unsigned => Scalar::Uint(raw),
        FieldCode::Signed => Scalar::Int(sign_extend(raw, field.bits)),
        FieldCode::Boolean => Scalar::Bool(raw != 0),
        FieldCode::Char => Scalar::Char(raw as u8 as char),
        FieldCode::Float => match field.bits {
            32 => Scalar::Float32(f32::from_bits(raw as u32)),
            _ => Scalar::Float64(f64::from_bits(raw)),
        },
    })
}

fn encode_field(field: Field, scalar: &Scalar, writer: &mut BitWriter) -> SpeadResult<()> {
    let out_of_range = |value: String| SpeadError::ValueOutOfRange {
        value,
        field: format!("{}{}", field.code.as_char(), field.bits),
    };
    let raw = match field.code {
        FieldCode::Unsigned => {
            let value = scalar
                .as_u64()
                .ok_or_else(|| out_of_range(format!("{scalar:?}")))?;
            if field.bits < 64 && value >> field.bits != 0 {
                return Err(out_of_range(value.to_string()));
            }
            value
        }
        FieldCode::Signed => {
            let value = scalar
                .as_i64()
                .ok_or_else(|| out_of_range(format!("{scalar:?}")))?;
            let top_bit = 1i128 << (field.bits - 1);
            if i128::from(value) < -top_bit || i128::from(value) >= top_bit {
                return Err(out_of_range(value.to_string()));
            }
            // Two's complement at the field width.
            (value as u64) & width_mask(field.bits)
        }
        FieldCode::Boolean => match *scalar {
            Scalar::Bool(b) => u64::from(b),
            Scalar::Uint(v @ (0 | 1)) => v,
            Scalar::Int(v @ (0 | 1)) => v as u64,
            _ => return Err(out_of_range(format!("{scalar:?}"))),
        },
        FieldCode::Char => {
            let c = match *scalar {
                Scalar::Char(c) => c,
                _ => return Err(out_of_range(format!("{scalar:?}"))),
            };
            u64::from(u8::try_from(u32::from(c)).map_err(|_| out_of_range(format!("{c:?}")))?)
        }
        FieldCode::Float => {
            let value = scalar
                .as_f64()
                .ok_or_else(|| out_of_range(format!("{scalar:?}")))?;
            match field.bits {
                32 => u64::from((value as f32).to_bits()),
                _ => value.to_bits(),
            }
        }
    };
    writer.put(raw, field.bits)
}

fn width_mask(bits: u32) -> u64 {
    if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
