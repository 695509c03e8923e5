//! Element data types and byte-order handling.

use crate::error::{SpeadError, SpeadResult};

/// Byte order of multi-byte array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Little Endian
    LittleEndian,
    /// Big Endian
    BigEndian,
}

impl Endianness {
    /// The native endianness of the host system.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::LittleEndian
        } else {
            Endianness::BigEndian
        }
    }

    /// Check if the endianness matches the native endianness of the host system.
    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    /// The opposite byte order.
    pub fn swapped(self) -> Self {
        match self {
            Endianness::LittleEndian => Endianness::BigEndian,
            Endianness::BigEndian => Endianness::LittleEndian,
        }
    }

    fn symbol(self) -> char {
        match self {
            Endianness::LittleEndian => '<',
            Endianness::BigEndian => '>',
        }
    }
}

/// Supported element types for array values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean; stored as one byte, nonzero means true.
    Bool,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Single-byte string element (`S1`); rank-1 arrays of these decode to
    /// ASCII text.
    Str1,
}

impl DataType {
    /// The size in bytes of this data type.
    ///
    /// ```
    /// use spead_codec::DataType;
    ///
    /// assert_eq!(DataType::Bool.size(), 1);
    /// assert_eq!(DataType::Int16.size(), 2);
    /// assert_eq!(DataType::Float64.size(), 8);
    /// ```
    pub fn size(&self) -> usize {
        match self {
            DataType::Bool | DataType::UInt8 | DataType::Int8 | DataType::Str1 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }

    /// The kind-and-size body of the numpy `descr` code, e.g. `u2`.
    fn descr_body(self) -> &'static str {
        match self {
            DataType::Bool => "b1",
            DataType::UInt8 => "u1",
            DataType::UInt16 => "u2",
            DataType::UInt32 => "u4",
            DataType::UInt64 => "u8",
            DataType::Int8 => "i1",
            DataType::Int16 => "i2",
            DataType::Int32 => "i4",
            DataType::Int64 => "i8",
            DataType::Float32 => "f4",
            DataType::Float64 => "f8",
            DataType::Str1 => "S1",
        }
    }

    fn from_descr_body(body: &str) -> Option<Self> {
        match body {
            "b1" | "?" => Some(DataType::Bool),
            "u1" => Some(DataType::UInt8),
            "u2" => Some(DataType::UInt16),
            "u4" => Some(DataType::UInt32),
            "u8" => Some(DataType::UInt64),
            "i1" => Some(DataType::Int8),
            "i2" => Some(DataType::Int16),
            "i4" => Some(DataType::Int32),
            "i8" => Some(DataType::Int64),
            "f4" => Some(DataType::Float32),
            "f8" => Some(DataType::Float64),
            "S1" => Some(DataType::Str1),
            _ => None,
        }
    }
}

/// A full element dtype: a single scalar field, or the compound record
/// produced by reducing a byte-aligned packed format, together with the
/// byte order of the encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DType {
    fields: Vec<DataType>,
    byte_order: Endianness,
}

impl DType {
    /// A dtype with a single field.
    pub fn scalar(data_type: DataType, byte_order: Endianness) -> Self {
        Self {
            fields: vec![data_type],
            byte_order,
        }
    }

    /// A native-order dtype with a single field.
    pub fn native(data_type: DataType) -> Self {
        Self::scalar(data_type, Endianness::native())
    }

    /// A compound dtype with one field per entry. `fields` must be nonempty.
    pub fn compound(fields: Vec<DataType>, byte_order: Endianness) -> Self {
        debug_assert!(!fields.is_empty());
        Self { fields, byte_order }
    }

    /// The ordered element fields. A scalar dtype has exactly one.
    pub fn fields(&self) -> &[DataType] {
        &self.fields
    }

    /// Whether this dtype is a single scalar field.
    pub fn is_scalar(&self) -> bool {
        self.fields.len() == 1
    }

    /// The single field of a scalar dtype, `None` for compounds.
    pub fn scalar_type(&self) -> Option<DataType> {
        match self.fields[..] {
            [data_type] => Some(data_type),
            _ => None,
        }
    }

    /// The byte order of the encoded bytes.
    pub fn byte_order(&self) -> Endianness {
        self.byte_order
    }

    /// Total bytes of one record.
    pub fn itemsize(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    /// The same dtype with the opposite byte order.
    pub fn new_byte_order(&self) -> Self {
        self.with_byte_order(self.byte_order.swapped())
    }

    /// The same dtype with the given byte order.
    pub fn with_byte_order(&self, byte_order: Endianness) -> Self {
        Self {
            fields: self.fields.clone(),
            byte_order,
        }
    }

    /// Whether the encoded byte order matches the host.
    pub fn is_native(&self) -> bool {
        self.byte_order.is_native()
    }

    /// Swap every multi-byte field of every record in `data`, in place.
    ///
    /// `data` must be a whole number of records.
    pub fn byte_swap(&self, data: &mut [u8]) {
        let itemsize = self.itemsize();
        debug_assert_eq!(data.len() % itemsize, 0);
        for record in data.chunks_exact_mut(itemsize) {
            let mut offset = 0;
            for field in &self.fields {
                let size = field.size();
                record[offset..offset + size].reverse();
                offset += size;
            }
        }
    }

    /// Parse a scalar numpy `descr` string such as `>u2`, `<f8` or `|S1`.
    pub fn parse_scalar_descr(descr: &str) -> SpeadResult<Self> {
        let (byte_order, body) = match descr.chars().next() {
            Some('<') => (Endianness::LittleEndian, &descr[1..]),
            Some('>') => (Endianness::BigEndian, &descr[1..]),
            Some('=') | Some('|') => (Endianness::native(), &descr[1..]),
            _ => (Endianness::native(), descr),
        };
        let data_type = DataType::from_descr_body(body).ok_or_else(|| {
            SpeadError::DescriptorParse(format!(
                "descr is not a valid dtype descriptor: {descr:?}"
            ))
        })?;
        Ok(Self::scalar(data_type, byte_order))
    }

    fn field_descr(&self, field: DataType) -> String {
        if field.size() == 1 {
            format!("|{}", field.descr_body())
        } else {
            format!("{}{}", self.byte_order.symbol(), field.descr_body())
        }
    }

    /// The canonical `descr` repr as it appears inside an array header:
    /// `'<u2'` for scalars, `[('f0', '>u4'), ('f1', '>i2')]` for compounds.
    pub fn descr(&self) -> String {
        match self.fields[..] {
            [field] => format!("'{}'", self.field_descr(field)),
            _ => {
                let entries: Vec<String> = self
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, &field)| format!("('f{}', '{}')", i, self.field_descr(field)))
                    .collect();
                format!("[{}]", entries.join(", "))
            }
        }
    }
}
