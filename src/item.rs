use bytes::Bytes;

use crate::array::{Array, ArrayOrder};
use crate::bitstream::{BitReader, BitWriter};
use crate::data_type::{DType, DataType, Endianness};
use crate::descriptor::{Descriptor, ElementType};
use crate::error::{SpeadError, SpeadResult};
use crate::format::Format;
use crate::heap::{BugCompat, RawDescriptor, RawItem};
use crate::value::{Scalar, Value};

/// A [`Descriptor`] paired with a current value and a version counter.
///
/// The version starts at 1 and increments on every assignment; when an item
/// is updated from a heap the group overwrites the version with the heap's
/// sequence number, so consumers can correlate values to the heap that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    descriptor: Descriptor,
    value: Option<Value>,
    version: u64,
}

impl Item {
    /// Create an item with no value yet.
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            value: None,
            version: 1,
        }
    }

    /// Create an item holding an initial value.
    pub fn with_value(descriptor: Descriptor, value: Value) -> Self {
        Self {
            descriptor,
            value: Some(value),
            version: 1,
        }
    }

    /// Build an item from a wire descriptor.
    pub fn from_raw(raw: &RawDescriptor, bug_compat: BugCompat) -> SpeadResult<Self> {
        Ok(Self::new(Descriptor::from_raw(raw, bug_compat)?))
    }

    /// The descriptor this item is bound to.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The item id, from the descriptor.
    pub fn id(&self) -> u64 {
        self.descriptor.id()
    }

    /// The item name, from the descriptor.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The current value, if one has been assigned.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The version counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Assign a new value, bumping the version.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
        self.version += 1;
    }

    /// Materialize the value from a raw heap field.
    ///
    /// Immediate fields are head-padded (significant bytes at the end of
    /// the buffer); payload fields are tail-padded (excess trailing bytes
    /// ignored). The decoded value owns its storage, so the raw buffer is
    /// not retained past this call.
    pub fn set_from_raw(&mut self, raw: &RawItem) -> SpeadResult<()> {
        let value = match self.descriptor.element_type() {
            ElementType::Format(format) => decode_format(&self.descriptor, format, raw)?,
            ElementType::DType(dtype) => decode_dtype(&self.descriptor, dtype, raw)?,
        };
        self.set_value(value);
        Ok(())
    }

    /// Serialize the current value to a raw heap field buffer.
    ///
    /// In dtype mode, when the stored array already has the descriptor's
    /// byte order and axis order, the returned buffer aliases the value's
    /// storage (the shared `Bytes` allocation is immutable, which enforces
    /// the read-only aliasing contract); otherwise a fresh buffer is
    /// produced. Format mode always allocates.
    pub fn to_buffer(&self) -> SpeadResult<Bytes> {
        let value = self.value.as_ref().ok_or(SpeadError::MissingValue)?;
        match self.descriptor.element_type() {
            ElementType::DType(dtype) => encode_dtype(&self.descriptor, dtype, value),
            ElementType::Format(format) => encode_format(&self.descriptor, format, value),
        }
    }
}

// ---- decoding ----

fn decode_format(
    descriptor: &Descriptor,
    format: &Format,
    raw: &RawItem,
) -> SpeadResult<Value> {
    let bit_length = format.bits_per_record() as usize;
    let max_elements = raw.value.len() * 8 / bit_length;
    let shape = descriptor.dynamic_shape(max_elements)?;
    let elements: usize = shape.iter().product();
    if elements > max_elements {
        return Err(SpeadError::TooFewElements {
            available: max_elements,
            required: elements,
        });
    }
    let buf: &[u8] = if raw.is_immediate {
        let size_bytes = (elements * bit_length + 7) / 8;
        &raw.value[raw.value.len() - size_bytes..]
    } else {
        &raw.value
    };
    let mut reader = BitReader::new(buf);
    load_recursive(&shape, format, &mut reader)
}

fn load_recursive(
    shape: &[usize],
    format: &Format,
    reader: &mut BitReader<'_>,
) -> SpeadResult<Value> {
    if let Some((&dim, rest)) = shape.split_first() {
        let mut items = Vec::with_capacity(dim);
        for _ in 0..dim {
            items.push(load_recursive(rest, format, reader)?);
        }
        Ok(Value::List(items))
    } else {
        format.decode_record(reader)
    }
}

fn decode_dtype(descriptor: &Descriptor, dtype: &DType, raw: &RawItem) -> SpeadResult<Value> {
    let itemsize = dtype.itemsize();
    let max_elements = raw.value.len() / itemsize;
    let shape = descriptor.dynamic_shape(max_elements)?;
    let elements: usize = shape.iter().product();
    if elements > max_elements {
        return Err(SpeadError::TooFewElements {
            available: max_elements,
            required: elements,
        });
    }
    let size_bytes = elements * itemsize;
    let start = if raw.is_immediate {
        raw.value.len() - size_bytes
    } else {
        0
    };
    let mut data = raw.value[start..start + size_bytes].to_vec();

    // Normalize to native byte order so later reads are cheap.
    let mut dtype = dtype.clone();
    if !dtype.is_native() {
        dtype.byte_swap(&mut data);
        dtype = dtype.with_byte_order(Endianness::native());
    }
    let array = Array::new(Bytes::from(data), dtype, shape, descriptor.order())?;

    if array.shape().is_empty() {
        return Ok(extract_record(&array));
    }
    if array.shape().len() == 1 && array.dtype().scalar_type() == Some(DataType::Str1) {
        let bytes = array.raw_data();
        if !bytes.is_ascii() {
            return Err(SpeadError::TypeMismatch(
                "string value is not ASCII".to_owned(),
            ));
        }
        return Ok(Value::String(
            String::from_utf8_lossy(bytes).into_owned(),
        ));
    }
    Ok(Value::Array(array))
}

/// Pull the single record out of a zero-dimensional array.
fn extract_record(array: &Array) -> Value {
    let data = array.raw_data();
    let fields = array.dtype().fields();
    let mut scalars = Vec::with_capacity(fields.len());
    let mut offset = 0;
    for &field in fields {
        scalars.push(Scalar::from_native_bytes(field, &data[offset..offset + field.size()]));
        offset += field.size();
    }
    if scalars.len() == 1 {
        Value::Scalar(scalars.remove(0))
    } else {
        Value::Record(scalars)
    }
}

// ---- encoding ----

fn encode_format(descriptor: &Descriptor, format: &Format, value: &Value) -> SpeadResult<Bytes> {
    let elements = count_elements(descriptor.shape(), value)?;
    let total_bits = format.bits_per_record() as usize * elements;
    let mut writer = BitWriter::with_capacity((total_bits + 7) / 8);
    store_recursive(descriptor.shape(), format, value, &mut writer)?;
    Ok(writer.finish())
}

/// Element count derived by walking the first branch of each nesting
/// level; every branch is fully validated during the store pass.
fn count_elements(shape: &[i64], value: &Value) -> SpeadResult<usize> {
    match shape.split_first() {
        None => Ok(1),
        Some((_, rest)) => match value {
            Value::List(items) => match items.first() {
                Some(first) => Ok(items.len() * count_elements(rest, first)?),
                None => Ok(0),
            },
            Value::String(s) if rest.is_empty() => Ok(s.len()),
            _ => Err(SpeadError::ValueShape(
                "value has too few dimensions for shape".to_owned(),
            )),
        },
    }
}

fn store_recursive(
    shape: &[i64],
    format: &Format,
    value: &Value,
    writer: &mut BitWriter,
) -> SpeadResult<()> {
    if let Some((&dim, rest)) = shape.split_first() {
        match value {
            Value::List(items) => {
                if dim >= 0 && dim as usize != items.len() {
                    return Err(SpeadError::ValueShape(format!(
                        "length {} does not match dimension {}",
                        items.len(),
                        dim
                    )));
                }
                for item in items {
                    store_recursive(rest, format, item, writer)?;
                }
                Ok(())
            }
            // Strings encode through a character format, one record per char.
            Value::String(s) if rest.is_empty() => {
                if dim >= 0 && dim as usize != s.len() {
                    return Err(SpeadError::ValueShape(format!(
                        "length {} does not match dimension {}",
                        s.len(),
                        dim
                    )));
                }
                for c in s.chars() {
                    format.encode_record(&Value::Scalar(Scalar::Char(c)), writer)?;
                }
                Ok(())
            }
            _ => Err(SpeadError::ValueShape(
                "value has too few dimensions for shape".to_owned(),
            )),
        }
    } else {
        match value {
            Value::List(_) => Err(SpeadError::ValueShape(
                "value has too many dimensions for shape".to_owned(),
            )),
            record => format.encode_record(record, writer),
        }
    }
}

fn encode_dtype(descriptor: &Descriptor, dtype: &DType, value: &Value) -> SpeadResult<Bytes> {
    match value {
        Value::Array(array) => encode_array(descriptor, dtype, array),
        Value::Scalar(scalar) => {
            check_rank0(descriptor)?;
            let data_type = dtype.scalar_type().ok_or_else(|| {
                SpeadError::TypeMismatch(format!(
                    "compound dtype {} needs a record value",
                    dtype.descr()
                ))
            })?;
            let mut out = Vec::with_capacity(dtype.itemsize());
            scalar.write_bytes(data_type, dtype.byte_order(), &mut out)?;
            Ok(Bytes::from(out))
        }
        Value::Record(scalars) => {
            check_rank0(descriptor)?;
            if scalars.len() != dtype.fields().len() {
                return Err(SpeadError::ValueShape(format!(
                    "record has {} fields, dtype has {}",
                    scalars.len(),
                    dtype.fields().len()
                )));
            }
            let mut out = Vec::with_capacity(dtype.itemsize());
            for (scalar, &field) in scalars.iter().zip(dtype.fields()) {
                scalar.write_bytes(field, dtype.byte_order(), &mut out)?;
            }
            Ok(Bytes::from(out))
        }
        Value::String(s) => {
            if dtype.scalar_type() != Some(DataType::Str1) {
                return Err(SpeadError::TypeMismatch(format!(
                    "cannot encode a string as {}",
                    dtype.descr()
                )));
            }
            if !s.is_ascii() {
                return Err(SpeadError::TypeMismatch(
                    "string value is not ASCII".to_owned(),
                ));
            }
            if !descriptor.compatible_shape(&[s.len()]) {
                return Err(SpeadError::IncompatibleShape {
                    actual: vec![s.len()],
                    expected: descriptor.shape().to_vec(),
                });
            }
            Ok(Bytes::copy_from_slice(s.as_bytes()))
        }
        Value::List(_) => encode_nested(descriptor, dtype, value),
    }
}

fn check_rank0(descriptor: &Descriptor) -> SpeadResult<()> {
    if descriptor.compatible_shape(&[]) {
        Ok(())
    } else {
        Err(SpeadError::IncompatibleShape {
            actual: vec![],
            expected: descriptor.shape().to_vec(),
        })
    }
}

fn encode_array(descriptor: &Descriptor, dtype: &DType, array: &Array) -> SpeadResult<Bytes> {
    if array.dtype().fields() != dtype.fields() {
        return Err(SpeadError::TypeMismatch(format!(
            "array dtype {} does not match descriptor dtype {}",
            array.dtype().descr(),
            dtype.descr()
        )));
    }
    if !descriptor.compatible_shape(array.shape()) {
        return Err(SpeadError::IncompatibleShape {
            actual: array.shape().to_vec(),
            expected: descriptor.shape().to_vec(),
        });
    }
    let same_order = array.order() == descriptor.order() || array.shape().len() < 2;
    let has_multibyte = dtype.fields().iter().any(|f| f.size() > 1);
    let needs_swap = has_multibyte && array.dtype().byte_order() != dtype.byte_order();

    if same_order && !needs_swap {
        // Zero-copy: alias the stored value.
        return Ok(array.raw_data().clone());
    }
    let mut data = if same_order {
        array.raw_data().to_vec()
    } else {
        reorder_records(
            array.raw_data(),
            dtype.itemsize(),
            array.shape(),
            array.order(),
            descriptor.order(),
        )
    };
    if needs_swap {
        dtype.byte_swap(&mut data);
    }
    Ok(Bytes::from(data))
}

fn encode_nested(descriptor: &Descriptor, dtype: &DType, value: &Value) -> SpeadResult<Bytes> {
    let rank = descriptor.shape().len();
    let shape = nested_shape(value, rank)?;
    if !descriptor.compatible_shape(&shape) {
        return Err(SpeadError::IncompatibleShape {
            actual: shape,
            expected: descriptor.shape().to_vec(),
        });
    }
    let elements: usize = shape.iter().product();
    let mut out = Vec::with_capacity(elements * dtype.itemsize());
    match descriptor.order() {
        ArrayOrder::C => encode_nested_c(value, &shape, 0, dtype, &mut out)?,
        ArrayOrder::F => {
            let mut index = vec![0usize; rank];
            for _ in 0..elements {
                let leaf = leaf_at(value, &index, &shape)?;
                encode_leaf(leaf, dtype, &mut out)?;
                advance_first_fastest(&mut index, &shape);
            }
        }
    }
    Ok(Bytes::from(out))
}

/// Shape of a nested list value, descending the first branch per level.
fn nested_shape(value: &Value, rank: usize) -> SpeadResult<Vec<usize>> {
    let mut shape = Vec::with_capacity(rank);
    let mut current = value;
    for _ in 0..rank {
        match current {
            Value::List(items) => {
                shape.push(items.len());
                match items.first() {
                    Some(first) => current = first,
                    None => {
                        shape.resize(rank, 0);
                        break;
                    }
                }
            }
            _ => {
                return Err(SpeadError::ValueShape(
                    "value has too few dimensions for shape".to_owned(),
                ))
            }
        }
    }
    Ok(shape)
}

fn encode_nested_c(
    value: &Value,
    shape: &[usize],
    level: usize,
    dtype: &DType,
    out: &mut Vec<u8>,
) -> SpeadResult<()> {
    if level == shape.len() {
        return encode_leaf(value, dtype, out);
    }
    match value {
        Value::List(items) if items.len() == shape[level] => {
            for item in items {
                encode_nested_c(item, shape, level + 1, dtype, out)?;
            }
            Ok(())
        }
        Value::List(items) => Err(SpeadError::ValueShape(format!(
            "length {} does not match dimension {}",
            items.len(),
            shape[level]
        ))),
        _ => Err(SpeadError::ValueShape(
            "value has too few dimensions for shape".to_owned(),
        )),
    }
}

fn leaf_at<'v>(value: &'v Value, index: &[usize], shape: &[usize]) -> SpeadResult<&'v Value> {
    let mut current = value;
    for (level, &i) in index.iter().enumerate() {
        match current {
            Value::List(items) if items.len() == shape[level] => current = &items[i],
            Value::List(items) => {
                return Err(SpeadError::ValueShape(format!(
                    "length {} does not match dimension {}",
                    items.len(),
                    shape[level]
                )))
            }
            _ => {
                return Err(SpeadError::ValueShape(
                    "value has too few dimensions for shape".to_owned(),
                ))
            }
        }
    }
    Ok(current)
}

fn encode_leaf(value: &Value, dtype: &DType, out: &mut Vec<u8>) -> SpeadResult<()> {
    match value {
        Value::Scalar(scalar) => {
            let data_type = dtype.scalar_type().ok_or_else(|| {
                SpeadError::TypeMismatch(format!(
                    "compound dtype {} needs record elements",
                    dtype.descr()
                ))
            })?;
            scalar.write_bytes(data_type, dtype.byte_order(), out)
        }
        Value::Record(scalars) if scalars.len() == dtype.fields().len() => {
            for (scalar, &field) in scalars.iter().zip(dtype.fields()) {
                scalar.write_bytes(field, dtype.byte_order(), out)?;
            }
            Ok(())
        }
        Value::Record(scalars) => Err(SpeadError::ValueShape(format!(
            "record has {} fields, dtype has {}",
            scalars.len(),
            dtype.fields().len()
        ))),
        _ => Err(SpeadError::ValueShape(
            "value has too many dimensions for shape".to_owned(),
        )),
    }
}

/// Copy records from one axis-order layout into the other.
fn reorder_records(
    data: &[u8],
    itemsize: usize,
    shape: &[usize],
    from: ArrayOrder,
    to: ArrayOrder,
) -> Vec<u8> {
    let strides = record_strides(shape, from);
    let total: usize = shape.iter().product();
    let mut out = Vec::with_capacity(data.len());
    let mut index = vec![0usize; shape.len()];
    for _ in 0..total {
        let flat: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        out.extend_from_slice(&data[flat * itemsize..(flat + 1) * itemsize]);
        match to {
            ArrayOrder::C => advance_last_fastest(&mut index, shape),
            ArrayOrder::F => advance_first_fastest(&mut index, shape),
        }
    }
    out
}

fn record_strides(shape: &[usize], order: ArrayOrder) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    match order {
        ArrayOrder::C => {
            for i in (0..shape.len().saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * shape[i + 1];
            }
        }
        ArrayOrder::F => {
            for i in 1..shape.len() {
                strides[i] = strides[i - 1] * shape[i - 1];
            }
        }
    }
    strides
}

fn advance_last_fastest(index: &mut [usize], shape: &[usize]) {
    for axis in (0..shape.len()).rev() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return;
        }
        index[axis] = 0;
    }
}

fn advance_first_fastest(index: &mut [usize], shape: &[usize]) {
    for axis in 0..shape.len() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return;
        }
        index[axis] = 0;
    }
}
