use bytemuck::try_cast_slice;
use bytes::Bytes;

use crate::data_type::{DType, DataType};
use crate::error::{SpeadError, SpeadResult};

/// Axis ordering of a stored array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayOrder {
    /// Row-major: the last axis varies fastest.
    C,
    /// Column-major: the first axis varies fastest.
    F,
}

/// A typed n-dimensional array backed by raw bytes.
///
/// The backing buffer is laid out per the array's [`ArrayOrder`]. Arrays
/// produced by decoding are normalized to native byte order, so their data
/// can be viewed directly through [`as_typed`][Self::as_typed].
///
/// Cloning is cheap: the buffer is reference-counted and immutable, which
/// also makes buffers returned by item serialization safe to alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// The raw byte data of the array.
    data: Bytes,

    /// The element dtype, including the byte order of `data`.
    dtype: DType,

    /// The shape of the array; scalars have an empty shape.
    shape: Vec<usize>,

    /// The axis ordering of `data`.
    order: ArrayOrder,
}

impl Array {
    /// Wrap raw bytes as an array.
    ///
    /// The buffer length must match the shape's element count times the
    /// dtype's record size.
    pub fn new(
        data: Bytes,
        dtype: DType,
        shape: Vec<usize>,
        order: ArrayOrder,
    ) -> SpeadResult<Self> {
        let elements: usize = shape.iter().product();
        let expected = elements * dtype.itemsize();
        if data.len() != expected {
            return Err(SpeadError::TypeMismatch(format!(
                "buffer holds {} bytes but shape {:?} of {} needs {}",
                data.len(),
                shape,
                dtype.descr(),
                expected
            )));
        }
        Ok(Self {
            data,
            dtype,
            shape,
            order,
        })
    }

    /// Build a native-order, row-major array from a typed vector.
    pub fn from_vec<T: Element>(values: Vec<T>, shape: &[usize]) -> SpeadResult<Self> {
        Self::from_vec_with_order(values, shape, ArrayOrder::C)
    }

    /// Build a native-order array from a typed vector already laid out in
    /// the given axis order.
    pub fn from_vec_with_order<T: Element>(
        values: Vec<T>,
        shape: &[usize],
        order: ArrayOrder,
    ) -> SpeadResult<Self> {
        let data = Bytes::from(bytemuck::pod_collect_to_vec::<T, u8>(&values));
        Self::new(data, DType::native(T::DATA_TYPE), shape.to_vec(), order)
    }

    /// Access the raw underlying byte data of the array.
    ///
    /// Use [`as_typed`][Self::as_typed] to get a typed view of the data.
    pub fn raw_data(&self) -> &Bytes {
        &self.data
    }

    /// The element dtype of the array.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// Get the shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The axis ordering of the backing buffer.
    pub fn order(&self) -> ArrayOrder {
        self.order
    }

    /// Total number of elements.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Get a typed view of the array data.
    ///
    /// Returns `None` for compound dtypes, for non-native byte order, and
    /// when the backing buffer is not aligned for the element type.
    pub fn as_typed(&self) -> Option<TypedArray<'_>> {
        let data_type = self.dtype.scalar_type()?;
        if data_type.size() > 1 && !self.dtype.byte_order().is_native() {
            return None;
        }
        match data_type {
            DataType::Bool => Some(TypedArray::Bool(&self.data)),
            DataType::Str1 => Some(TypedArray::Str1(&self.data)),
            DataType::UInt8 => Some(TypedArray::Uint8(&self.data)),
            DataType::UInt16 => Some(TypedArray::Uint16(try_cast_slice(&self.data).ok()?)),
            DataType::UInt32 => Some(TypedArray::Uint32(try_cast_slice(&self.data).ok()?)),
            DataType::UInt64 => Some(TypedArray::Uint64(try_cast_slice(&self.data).ok()?)),
            DataType::Int8 => Some(TypedArray::Int8(try_cast_slice(&self.data).ok()?)),
            DataType::Int16 => Some(TypedArray::Int16(try_cast_slice(&self.data).ok()?)),
            DataType::Int32 => Some(TypedArray::Int32(try_cast_slice(&self.data).ok()?)),
            DataType::Int64 => Some(TypedArray::Int64(try_cast_slice(&self.data).ok()?)),
            DataType::Float32 => Some(TypedArray::Float32(try_cast_slice(&self.data).ok()?)),
            DataType::Float64 => Some(TypedArray::Float64(try_cast_slice(&self.data).ok()?)),
        }
    }
}

/// An enum representing a typed view of the array data.
#[derive(Debug, Clone, Copy)]
pub enum TypedArray<'a> {
    /// Boolean array, one byte per element.
    Bool(&'a [u8]),
    /// Single-byte string array.
    Str1(&'a [u8]),
    /// Unsigned 8-bit integer array.
    Uint8(&'a [u8]),
    /// Unsigned 16-bit integer array.
    Uint16(&'a [u16]),
    /// Unsigned 32-bit integer array.
    Uint32(&'a [u32]),
    /// Unsigned 64-bit integer array.
    Uint64(&'a [u64]),
    /// Signed 8-bit integer array.
    Int8(&'a [i8]),
    /// Signed 16-bit integer array.
    Int16(&'a [i16]),
    /// Signed 32-bit integer array.
    Int32(&'a [i32]),
    /// Signed 64-bit integer array.
    Int64(&'a [i64]),
    /// 32-bit floating point array.
    Float32(&'a [f32]),
    /// 64-bit floating point array.
    Float64(&'a [f64]),
}

/// Element types that can back an [`Array`] built from a typed vector.
pub trait Element: bytemuck::Pod {
    /// The corresponding array element type.
    const DATA_TYPE: DataType;
}

macro_rules! element {
    ($($ty:ty => $data_type:ident,)*) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$data_type;
            }
        )*
    };
}

element! {
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::Endianness;

    #[test]
    fn test_new_checks_length() {
        let dtype = DType::native(DataType::UInt16);
        assert!(Array::new(Bytes::from_static(&[0; 6]), dtype.clone(), vec![3], ArrayOrder::C).is_ok());
        assert!(Array::new(Bytes::from_static(&[0; 5]), dtype, vec![3], ArrayOrder::C).is_err());
    }

    #[test]
    fn test_from_vec_round_trip() {
        let array = Array::from_vec(vec![1u16, 2, 3, 4], &[2, 2]).unwrap();
        assert_eq!(array.num_elements(), 4);
        match array.as_typed().unwrap() {
            TypedArray::Uint16(values) => assert_eq!(values, &[1, 2, 3, 4]),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn test_as_typed_requires_native_order() {
        let dtype = DType::scalar(DataType::UInt16, Endianness::native().swapped());
        let array = Array::new(Bytes::from_static(&[0, 1, 0, 2]), dtype, vec![2], ArrayOrder::C)
            .unwrap();
        assert!(array.as_typed().is_none());
    }
}
