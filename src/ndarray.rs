//! [`ndarray`] integration for spead-codec.

use bytemuck::try_cast_slice;
use ndarray::{ArrayViewD, CowArray, IxDyn, ShapeBuilder};

use crate::array::{Array, ArrayOrder};
use crate::data_type::DataType;
use crate::error::{SpeadError, SpeadResult};

/// An enum representing a view of an n-dimensional array with various
/// possible data types.
///
/// We use `CowArray` because whether the data can be exposed zero-copy
/// depends on the alignment of the decoded buffer; decoded arrays are
/// already normalized to native byte order.
pub enum NdArrayView<'a> {
    /// Unsigned 8-bit integer array
    Uint8(CowArray<'a, u8, IxDyn>),

    /// Unsigned 16-bit integer array
    Uint16(CowArray<'a, u16, IxDyn>),

    /// Unsigned 32-bit integer array
    Uint32(CowArray<'a, u32, IxDyn>),

    /// Unsigned 64-bit integer array
    Uint64(CowArray<'a, u64, IxDyn>),

    /// Signed 8-bit integer array
    Int8(CowArray<'a, i8, IxDyn>),

    /// Signed 16-bit integer array
    Int16(CowArray<'a, i16, IxDyn>),

    /// Signed 32-bit integer array
    Int32(CowArray<'a, i32, IxDyn>),

    /// Signed 64-bit integer array
    Int64(CowArray<'a, i64, IxDyn>),

    /// 32-bit floating point array
    Float32(CowArray<'a, f32, IxDyn>),

    /// 64-bit floating point array
    Float64(CowArray<'a, f64, IxDyn>),
}

fn view<'a, T: bytemuck::Pod>(value: &'a Array) -> SpeadResult<CowArray<'a, T, IxDyn>> {
    let slice: &[T] = try_cast_slice(value.raw_data())
        .map_err(|err| SpeadError::TypeMismatch(err.to_string()))?;
    let view = match value.order() {
        ArrayOrder::C => ArrayViewD::from_shape(IxDyn(value.shape()), slice),
        ArrayOrder::F => ArrayViewD::from_shape(IxDyn(value.shape()).f(), slice),
    }
    .map_err(|err| SpeadError::TypeMismatch(err.to_string()))?;
    Ok(CowArray::from(view))
}

impl<'a> TryFrom<&'a Array> for NdArrayView<'a> {
    type Error = SpeadError;

    fn try_from(value: &'a Array) -> Result<Self, Self::Error> {
        if !value.dtype().byte_order().is_native() {
            return Err(SpeadError::TypeMismatch(
                "ndarray views require native byte order".to_string(),
            ));
        }
        let data_type = value.dtype().scalar_type().ok_or_else(|| {
            SpeadError::TypeMismatch("ndarray views require a scalar dtype".to_string())
        })?;
        match data_type {
            DataType::UInt8 => Ok(NdArrayView::Uint8(view(value)?)),
            DataType::UInt16 => Ok(NdArrayView::Uint16(view(value)?)),
            DataType::UInt32 => Ok(NdArrayView::Uint32(view(value)?)),
            DataType::UInt64 => Ok(NdArrayView::Uint64(view(value)?)),
            DataType::Int8 => Ok(NdArrayView::Int8(view(value)?)),
            DataType::Int16 => Ok(NdArrayView::Int16(view(value)?)),
            DataType::Int32 => Ok(NdArrayView::Int32(view(value)?)),
            DataType::Int64 => Ok(NdArrayView::Int64(view(value)?)),
            DataType::Float32 => Ok(NdArrayView::Float32(view(value)?)),
            DataType::Float64 => Ok(NdArrayView::Float64(view(value)?)),
            DataType::Bool | DataType::Str1 => Err(SpeadError::TypeMismatch(format!(
                "no ndarray view for {data_type:?} elements"
            ))),
        }
    }
}
