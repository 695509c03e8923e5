use crate::array::ArrayOrder;
use crate::data_type::DType;
use crate::error::{SpeadError, SpeadResult};
use crate::format::Format;
use crate::header;
use crate::heap::{BugCompat, RawDescriptor};

/// The element representation of a descriptor: either a numeric dtype or a
/// packed bitfield format.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// Raw bytes reinterpret as numeric elements.
    DType(DType),
    /// Raw bytes unpack as bitfield records.
    Format(Format),
}

/// Immutable metadata describing one logical item: identity, shape, axis
/// order and element representation.
///
/// A descriptor constructed from a format whose fields are all
/// byte-aligned is normalized to the equivalent numeric dtype, so the two
/// construction paths converge on the same state.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    id: u64,
    name: String,
    description: String,
    shape: Vec<i64>,
    element_type: ElementType,
    order: ArrayOrder,
}

impl Descriptor {
    /// Construct a descriptor around a numeric dtype.
    pub fn with_dtype(
        id: u64,
        name: impl Into<String>,
        description: impl Into<String>,
        shape: Vec<i64>,
        dtype: DType,
        order: ArrayOrder,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            shape,
            element_type: ElementType::DType(dtype),
            order,
        }
    }

    /// Construct a descriptor around a packed format. Format-mode
    /// descriptors are always row-major; dtype-compatible formats are
    /// reduced to their dtype form.
    pub fn with_format(
        id: u64,
        name: impl Into<String>,
        description: impl Into<String>,
        shape: Vec<i64>,
        format: Format,
    ) -> Self {
        let element_type = match format.to_dtype() {
            Some(dtype) => ElementType::DType(dtype),
            None => ElementType::Format(format),
        };
        Self {
            id,
            name: name.into(),
            description: description.into(),
            shape,
            element_type,
            order: ArrayOrder::C,
        }
    }

    /// The item id this descriptor applies to.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Item name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared shape; negative entries mark variable dimensions.
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Axis order of decoded values.
    pub fn order(&self) -> ArrayOrder {
        self.order
    }

    /// The element representation.
    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    /// The numeric dtype, when this descriptor is in dtype mode.
    pub fn dtype(&self) -> Option<&DType> {
        match &self.element_type {
            ElementType::DType(dtype) => Some(dtype),
            ElementType::Format(_) => None,
        }
    }

    /// The packed format, when this descriptor is in format mode.
    pub fn format(&self) -> Option<&Format> {
        match &self.element_type {
            ElementType::Format(format) => Some(format),
            ElementType::DType(_) => None,
        }
    }

    /// Whether any dimension is variable.
    pub fn is_variable_size(&self) -> bool {
        self.shape.iter().any(|&dim| dim < 0)
    }

    /// Resolve the shape against the number of element slots available in
    /// a raw buffer.
    ///
    /// With no unknown dimension the shape is returned unchanged. A single
    /// unknown dimension resolves to `max_elements` divided by the product
    /// of the fixed dimensions (zero when that product is zero). More than
    /// one unknown dimension is an error.
    pub fn dynamic_shape(&self, max_elements: usize) -> SpeadResult<Vec<usize>> {
        let mut known: usize = 1;
        let mut unknown_pos = None;
        for (i, &dim) in self.shape.iter().enumerate() {
            if dim >= 0 {
                known *= dim as usize;
            } else if unknown_pos.is_some() {
                return Err(SpeadError::MultipleUnknownDimensions);
            } else {
                unknown_pos = Some(i);
            }
        }
        let mut shape: Vec<usize> = self.shape.iter().map(|&dim| dim.max(0) as usize).collect();
        if let Some(pos) = unknown_pos {
            shape[pos] = if known == 0 { 0 } else { max_elements / known };
        }
        Ok(shape)
    }

    /// Determine whether `shape` is compatible with the (possibly
    /// variable-sized) shape for this descriptor.
    pub fn compatible_shape(&self, shape: &[usize]) -> bool {
        self.shape.len() == shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(&expected, &actual)| expected < 0 || expected as usize == actual)
    }

    /// Build a descriptor from its wire form.
    ///
    /// A nonempty numpy-style header takes precedence over the raw format;
    /// under [`BugCompat::SWAP_ENDIAN`] the parsed dtype is reinterpreted
    /// with the opposite byte order.
    pub fn from_raw(raw: &RawDescriptor, bug_compat: BugCompat) -> SpeadResult<Self> {
        if !raw.numpy_header.is_empty() {
            let parsed = header::parse_header(&raw.numpy_header)?;
            let mut dtype = parsed.dtype;
            if bug_compat.contains(BugCompat::SWAP_ENDIAN) {
                dtype = dtype.new_byte_order();
            }
            Ok(Self::with_dtype(
                raw.id,
                raw.name.clone(),
                raw.description.clone(),
                parsed.shape,
                dtype,
                parsed.order,
            ))
        } else {
            let format = Format::new(&raw.format)?;
            Ok(Self::with_format(
                raw.id,
                raw.name.clone(),
                raw.description.clone(),
                raw.shape.clone(),
                format,
            ))
        }
    }

    /// Serialize this descriptor to its wire form, the mirror of
    /// [`from_raw`](Self::from_raw).
    pub fn to_raw(&self, bug_compat: BugCompat) -> RawDescriptor {
        let mut raw = RawDescriptor::new(self.id, self.name.clone(), self.description.clone());
        raw.shape = self.shape.clone();
        match &self.element_type {
            ElementType::DType(dtype) => {
                let dtype = if bug_compat.contains(BugCompat::SWAP_ENDIAN) {
                    dtype.new_byte_order()
                } else {
                    dtype.clone()
                };
                raw.numpy_header = header::make_header(&self.shape, &dtype, self.order);
            }
            ElementType::Format(format) => {
                raw.format = format.raw_fields();
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::{DataType, Endianness};

    fn variable_descriptor(shape: Vec<i64>) -> Descriptor {
        Descriptor::with_dtype(
            1,
            "x",
            "",
            shape,
            DType::native(DataType::UInt8),
            ArrayOrder::C,
        )
    }

    #[test]
    fn test_dynamic_shape_fixed() {
        let d = variable_descriptor(vec![2, 3]);
        assert!(!d.is_variable_size());
        assert_eq!(d.dynamic_shape(100).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_dynamic_shape_resolves_unknown() {
        let d = variable_descriptor(vec![2, -1, 3]);
        assert!(d.is_variable_size());
        assert_eq!(d.dynamic_shape(25).unwrap(), vec![2, 4, 3]);
        assert_eq!(d.dynamic_shape(5).unwrap(), vec![2, 0, 3]);
    }

    #[test]
    fn test_dynamic_shape_zero_known_product() {
        let d = variable_descriptor(vec![0, -1]);
        assert_eq!(d.dynamic_shape(10).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_dynamic_shape_multiple_unknowns() {
        let d = variable_descriptor(vec![-1, -1]);
        assert!(matches!(
            d.dynamic_shape(4),
            Err(SpeadError::MultipleUnknownDimensions)
        ));
    }

    #[test]
    fn test_compatible_shape() {
        let d = variable_descriptor(vec![2, -1]);
        assert!(d.compatible_shape(&[2, 7]));
        assert!(d.compatible_shape(&[2, 0]));
        assert!(!d.compatible_shape(&[3, 7]));
        assert!(!d.compatible_shape(&[2]));
        assert!(!d.compatible_shape(&[2, 7, 1]));
    }

    #[test]
    fn test_format_reduction_matches_direct_dtype() {
        let from_format = Descriptor::with_format(
            1,
            "x",
            "",
            vec![4],
            Format::new(&[('u', 16)]).unwrap(),
        );
        let from_dtype = Descriptor::with_dtype(
            1,
            "x",
            "",
            vec![4],
            DType::scalar(DataType::UInt16, Endianness::BigEndian),
            ArrayOrder::C,
        );
        assert_eq!(from_format, from_dtype);
    }

    #[test]
    fn test_non_reducible_format_stays_format() {
        let d = Descriptor::with_format(1, "x", "", vec![], Format::new(&[('u', 12)]).unwrap());
        assert!(d.format().is_some());
        assert!(d.dtype().is_none());
    }

    #[test]
    fn test_raw_round_trip_format_mode() {
        let mut raw = RawDescriptor::new(9, "flags", "status flags");
        raw.shape = vec![8];
        raw.format = vec![('u', 3), ('b', 1)];
        let descriptor = Descriptor::from_raw(&raw, BugCompat::NONE).unwrap();
        assert_eq!(descriptor.to_raw(BugCompat::NONE), raw);
    }

    #[test]
    fn test_swap_endian_round_trip_is_fixed_point() {
        let mut raw = RawDescriptor::new(9, "samples", "");
        raw.shape = vec![4];
        raw.numpy_header =
            "{'descr': '>u2', 'fortran_order': False, 'shape': (4,)}".to_owned();
        let flags = BugCompat::SWAP_ENDIAN;

        let first = Descriptor::from_raw(&raw, flags).unwrap();
        assert_eq!(
            first.dtype().unwrap().byte_order(),
            Endianness::LittleEndian
        );
        let second = Descriptor::from_raw(&first.to_raw(flags), flags).unwrap();
        assert_eq!(first, second);
    }
}
