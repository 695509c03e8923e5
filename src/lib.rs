#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod array;
pub mod bitstream;
mod data_type;
mod descriptor;
pub mod error;
mod format;
mod group;
mod header;
mod heap;
mod item;
#[cfg(feature = "ndarray")]
pub mod ndarray;
mod value;

pub use array::{Array, ArrayOrder, Element, TypedArray};
pub use data_type::{DType, DataType, Endianness};
pub use descriptor::{Descriptor, ElementType};
pub use error::{SpeadError, SpeadResult};
pub use format::{Field, FieldCode, Format};
pub use group::ItemGroup;
pub use heap::{BugCompat, Heap, RawDescriptor, RawItem, MAX_RESERVED_ID};
pub use item::Item;
pub use value::{Scalar, Value};
