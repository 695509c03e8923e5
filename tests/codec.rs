//! End-to-end tests of the item codec: decode from raw heap fields,
//! serialize back, and group bookkeeping.

use bytes::Bytes;
use spead_codec::{
    Array, ArrayOrder, BugCompat, DType, DataType, Descriptor, Endianness, Format, Heap, Item,
    ItemGroup, RawDescriptor, RawItem, Scalar, TypedArray, Value,
};

fn dtype_descriptor(id: u64, name: &str, header: &str) -> RawDescriptor {
    let mut raw = RawDescriptor::new(id, name, "");
    raw.numpy_header = header.to_owned();
    raw
}

#[test]
fn test_scalar_unsigned_immediate() {
    // An 8-byte immediate carrying a 32-bit unsigned scalar: the used
    // bytes sit at the tail.
    let mut raw = RawDescriptor::new(0x20, "timestamp", "");
    raw.format = vec![('u', 32)];
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();

    let field = RawItem::new(
        0x20,
        Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x00, 0xDE, 0xAD, 0xBE]),
        true,
    );
    item.set_from_raw(&field).unwrap();
    assert_eq!(item.value(), Some(&Value::Scalar(Scalar::Uint(14593470))));
}

#[test]
fn test_signed_record() {
    let mut raw = RawDescriptor::new(0x21, "offsets", "");
    raw.format = vec![('i', 12), ('i', 12)];
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();

    let field = RawItem::new(0x21, Bytes::from_static(&[0xFF, 0xF0, 0x01]), false);
    item.set_from_raw(&field).unwrap();
    assert_eq!(
        item.value(),
        Some(&Value::Record(vec![Scalar::Int(-1), Scalar::Int(1)]))
    );
}

#[test]
fn test_variable_length_vector_dtype_mode() {
    let raw = dtype_descriptor(
        0x22,
        "adc_counts",
        "{'descr': '>u2', 'fortran_order': False, 'shape': (-1,)}",
    );
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();

    let field = RawItem::new(
        0x22,
        Bytes::from_static(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x03]),
        false,
    );
    item.set_from_raw(&field).unwrap();

    let array = item.value().and_then(Value::as_array).unwrap();
    assert_eq!(array.shape(), &[3]);
    assert!(array.dtype().is_native());
    match array.as_typed().unwrap() {
        TypedArray::Uint16(values) => assert_eq!(values, &[1, 2, 3]),
        other => panic!("unexpected view {other:?}"),
    }
}

#[test]
fn test_ascii_string_specialization() {
    let raw = dtype_descriptor(
        0x23,
        "source_name",
        "{'descr': '|S1', 'fortran_order': False, 'shape': (5,)}",
    );
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();

    let field = RawItem::new(0x23, Bytes::from_static(b"Hello"), false);
    item.set_from_raw(&field).unwrap();
    assert_eq!(item.value().and_then(Value::as_str), Some("Hello"));
}

#[test]
fn test_fortran_order_round_trip() {
    // [[1, 2, 3], [4, 5, 6]] laid out column-major.
    let matrix =
        Array::from_vec_with_order(vec![1i32, 4, 2, 5, 3, 6], &[2, 3], ArrayOrder::F).unwrap();
    let descriptor = Descriptor::with_dtype(
        0x24,
        "weights",
        "per-channel weights",
        vec![2, 3],
        DType::native(DataType::Int32),
        ArrayOrder::F,
    );
    let item = Item::with_value(descriptor.clone(), Value::Array(matrix.clone()));

    let raw_descriptor = item.descriptor().to_raw(BugCompat::NONE);
    let buffer = item.to_buffer().unwrap();

    let mut received = Item::from_raw(&raw_descriptor, BugCompat::NONE).unwrap();
    assert_eq!(received.descriptor(), &descriptor);
    received
        .set_from_raw(&RawItem::new(0x24, buffer, false))
        .unwrap();
    assert_eq!(received.value(), Some(&Value::Array(matrix)));
}

#[test]
fn test_group_update_with_unknown_id() {
    let mut group = ItemGroup::new();
    group.add_item(
        Item::from_raw(
            &{
                let mut raw = RawDescriptor::new(10, "gain", "");
                raw.format = vec![('u', 16)];
                raw
            },
            BugCompat::NONE,
        )
        .unwrap(),
    );

    let mut heap = Heap::new(42, BugCompat::NONE);
    heap.add_item(RawItem::new(5, Bytes::from_static(&[0, 1]), true));
    heap.add_item(RawItem::new(10, Bytes::from_static(&[0x12, 0x34]), false));
    heap.add_item(RawItem::new(99, Bytes::from_static(&[0, 1]), false));

    let updated = group.update(&heap).unwrap();
    assert_eq!(updated.len(), 1);
    let item = updated["gain"];
    assert_eq!(item.version(), 42);
    assert_eq!(item.value(), Some(&Value::Scalar(Scalar::Uint(0x1234))));
}

#[test]
fn test_group_update_installs_descriptors() {
    let mut heap = Heap::new(7, BugCompat::NONE);
    heap.add_descriptor(dtype_descriptor(
        0x30,
        "samples",
        "{'descr': '>u2', 'fortran_order': False, 'shape': (-1,)}",
    ));
    heap.add_item(RawItem::new(
        0x30,
        Bytes::from_static(&[0x00, 0x05, 0x00, 0x06]),
        false,
    ));

    let mut group = ItemGroup::new();
    let updated = group.update(&heap).unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated["samples"].version(), 7);

    let array = group
        .by_name("samples")
        .and_then(Item::value)
        .and_then(Value::as_array)
        .unwrap();
    match array.as_typed().unwrap() {
        TypedArray::Uint16(values) => assert_eq!(values, &[5, 6]),
        other => panic!("unexpected view {other:?}"),
    }
}

#[test]
fn test_immediate_padding_equivalence() {
    // Decoding an n-byte immediate equals decoding its last k bytes as
    // payload.
    let mut raw = RawDescriptor::new(0x25, "counter", "");
    raw.format = vec![('u', 24)];

    let full = [0xAAu8, 0xBB, 0xCC, 0x10, 0x20, 0x30];
    let mut as_immediate = Item::from_raw(&raw, BugCompat::NONE).unwrap();
    as_immediate
        .set_from_raw(&RawItem::new(0x25, Bytes::copy_from_slice(&full), true))
        .unwrap();

    let mut as_payload = Item::from_raw(&raw, BugCompat::NONE).unwrap();
    as_payload
        .set_from_raw(&RawItem::new(
            0x25,
            Bytes::copy_from_slice(&full[full.len() - 3..]),
            false,
        ))
        .unwrap();

    assert_eq!(as_immediate.value(), as_payload.value());
    assert_eq!(
        as_immediate.value(),
        Some(&Value::Scalar(Scalar::Uint(0x102030)))
    );
}

#[test]
fn test_dtype_round_trip_both_orders() {
    for order in [ArrayOrder::C, ArrayOrder::F] {
        let array = Array::from_vec_with_order(
            vec![10u16, 20, 30, 40, 50, 60],
            &[3, 2],
            order,
        )
        .unwrap();
        let descriptor = Descriptor::with_dtype(
            0x26,
            "grid",
            "",
            vec![3, 2],
            DType::native(DataType::UInt16),
            order,
        );
        let item = Item::with_value(descriptor, Value::Array(array.clone()));
        let buffer = item.to_buffer().unwrap();

        let mut received = Item::from_raw(
            &item.descriptor().to_raw(BugCompat::NONE),
            BugCompat::NONE,
        )
        .unwrap();
        received
            .set_from_raw(&RawItem::new(0x26, buffer, false))
            .unwrap();
        assert_eq!(received.value(), Some(&Value::Array(array)));
    }
}

#[test]
fn test_format_round_trip_with_shape() {
    let format = Format::new(&[('u', 3), ('i', 5), ('b', 1), ('f', 32)]).unwrap();
    let descriptor = Descriptor::with_format(0x27, "mixed", "", vec![2], format);
    let record = |u, i, b, f| {
        Value::Record(vec![
            Scalar::Uint(u),
            Scalar::Int(i),
            Scalar::Bool(b),
            Scalar::Float32(f),
        ])
    };
    let value = Value::List(vec![record(3, -7, true, 1.5), record(0, 11, false, -2.0)]);

    let item = Item::with_value(descriptor.clone(), value.clone());
    let buffer = item.to_buffer().unwrap();
    assert_eq!(buffer.len(), (2 * 41 + 7) / 8);

    let mut received = Item::new(descriptor);
    received
        .set_from_raw(&RawItem::new(0x27, buffer, false))
        .unwrap();
    assert_eq!(received.value(), Some(&value));
}

#[test]
fn test_swap_endian_decodes_opposite_order() {
    // Under SWAP_ENDIAN a '>u2' descriptor is reinterpreted as '<u2'.
    let raw = dtype_descriptor(
        0x28,
        "counts",
        "{'descr': '>u2', 'fortran_order': False, 'shape': (2,)}",
    );
    let mut item = Item::from_raw(&raw, BugCompat::PYSPEAD_0_5_2).unwrap();
    assert_eq!(
        item.descriptor().dtype().unwrap().byte_order(),
        Endianness::LittleEndian
    );

    item.set_from_raw(&RawItem::new(
        0x28,
        Bytes::from_static(&[0x01, 0x00, 0x02, 0x00]),
        false,
    ))
    .unwrap();
    let array = item.value().and_then(Value::as_array).unwrap();
    match array.as_typed().unwrap() {
        TypedArray::Uint16(values) => assert_eq!(values, &[1, 2]),
        other => panic!("unexpected view {other:?}"),
    }
}

#[test]
fn test_swap_endian_round_trip_fixed_point() {
    let raw = dtype_descriptor(
        0x29,
        "counts",
        "{'descr': '>u2', 'fortran_order': False, 'shape': (2,)}",
    );
    let flags = BugCompat::SWAP_ENDIAN;
    let first = Descriptor::from_raw(&raw, flags).unwrap();
    let second = Descriptor::from_raw(&first.to_raw(flags), flags).unwrap();
    assert_eq!(first, second);
    // The emitted header names the original byte order.
    assert!(first.to_raw(flags).numpy_header.contains(">u2"));
}

#[test]
fn test_compound_dtype_from_reduced_format() {
    // A byte-aligned multi-field format reduces to a big-endian compound
    // dtype; records decode as tuples.
    let mut raw = RawDescriptor::new(0x2A, "status", "");
    raw.format = vec![('u', 16), ('i', 16)];
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();
    assert!(item.descriptor().dtype().is_some());

    item.set_from_raw(&RawItem::new(
        0x2A,
        Bytes::from_static(&[0x01, 0x00, 0xFF, 0xFE]),
        false,
    ))
    .unwrap();
    assert_eq!(
        item.value(),
        Some(&Value::Record(vec![Scalar::Uint(0x0100), Scalar::Int(-2)]))
    );

    // And the mirror: encoding lays the fields back out big-endian.
    assert_eq!(
        item.to_buffer().unwrap().as_ref(),
        &[0x01, 0x00, 0xFF, 0xFE]
    );
}

#[test]
fn test_variable_dimension_resolves_to_floor() {
    let raw = dtype_descriptor(
        0x2B,
        "blocks",
        "{'descr': '>u2', 'fortran_order': False, 'shape': (2, -1)}",
    );
    let mut item = Item::from_raw(&raw, BugCompat::NONE).unwrap();
    // 7 bytes hold 3 u16 elements; 3 // 2 == 1 per row, trailing byte
    // ignored.
    item.set_from_raw(&RawItem::new(
        0x2B,
        Bytes::from_static(&[0, 1, 0, 2, 0, 3, 9]),
        false,
    ))
    .unwrap();
    let array = item.value().and_then(Value::as_array).unwrap();
    assert_eq!(array.shape(), &[2, 1]);
}
