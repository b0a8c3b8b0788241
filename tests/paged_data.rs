//! # Paged Buffer Integration Tests
//!
//! Exercises `PagedData` through the public byte range traits with small page
//! sizes so every edit crosses page boundaries.
//!
//! ## Test Coverage
//!
//! 1. Backward copy on insert for every position and several lengths
//! 2. Overlapping moves inside one buffer
//! 3. Stream views over buffer ranges
//! 4. Loading and saving through `std::io`

use std::io::{Read, Seek, SeekFrom, Write};

use bindelta::{data_equals, is_out_of_bounds, BinaryData, EditableBinaryData, PagedData};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn buffer(page_size: usize, data: &[u8]) -> PagedData {
    let mut paged = PagedData::with_page_size(page_size);
    paged.insert_slice(0, data).unwrap();
    paged
}

fn contents(data: &PagedData) -> Vec<u8> {
    let mut out = vec![0u8; data.data_size() as usize];
    data.copy_to_slice(0, &mut out).unwrap();
    out
}

fn assert_pages_full(data: &PagedData) {
    let count = data.page_count();
    for index in 0..count {
        let len = data.page(index).unwrap().len();
        if index + 1 < count {
            assert_eq!(len, data.page_size(), "page {} is short", index);
        } else {
            assert!(len > 0, "last page is empty");
        }
    }
}

// ============================================================================
// Insert / Remove
// ============================================================================

#[test]
fn test_insert_uninitialized_preserves_surrounding_bytes() {
    let original = sample(40);
    for page_size in [1usize, 3, 7, 16] {
        for position in 0..=original.len() {
            for length in [1usize, 2, 6, 7, 15, 33] {
                let mut data = buffer(page_size, &original);
                data.insert_uninitialized(position as u64, length as u64).unwrap();
                let gap: Vec<u8> = vec![0xee; length];
                data.replace_slice(position as u64, &gap).unwrap();

                let mut expected = original.clone();
                expected.splice(position..position, gap);
                assert_eq!(
                    contents(&data),
                    expected,
                    "page {} position {} length {}",
                    page_size,
                    position,
                    length
                );
                assert_pages_full(&data);
            }
        }
    }
}

#[test]
fn test_remove_every_range() {
    let original = sample(30);
    for start in 0..=original.len() {
        for length in 0..=(original.len() - start) {
            let mut data = buffer(4, &original);
            data.remove(start as u64, length as u64).unwrap();

            let mut expected = original.clone();
            expected.drain(start..start + length);
            assert_eq!(contents(&data), expected);
            assert_pages_full(&data);
        }
    }
}

#[test]
fn test_insert_across_page_boundary() {
    let mut data = buffer(8, &sample(16));
    data.insert_slice(7, &[1, 2, 3]).unwrap();

    let mut expected = sample(16);
    expected.splice(7..7, [1, 2, 3]);
    assert_eq!(contents(&data), expected);
    assert_eq!(data.page_count(), 3);
}

#[test]
fn test_bounds_are_checked() {
    let mut data = buffer(8, &sample(16));
    assert!(is_out_of_bounds(&data.insert_slice(17, &[1]).unwrap_err()));
    assert!(is_out_of_bounds(&data.remove(10, 7).unwrap_err()));
    assert!(is_out_of_bounds(&data.fill(15, 2, 0).unwrap_err()));
    assert!(is_out_of_bounds(&data.byte_at(16).unwrap_err()));
    assert_eq!(contents(&data), sample(16));
}

// ============================================================================
// Moves Inside One Buffer
// ============================================================================

#[test]
fn test_copy_within_matches_slice_copy_within() {
    let original = sample(50);
    for source in (0..50).step_by(3) {
        for target in (0..50).step_by(5) {
            let length = (50 - source.max(target)).min(23);
            let mut data = buffer(6, &original);
            data.copy_within(target as u64, source as u64, length as u64)
                .unwrap();

            let mut expected = original.clone();
            expected.copy_within(source..source + length, target);
            assert_eq!(
                contents(&data),
                expected,
                "source {} target {} length {}",
                source,
                target,
                length
            );
        }
    }
}

#[test]
fn test_copy_is_independent() {
    let mut data = buffer(4, &sample(20));
    let copy = data.copy_range(3, 10).unwrap();
    data.fill(0, 20, 0).unwrap();

    assert_eq!(contents(&copy), sample(20)[3..13].to_vec());
    assert_eq!(copy.page_size(), 4);
}

#[test]
fn test_equality_ignores_page_size() {
    let small = buffer(3, &sample(100));
    let large = buffer(64, &sample(100));
    assert!(data_equals(&small, &large).unwrap());
    assert_eq!(small, large);

    let other = buffer(64, &sample(99));
    assert_ne!(small, other);
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_range_reader_and_writer() {
    let mut data = buffer(5, &sample(40));

    let mut reader = data.range_reader(10, 20).unwrap();
    let mut head = [0u8; 4];
    reader.read_exact(&mut head).unwrap();
    assert_eq!(head.to_vec(), sample(40)[10..14].to_vec());
    reader.mark();
    reader.skip(6);
    assert_eq!(reader.available(), 10);
    reader.reset();
    assert_eq!(reader.processed_size(), 4);
    assert_eq!(reader.finish(), 16);

    let mut writer = data.range_writer(30, 5).unwrap();
    writer.seek(SeekFrom::Start(2)).unwrap();
    let written = writer.write(&[9, 9, 9, 9, 9]).unwrap();
    assert_eq!(written, 3);
    drop(writer);

    let mut expected = sample(40);
    expected[32..35].fill(9);
    assert_eq!(contents(&data), expected);
}

#[test]
fn test_load_and_save_streams() {
    let original = sample(10_000);
    let mut data = PagedData::with_page_size(512);
    data.load_from_reader(&mut original.as_slice()).unwrap();
    assert_eq!(data.data_size(), 10_000);
    assert_pages_full(&data);

    let loaded = data
        .insert_from_reader(100, &mut [1u8, 2, 3, 4].as_slice(), Some(3))
        .unwrap();
    assert_eq!(loaded, 3);

    let mut out = Vec::new();
    data.save_to_writer(&mut out).unwrap();
    let mut expected = original.clone();
    expected.splice(100..100, [1, 2, 3]);
    assert_eq!(out, expected);
}
