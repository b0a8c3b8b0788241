//! # Delta Document Integration Tests
//!
//! Segment layouts produced by edits over a 256-byte file holding `0..=255`,
//! copies between documents, and a randomized edit sequence checked against
//! a plain `Vec<u8>` after every step.
//!
//! ## Test Coverage
//!
//! 1. Segment layout after byte writes, inserts, removes and replaces
//! 2. Coalescing of consecutive byte edits
//! 3. Bounds errors
//! 4. Copies sharing source ranges stay independent
//! 5. Memory store compaction after removals
//! 6. Randomized edits with invariant validation

use std::io::Write;
use std::sync::Arc;

use bindelta::{
    is_out_of_bounds, BinaryData, DataSegment, DeltaDocument, EditMode, EditableBinaryData,
    FileDataSource, PagedData, SegmentsRepository,
};
use tempfile::NamedTempFile;

fn sample_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    file
}

fn open(
    repository: &SegmentsRepository,
    file: &NamedTempFile,
) -> (Arc<FileDataSource>, DeltaDocument) {
    let source = repository
        .open_file_source(file.path(), EditMode::ReadOnly)
        .unwrap();
    let document = repository.create_document(&source).unwrap();
    (source, document)
}

fn contents(data: &dyn BinaryData) -> Vec<u8> {
    let mut buffer = vec![0u8; data.data_size() as usize];
    data.copy_to_slice(0, &mut buffer).unwrap();
    buffer
}

fn src(start: u64, length: u64) -> DataSegment {
    DataSegment::Source { start, length }
}

fn mem(start: u64, length: u64) -> DataSegment {
    DataSegment::Memory { start, length }
}

// ============================================================================
// Segment Layout Tests
// ============================================================================

#[test]
fn test_new_document_is_single_source_segment() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, document) = open(&repository, &file);

    assert_eq!(document.data_size(), 256);
    assert_eq!(document.segments(), vec![src(0, 256)]);
    assert_eq!(contents(&document), (0..=255u8).collect::<Vec<_>>());
    document.validate();
}

#[test]
fn test_set_byte_splits_source_in_three() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.set_byte(10, 0).unwrap();

    assert_eq!(
        document.segments(),
        vec![src(0, 10), mem(0, 1), src(11, 245)]
    );
    assert_eq!(document.byte_at(10).unwrap(), 0);
    assert_eq!(document.byte_at(11).unwrap(), 11);
    document.validate();
}

#[test]
fn test_set_byte_at_document_edges() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.set_byte(0, 0xff).unwrap();
    assert_eq!(document.segments(), vec![mem(0, 1), src(1, 255)]);

    document.set_byte(255, 0xee).unwrap();
    assert_eq!(
        document.segments(),
        vec![mem(0, 1), src(1, 254), mem(1, 1)]
    );
    document.validate();
}

#[test]
fn test_consecutive_byte_edits_coalesce() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    for (offset, position) in (10..20u64).enumerate() {
        document.set_byte(position, offset as u8).unwrap();
        document.validate();
    }

    assert_eq!(
        document.segments(),
        vec![src(0, 10), mem(0, 10), src(20, 236)]
    );
    assert_eq!(document.memory_size(), 10);
}

#[test]
fn test_rewriting_memory_byte_stays_in_place() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.set_byte(10, 1).unwrap();
    document.set_byte(10, 2).unwrap();
    assert_eq!(document.memory_size(), 1);
    assert_eq!(document.byte_at(10).unwrap(), 2);
    assert_eq!(document.segment_count(), 3);
}

#[test]
fn test_insert_byte_in_middle() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.insert_slice(10, &[0xaa]).unwrap();

    assert_eq!(document.data_size(), 257);
    assert_eq!(
        document.segments(),
        vec![src(0, 10), mem(0, 1), src(10, 246)]
    );
    assert_eq!(document.byte_at(10).unwrap(), 0xaa);
    assert_eq!(document.byte_at(11).unwrap(), 10);
    document.validate();
}

#[test]
fn test_typing_extends_memory_segment() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    for (index, byte) in b"hello".iter().enumerate() {
        document.insert_slice(100 + index as u64, &[*byte]).unwrap();
    }

    assert_eq!(
        document.segments(),
        vec![src(0, 100), mem(0, 5), src(100, 156)]
    );
    let mut word = [0u8; 5];
    document.copy_to_slice(100, &mut word).unwrap();
    assert_eq!(&word, b"hello");
}

#[test]
fn test_insert_at_start_and_end() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.insert_slice(0, &[1, 2]).unwrap();
    document.insert_slice(258, &[3]).unwrap();

    assert_eq!(
        document.segments(),
        vec![mem(0, 2), src(0, 256), mem(2, 1)]
    );
    assert_eq!(document.data_size(), 259);
    document.validate();
}

#[test]
fn test_remove_middle_leaves_two_sources() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.remove(64, 64).unwrap();

    assert_eq!(document.segments(), vec![src(0, 64), src(128, 128)]);
    assert_eq!(document.byte_at(64).unwrap(), 128);
    document.validate();
}

#[test]
fn test_remove_inserted_bytes_merges_sources_again() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.insert_slice(50, &[9; 20]).unwrap();
    document.remove(50, 20).unwrap();

    assert_eq!(document.segments(), vec![src(0, 256)]);
    assert_eq!(document.memory_size(), 0);
    document.validate();
}

#[test]
fn test_remove_everything() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.remove(0, 256).unwrap();
    assert!(document.is_empty());
    assert!(document.segments().is_empty());
    document.validate();
}

#[test]
fn test_replace_source_range() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.replace_slice(20, &[7, 7, 7, 7]).unwrap();

    assert_eq!(
        document.segments(),
        vec![src(0, 20), mem(0, 4), src(24, 232)]
    );
    assert_eq!(document.data_size(), 256);

    document.replace_slice(21, &[8, 8]).unwrap();
    assert_eq!(document.memory_size(), 4);
    assert_eq!(document.byte_at(21).unwrap(), 8);
    assert_eq!(document.byte_at(23).unwrap(), 7);
    document.validate();
}

#[test]
fn test_fill_and_set_data_size() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.fill(100, 10, 0x55).unwrap();
    assert!((100..110).all(|i| document.byte_at(i).unwrap() == 0x55));

    document.set_data_size(300).unwrap();
    assert_eq!(document.data_size(), 300);
    assert_eq!(document.byte_at(299).unwrap(), 0);

    document.set_data_size(50).unwrap();
    assert_eq!(document.segments(), vec![src(0, 50)]);
    document.validate();
}

// ============================================================================
// Bounds Tests
// ============================================================================

#[test]
fn test_out_of_bounds_edits_fail_without_change() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    assert!(is_out_of_bounds(&document.insert_slice(257, &[1]).unwrap_err()));
    assert!(is_out_of_bounds(&document.remove(200, 57).unwrap_err()));
    assert!(is_out_of_bounds(&document.replace_slice(255, &[1, 2]).unwrap_err()));
    assert!(is_out_of_bounds(&document.set_byte(256, 0).unwrap_err()));
    assert!(is_out_of_bounds(&document.byte_at(256).unwrap_err()));

    assert_eq!(document.segments(), vec![src(0, 256)]);
}

#[test]
fn test_zero_length_edits_are_no_ops() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.insert_slice(10, &[]).unwrap();
    document.remove(10, 0).unwrap();
    document.replace_slice(256, &[]).unwrap();
    assert_eq!(document.segments(), vec![src(0, 256)]);
}

// ============================================================================
// Copy Tests
// ============================================================================

#[test]
fn test_copy_range_shares_source_and_stays_independent() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);
    document.set_byte(70, 0xff).unwrap();

    let copy = document.copy_range(64, 16).unwrap();
    assert_eq!(
        copy.segments(),
        vec![src(64, 6), mem(0, 1), src(71, 9)]
    );
    let expected = contents(&copy);

    document.remove(0, 100).unwrap();
    document.set_byte(0, 1).unwrap();
    assert_eq!(contents(&copy), expected);
    copy.validate();
}

#[test]
fn test_move_quarter_to_end() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    let quarter = document.copy_range(64, 64).unwrap();
    document.remove(64, 64).unwrap();
    document.insert_data(192, &quarter, 0, 64).unwrap();

    assert_eq!(
        document.segments(),
        vec![src(0, 64), src(128, 128), src(64, 64)]
    );
    let mut expected: Vec<u8> = (0..=255u8).collect();
    let moved: Vec<u8> = expected.drain(64..128).collect();
    expected.extend(moved);
    assert_eq!(contents(&document), expected);
    document.validate();
}

#[test]
fn test_insert_copy_within_duplicates_memory() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);
    document.replace_slice(0, &[9, 9, 9, 9]).unwrap();

    document.insert_copy_within(2, 0, 8).unwrap();

    let mut expected: Vec<u8> = (0..=255u8).collect();
    expected[..4].copy_from_slice(&[9, 9, 9, 9]);
    let copied = expected[0..8].to_vec();
    expected.splice(2..2, copied);
    assert_eq!(contents(&document), expected);
    document.validate();
}

#[test]
fn test_insert_from_plain_buffer() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    let buffer = PagedData::from_slice(&[1, 2, 3, 4, 5, 6]);
    document.insert_data(128, &buffer, 1, 4).unwrap();
    assert_eq!(document.data_size(), 260);

    let mut inserted = [0u8; 4];
    document.copy_to_slice(128, &mut inserted).unwrap();
    assert_eq!(inserted, [2, 3, 4, 5]);
}

#[test]
fn test_empty_document_without_source() {
    let repository = SegmentsRepository::new();
    let mut document = repository.create_empty_document();

    document.insert_slice(0, b"abcdef").unwrap();
    document.remove(1, 2).unwrap();
    assert_eq!(contents(&document), b"adef");
    assert!(document.file_source().is_none());
    assert!(document.save().is_err());
}

#[test]
fn test_clear_and_dispose() {
    let file = sample_file(256);
    let repository = SegmentsRepository::new();
    let (_source, mut document) = open(&repository, &file);

    document.insert_slice(0, &[1; 10]).unwrap();
    document.clear();
    assert!(document.is_empty());
    assert_eq!(document.memory_size(), 0);
    assert!(document.file_source().is_some());

    document.dispose();
    assert!(document.file_source().is_none());
}

// ============================================================================
// Memory Store Tests
// ============================================================================

#[test]
fn test_repeated_moves_keep_memory_bounded() {
    const BLOCK: u64 = 64 * 1024;

    let repository = SegmentsRepository::new();
    let mut document = repository.create_empty_document();
    let mut model: Vec<u8> = (0..2 * BLOCK).map(|i| (i % 251) as u8).collect();
    document.insert_slice(0, &model).unwrap();

    for _ in 0..50 {
        let size = document.data_size();
        document.insert_copy_within(size, 0, BLOCK).unwrap();
        document.remove(0, BLOCK).unwrap();
        model.rotate_left(BLOCK as usize);

        assert_eq!(document.data_size(), 2 * BLOCK);
        assert!(
            document.memory_size() < 2 * document.data_size() + repository.page_size() as u64,
            "memory store holds {} bytes for {} bytes of content",
            document.memory_size(),
            document.data_size()
        );
        document.validate();
    }

    assert_eq!(contents(&document), model);
}

#[test]
fn test_removal_compacts_store_and_merges_neighbours() {
    let repository = SegmentsRepository::builder().page_size(16).build().unwrap();
    let mut document = repository.create_empty_document();

    document.insert_slice(0, &[1; 4]).unwrap();
    document.insert_slice(0, &[2; 20]).unwrap();
    document.insert_slice(24, &[3; 4]).unwrap();
    assert_eq!(document.segments(), vec![mem(4, 20), mem(0, 4), mem(24, 4)]);

    document.remove(0, 20).unwrap();

    assert_eq!(document.segments(), vec![mem(0, 8)]);
    assert_eq!(document.memory_size(), 8);
    assert_eq!(document.memory_garbage(), 0);
    assert_eq!(contents(&document), vec![1, 1, 1, 1, 3, 3, 3, 3]);
    document.validate();
}

#[test]
fn test_small_garbage_waits_for_explicit_compaction() {
    let file = sample_file(256);
    let repository = SegmentsRepository::builder().page_size(16).build().unwrap();
    let (_source, mut document) = open(&repository, &file);

    document.set_byte(10, 0xaa).unwrap();
    document.set_byte(20, 0xbb).unwrap();
    document.set_byte(30, 0xcc).unwrap();
    document.remove(20, 1).unwrap();

    assert_eq!(
        document.segments(),
        vec![src(0, 10), mem(0, 1), src(11, 9), src(21, 9), mem(2, 1), src(31, 225)]
    );
    assert_eq!(document.memory_size(), 3);
    assert_eq!(document.memory_garbage(), 1);
    let before = contents(&document);

    document.compact_memory().unwrap();

    assert_eq!(
        document.segments(),
        vec![src(0, 10), mem(0, 1), src(11, 9), src(21, 9), mem(1, 1), src(31, 225)]
    );
    assert_eq!(document.memory_size(), 2);
    assert_eq!(document.memory_garbage(), 0);
    assert_eq!(contents(&document), before);
    document.validate();
}

// ============================================================================
// Randomized Edits
// ============================================================================

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            self.next() % bound
        }
    }
}

#[test]
fn test_random_edits_match_vec_model() {
    let file = sample_file(1024);
    let repository = SegmentsRepository::builder().page_size(64).build().unwrap();
    let (_source, mut document) = open(&repository, &file);
    let mut model: Vec<u8> = (0..1024).map(|i| i as u8).collect();
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

    for step in 0..2000 {
        let size = model.len() as u64;
        match rng.below(6) {
            0 if size > 0 => {
                let position = rng.below(size);
                let value = rng.next() as u8;
                document.set_byte(position, value).unwrap();
                model[position as usize] = value;
            }
            1 => {
                let position = rng.below(size + 1);
                let data: Vec<u8> = (0..rng.below(40)).map(|_| rng.next() as u8).collect();
                document.insert_slice(position, &data).unwrap();
                model.splice(position as usize..position as usize, data);
            }
            2 => {
                let position = rng.below(size + 1);
                let length = rng.below(size - position + 1).min(50);
                document.remove(position, length).unwrap();
                model.drain(position as usize..(position + length) as usize);
            }
            3 => {
                let position = rng.below(size + 1);
                let length = rng.below(size - position + 1).min(30);
                let data: Vec<u8> = (0..length).map(|_| rng.next() as u8).collect();
                document.replace_slice(position, &data).unwrap();
                model[position as usize..(position + length) as usize].copy_from_slice(&data);
            }
            4 if size > 0 => {
                let start = rng.below(size);
                let length = rng.below(size - start + 1).min(60);
                let position = rng.below(size + 1);
                document.insert_copy_within(position, start, length).unwrap();
                let copied = model[start as usize..(start + length) as usize].to_vec();
                model.splice(position as usize..position as usize, copied);
            }
            _ => {
                let position = rng.below(size + 1);
                let length = rng.below(size - position + 1).min(20);
                let value = rng.next() as u8;
                document.fill(position, length, value).unwrap();
                model[position as usize..(position + length) as usize].fill(value);
            }
        }

        document.validate();
        assert_eq!(document.data_size(), model.len() as u64, "size after step {}", step);
        if step % 50 == 0 {
            assert_eq!(contents(&document), model, "content after step {}", step);
        }
    }
    assert_eq!(contents(&document), model);
}
