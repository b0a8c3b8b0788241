//! Fuzz testing for delta document edits.
//!
//! Replays arbitrary edit sequences against a `DeltaDocument` over a small
//! file and against a `Vec<u8>`, checks the segment invariants after every
//! edit and compares the saved file with the model at the end.

#![no_main]

use std::io::Write;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use bindelta::{BinaryData, EditMode, EditableBinaryData, SegmentsRepository};

#[derive(Debug, Arbitrary)]
struct EditInput {
    file_len: u8,
    page_size: u8,
    operations: Vec<Edit>,
}

#[derive(Debug, Arbitrary)]
enum Edit {
    SetByte { position: u16, value: u8 },
    Insert { position: u16, data: Vec<u8> },
    Remove { position: u16, length: u16 },
    Replace { position: u16, data: Vec<u8> },
    Fill { position: u16, length: u8, value: u8 },
    CopyWithin { position: u16, start: u16, length: u16 },
    Move { start: u16, length: u16, target: u16 },
}

fn clamp(value: u16, max: usize) -> usize {
    if max == 0 {
        0
    } else {
        value as usize % (max + 1)
    }
}

fuzz_target!(|input: EditInput| {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let original: Vec<u8> = (0..input.file_len).collect();
    file.write_all(&original).unwrap();
    file.flush().unwrap();

    let repository = SegmentsRepository::builder()
        .page_size(input.page_size.max(1) as usize)
        .build()
        .unwrap();
    let source = repository
        .open_file_source(file.path(), EditMode::ReadWrite)
        .unwrap();
    let mut document = repository.create_document(&source).unwrap();
    let mut model = original;

    for edit in input.operations.iter().take(64) {
        let size = model.len();
        match edit {
            Edit::SetByte { position, value } => {
                if size == 0 {
                    continue;
                }
                let position = *position as usize % size;
                document.set_byte(position as u64, *value).unwrap();
                model[position] = *value;
            }
            Edit::Insert { position, data } => {
                let position = clamp(*position, size);
                document.insert_slice(position as u64, data).unwrap();
                model.splice(position..position, data.iter().copied());
            }
            Edit::Remove { position, length } => {
                let position = clamp(*position, size);
                let length = clamp(*length, size - position);
                document.remove(position as u64, length as u64).unwrap();
                model.drain(position..position + length);
            }
            Edit::Replace { position, data } => {
                let position = clamp(*position, size);
                let length = data.len().min(size - position);
                document
                    .replace_slice(position as u64, &data[..length])
                    .unwrap();
                model[position..position + length].copy_from_slice(&data[..length]);
            }
            Edit::Fill {
                position,
                length,
                value,
            } => {
                let position = clamp(*position, size);
                let length = (*length as usize).min(size - position);
                document
                    .fill(position as u64, length as u64, *value)
                    .unwrap();
                model[position..position + length].fill(*value);
            }
            Edit::CopyWithin {
                position,
                start,
                length,
            } => {
                let start = clamp(*start, size);
                let length = clamp(*length, size - start);
                let position = clamp(*position, size);
                document
                    .insert_copy_within(position as u64, start as u64, length as u64)
                    .unwrap();
                let copied = model[start..start + length].to_vec();
                model.splice(position..position, copied);
            }
            Edit::Move {
                start,
                length,
                target,
            } => {
                let start = clamp(*start, size);
                let length = clamp(*length, size - start);
                let block = document.copy_range(start as u64, length as u64).unwrap();
                document.remove(start as u64, length as u64).unwrap();
                let target = clamp(*target, size - length);
                document
                    .insert_data(target as u64, &block, 0, length as u64)
                    .unwrap();

                let moved: Vec<u8> = model.drain(start..start + length).collect();
                model.splice(target..target, moved);
            }
        }

        document.validate();
        assert_eq!(document.data_size(), model.len() as u64);
        assert!(document.memory_size() - document.memory_garbage() <= document.data_size());
    }

    let mut content = vec![0u8; model.len()];
    document.copy_to_slice(0, &mut content).unwrap();
    assert_eq!(content, model);

    document.save().unwrap();
    assert_eq!(std::fs::read(file.path()).unwrap(), model);
    document.validate();
});
