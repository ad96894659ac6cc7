//! End-to-end scenarios against a small in-memory disk image: open/make,
//! write/read round-trips across a close, delete freeing blocks back to
//! the BAM, wildcard search, and attribute-preserving rename.

use almmmost_common::name::parse_8_3;
use almmmost_core::record::RecordIo;
use almmmost_fs::{DirKind, DiskParams, FileEngine};

fn tiny_params(kind: DirKind) -> DiskParams {
    DiskParams {
        spt: 26,
        bsf: 0,
        blm: 0,
        exm: 0,
        dbm: 9,
        dbl: 7,
        dir_alx: 2,
        cks: 0,
        res_tracks: 0,
        is_floppy: true,
        dirs: 0,
        kind,
    }
}

fn backing(records: u32) -> Box<dyn RecordIo + Send> {
    let data: Vec<u8> = vec![0u8; records as usize * 128];
    Box::new(data)
}

fn small_engine() -> (FileEngine, u8) {
    let mut engine = FileEngine::new();
    let disk = engine.images.add_disk(tiny_params(DirKind::Public), vec![backing(10)]);
    (engine, disk)
}

#[test]
fn make_write_close_open_read_round_trips() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");

    let handle = engine.open(1, disk, 0, 0, &fname, &fext, true).expect("make");
    let mut record = [0u8; 128];
    record[0..5].copy_from_slice(b"hello");
    // The dispatcher derives a sequential position from the FCB's
    // s2/curext/currec fields rather than any server-side cursor; a fresh
    // FCB's position is record 0, so write_rand/read_rand at 0 is the
    // engine-level equivalent of that first sequential write/read.
    engine.write_rand(handle, 0, &record).expect("write");
    engine.close(handle).expect("close");

    let handle2 = engine.open(1, disk, 0, 0, &fname, &fext, false).expect("reopen");
    let read_back = engine.read_rand(handle2, 0).expect("read");
    assert_eq!(&read_back[0..5], b"hello");
    assert_eq!(engine.get_size(handle2).unwrap(), 1);
}

#[test]
fn make_on_existing_file_fails() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();
    let second = engine.open(1, disk, 0, 0, &fname, &fext, true);
    assert!(second.is_err());
}

#[test]
fn open_nonexistent_file_fails() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("NOPE.TXT");
    assert!(engine.open(1, disk, 0, 0, &fname, &fext, false).is_err());
}

#[test]
fn delete_frees_blocks_back_to_the_bam() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    let handle = engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();
    let record = [7u8; 128];
    engine.write_rand(handle, 3, &record).unwrap();
    engine.close(handle).unwrap();

    let free_before = {
        let bam = engine.images.bam_mut(disk).unwrap();
        bam.free_count()
    };
    let deleted = engine.delete(disk, 0, 0, &fname, &fext).unwrap();
    assert_eq!(deleted, 1);
    let free_after = {
        let bam = engine.images.bam_mut(disk).unwrap();
        bam.free_count()
    };
    assert!(free_after > free_before, "deleting a file should free its blocks");
}

#[test]
fn search_first_matches_wildcard_pattern() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();

    let (pat_name, pat_ext) = parse_8_3("F??.TXT");
    let found = engine.search_first(disk, 0, Some(0), &pat_name, &pat_ext).unwrap();
    assert!(found.is_some());
}

#[test]
fn rename_preserves_attributes() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();
    engine
        .set_attr(disk, 0, 0, &fname, &fext, almmmost_common::Attributes::READ_ONLY)
        .unwrap();

    let (new_name, new_ext) = parse_8_3("BAR.TXT");
    engine.rename(disk, 0, 0, &fname, &fext, &new_name, &new_ext).unwrap();

    let (pat_name, pat_ext) = parse_8_3("BAR.TXT");
    let found = engine
        .search_first(disk, 0, Some(0), &pat_name, &pat_ext)
        .unwrap()
        .expect("renamed file should be found under its new name");
    assert!(found.attributes().contains(almmmost_common::Attributes::READ_ONLY));
}

#[test]
fn read_only_file_rejects_writes() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    let handle = engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();
    engine.close(handle).unwrap();
    engine
        .set_attr(disk, 0, 0, &fname, &fext, almmmost_common::Attributes::READ_ONLY)
        .unwrap();

    let handle2 = engine.open(1, disk, 0, 0, &fname, &fext, false).unwrap();
    let record = [1u8; 128];
    assert!(engine.write_rand(handle2, 0, &record).is_err());
}

#[test]
fn delete_of_an_open_file_is_rejected() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("L.L");
    let handle = engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();

    assert!(engine.delete(disk, 0, 0, &fname, &fext).is_err());

    engine.close(handle).unwrap();
    assert_eq!(engine.delete(disk, 0, 0, &fname, &fext).unwrap(), 1);
    assert!(engine.open(1, disk, 0, 0, &fname, &fext, false).is_err());
}

#[test]
fn rename_with_wildcard_destination_is_rejected() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();

    let (dst_name, dst_ext) = parse_8_3("?.TXT");
    assert!(engine.rename(disk, 0, 0, &fname, &fext, &dst_name, &dst_ext).is_err());
}

#[test]
fn rename_of_an_open_file_is_rejected() {
    let (mut engine, disk) = small_engine();
    let (fname, fext) = parse_8_3("FOO.TXT");
    engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();

    let (dst_name, dst_ext) = parse_8_3("BAR.TXT");
    assert!(engine.rename(disk, 0, 0, &fname, &fext, &dst_name, &dst_ext).is_err());
}

#[test]
fn private_drive_allocates_without_a_bam() {
    let mut engine = FileEngine::new();
    let disk = engine.images.add_disk(
        DiskParams {
            dirs: 1,
            ..tiny_params(DirKind::Private)
        },
        vec![backing(10)],
    );
    let (fname, fext) = parse_8_3("FOO.TXT");
    let handle = engine.open(1, disk, 0, 0, &fname, &fext, true).unwrap();
    let record = [9u8; 128];
    engine.write_rand(handle, 2, &record).unwrap();
    let read_back = engine.read_rand(handle, 2).unwrap();
    assert_eq!(read_back, record);
}
