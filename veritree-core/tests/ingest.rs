use rand::{rngs::StdRng, Rng, SeedableRng};
use veritree_core::digest::{Algorithm, Sha256};
use veritree_core::ingest::{feed, hash_file, ImageFormat, IngestMode, IngestOptions};
use veritree_core::{Error, HashTreeBuilder};

const BLOCK: usize = 4096;

fn holey_image(blocks: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; blocks * BLOCK];
    for (i, block) in data.chunks_mut(BLOCK).enumerate() {
        // data, hole, hole, data... with a partially zero block now and then
        match i % 5 {
            0 | 3 => rng.fill(block),
            4 => block[BLOCK - 1] = 1,
            _ => {}
        }
    }
    data
}

fn built_with(data: &[u8], mode: IngestMode) -> HashTreeBuilder<Sha256> {
    let mut b = HashTreeBuilder::new(BLOCK, Sha256);
    b.initialize(data.len() as u64, b"ingest").unwrap();
    feed(&mut b, data, mode).unwrap();
    b.build_hash_tree().unwrap();
    b
}

#[test]
fn zero_scan_and_dense_feeding_agree() {
    let data = holey_image(333, 11);
    let dense = built_with(&data, IngestMode::Dense);
    let scanned = built_with(&data, IngestMode::ZeroScan);
    assert_eq!(dense.levels(), scanned.levels());
    assert_eq!(dense.root_hash(), scanned.root_hash());
}

#[test]
fn all_zero_image_in_zero_scan_mode() {
    let data = vec![0u8; 300 * BLOCK];
    let scanned = built_with(&data, IngestMode::ZeroScan);
    let dense = built_with(&data, IngestMode::Dense);
    assert_eq!(scanned.root_hash(), dense.root_hash());
    assert_eq!(&scanned.levels()[0][..32], scanned.zero_block_hash());
}

#[test]
fn unaligned_feed_is_rejected_before_hashing() {
    let mut b = HashTreeBuilder::new(BLOCK, Sha256);
    b.initialize(2 * BLOCK as u64, b"").unwrap();
    let err = feed(&mut b, &vec![0u8; BLOCK + 1], IngestMode::ZeroScan).unwrap_err();
    assert!(matches!(err, Error::UnalignedUpdate { .. }));
    assert!(b.levels()[0].is_empty());
}

#[test]
fn hash_file_matches_in_memory_build() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("vendor.img");
    let data = holey_image(150, 12);
    std::fs::write(&path, &data).unwrap();

    let expected = built_with(&data, IngestMode::Dense);
    for mode in [IngestMode::Dense, IngestMode::ZeroScan] {
        let opts = IngestOptions { format: ImageFormat::Auto, mode };
        let b = hash_file(&path, BLOCK, Sha256, b"ingest", opts).unwrap();
        assert_eq!(b.root_hash(), expected.root_hash());
        assert_eq!(b.levels(), expected.levels());
    }

    let boxed =
        hash_file(&path, BLOCK, Algorithm::Sha256.backend(), b"ingest", IngestOptions::default())
            .unwrap();
    assert_eq!(boxed.root_hash(), expected.root_hash());
}

#[test]
fn hash_file_of_empty_image() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("empty.img");
    std::fs::write(&path, b"").unwrap();

    let b = hash_file(&path, BLOCK, Sha256, b"e", IngestOptions::default()).unwrap();
    assert_eq!(b.tree_size(), BLOCK as u64);
    assert_eq!(b.root_hash(), b.zero_block_hash());
}

#[test]
fn hash_file_rejects_unaligned_image() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("odd.img");
    std::fs::write(&path, vec![7u8; BLOCK + 512]).unwrap();

    let err = hash_file(&path, BLOCK, Sha256, b"", IngestOptions::default()).err().unwrap();
    assert!(matches!(err, Error::SizeMismatch { size: 4608, block_size: 4096 }));
}

#[test]
fn hash_file_reports_missing_input() {
    let td = tempfile::tempdir().unwrap();
    let err = hash_file(&td.path().join("absent.img"), BLOCK, Sha256, b"", IngestOptions::default())
        .err()
        .unwrap();
    match err {
        Error::Io { context, source } => {
            assert!(context.starts_with("open "));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn zero_scan_over_alternating_blocks() {
    // hole, data, hole, data ... ending on a hole
    let mut rng = StdRng::seed_from_u64(13);
    let mut data = vec![0u8; 257 * BLOCK];
    for block in data.chunks_mut(BLOCK).skip(1).step_by(2) {
        rng.fill(block);
    }
    let dense = built_with(&data, IngestMode::Dense);
    let scanned = built_with(&data, IngestMode::ZeroScan);
    assert_eq!(dense.levels(), scanned.levels());
    assert_eq!(&scanned.levels()[0][..32], scanned.zero_block_hash());
    assert_eq!(&scanned.levels()[0][256 * 32..257 * 32], scanned.zero_block_hash());
}
