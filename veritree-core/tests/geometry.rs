use proptest::prelude::*;
use veritree_core::digest::{HashAlgorithm, Sha256};
use veritree_core::geometry::{level_blocks, tree_levels, tree_size, validate_block_size};
use veritree_core::{Error, HashTreeBuilder};

/// BLAKE3 XOF cut to an arbitrary width, to exercise odd digest sizes.
struct WideBlake3(usize);

impl HashAlgorithm for WideBlake3 {
    fn name(&self) -> &'static str {
        "blake3-xof"
    }

    fn output_size(&self) -> usize {
        self.0
    }

    fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]) {
        let mut h = blake3::Hasher::new();
        for p in parts {
            h.update(p);
        }
        h.finalize_xof().fill(out);
    }
}

#[test]
fn dm_verity_sizes() {
    assert_eq!(tree_size(0, 4096, 32), 4096);
    assert_eq!(tree_size(3 * 4096, 4096, 32), 4096);
    assert_eq!(tree_levels(200 * 4096, 4096, 32), vec![2, 1]);
    assert_eq!(tree_size(200 * 4096, 4096, 32), 3 * 4096);
    // 1 GiB: 262144 blocks -> 2048 -> 16 -> 1
    assert_eq!(tree_levels(1 << 30, 4096, 32), vec![2048, 16, 1]);
    assert_eq!(level_blocks(1 << 30, 4096, 32, 1), 16);
    assert_eq!(level_blocks(1 << 30, 4096, 32, 5), 1);
}

#[test]
fn block_size_validation() {
    assert!(validate_block_size(4096, 32).is_ok());
    assert!(validate_block_size(128, 32).is_ok());
    assert!(matches!(validate_block_size(64, 32), Err(Error::Configuration(_))));
    assert!(matches!(validate_block_size(3000, 32), Err(Error::Configuration(_))));
    assert!(matches!(validate_block_size(0, 32), Err(Error::Configuration(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn build_terminates_with_predicted_shape(
        block_shift in 6u32..10,
        hash_frac in 1usize..100,
        blocks in 0u64..400,
        hole in any::<bool>(),
    ) {
        let block_size = 1usize << block_shift;
        // any width with 2H < B
        let hash_size = 1 + (block_size / 2 - 2) * hash_frac / 100;
        prop_assume!(hash_size * 2 < block_size);

        let data_size = blocks * block_size as u64;
        let mut b = HashTreeBuilder::new(block_size, WideBlake3(hash_size));
        b.initialize(data_size, b"prop").unwrap();
        if hole {
            b.update_zeros(data_size).unwrap();
        } else {
            let data: Vec<u8> = (0..data_size).map(|i| (i % 251) as u8).collect();
            b.update(&data).unwrap();
        }
        b.build_hash_tree().unwrap();

        let levels = b.levels();
        let (top, lower) = levels.split_last().unwrap();
        prop_assert_eq!(top.len(), block_size);
        for level in lower {
            prop_assert!(level.len() > block_size);
            prop_assert_eq!(level.len() % block_size, 0);
        }

        let predicted = tree_levels(data_size, block_size, hash_size);
        let actual: Vec<u64> = levels.iter().map(|l| (l.len() / block_size) as u64).collect();
        prop_assert_eq!(&actual, &predicted);
        prop_assert_eq!(b.tree_size(), tree_size(data_size, block_size, hash_size));

        // each reduction divides by at least B / H hashes per block
        let fanout = (block_size / hash_size) as f64;
        let bound = ((blocks.max(1) as f64).ln() / fanout.ln()).ceil() as usize + 1;
        prop_assert!(levels.len() <= bound, "{} levels > bound {}", levels.len(), bound);
    }

    #[test]
    fn level_zero_holds_one_digest_per_block(blocks in 1u64..300) {
        let data_size = blocks * 4096;
        let mut b = HashTreeBuilder::new(4096, Sha256);
        b.initialize(data_size, b"").unwrap();
        b.update_zeros(data_size).unwrap();
        b.build_hash_tree().unwrap();

        let used = blocks as usize * 32;
        let zero_hash = b.zero_block_hash().to_vec();
        let level0 = &b.levels()[0];
        for entry in level0[..used].chunks(32) {
            prop_assert_eq!(entry, &zero_hash[..]);
        }
        prop_assert!(level0[used..].iter().all(|&x| x == 0));
    }
}
