use veritree_core::descriptor::TreeDescriptor;
use veritree_core::digest::{Algorithm, Blake3};
use veritree_core::HashTreeBuilder;

#[test]
fn descriptor_summarizes_built_tree() {
    let mut b = HashTreeBuilder::new(4096, Blake3);
    let data_size = 200 * 4096u64;
    b.initialize(data_size, &[0xde, 0xad]).unwrap();
    b.update_zeros(data_size).unwrap();
    b.build_hash_tree().unwrap();

    let d = TreeDescriptor::from_builder(&b);
    assert_eq!(d.algorithm, "blake3");
    assert_eq!(d.algorithm.parse::<Algorithm>().unwrap(), Algorithm::Blake3);
    assert_eq!(d.block_size, 4096);
    assert_eq!(d.data_size, data_size);
    assert_eq!(d.salt_hex, "dead");
    assert_eq!(d.root_hash_hex, hex::encode(b.root_hash()));
    assert_eq!(d.tree_size, 3 * 4096);
    // on-disk order: root-adjacent level first
    assert_eq!(d.levels, vec![1, 2]);
    assert!(chrono::DateTime::parse_from_rfc3339(&d.created_utc).is_ok());

    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("tree.json");
    d.write_to(&path).unwrap();
    assert_eq!(TreeDescriptor::read_from(&path).unwrap(), d);
}

#[test]
fn unknown_algorithm_name() {
    assert!("md5".parse::<Algorithm>().is_err());
    assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
    assert_eq!(Algorithm::default().to_string(), "sha256");
}
