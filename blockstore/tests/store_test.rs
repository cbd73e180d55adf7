use blockstore::{BlockId, BlockStore, BlockStoreBuilder, StoreError};
use tempfile::NamedTempFile;

#[test]
fn write_read_release_cycle_on_default_store() {
  let mut store = BlockStore::create().unwrap();

  assert_eq!(store.write(1, &[b'A'; 256]).unwrap(), 256);
  assert_eq!(store.used_blocks(), 1);

  let mut buf = [0; 256];
  assert_eq!(store.read(1, &mut buf).unwrap(), 256);
  assert!(buf.iter().all(|&b| b == b'A'));

  store.release(1);
  assert_eq!(store.used_blocks(), 0);
  assert!(store.read(1, &mut buf).is_err());
}

#[test]
fn allocation_is_strictly_increasing_until_full() {
  let mut store = BlockStore::create().unwrap();

  let mut last = 0;
  while let Some(id) = store.allocate() {
    assert!(id > last);
    last = id;
  }

  assert_eq!(last, BlockStore::default_total_blocks());
  assert_eq!(store.used_blocks(), 255);
  assert_eq!(store.free_blocks(), 0);
  assert_eq!(store.allocate(), None);
}

#[test]
fn can_persist_and_reload_a_populated_store() {
  let tf = NamedTempFile::new().unwrap();
  let mut store = BlockStore::create().unwrap();
  for id in 1..=10 {
    store.allocate();
    store.write(id * 3, &[id as u8; 256]).unwrap();
  }
  store.release(2);
  store.request(254);

  assert_eq!(store.serialize(tf.path()).unwrap(), 256 * 256);
  let loaded = BlockStore::deserialize(tf.path()).unwrap();

  assert_eq!(loaded.used_blocks(), store.used_blocks());
  assert_eq!(loaded.free_blocks(), store.free_blocks());
  let ids: Vec<BlockId> = loaded.used_block_ids().collect();
  assert_eq!(ids, store.used_block_ids().collect::<Vec<_>>());
  for id in 1..=10 {
    let mut buf = [0; 256];
    loaded.read(id * 3, &mut buf).unwrap();
    assert_eq!(buf, [id as u8; 256]);
  }
  assert_eq!(loaded.as_bytes(), store.as_bytes());
}

#[test]
fn reloaded_store_keeps_allocating_first_fit() {
  let tf = NamedTempFile::new().unwrap();
  let builder = BlockStoreBuilder::new()
    .with_block_count(32)
    .with_block_size(16);
  let mut store = builder.build().unwrap();
  for _ in 0..6 {
    store.allocate();
  }
  store.release(4);
  store.serialize(tf.path()).unwrap();

  let mut loaded = builder.open(tf.path()).unwrap();

  assert_eq!(loaded.allocate(), Some(4));
  assert_eq!(loaded.allocate(), Some(7));
  assert!(!loaded.request(5));
}

#[test]
fn missing_image_fails_to_load() {
  let dir = tempfile::tempdir().unwrap();
  let result = BlockStore::deserialize(dir.path().join("nope.img"));
  match result {
    Err(StoreError::Io(_)) => (),
    other => panic!("expected Io error loading a missing image, got {:?}", other.map(|_| ())),
  }
}

#[test]
fn serialize_into_missing_directory_fails() {
  let dir = tempfile::tempdir().unwrap();
  let store = BlockStore::create().unwrap();
  let result = store.serialize(dir.path().join("no").join("such").join("dir.img"));
  match result {
    Err(StoreError::Io(_)) => (),
    other => panic!("expected Io error serializing to a missing directory, got {:?}", other),
  }
}
