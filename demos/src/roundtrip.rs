use std::env;
use std::process;

use blockstore::{BlockStore, StoreError};
use log::{error, warn};

/// Fills a few blocks, writes the store image to the path given as the first
/// argument (default `blockstore.img`), then loads it back and compares.
pub fn main() {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "blockstore.img".to_string());

    if let Err(e) = run(&path) {
        error!("{}: {}", path, e);
        process::exit(1);
    }
}

fn run(path: &str) -> Result<(), StoreError> {
    let mut store = BlockStore::create()?;
    let block_size = store.geometry().block_size();

    for fill in b"ABC" {
        if let Some(id) = store.allocate() {
            store.write(id, &vec![*fill; block_size])?;
        }
    }
    // Claim a block far from the first-fit frontier.
    if !store.request(200) {
        warn!("Block 200 is already claimed.");
    }

    let written = store.serialize(path)?;
    println!(
        "wrote {} bytes: {} used, {} free of {}",
        written,
        store.used_blocks(),
        store.free_blocks(),
        store.total_blocks()
    );

    let loaded = BlockStore::deserialize(path)?;
    let mut buf = vec![0; block_size];
    for id in loaded.used_block_ids() {
        loaded.read(id, &mut buf)?;
        println!("block {:3}: {:?}...", id, &buf[..8]);
    }
    println!("image matches: {}", loaded.as_bytes() == store.as_bytes());

    store.destroy();
    loaded.destroy();
    Ok(())
}
