use anyhow::Result;
use std::path::PathBuf;

use BlockSalvage::config::parse_checksum_kind;
use BlockSalvage::{Block, SalvageConfig};

pub fn exec(path: PathBuf, allocsize: Option<u32>, checksum: Option<String>) -> Result<()> {
    let mut cfg = SalvageConfig::from_env();
    if let Some(a) = allocsize {
        cfg = cfg.with_allocsize(a);
    }
    if let Some(c) = checksum {
        cfg = cfg.with_checksum_kind(parse_checksum_kind(&c)?);
    }

    let block = Block::create(&path, &cfg)?;
    println!(
        "OK create: {} (allocsize={}, {})",
        path.display(),
        block.allocsize(),
        cfg
    );
    Ok(())
}
