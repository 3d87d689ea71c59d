use anyhow::Result;
use std::path::PathBuf;

use BlockSalvage::config::parse_codec;
use BlockSalvage::{Block, SalvageConfig};

use super::util::{decode_value_arg, to_hex};

pub fn exec(path: PathBuf, value: String, page_type: u8, codec: Option<String>) -> Result<()> {
    let data = decode_value_arg(&value)?;

    let mut cfg = SalvageConfig::from_env();
    if let Some(c) = codec {
        cfg = cfg.with_codec(parse_codec(&c)?);
    }

    let mut block = Block::open(&path, &cfg)?;
    let addr = block.write_block(page_type, &data)?;
    block.sync()?;
    println!(
        "OK put: {} B, type={}, lsn={}, addr={}",
        data.len(),
        page_type,
        block.lsn(),
        to_hex(&addr)
    );
    Ok(())
}
