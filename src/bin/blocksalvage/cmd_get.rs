use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use BlockSalvage::{Block, SalvageConfig};

use super::util::{decode_hex, hex_preview};

pub fn exec(path: PathBuf, addr: String, out: Option<PathBuf>) -> Result<()> {
    let cookie = decode_hex(&addr)?;
    let block = Block::open(&path, &SalvageConfig::from_env())?;
    let page = block.read_addr(&cookie)?;

    if let Some(out_path) = out {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        f.write_all(&page.data)?;
        f.sync_all()?;
        println!(
            "FOUND: {} B (type={}, lsn={}) -> wrote to {}",
            page.data.len(),
            page.header.page_type,
            page.header.lsn,
            out_path.display()
        );
    } else {
        println!(
            "FOUND: {} B (type={}, lsn={})",
            page.data.len(),
            page.header.page_type,
            page.header.lsn
        );
        println!("data: {}", hex_preview(&page.data, 64));
    }
    Ok(())
}
