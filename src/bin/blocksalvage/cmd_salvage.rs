use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use BlockSalvage::free::free_file_path;
use BlockSalvage::{Block, SalvageConfig, SalvageNext, SalvageStats};

use super::util::to_hex;

#[derive(Serialize)]
struct PageReport {
    offset: u64,
    size: u32,
    cksum: u32,
    lsn: u64,
    page_type: u8,
    mem_size: usize,
    addr: String,
}

#[derive(Serialize)]
struct SalvageReport {
    path: String,
    allocsize: u32,
    file_size: u64,
    pages: Vec<PageReport>,
    stats: SalvageStats,
    free_extents: Vec<(u64, u64)>,
    committed: bool,
}

pub fn exec(
    path: PathBuf,
    allocsize: Option<u32>,
    max_page_size: Option<u32>,
    json: bool,
    commit: bool,
) -> Result<()> {
    let mut cfg = SalvageConfig::from_env();
    if let Some(a) = allocsize {
        cfg = cfg.with_allocsize(a);
    }
    if let Some(m) = max_page_size {
        cfg = cfg.with_max_page_size(m);
    }

    let mut block = Block::open_for_salvage(&path, &cfg)?;
    let mut pages = Vec::new();

    let (file_size, stats) = {
        let mut s = block.salvage_start()?;
        let file_size = s.file_size();
        // Фатальная ошибка чтения: `?` бросает курсор, drop завершает прогон как неуспешный.
        while let SalvageNext::Page(p) = s.next_page()? {
            if !json {
                println!(
                    "page off={} size={} cksum={:#010x} lsn={} type={} addr={}",
                    p.offset,
                    p.size,
                    p.cksum,
                    p.lsn,
                    p.page_type,
                    to_hex(&p.addr)
                );
            }
            pages.push(PageReport {
                offset: p.offset,
                size: p.size,
                cksum: p.cksum,
                lsn: p.lsn,
                page_type: p.page_type,
                mem_size: p.data.len(),
                addr: to_hex(&p.addr),
            });
        }
        (file_size, s.end(true))
    };

    if commit {
        block.tracker().save(&free_file_path(&path))?;
        block.sync()?;
    }

    if json {
        let report = SalvageReport {
            path: path.display().to_string(),
            allocsize: block.allocsize(),
            file_size,
            pages,
            stats,
            free_extents: block.tracker().extents(),
            committed: commit,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("Salvage report ({}):", path.display());
        println!("  allocsize      = {}", block.allocsize());
        println!("  file_size      = {}", file_size);
        println!("  pages          = {}", stats.pages);
        println!("  page_bytes     = {}", stats.page_bytes);
        println!("  skipped_units  = {}", stats.skipped_units);
        println!("  skipped_bytes  = {}", stats.skipped_bytes);
        println!("  max_lsn        = {}", stats.max_lsn);
        println!("  free_extents   = {}", block.tracker().len());
        println!("  committed      = {}", commit);
    }
    Ok(())
}
