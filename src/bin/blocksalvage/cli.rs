use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI блочного файла: создание, дозапись страниц, salvage.
#[derive(Parser, Debug)]
#[command(name = "blocksalvage", version, about = "Block file salvage tool")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create a new block file (description sector only)
    Create {
        #[arg(long)]
        path: PathBuf,
        /// Allocation unit (overrides BS_ALLOCSIZE)
        #[arg(long)]
        allocsize: Option<u32>,
        /// crc32 | crc32c (overrides BS_CHECKSUM)
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Append one page and print its address cookie
    Put {
        #[arg(long)]
        path: PathBuf,
        /// Payload: literal string, "@file", "hex:..." or "-" for stdin
        #[arg(long)]
        value: String,
        #[arg(long, default_value_t = 1)]
        page_type: u8,
        /// none | zstd (overrides BS_CODEC)
        #[arg(long)]
        codec: Option<String>,
    },
    /// Read a page by address cookie (hex)
    Get {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        addr: String,
        /// Optional file to write the raw payload into
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Decode an address cookie (hex)
    Addr {
        #[arg(long)]
        addr: String,
    },
    /// Salvage: scan the file for valid pages (truncates the tail, resets the description sector)
    Salvage {
        #[arg(long)]
        path: PathBuf,
        /// Allocation unit to use if the description sector is damaged
        #[arg(long)]
        allocsize: Option<u32>,
        /// Largest page size to accept (overrides BS_MAX_PAGE_SIZE)
        #[arg(long)]
        max_page_size: Option<u32>,
        /// Print one JSON object instead of a text report
        #[arg(long)]
        json: bool,
        /// Persist the rebuilt free extents to <path>.free and fsync the file
        #[arg(long)]
        commit: bool,
    },
}
