//! Centralized configuration for the block manager and its salvage path.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - SalvageConfig::from_env() reads BS_* variables; fluent `with_*` setters override them.
//! - The values are fixed for the lifetime of one open Block (and so for one salvage run).
//!
//! Env:
//! - BS_ALLOCSIZE       allocation unit for new files / fallback when the description sector is damaged
//! - BS_MAX_PAGE_SIZE   upper bound for a page's declared size during salvage and writes
//! - BS_CHECKSUM        crc32 | crc32c (default crc32c)
//! - BS_CODEC           none | zstd (default none)
//! - BS_ZSTD_LEVEL      zstd level when BS_CODEC=zstd (default 3)
//! - BS_DATA_FSYNC      1|true|yes|on => fsync after writes/truncate (default false)

use anyhow::{anyhow, Result};
use std::fmt;

use crate::consts::{
    ALLOCSIZE_DEFAULT, ALLOCSIZE_MAX, ALLOCSIZE_MIN, CKSUM_CRC32, CKSUM_CRC32C, PAGE_SIZE_MAX,
};
use crate::page::{CODEC_NONE, CODEC_ZSTD, PAGE_HDR_SIZE};

/// Configuration of a block file (writer and salvage).
#[derive(Clone, Debug)]
pub struct SalvageConfig {
    /// Allocation unit in bytes (power of two, 512 .. 128 MiB).
    /// Env: BS_ALLOCSIZE (default 4096)
    pub allocsize: u32,

    /// Largest page size accepted by salvage (and produced by writes).
    /// Env: BS_MAX_PAGE_SIZE (default 512 MiB)
    pub max_page_size: u32,

    /// Checksum algorithm for new files (CKSUM_CRC32 | CKSUM_CRC32C).
    /// Env: BS_CHECKSUM = crc32|crc32c (default crc32c)
    pub checksum_kind: u8,

    /// Page payload codec for writes (CODEC_NONE | CODEC_ZSTD).
    /// Env: BS_CODEC = none|zstd (default none)
    pub codec: u8,

    /// zstd compression level.
    /// Env: BS_ZSTD_LEVEL (default 3)
    pub zstd_level: i32,

    /// fsync the data file after writes and truncation.
    /// Env: BS_DATA_FSYNC (default false)
    pub data_fsync: bool,
}

impl Default for SalvageConfig {
    fn default() -> Self {
        Self {
            allocsize: ALLOCSIZE_DEFAULT,
            max_page_size: PAGE_SIZE_MAX,
            checksum_kind: CKSUM_CRC32C,
            codec: CODEC_NONE,
            zstd_level: 3,
            data_fsync: false,
        }
    }
}

#[inline]
fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

/// Разбор имени алгоритма checksum ("crc32" | "crc32c").
pub fn parse_checksum_kind(s: &str) -> Result<u8> {
    match s.trim().to_ascii_lowercase().as_str() {
        "crc32" => Ok(CKSUM_CRC32),
        "crc32c" => Ok(CKSUM_CRC32C),
        other => Err(anyhow!("unknown checksum kind '{}' (expected crc32|crc32c)", other)),
    }
}

/// Разбор имени кодека ("none" | "zstd").
pub fn parse_codec(s: &str) -> Result<u8> {
    match s.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(CODEC_NONE),
        "zstd" => Ok(CODEC_ZSTD),
        other => Err(anyhow!("unknown codec '{}' (expected none|zstd)", other)),
    }
}

/// Проверка allocation unit: степень двойки в [512 .. 128 MiB].
pub fn validate_allocsize(allocsize: u32) -> Result<()> {
    if allocsize < ALLOCSIZE_MIN
        || allocsize > ALLOCSIZE_MAX
        || (allocsize & (allocsize - 1)) != 0
    {
        return Err(anyhow!(
            "allocsize must be a power of two in [{} .. {}], got {}",
            ALLOCSIZE_MIN,
            ALLOCSIZE_MAX,
            allocsize
        ));
    }
    Ok(())
}

impl SalvageConfig {
    /// Load configuration from environment variables; unparsable values keep defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BS_ALLOCSIZE") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.allocsize = n;
            }
        }

        if let Ok(v) = std::env::var("BS_MAX_PAGE_SIZE") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.max_page_size = n;
            }
        }

        if let Ok(v) = std::env::var("BS_CHECKSUM") {
            if let Ok(k) = parse_checksum_kind(&v) {
                cfg.checksum_kind = k;
            }
        }

        if let Ok(v) = std::env::var("BS_CODEC") {
            if let Ok(c) = parse_codec(&v) {
                cfg.codec = c;
            }
        }

        if let Ok(v) = std::env::var("BS_ZSTD_LEVEL") {
            if let Ok(n) = v.trim().parse::<i32>() {
                cfg.zstd_level = n;
            }
        }

        if let Ok(v) = std::env::var("BS_DATA_FSYNC") {
            cfg.data_fsync = env_flag(&v);
        }

        cfg
    }

    pub fn with_allocsize(mut self, allocsize: u32) -> Self {
        self.allocsize = allocsize;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_checksum_kind(mut self, kind: u8) -> Self {
        self.checksum_kind = kind;
        self
    }

    pub fn with_codec(mut self, codec: u8) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Проверить согласованность полей. Block::create/open вызывают это сами.
    pub fn validate(&self) -> Result<()> {
        validate_allocsize(self.allocsize)?;
        if (self.allocsize as usize) < PAGE_HDR_SIZE {
            return Err(anyhow!(
                "allocsize {} smaller than page header ({})",
                self.allocsize,
                PAGE_HDR_SIZE
            ));
        }
        if self.max_page_size < self.allocsize
            || self.max_page_size > PAGE_SIZE_MAX
            || self.max_page_size % self.allocsize != 0
        {
            return Err(anyhow!(
                "max_page_size must be a multiple of allocsize {} in [{} .. {}], got {}",
                self.allocsize,
                self.allocsize,
                PAGE_SIZE_MAX,
                self.max_page_size
            ));
        }
        if self.checksum_kind != CKSUM_CRC32 && self.checksum_kind != CKSUM_CRC32C {
            return Err(anyhow!("unsupported checksum kind {}", self.checksum_kind));
        }
        if self.codec != CODEC_NONE && self.codec != CODEC_ZSTD {
            return Err(anyhow!("unsupported codec {}", self.codec));
        }
        Ok(())
    }
}

impl fmt::Display for SalvageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SalvageConfig {{ \
             allocsize: {}, \
             max_page_size: {}, \
             checksum: {}, \
             codec: {}, \
             zstd_level: {}, \
             data_fsync: {} \
             }}",
            self.allocsize,
            self.max_page_size,
            crate::page::checksum_kind_name(self.checksum_kind),
            crate::page::codec_name(self.codec),
            self.zstd_level,
            self.data_fsync,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SalvageConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.allocsize, 4096);
        assert_eq!(cfg.checksum_kind, CKSUM_CRC32C);
    }

    #[test]
    fn validate_rejects_bad_units() {
        assert!(SalvageConfig::default().with_allocsize(1000).validate().is_err());
        assert!(SalvageConfig::default().with_allocsize(256).validate().is_err());
        // max_page_size не кратен allocsize
        assert!(SalvageConfig::default()
            .with_allocsize(4096)
            .with_max_page_size(4096 * 3 + 512)
            .validate()
            .is_err());
        // max_page_size меньше allocsize
        assert!(SalvageConfig::default()
            .with_allocsize(8192)
            .with_max_page_size(4096)
            .validate()
            .is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!(parse_checksum_kind("CRC32").unwrap(), CKSUM_CRC32);
        assert_eq!(parse_checksum_kind(" crc32c ").unwrap(), CKSUM_CRC32C);
        assert!(parse_checksum_kind("blake3").is_err());
        assert_eq!(parse_codec("zstd").unwrap(), CODEC_ZSTD);
        assert!(parse_codec("lz4").is_err());
    }
}
