//! block/core - Block: контекст блочного менеджера одного открытого файла.
//!
//! Поля, которые salvage обязан уважать:
//! - allocsize фиксируется при открытии и не меняется;
//! - file_size - снимок длины файла (обновляется после усечения в salvage_start и после записей);
//! - lsn - максимальный наблюдённый порядковый номер записи; новые записи получают lsn+1;
//! - ok - «состоянию файла можно доверять»; сбрасывается неуспешным salvage.
//!
//! Один Block на файл: на время жизни держится эксклюзивный fs2‑lock `<path>.lock`.

use anyhow::{anyhow, Result};
use log::{debug, warn};
use std::path::Path;

use crate::config::SalvageConfig;
use crate::consts::DESC_SECTOR;
use crate::desc::{desc_init, desc_read};
use crate::free::{ExtentList, FreeTracker};
use crate::lock::{try_acquire_exclusive_lock, LockGuard};

use super::io::BlockFile;

/// Блочный менеджер открытого файла.
pub struct Block<T: FreeTracker = ExtentList> {
    pub(crate) fh: BlockFile,
    pub(crate) allocsize: u32,
    pub(crate) max_page_size: u32,
    pub(crate) checksum_kind: u8,
    pub(crate) codec: u8,
    pub(crate) zstd_level: i32,
    pub(crate) file_size: u64,
    pub(crate) lsn: u64,
    pub(crate) ok: bool,
    pub(crate) free: T,
    _lock: LockGuard,
}

impl Block<ExtentList> {
    /// Создать новый файл: description sector по cfg, без страниц.
    pub fn create(path: &Path, cfg: &SalvageConfig) -> Result<Self> {
        cfg.validate()?;
        let lock = try_acquire_exclusive_lock(path)?;
        let fh = BlockFile::create(path, cfg.data_fsync)?;
        desc_init(&fh, cfg.allocsize, cfg.checksum_kind)?;
        fh.sync()?;
        debug!(
            "block create: {} allocsize={} cksum_kind={}",
            path.display(),
            cfg.allocsize,
            cfg.checksum_kind
        );
        Ok(Self::from_parts(fh, lock, cfg, cfg.allocsize, cfg.checksum_kind, DESC_SECTOR))
    }

    /// Открыть существующий файл: description sector обязан быть валиден.
    /// allocsize и алгоритм checksum берутся из файла, а не из cfg.
    pub fn open(path: &Path, cfg: &SalvageConfig) -> Result<Self> {
        cfg.validate()?;
        let lock = try_acquire_exclusive_lock(path)?;
        let fh = BlockFile::open(path, cfg.data_fsync)?;
        let d = desc_read(&fh)?;
        if d.allocsize > cfg.max_page_size {
            return Err(anyhow!(
                "file allocsize {} exceeds configured max_page_size {}",
                d.allocsize,
                cfg.max_page_size
            ));
        }
        let len = fh.len()?;
        Ok(Self::from_parts(fh, lock, cfg, d.allocsize, d.checksum_kind, len))
    }

    /// Открыть файл для salvage: description sector может быть повреждён.
    /// Если он не читается - берём allocsize/checksum из cfg (с предупреждением).
    pub fn open_for_salvage(path: &Path, cfg: &SalvageConfig) -> Result<Self> {
        cfg.validate()?;
        let lock = try_acquire_exclusive_lock(path)?;
        let fh = BlockFile::open(path, cfg.data_fsync)?;
        let (allocsize, checksum_kind) = match desc_read(&fh) {
            Ok(d) if d.allocsize <= cfg.max_page_size => (d.allocsize, d.checksum_kind),
            Ok(d) => {
                warn!(
                    "salvage {}: description allocsize {} exceeds max_page_size {}, using configured allocsize {}",
                    path.display(),
                    d.allocsize,
                    cfg.max_page_size,
                    cfg.allocsize
                );
                (cfg.allocsize, cfg.checksum_kind)
            }
            Err(e) => {
                warn!(
                    "salvage {}: description sector unreadable ({:#}), using configured allocsize {}",
                    path.display(),
                    e,
                    cfg.allocsize
                );
                (cfg.allocsize, cfg.checksum_kind)
            }
        };
        let len = fh.len()?;
        Ok(Self::from_parts(fh, lock, cfg, allocsize, checksum_kind, len))
    }

    fn from_parts(
        fh: BlockFile,
        lock: LockGuard,
        cfg: &SalvageConfig,
        allocsize: u32,
        checksum_kind: u8,
        file_size: u64,
    ) -> Self {
        Self {
            fh,
            allocsize,
            // max_page_size кратен cfg.allocsize; для файла с другим unit округлим вниз.
            max_page_size: (cfg.max_page_size / allocsize) * allocsize,
            checksum_kind,
            codec: cfg.codec,
            zstd_level: cfg.zstd_level,
            file_size,
            lsn: 0,
            ok: true,
            free: ExtentList::new(),
            _lock: lock,
        }
    }
}

impl<T: FreeTracker> Block<T> {
    /// Заменить трекер свободного места (например, внешним allocation tracker'ом).
    pub fn with_tracker<U: FreeTracker>(self, tracker: U) -> Block<U> {
        Block {
            fh: self.fh,
            allocsize: self.allocsize,
            max_page_size: self.max_page_size,
            checksum_kind: self.checksum_kind,
            codec: self.codec,
            zstd_level: self.zstd_level,
            file_size: self.file_size,
            lsn: self.lsn,
            ok: self.ok,
            free: tracker,
            _lock: self._lock,
        }
    }

    #[inline] pub fn allocsize(&self) -> u32 { self.allocsize }
    #[inline] pub fn max_page_size(&self) -> u32 { self.max_page_size }
    #[inline] pub fn checksum_kind(&self) -> u8 { self.checksum_kind }
    #[inline] pub fn file_size(&self) -> u64 { self.file_size }
    #[inline] pub fn lsn(&self) -> u64 { self.lsn }
    #[inline] pub fn is_ok(&self) -> bool { self.ok }
    #[inline] pub fn path(&self) -> &Path { self.fh.path() }
    #[inline] pub fn tracker(&self) -> &T { &self.free }
    #[inline] pub fn tracker_mut(&mut self) -> &mut T { &mut self.free }

    /// Поднять watermark (никогда не опускает).
    pub fn bump_lsn(&mut self, lsn: u64) {
        if lsn > self.lsn {
            self.lsn = lsn;
        }
    }

    /// fsync файла данных.
    pub fn sync(&self) -> Result<()> {
        self.fh.sync()
    }

    /// Первый выровненный offset за концом данных (для дозаписи).
    pub(crate) fn append_offset(&self) -> u64 {
        if self.file_size <= DESC_SECTOR {
            return DESC_SECTOR;
        }
        let unit = self.allocsize as u64;
        DESC_SECTOR + (self.file_size - DESC_SECTOR).div_ceil(unit) * unit
    }
}
