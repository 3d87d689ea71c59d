//! salvage - перебор файла данных в поисках валидных страниц, когда структуре файла доверять нельзя.
//!
//! Протокол из трёх фаз:
//! - Block::salvage_start - усечь файл до DESC_SECTOR + N*allocsize, переписать description sector,
//!   вернуть курсор Salvage, стоящий сразу за сектором описания;
//! - Salvage::next_page - пробовать по одному allocation unit: заголовок → дешёвые структурные
//!   проверки → полная материализация (checksum + декодирование). Принятая страница возвращается
//!   и курсор перескакивает её целиком; отвергнутый unit отдаётся трекеру свободного места
//!   и курсор сдвигается ровно на allocsize;
//! - Salvage::end (или Block::salvage_end) - при неуспехе Block инвалидируется, накопленный
//!   учёт свободного места выбрасывается.
//!
//! Гарантии:
//! - offset монотонен, кратен allocsize относительно DESC_SECTOR, не выходит за file_size;
//! - после Eof любой следующий вызов снова даёт Eof;
//! - отвергнутые unit'ы и возвращённые страницы в точности покрывают [DESC_SECTOR, file_size);
//! - watermark (max lsn) поднимается только принятыми страницами.
//!
//! Курсор, брошенный без end (например, после `?` на фатальной ошибке ввода-вывода),
//! ведёт себя как end(false).

use anyhow::{Error, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

use crate::block::addr::addr_to_vec;
use crate::block::Block;
use crate::consts::DESC_SECTOR;
use crate::desc::desc_init;
use crate::free::FreeTracker;
use crate::page::page_header_read;

/// Страница, найденная salvage.
#[derive(Debug, Clone)]
pub struct SalvagePage {
    /// Address cookie (offset, size, cksum).
    pub addr: Vec<u8>,
    pub offset: u64,
    pub size: u32,
    pub cksum: u32,
    pub lsn: u64,
    pub page_type: u8,
    /// Декодированный payload.
    pub data: Vec<u8>,
}

impl SalvagePage {
    /// Размер страницы на диске.
    pub fn size_hint(&self) -> u32 {
        self.size
    }
}

/// Результат одного next_page.
#[derive(Debug)]
pub enum SalvageNext {
    Page(SalvagePage),
    Eof,
}

/// Почему allocation unit отвергнут.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ZeroSize,
    Misaligned(u32),
    TooLarge(u32),
    PastEof(u32),
    /// Материализация не удалась: checksum, заголовок, декодирование.
    Corrupt(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "zero size"),
            Self::Misaligned(s) => write!(f, "size {} not a multiple of allocsize", s),
            Self::TooLarge(s) => write!(f, "size {} exceeds max page size", s),
            Self::PastEof(s) => write!(f, "size {} runs past end of file", s),
            Self::Corrupt(msg) => write!(f, "corrupt: {}", msg),
        }
    }
}

/// Итог одной пробы.
enum Probe {
    Accepted(SalvagePage),
    Rejected(RejectReason),
    Fatal(Error),
}

/// Статистика прогона.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SalvageStats {
    pub pages: u64,
    pub page_bytes: u64,
    pub skipped_units: u64,
    pub skipped_bytes: u64,
    pub max_lsn: u64,
}

/// Курсор salvage. Создаётся Block::salvage_start, живёт до end (или drop).
pub struct Salvage<'a, T: FreeTracker> {
    block: &'a mut Block<T>,
    allocsize: u32,
    max_page_size: u32,
    file_size: u64,
    offset: u64,
    max_lsn: u64,
    buf: Vec<u8>,
    stats: SalvageStats,
    // Iterator: после Eof/фатальной ошибки больше ничего не отдаём.
    fused: bool,
    ended: bool,
}

impl<T: FreeTracker> Block<T> {
    /// Начать salvage: усечение до целого числа allocation unit'ов, сброс description sector.
    /// Трекер свободного места не трогается - он строится заново самим сканом.
    pub fn salvage_start(&mut self) -> Result<Salvage<'_, T>> {
        let unit = self.allocsize as u64;
        let len = self.fh.len()?;
        if len > DESC_SECTOR {
            let aligned = DESC_SECTOR + ((len - DESC_SECTOR) / unit) * unit;
            if aligned != len {
                info!(
                    "salvage {}: truncating {} trailing byte(s), {} -> {}",
                    self.fh.path().display(),
                    len - aligned,
                    len,
                    aligned
                );
                self.fh.truncate(aligned)?;
            }
        }

        // Короткий файл (< DESC_SECTOR) при этом дорастает до полного сектора.
        desc_init(&self.fh, self.allocsize, self.checksum_kind)?;
        self.file_size = self.fh.len()?;

        debug!(
            "salvage {}: start file_size={} allocsize={} max_page_size={}",
            self.fh.path().display(),
            self.file_size,
            self.allocsize,
            self.max_page_size
        );
        Ok(Salvage {
            allocsize: self.allocsize,
            max_page_size: self.max_page_size,
            file_size: self.file_size,
            offset: DESC_SECTOR,
            max_lsn: self.lsn,
            buf: vec![0u8; self.allocsize as usize],
            stats: SalvageStats { max_lsn: self.lsn, ..SalvageStats::default() },
            fused: false,
            ended: false,
            block: self,
        })
    }

    /// Завершить salvage. При неуспехе - Block недоверенный, учёт свободного места выброшен.
    /// При успехе ничего не делает: сохранение состояния - забота вызывающего.
    pub fn salvage_end(&mut self, success: bool) {
        if !success {
            self.ok = false;
            self.free.discard_all();
            info!(
                "salvage {}: failed, block invalidated and free-space bookkeeping discarded",
                self.fh.path().display()
            );
        }
    }
}

impl<'a, T: FreeTracker> Salvage<'a, T> {
    /// Следующая валидная страница или Eof. Err - только фатальная ошибка ввода-вывода.
    pub fn next_page(&mut self) -> Result<SalvageNext> {
        loop {
            if self.offset >= self.file_size {
                self.fused = true;
                return Ok(SalvageNext::Eof);
            }
            match self.probe() {
                Probe::Accepted(page) => {
                    if page.lsn > self.max_lsn {
                        self.max_lsn = page.lsn;
                    }
                    self.offset += page.size as u64;
                    self.stats.pages += 1;
                    self.stats.page_bytes += page.size as u64;
                    self.stats.max_lsn = self.max_lsn;
                    return Ok(SalvageNext::Page(page));
                }
                Probe::Rejected(reason) => self.skip(&reason),
                Probe::Fatal(e) => return Err(e),
            }
        }
    }

    /// Одна проба на текущем offset.
    fn probe(&mut self) -> Probe {
        let offset = self.offset;
        if let Err(e) = self.block.fh.read_at(offset, &mut self.buf) {
            return Probe::Fatal(e.context(format!("salvage read at offset {}", offset)));
        }
        let h = match page_header_read(&self.buf) {
            Ok(h) => h,
            Err(e) => return Probe::Rejected(RejectReason::Corrupt(format!("{:#}", e))),
        };

        // Дешёвый структурный фильтр.
        let size = h.size;
        if size == 0 {
            return Probe::Rejected(RejectReason::ZeroSize);
        }
        if size % self.allocsize != 0 {
            return Probe::Rejected(RejectReason::Misaligned(size));
        }
        if size > self.max_page_size {
            return Probe::Rejected(RejectReason::TooLarge(size));
        }
        if offset + size as u64 > self.file_size {
            return Probe::Rejected(RejectReason::PastEof(size));
        }

        // Полная материализация - окончательный вердикт.
        match self.block.read_block(offset, size, h.cksum) {
            Ok(page) => Probe::Accepted(SalvagePage {
                addr: addr_to_vec(offset, size, h.cksum),
                offset,
                size,
                cksum: h.cksum,
                lsn: page.header.lsn,
                page_type: page.header.page_type,
                data: page.data,
            }),
            Err(e) => Probe::Rejected(RejectReason::Corrupt(format!("{:#}", e))),
        }
    }

    /// Отвергнуть unit на текущем offset: отдать трекеру и шагнуть на allocsize.
    fn skip(&mut self, reason: &RejectReason) {
        let unit = self.allocsize as u64;
        debug!(
            "salvage: skipping {}B at file offset {}: {}",
            unit, self.offset, reason
        );
        if let Err(e) = self.block.free.report_free(self.offset, unit) {
            warn!(
                "salvage: free-space report for {}+{} failed (ignored): {:#}",
                self.offset, unit, e
            );
        }
        self.offset += unit;
        self.stats.skipped_units += 1;
        self.stats.skipped_bytes += unit;
    }

    /// Текущий offset (начало ещё не просмотренной области).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Длина файла, по которой идёт скан (после усечения).
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn allocsize(&self) -> u32 {
        self.allocsize
    }

    /// Максимальный lsn среди принятых страниц (и исходного watermark Block).
    pub fn max_lsn(&self) -> u64 {
        self.max_lsn
    }

    pub fn stats(&self) -> &SalvageStats {
        &self.stats
    }

    /// Трекер свободного места (только чтение, пока идёт скан).
    pub fn tracker(&self) -> &T {
        &self.block.free
    }

    /// Завершить прогон: перенести watermark в Block и вызвать salvage_end(success).
    pub fn end(mut self, success: bool) -> SalvageStats {
        self.finish(success);
        self.stats.clone()
    }

    fn finish(&mut self, success: bool) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.block.bump_lsn(self.max_lsn);
        info!(
            "salvage {}: {} (pages={}, skipped_units={}, max_lsn={})",
            self.block.fh.path().display(),
            if success { "done" } else { "aborted" },
            self.stats.pages,
            self.stats.skipped_units,
            self.max_lsn
        );
        self.block.salvage_end(success);
    }
}

impl<'a, T: FreeTracker> Iterator for Salvage<'a, T> {
    type Item = Result<SalvagePage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.next_page() {
            Ok(SalvageNext::Page(p)) => Some(Ok(p)),
            Ok(SalvageNext::Eof) => None,
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a, T: FreeTracker> Drop for Salvage<'a, T> {
    fn drop(&mut self) {
        if !self.ended {
            warn!(
                "salvage {}: cursor dropped without end at offset {}, treating as failure",
                self.block.fh.path().display(),
                self.offset
            );
            self.finish(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SalvageConfig;
    use std::path::PathBuf;

    fn tmp_path(name: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("bs-slvg-{}-{}-{}", name, std::process::id(), t))
    }

    #[test]
    fn reject_reason_display() {
        assert_eq!(RejectReason::ZeroSize.to_string(), "zero size");
        assert!(RejectReason::PastEof(8192).to_string().contains("8192"));
        assert!(RejectReason::Corrupt("checksum".into()).to_string().contains("checksum"));
    }

    #[test]
    fn eof_is_sticky_and_iterator_is_fused() {
        let p = tmp_path("eof");
        let cfg = SalvageConfig::default().with_allocsize(512);
        let mut b = crate::block::Block::create(&p, &cfg).unwrap();
        {
            let mut s = b.salvage_start().unwrap();
            assert!(matches!(s.next_page().unwrap(), SalvageNext::Eof));
            assert!(matches!(s.next_page().unwrap(), SalvageNext::Eof));
            assert!(s.next().is_none());
            assert!(s.next().is_none());
            assert_eq!(s.offset(), DESC_SECTOR);
            s.end(true);
        }
        assert!(b.is_ok());
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn watermark_starts_from_block_lsn() {
        let p = tmp_path("lsn");
        let cfg = SalvageConfig::default().with_allocsize(512);
        let mut b = crate::block::Block::create(&p, &cfg).unwrap();
        b.write_block(1, b"a").unwrap();
        b.write_block(1, b"b").unwrap();
        assert_eq!(b.lsn(), 2);
        {
            let s = b.salvage_start().unwrap();
            assert_eq!(s.max_lsn(), 2);
            let pages: Vec<_> = s.collect::<Result<Vec<_>>>().unwrap();
            assert_eq!(pages.len(), 2);
            assert_eq!(pages[0].data, b"a");
            assert_eq!(pages[1].lsn, 2);
        }
        // Курсор брошен без end -> как end(false).
        assert!(!b.is_ok());
        assert_eq!(b.lsn(), 2);
        let _ = std::fs::remove_file(&p);
    }
}
