//! block/rw - обычный путь чтения/записи страниц:
//! - write_block: дозапись выровненной страницы со штампом lsn+1, возвращает address cookie;
//! - read_block: материализация страницы по (offset, size, cksum);
//! - read_addr: то же по cookie.
//!
//! read_block - ровно та операция «materialize page», на которую опирается salvage.

use anyhow::{anyhow, Result};
use log::debug;

use crate::free::FreeTracker;
use crate::page::{page_build, page_decode, page_header_read, DiskPage};

use super::addr::{addr_decode, addr_to_vec};
use super::core::Block;

impl<T: FreeTracker> Block<T> {
    /// Дописать страницу в конец файла. Ошибка, если Block инвалидирован неуспешным salvage.
    pub fn write_block(&mut self, page_type: u8, data: &[u8]) -> Result<Vec<u8>> {
        if !self.ok {
            return Err(anyhow!(
                "block {} is invalid (failed salvage); writes refused",
                self.fh.path().display()
            ));
        }
        if data.len() > self.max_page_size as usize {
            return Err(anyhow!(
                "payload {} B exceeds max_page_size {}",
                data.len(),
                self.max_page_size
            ));
        }
        let lsn = self.lsn + 1;
        let (page, h) = page_build(
            self.allocsize,
            page_type,
            lsn,
            data,
            self.codec,
            self.zstd_level,
            self.checksum_kind,
        )?;
        if h.size > self.max_page_size {
            return Err(anyhow!(
                "page size {} exceeds max_page_size {}",
                h.size,
                self.max_page_size
            ));
        }

        let offset = self.append_offset();
        self.fh.write_at(offset, &page)?;
        self.file_size = offset + page.len() as u64;
        self.lsn = lsn;

        debug!(
            "write_block: off={} size={} cksum={:#010x} lsn={} codec={}",
            offset, h.size, h.cksum, lsn, h.codec
        );
        Ok(addr_to_vec(offset, h.size, h.cksum))
    }

    /// Прочитать и материализовать страницу: заголовок обязан совпасть с (size, cksum),
    /// checksum - сойтись, payload - декодироваться.
    pub fn read_block(&self, offset: u64, size: u32, cksum: u32) -> Result<DiskPage> {
        let end = offset
            .checked_add(size as u64)
            .ok_or_else(|| anyhow!("block {}+{} overflows", offset, size))?;
        if end > self.file_size {
            return Err(anyhow!(
                "block {}+{} past end of file ({})",
                offset,
                size,
                self.file_size
            ));
        }

        let mut buf = vec![0u8; size as usize];
        self.fh.read_at(offset, &mut buf)?;

        let h = page_header_read(&buf)?;
        if h.size != size || h.cksum != cksum {
            return Err(anyhow!(
                "block at {}: header (size={}, cksum={:#010x}) does not match address (size={}, cksum={:#010x})",
                offset,
                h.size,
                h.cksum,
                size,
                cksum
            ));
        }
        page_decode(&buf, self.checksum_kind, self.max_page_size)
    }

    /// Прочитать страницу по address cookie.
    pub fn read_addr(&self, addr: &[u8]) -> Result<DiskPage> {
        let (offset, size, cksum) = addr_decode(addr)?;
        self.read_block(offset, size, cksum)
    }
}
