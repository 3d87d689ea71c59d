//! page/disk - заголовок страницы, сборка страницы для записи и «материализация» при чтении.
//!
//! Материализация (page_decode) - единственный авторитет в вопросе «это действительно страница»:
//! проверка заявленного размера, checksum и декодирование payload (zstd при codec=1).
//! Любая ошибка - Err, частичных результатов нет.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::checksum::{page_update_checksum, page_verify_checksum};
use super::common::{
    CODEC_NONE, CODEC_ZSTD, OFF_CKSUM, OFF_CODEC, OFF_FLAGS, OFF_LSN, OFF_MEM_SIZE,
    OFF_PAYLOAD_LEN, OFF_RESERVED, OFF_SIZE, OFF_TYPE, PAGE_HDR_SIZE,
};

/// Заголовок страницы на диске.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub size: u32,
    pub cksum: u32,
    pub lsn: u64,
    pub mem_size: u32,
    pub payload_len: u32,
    pub page_type: u8,
    pub codec: u8,
    pub flags: u16,
}

/// Декодированная страница.
#[derive(Debug, Clone)]
pub struct DiskPage {
    pub header: PageHeader,
    pub data: Vec<u8>,
}

/// Прочитать заголовок из начала буфера. Значения не валидируются.
pub fn page_header_read(buf: &[u8]) -> Result<PageHeader> {
    if buf.len() < PAGE_HDR_SIZE {
        return Err(anyhow!(
            "buffer too small for page header ({} < {})",
            buf.len(),
            PAGE_HDR_SIZE
        ));
    }
    Ok(PageHeader {
        size: LittleEndian::read_u32(&buf[OFF_SIZE..OFF_SIZE + 4]),
        cksum: LittleEndian::read_u32(&buf[OFF_CKSUM..OFF_CKSUM + 4]),
        lsn: LittleEndian::read_u64(&buf[OFF_LSN..OFF_LSN + 8]),
        mem_size: LittleEndian::read_u32(&buf[OFF_MEM_SIZE..OFF_MEM_SIZE + 4]),
        payload_len: LittleEndian::read_u32(&buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 4]),
        page_type: buf[OFF_TYPE],
        codec: buf[OFF_CODEC],
        flags: LittleEndian::read_u16(&buf[OFF_FLAGS..OFF_FLAGS + 2]),
    })
}

/// Записать заголовок (без пересчёта checksum).
pub fn page_header_write(buf: &mut [u8], h: &PageHeader) -> Result<()> {
    if buf.len() < PAGE_HDR_SIZE {
        return Err(anyhow!("buffer too small for page header"));
    }
    LittleEndian::write_u32(&mut buf[OFF_SIZE..OFF_SIZE + 4], h.size);
    LittleEndian::write_u32(&mut buf[OFF_CKSUM..OFF_CKSUM + 4], h.cksum);
    LittleEndian::write_u64(&mut buf[OFF_LSN..OFF_LSN + 8], h.lsn);
    LittleEndian::write_u32(&mut buf[OFF_MEM_SIZE..OFF_MEM_SIZE + 4], h.mem_size);
    LittleEndian::write_u32(&mut buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 4], h.payload_len);
    buf[OFF_TYPE] = h.page_type;
    buf[OFF_CODEC] = h.codec;
    LittleEndian::write_u16(&mut buf[OFF_FLAGS..OFF_FLAGS + 2], h.flags);
    LittleEndian::write_u32(&mut buf[OFF_RESERVED..OFF_RESERVED + 4], 0); // всегда 0
    Ok(())
}

/// Собрать страницу для записи: заголовок + payload + нулевой хвост до кратного allocsize размера.
///
/// При codec=CODEC_ZSTD payload сжимается, но только если это реально уменьшает его;
/// иначе страница пишется с CODEC_NONE.
pub fn page_build(
    allocsize: u32,
    page_type: u8,
    lsn: u64,
    data: &[u8],
    codec: u8,
    zstd_level: i32,
    checksum_kind: u8,
) -> Result<(Vec<u8>, PageHeader)> {
    if data.len() > u32::MAX as usize {
        return Err(anyhow!("page payload too large: {} bytes", data.len()));
    }

    let compressed = match codec {
        CODEC_NONE => None,
        CODEC_ZSTD => {
            let z = zstd::bulk::compress(data, zstd_level)
                .map_err(|e| anyhow!("zstd compress failed: {}", e))?;
            if z.len() < data.len() { Some(z) } else { None }
        }
        other => return Err(anyhow!("unsupported codec {}", other)),
    };
    let (payload, codec_used): (&[u8], u8) = match compressed.as_deref() {
        Some(z) => (z, CODEC_ZSTD),
        None => (data, CODEC_NONE),
    };

    let used = (PAGE_HDR_SIZE + payload.len()) as u64;
    let unit = allocsize as u64;
    let size = used.div_ceil(unit) * unit;
    if size > u32::MAX as u64 {
        return Err(anyhow!("page size {} overflows u32", size));
    }

    let mut page = vec![0u8; size as usize];
    let mut h = PageHeader {
        size: size as u32,
        cksum: 0,
        lsn,
        mem_size: data.len() as u32,
        payload_len: payload.len() as u32,
        page_type,
        codec: codec_used,
        flags: 0,
    };
    page_header_write(&mut page, &h)?;
    page[PAGE_HDR_SIZE..PAGE_HDR_SIZE + payload.len()].copy_from_slice(payload);
    h.cksum = page_update_checksum(&mut page, checksum_kind)?;
    Ok((page, h))
}

/// Материализовать страницу из полного буфера `size` байт: размер, checksum, декодирование.
///
/// `mem_limit` ограничивает заявленный в заголовке mem_size: буфер под распаковку
/// не выделяется больше этого предела.
pub fn page_decode(page: &[u8], checksum_kind: u8, mem_limit: u32) -> Result<DiskPage> {
    let h = page_header_read(page)?;
    if h.size as usize != page.len() {
        return Err(anyhow!(
            "declared page size {} != buffer size {}",
            h.size,
            page.len()
        ));
    }
    if !page_verify_checksum(page, checksum_kind)? {
        return Err(anyhow!("page checksum mismatch (stored={:#010x})", h.cksum));
    }

    let payload_end = PAGE_HDR_SIZE
        .checked_add(h.payload_len as usize)
        .filter(|&end| end <= page.len())
        .ok_or_else(|| {
            anyhow!(
                "payload_len {} exceeds page size {}",
                h.payload_len,
                h.size
            )
        })?;
    let payload = &page[PAGE_HDR_SIZE..payload_end];

    if h.mem_size > mem_limit {
        return Err(anyhow!(
            "page mem_size {} exceeds limit {}",
            h.mem_size,
            mem_limit
        ));
    }

    let data = match h.codec {
        CODEC_NONE => {
            if h.mem_size != h.payload_len {
                return Err(anyhow!(
                    "uncompressed page with mem_size {} != payload_len {}",
                    h.mem_size,
                    h.payload_len
                ));
            }
            payload.to_vec()
        }
        CODEC_ZSTD => {
            let out = zstd::bulk::decompress(payload, h.mem_size as usize)
                .map_err(|e| anyhow!("zstd decompress failed: {}", e))?;
            if out.len() != h.mem_size as usize {
                return Err(anyhow!(
                    "decompressed {} bytes, header says {}",
                    out.len(),
                    h.mem_size
                ));
            }
            out
        }
        other => return Err(anyhow!("unsupported page codec {}", other)),
    };

    Ok(DiskPage { header: h, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{CKSUM_CRC32, CKSUM_CRC32C};

    #[test]
    fn build_pads_to_allocation_unit() {
        let (page, h) = page_build(512, 7, 42, &[1u8; 600], CODEC_NONE, 3, CKSUM_CRC32C).unwrap();
        assert_eq!(page.len(), 1024);
        assert_eq!(h.size, 1024);
        assert_eq!(h.lsn, 42);
        assert_eq!(h.page_type, 7);
        assert_eq!(page_header_read(&page).unwrap(), h);

        let d = page_decode(&page, CKSUM_CRC32C, u32::MAX).unwrap();
        assert_eq!(d.data, vec![1u8; 600]);
        assert_eq!(d.header.codec, CODEC_NONE);
    }

    #[test]
    fn empty_payload_is_one_unit() {
        let (page, h) = page_build(4096, 1, 1, &[], CODEC_NONE, 3, CKSUM_CRC32).unwrap();
        assert_eq!(page.len(), 4096);
        assert_eq!(h.mem_size, 0);
        assert!(page_decode(&page, CKSUM_CRC32, u32::MAX).unwrap().data.is_empty());
    }

    #[test]
    fn zstd_used_only_when_smaller() {
        let compressible = vec![b'a'; 20_000];
        let (page, h) =
            page_build(4096, 1, 5, &compressible, CODEC_ZSTD, 3, CKSUM_CRC32C).unwrap();
        assert_eq!(h.codec, CODEC_ZSTD);
        assert_eq!(page.len(), 4096);
        assert_eq!(page_decode(&page, CKSUM_CRC32C, u32::MAX).unwrap().data, compressible);

        // Два байта не сожмутся - должен остаться CODEC_NONE.
        let (_, h2) = page_build(4096, 1, 6, b"xy", CODEC_ZSTD, 3, CKSUM_CRC32C).unwrap();
        assert_eq!(h2.codec, CODEC_NONE);
    }

    #[test]
    fn decode_rejects_corruption() {
        let (mut page, _) = page_build(512, 1, 1, b"payload", CODEC_NONE, 3, CKSUM_CRC32C).unwrap();
        page[PAGE_HDR_SIZE + 2] ^= 0xFF;
        let err = page_decode(&page, CKSUM_CRC32C, u32::MAX).unwrap_err();
        assert!(err.to_string().contains("checksum"), "got: {}", err);
    }

    #[test]
    fn decode_rejects_size_mismatch() {
        let (page, _) = page_build(512, 1, 1, b"payload", CODEC_NONE, 3, CKSUM_CRC32C).unwrap();
        let mut bigger = page.clone();
        bigger.extend_from_slice(&[0u8; 512]);
        assert!(page_decode(&bigger, CKSUM_CRC32C, u32::MAX).is_err());
    }

    #[test]
    fn decode_rejects_bad_payload_len_even_with_valid_checksum() {
        let (mut page, mut h) =
            page_build(512, 1, 1, b"payload", CODEC_NONE, 3, CKSUM_CRC32C).unwrap();
        h.payload_len = 10_000;
        h.mem_size = 10_000;
        page_header_write(&mut page, &h).unwrap();
        page_update_checksum(&mut page, CKSUM_CRC32C).unwrap();
        assert!(page_decode(&page, CKSUM_CRC32C, u32::MAX).is_err());
    }

    #[test]
    fn decode_rejects_mem_size_over_limit() {
        let data = vec![b'a'; 20_000];
        let (page, _) = page_build(4096, 1, 1, &data, CODEC_ZSTD, 3, CKSUM_CRC32C).unwrap();
        assert_eq!(page_decode(&page, CKSUM_CRC32C, 20_000).unwrap().data, data);
        let err = page_decode(&page, CKSUM_CRC32C, 19_999).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"), "got: {}", err);

        // Заявленный mem_size ~4 GiB при валидном checksum: отказ до выделения памяти.
        let (mut page, mut h) =
            page_build(4096, 1, 1, &data, CODEC_ZSTD, 3, CKSUM_CRC32C).unwrap();
        h.mem_size = u32::MAX;
        page_header_write(&mut page, &h).unwrap();
        page_update_checksum(&mut page, CKSUM_CRC32C).unwrap();
        assert!(page_decode(&page, CKSUM_CRC32C, 1 << 20).is_err());
    }
}
