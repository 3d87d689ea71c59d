//! page/checksum - checksum страницы, хранящийся в заголовке (поле cksum).
//!
//! - Считается по всем `size` байтам страницы, поле cksum при расчёте считается нулевым.
//! - Алгоритм задаётся description sector'ом файла: CRC32 (crc32fast) или CRC32C (Castagnoli).
//! - В отличие от обычного чтения, нулевой stored checksum не считается «пустой страницей»:
//!   salvage обязан проверять всё строго.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::common::{OFF_CKSUM, PAGE_HDR_SIZE};
use crate::consts::{CKSUM_CRC32, CKSUM_CRC32C};

pub fn checksum_kind_name(kind: u8) -> &'static str {
    match kind {
        CKSUM_CRC32 => "crc32",
        CKSUM_CRC32C => "crc32c",
        _ => "unknown",
    }
}

/// Checksum по набору кусков (как если бы они шли подряд).
fn checksum_parts(kind: u8, parts: &[&[u8]]) -> Result<u32> {
    match kind {
        CKSUM_CRC32 => {
            let mut h = crc32fast::Hasher::new();
            for p in parts {
                h.update(p);
            }
            Ok(h.finalize())
        }
        CKSUM_CRC32C => {
            let mut crc = 0u32;
            for p in parts {
                crc = crc32c::crc32c_append(crc, p);
            }
            Ok(crc)
        }
        other => Err(anyhow!("unsupported checksum kind {}", other)),
    }
}

/// Посчитать checksum страницы (поле cksum считается нулевым; страницу не копируем).
pub fn page_checksum(page: &[u8], kind: u8) -> Result<u32> {
    if page.len() < PAGE_HDR_SIZE {
        return Err(anyhow!("page buffer too small for checksum"));
    }
    let zero = [0u8; 4];
    checksum_parts(
        kind,
        &[&page[..OFF_CKSUM], &zero, &page[OFF_CKSUM + 4..]],
    )
}

/// Записать checksum страницы в заголовок. Возвращает записанное значение.
pub fn page_update_checksum(page: &mut [u8], kind: u8) -> Result<u32> {
    let c = page_checksum(page, kind)?;
    LittleEndian::write_u32(&mut page[OFF_CKSUM..OFF_CKSUM + 4], c);
    Ok(c)
}

/// Проверить checksum страницы. true = ок.
pub fn page_verify_checksum(page: &[u8], kind: u8) -> Result<bool> {
    if page.len() < PAGE_HDR_SIZE {
        return Err(anyhow!("page buffer too small for checksum verify"));
    }
    let stored = LittleEndian::read_u32(&page[OFF_CKSUM..OFF_CKSUM + 4]);
    Ok(stored == page_checksum(page, kind)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_then_verify_both_kinds() {
        for kind in [CKSUM_CRC32, CKSUM_CRC32C] {
            let mut page = vec![0u8; 512];
            page[40..45].copy_from_slice(b"hello");
            let c = page_update_checksum(&mut page, kind).unwrap();
            assert!(page_verify_checksum(&page, kind).unwrap());
            assert_eq!(page_checksum(&page, kind).unwrap(), c);

            page[100] ^= 0x01;
            assert!(!page_verify_checksum(&page, kind).unwrap());
        }
    }

    #[test]
    fn kinds_disagree() {
        let mut page = vec![7u8; 512];
        page_update_checksum(&mut page, CKSUM_CRC32C).unwrap();
        assert!(!page_verify_checksum(&page, CKSUM_CRC32).unwrap());
    }

    #[test]
    fn crc32c_matches_contiguous_digest() {
        // Кусочный расчёт обязан совпадать с расчётом по копии с занулённым полем.
        let mut page = vec![0u8; 1024];
        for (i, b) in page.iter_mut().enumerate() {
            *b = (i * 31 % 251) as u8;
        }
        let mut copy = page.clone();
        copy[OFF_CKSUM..OFF_CKSUM + 4].fill(0);
        assert_eq!(
            page_checksum(&page, CKSUM_CRC32C).unwrap(),
            crc32c::crc32c(&copy)
        );
    }

    #[test]
    fn unknown_kind_is_error() {
        let page = vec![0u8; 512];
        assert!(page_checksum(&page, 9).is_err());
    }
}
