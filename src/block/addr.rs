//! block/addr - address cookie: компактная ссылка (offset, size, cksum) на страницу.
//!
//! Формат v1:
//!   [ver u8 = ADDR_VERSION][offset uleb128][size uleb128][cksum uleb128]
//! Максимум ADDR_MAX_SIZE байт. Кодирование детерминировано и не зависит от состояния Block,
//! поэтому cookie, записанные одним прогоном, читаются любым кодом, знающим ту же версию.

use anyhow::{anyhow, Result};

use crate::consts::{ADDR_MAX_SIZE, ADDR_VERSION};

#[inline]
fn uleb_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

#[inline]
fn uleb_put(buf: &mut [u8], mut pos: usize, mut v: u64) -> usize {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            buf[pos] = byte;
            return pos + 1;
        }
        buf[pos] = byte | 0x80;
        pos += 1;
    }
}

fn uleb_get(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut v: u64 = 0;
    let mut shift = 0u32;
    loop {
        let b = *bytes
            .get(*pos)
            .ok_or_else(|| anyhow!("address cookie truncated at byte {}", *pos))?;
        *pos += 1;
        let low = (b & 0x7F) as u64;
        // 10-й байт может нести только младший бит u64.
        if shift == 63 && low > 1 {
            return Err(anyhow!("address cookie varint overflows u64"));
        }
        v |= low << shift;
        if b & 0x80 == 0 {
            // Минимальная запись: старший байт многобайтового varint не может быть нулём.
            if b == 0 && shift > 0 {
                return Err(anyhow!("address cookie varint not minimal at byte {}", *pos - 1));
            }
            return Ok(v);
        }
        shift += 7;
        if shift > 63 {
            return Err(anyhow!("address cookie varint too long"));
        }
    }
}

/// Длина cookie для данной тройки.
pub fn addr_encoded_len(offset: u64, size: u32, cksum: u32) -> usize {
    1 + uleb_len(offset) + uleb_len(size as u64) + uleb_len(cksum as u64)
}

/// Закодировать cookie в buf, вернуть число записанных байт.
///
/// # Panics
/// Если buf короче addr_encoded_len(): это нарушение контракта вызывающего
/// (буфера ADDR_MAX_SIZE всегда достаточно).
pub fn addr_encode(buf: &mut [u8], offset: u64, size: u32, cksum: u32) -> usize {
    let need = addr_encoded_len(offset, size, cksum);
    assert!(
        buf.len() >= need,
        "address cookie buffer too small: {} < {}",
        buf.len(),
        need
    );
    buf[0] = ADDR_VERSION;
    let pos = uleb_put(buf, 1, offset);
    let pos = uleb_put(buf, pos, size as u64);
    uleb_put(buf, pos, cksum as u64)
}

/// Закодировать cookie в новый Vec.
pub fn addr_to_vec(offset: u64, size: u32, cksum: u32) -> Vec<u8> {
    let mut buf = [0u8; ADDR_MAX_SIZE];
    let n = addr_encode(&mut buf, offset, size, cksum);
    buf[..n].to_vec()
}

/// Раскодировать cookie -> (offset, size, cksum).
pub fn addr_decode(bytes: &[u8]) -> Result<(u64, u32, u32)> {
    let ver = *bytes.first().ok_or_else(|| anyhow!("empty address cookie"))?;
    if ver != ADDR_VERSION {
        return Err(anyhow!(
            "unsupported address cookie version {} (expected {})",
            ver,
            ADDR_VERSION
        ));
    }
    let mut pos = 1;
    let offset = uleb_get(bytes, &mut pos)?;
    let size = uleb_get(bytes, &mut pos)?;
    let cksum = uleb_get(bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(anyhow!(
            "address cookie has {} trailing byte(s)",
            bytes.len() - pos
        ));
    }
    let size = u32::try_from(size).map_err(|_| anyhow!("address cookie size {} overflows u32", size))?;
    let cksum =
        u32::try_from(cksum).map_err(|_| anyhow!("address cookie cksum {} overflows u32", cksum))?;
    Ok((offset, size, cksum))
}
