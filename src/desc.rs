// src/desc.rs - description sector блочного файла
//
// Формат первых 512 байт файла (LE):
// MAGIC8 = "BSDESC01"
// u16 major           = 1
// u16 minor           = 0
// u32 allocsize       (степень двойки, 512 .. 128 MiB)
// u8  checksum_kind   (0=crc32, 1=crc32c)
// u8[3] reserved
// u32 crc32           (crc32fast по всему сектору с занулённым полем crc)
// остаток сектора - нули
//
// Политика:
// - desc_init перезаписывает сектор целиком (в т.ч. расширяет короткий файл до 512 байт).
// - desc_read проверяет magic, crc и major-версию; minor новее - допускается.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::block::io::BlockFile;
use crate::config::validate_allocsize;
use crate::consts::{CKSUM_CRC32, CKSUM_CRC32C, DESC_MAGIC, DESC_MAJOR, DESC_MINOR, DESC_SECTOR};

const OFF_MAGIC: usize = 0;
const OFF_MAJOR: usize = 8;
const OFF_MINOR: usize = 10;
const OFF_ALLOCSIZE: usize = 12;
const OFF_CKSUM_KIND: usize = 16;
const OFF_CRC: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescSector {
    pub major: u16,
    pub minor: u16,
    pub allocsize: u32,
    pub checksum_kind: u8,
}

impl DescSector {
    pub fn new(allocsize: u32, checksum_kind: u8) -> Self {
        Self { major: DESC_MAJOR, minor: DESC_MINOR, allocsize, checksum_kind }
    }
}

fn sector_crc(buf: &[u8]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(&buf[..OFF_CRC]);
    h.update(&[0u8; 4]);
    h.update(&buf[OFF_CRC + 4..]);
    h.finalize()
}

/// Сериализовать сектор (ровно DESC_SECTOR байт).
pub fn desc_encode(d: &DescSector) -> Vec<u8> {
    let mut buf = vec![0u8; DESC_SECTOR as usize];
    buf[OFF_MAGIC..OFF_MAGIC + 8].copy_from_slice(DESC_MAGIC);
    LittleEndian::write_u16(&mut buf[OFF_MAJOR..OFF_MAJOR + 2], d.major);
    LittleEndian::write_u16(&mut buf[OFF_MINOR..OFF_MINOR + 2], d.minor);
    LittleEndian::write_u32(&mut buf[OFF_ALLOCSIZE..OFF_ALLOCSIZE + 4], d.allocsize);
    buf[OFF_CKSUM_KIND] = d.checksum_kind;
    let crc = sector_crc(&buf);
    LittleEndian::write_u32(&mut buf[OFF_CRC..OFF_CRC + 4], crc);
    buf
}

/// Разобрать и проверить сектор.
pub fn desc_decode(buf: &[u8]) -> Result<DescSector> {
    if buf.len() != DESC_SECTOR as usize {
        return Err(anyhow!(
            "description sector must be {} bytes, got {}",
            DESC_SECTOR,
            buf.len()
        ));
    }
    if &buf[OFF_MAGIC..OFF_MAGIC + 8] != DESC_MAGIC {
        return Err(anyhow!("bad description sector magic"));
    }
    let stored = LittleEndian::read_u32(&buf[OFF_CRC..OFF_CRC + 4]);
    let calc = sector_crc(buf);
    if stored != calc {
        return Err(anyhow!(
            "description sector checksum mismatch (stored={:#010x}, calc={:#010x})",
            stored,
            calc
        ));
    }
    let d = DescSector {
        major: LittleEndian::read_u16(&buf[OFF_MAJOR..OFF_MAJOR + 2]),
        minor: LittleEndian::read_u16(&buf[OFF_MINOR..OFF_MINOR + 2]),
        allocsize: LittleEndian::read_u32(&buf[OFF_ALLOCSIZE..OFF_ALLOCSIZE + 4]),
        checksum_kind: buf[OFF_CKSUM_KIND],
    };
    if d.major != DESC_MAJOR {
        return Err(anyhow!(
            "unsupported description sector version {}.{} (expected major {})",
            d.major,
            d.minor,
            DESC_MAJOR
        ));
    }
    validate_allocsize(d.allocsize)?;
    if d.checksum_kind != CKSUM_CRC32 && d.checksum_kind != CKSUM_CRC32C {
        return Err(anyhow!("unsupported checksum kind {} in description sector", d.checksum_kind));
    }
    Ok(d)
}

/// Записать «чистый» description sector в начало файла.
pub fn desc_init(fh: &BlockFile, allocsize: u32, checksum_kind: u8) -> Result<()> {
    let buf = desc_encode(&DescSector::new(allocsize, checksum_kind));
    fh.write_at(0, &buf)
}

/// Прочитать description sector из файла.
pub fn desc_read(fh: &BlockFile) -> Result<DescSector> {
    let mut buf = vec![0u8; DESC_SECTOR as usize];
    fh.read_at(0, &mut buf)?;
    desc_decode(&buf)
}
