//! Общие константы форматов (description sector, allocation unit, pages, address cookie, free side-file).

// -------- Description sector --------
/// Размер ведущего сектора описания файла (байт). Первая страница начинается сразу за ним.
pub const DESC_SECTOR: u64 = 512;
pub const DESC_MAGIC: &[u8; 8] = b"BSDESC01";
pub const DESC_MAJOR: u16 = 1;
pub const DESC_MINOR: u16 = 0;

// -------- Allocation unit --------
// Степень двойки в [512 .. 128 MiB].
pub const ALLOCSIZE_MIN: u32 = 512;
pub const ALLOCSIZE_MAX: u32 = 128 * 1024 * 1024;
pub const ALLOCSIZE_DEFAULT: u32 = 4096;

// -------- Pages --------
/// Абсолютный потолок размера страницы на диске.
pub const PAGE_SIZE_MAX: u32 = 512 * 1024 * 1024;

// -------- Checksum kinds (хранятся в description sector) --------
pub const CKSUM_CRC32: u8 = 0;
pub const CKSUM_CRC32C: u8 = 1; // default policy

// -------- Address cookie --------
// Формат v1: [ver u8][offset varint][size varint][cksum varint], LEB128.
pub const ADDR_VERSION: u8 = 1;
/// Верхняя граница длины cookie: 1 + 10 (u64) + 5 (u32) + 5 (u32), с запасом до 24.
pub const ADDR_MAX_SIZE: usize = 24;

// -------- Free extents side-file --------
// Формат (LE):
// [magic8="BSFREE01"][ver u32=1][count u32], далее count x [offset u64][len u64].
pub const FREE_EXT: &str = "free";
pub const FREE_MAGIC: &[u8; 8] = b"BSFREE01";
pub const FREE_VER: u32 = 1;
pub const FREE_HDR_SIZE: usize = 16;

// -------- Lock --------
pub const LOCK_EXT: &str = "lock";
