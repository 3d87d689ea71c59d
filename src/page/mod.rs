//! page - формат страницы блочного файла: заголовок, checksum, сборка и материализация.
//!
//! Разделение по подмодулям:
//! - common.rs   - offsets заголовка, размер заголовка, идентификаторы кодеков.
//! - checksum.rs - CRC32 / CRC32C по странице с занулённым полем cksum.
//! - disk.rs     - PageHeader read/write, page_build (запись), page_decode (материализация).

pub mod common;
pub mod checksum;
pub mod disk;

// ---------------- re-exports (внешний API модуля page) ----------------

pub use common::{codec_name, CODEC_NONE, CODEC_ZSTD, PAGE_HDR_SIZE};

pub use checksum::{checksum_kind_name, page_checksum, page_update_checksum, page_verify_checksum};

pub use disk::{page_build, page_decode, page_header_read, page_header_write, DiskPage, PageHeader};
