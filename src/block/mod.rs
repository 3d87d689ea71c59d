//! block - блочный менеджер файла данных.
//!
//! Подмодули:
//! - core.rs - структура Block, create/open/open_for_salvage, watermark и флаг ok.
//! - io.rs   - BlockFile: read_at/write_at/truncate/len/sync.
//! - addr.rs - address cookie (offset, size, cksum).
//! - rw.rs   - write_block/read_block/read_addr.
//!
//! Salvage (start/next/end) живёт в crate::salvage и работает поверх этих примитивов.

pub mod core;
pub mod io;
pub mod addr;
pub mod rw;

pub use addr::{addr_decode, addr_encode, addr_encoded_len, addr_to_vec};
pub use self::core::Block;
pub use io::BlockFile;
