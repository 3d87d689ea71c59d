//! page/common - offsets заголовка страницы на диске и идентификаторы кодеков.
//!
//! Заголовок (32 байта, LE) лежит в начале каждой страницы, выровненной по allocation unit:
//! [size u32][cksum u32][lsn u64][mem_size u32][payload_len u32][type u8][codec u8][flags u16][reserved u32]
//! Далее payload (payload_len байт), хвост до `size` - нули.

/// Размер заголовка страницы.
pub const PAGE_HDR_SIZE: usize = 32;

/// size (u32): заявленный размер страницы на диске, кратен allocation unit.
pub const OFF_SIZE: usize = 0;
/// cksum (u32): checksum всех `size` байт с занулённым полем cksum.
pub const OFF_CKSUM: usize = 4;
/// lsn (u64): порядковый номер записи страницы.
pub const OFF_LSN: usize = 8;
/// mem_size (u32): длина payload после декодирования.
pub const OFF_MEM_SIZE: usize = 16;
/// payload_len (u32): длина payload на диске (сжатая, если codec != 0).
pub const OFF_PAYLOAD_LEN: usize = 20;
/// type (u8): тип страницы, непрозрачен для блочного слоя.
pub const OFF_TYPE: usize = 24;
/// codec (u8): CODEC_*.
pub const OFF_CODEC: usize = 25;
/// flags (u16): резерв, 0.
pub const OFF_FLAGS: usize = 26;
/// reserved (u32).
pub const OFF_RESERVED: usize = 28;

pub const CODEC_NONE: u8 = 0;
pub const CODEC_ZSTD: u8 = 1;

pub fn codec_name(codec: u8) -> &'static str {
    match codec {
        CODEC_NONE => "none",
        CODEC_ZSTD => "zstd",
        _ => "unknown",
    }
}
