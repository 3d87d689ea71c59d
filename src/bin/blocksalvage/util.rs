use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Значение аргумента: "-" (stdin), "@file", "hex:..." или литерал.
pub fn decode_value_arg(arg: &str) -> Result<Vec<u8>> {
    if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    if let Some(p) = arg.strip_prefix('@') {
        return read_all(Path::new(p));
    }
    if let Some(hx) = arg.strip_prefix("hex:") {
        return decode_hex(hx);
    }
    Ok(arg.as_bytes().to_vec())
}

/// Hex-строка (регистр не важен, пробелы по краям игнорируются) -> байты.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(anyhow!("hex string must have even length, got {}", s.len()));
    }
    s.as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| anyhow!("invalid hex byte at pos {}", i * 2))
        })
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Первые `max` байт в hex, с пометкой об усечении.
pub fn hex_preview(bytes: &[u8], max: usize) -> String {
    if bytes.len() <= max {
        to_hex(bytes)
    } else {
        format!("{}.. (+{} B)", to_hex(&bytes[..max]), bytes.len() - max)
    }
}

pub fn read_all(p: &Path) -> Result<Vec<u8>> {
    fs::read(p).with_context(|| format!("read {}", p.display()))
}
