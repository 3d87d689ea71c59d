use anyhow::Result;

use BlockSalvage::addr_decode;

use super::util::decode_hex;

pub fn exec(addr: String) -> Result<()> {
    let (offset, size, cksum) = addr_decode(&decode_hex(&addr)?)?;
    println!("offset={} size={} cksum={:#010x}", offset, size, cksum);
    Ok(())
}
