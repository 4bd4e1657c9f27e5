//! On-ledger record schemas. Both records start with a fixed 8-byte type
//! discriminator; layouts are normative wire formats, encoded by hand.

mod config;
mod receipt;

pub use config::*;
pub use receipt::*;

pub(crate) fn read_pubkey(
    data: &[u8],
    offset: usize,
) -> crate::errors::Result<solana_pubkey::Pubkey> {
    let bytes: [u8; 32] = data
        .get(offset..offset + 32)
        .and_then(|s| s.try_into().ok())
        .ok_or(crate::errors::Error::CorruptRecord("truncated pubkey"))?;
    Ok(solana_pubkey::Pubkey::new_from_array(bytes))
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> crate::errors::Result<u16> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or(crate::errors::Error::CorruptRecord("truncated u16"))?;
    Ok(u16::from_le_bytes(bytes))
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> crate::errors::Result<u64> {
    let bytes: [u8; 8] = data
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or(crate::errors::Error::CorruptRecord("truncated u64"))?;
    Ok(u64::from_le_bytes(bytes))
}

pub(crate) fn read_i64(data: &[u8], offset: usize) -> crate::errors::Result<i64> {
    Ok(read_u64(data, offset)? as i64)
}

pub(crate) fn read_u8(data: &[u8], offset: usize) -> crate::errors::Result<u8> {
    data.get(offset)
        .copied()
        .ok_or(crate::errors::Error::CorruptRecord("truncated u8"))
}
