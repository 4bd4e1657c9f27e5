use solana_pubkey::Pubkey;

use crate::{
    errors::{Error, Result},
    state::{read_i64, read_pubkey, read_u8, read_u64},
};

pub const RECEIPT_DISCRIMINATOR: [u8; 8] = *b"fac:rcpt";

/// Longest accepted payment identifier, in bytes.
pub const MAX_PAYMENT_ID_LEN: usize = 64;

/// Immutable proof that one payment id was settled exactly once.
///
/// The record's existence at its derived address is the idempotency
/// guard; there is no update or delete operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: String,
    /// Gross amount in smallest token units.
    pub amount: u64,
    pub seller: Pubkey,
    pub buyer: Pubkey,
    pub tithe_amount: u64,
    pub fee_amount: u64,
    /// Unix seconds at settlement time.
    pub timestamp: i64,
    /// Always true once the record exists.
    pub settled: bool,
}

impl PaymentReceipt {
    pub fn to_bytes(&self) -> Vec<u8> {
        let id = self.payment_id.as_bytes();
        let mut data = Vec::with_capacity(8 + 4 + id.len() + 32 + 32 + 8 * 4 + 1);
        data.extend_from_slice(&RECEIPT_DISCRIMINATOR);
        data.extend_from_slice(&(id.len() as u32).to_le_bytes());
        data.extend_from_slice(id);
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.extend_from_slice(self.seller.as_ref());
        data.extend_from_slice(self.buyer.as_ref());
        data.extend_from_slice(&self.tithe_amount.to_le_bytes());
        data.extend_from_slice(&self.fee_amount.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.push(self.settled as u8);
        data
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 12 || data[..8] != RECEIPT_DISCRIMINATOR {
            return Err(Error::CorruptRecord("receipt discriminator mismatch"));
        }
        let id_len = {
            let bytes: [u8; 4] = data[8..12]
                .try_into()
                .map_err(|_| Error::CorruptRecord("truncated id length"))?;
            u32::from_le_bytes(bytes) as usize
        };
        if id_len > MAX_PAYMENT_ID_LEN {
            return Err(Error::CorruptRecord("payment id too long"));
        }
        let id_bytes = data
            .get(12..12 + id_len)
            .ok_or(Error::CorruptRecord("truncated payment id"))?;
        let payment_id = std::str::from_utf8(id_bytes)
            .map_err(|_| Error::CorruptRecord("payment id is not utf-8"))?
            .to_string();

        let mut offset = 12 + id_len;
        let amount = read_u64(data, offset)?;
        offset += 8;
        let seller = read_pubkey(data, offset)?;
        offset += 32;
        let buyer = read_pubkey(data, offset)?;
        offset += 32;
        let tithe_amount = read_u64(data, offset)?;
        offset += 8;
        let fee_amount = read_u64(data, offset)?;
        offset += 8;
        let timestamp = read_i64(data, offset)?;
        offset += 8;
        let settled = read_u8(data, offset)? != 0;
        if data.len() != offset + 1 {
            return Err(Error::CorruptRecord("receipt length mismatch"));
        }

        Ok(PaymentReceipt {
            payment_id,
            amount,
            seller,
            buyer,
            tithe_amount,
            fee_amount,
            timestamp,
            settled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PaymentReceipt {
        PaymentReceipt {
            payment_id: "test-payment-001".to_string(),
            amount: 100_000000,
            seller: Pubkey::new_from_array([3; 32]),
            buyer: Pubkey::new_from_array([4; 32]),
            tithe_amount: 10_000000,
            fee_amount: 1_000000,
            timestamp: 1_756_400_000,
            settled: true,
        }
    }

    #[test]
    fn test_round_trip() {
        let receipt = sample();
        assert_eq!(PaymentReceipt::from_bytes(&receipt.to_bytes()).unwrap(), receipt);
    }

    #[test]
    fn test_empty_payment_id_round_trips() {
        let mut receipt = sample();
        receipt.payment_id = String::new();
        assert_eq!(PaymentReceipt::from_bytes(&receipt.to_bytes()).unwrap(), receipt);
    }

    #[test]
    fn test_rejects_wrong_discriminator() {
        let mut bytes = sample().to_bytes();
        bytes[7] ^= 0x01;
        assert!(PaymentReceipt::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_rejects_truncated_record() {
        let bytes = sample().to_bytes();
        assert!(PaymentReceipt::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = sample().to_bytes();
        bytes.push(0);
        assert!(matches!(
            PaymentReceipt::from_bytes(&bytes),
            Err(Error::CorruptRecord(_))
        ));
    }
}
