use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A token amount in smallest units of the settlement asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub u64);

impl TokenAmount {
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Renders the amount in display units with at least two fractional
    /// digits, e.g. `1_000000` at 6 decimals becomes `"1.00"`.
    pub fn ui_amount(self, decimals: u8) -> String {
        if decimals == 0 {
            return format!("{}.00", self.0);
        }
        let scale = 10u64.pow(u32::from(decimals));
        let whole = self.0 / scale;
        let mut frac = format!("{:0width$}", self.0 % scale, width = decimals as usize);
        while frac.len() > 2 && frac.ends_with('0') {
            frac.pop();
        }
        format!("{whole}.{frac}")
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(value)
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = s.parse::<u64>().map_err(serde::de::Error::custom)?;
        Ok(TokenAmount(value))
    }
}
