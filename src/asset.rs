use serde::Serialize;

use crate::binary::ToBytes;
use crate::types::ObjectId;
use crate::{Error, Result};

/// The core asset, `1.3.0`.
pub const CORE_ASSET: ObjectId = ObjectId::asset(0);

/// An amount of a specific asset.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetAmount {
    amount: u64,
    asset_id: ObjectId,
}

impl AssetAmount {
    pub fn new(amount: u64, asset_id: ObjectId) -> Self {
        AssetAmount { amount, asset_id }
    }

    pub fn zero(asset_id: ObjectId) -> Self {
        AssetAmount::new(0, asset_id)
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_asset_id(&self) -> ObjectId {
        self.asset_id
    }

    pub fn add(&self, other: &AssetAmount) -> Result<AssetAmount> {
        self.check_compatible(other, "add")?;
        let amount = self.amount.checked_add(other.amount).ok_or_else(|| {
            Error::IncompatibleOperation(format!("{} + {} overflows", self.amount, other.amount))
        })?;
        Ok(AssetAmount::new(amount, self.asset_id))
    }

    pub fn subtract(&self, other: &AssetAmount) -> Result<AssetAmount> {
        self.check_compatible(other, "subtract")?;
        let amount = self.amount.checked_sub(other.amount).ok_or_else(|| {
            Error::IncompatibleOperation(format!("{} - {} underflows", self.amount, other.amount))
        })?;
        Ok(AssetAmount::new(amount, self.asset_id))
    }

    /// Scale by `numerator / denominator`, rounding down.
    pub fn multiply(&self, numerator: u64, denominator: u64) -> Result<AssetAmount> {
        if denominator == 0 {
            return Err(Error::IncompatibleOperation(String::from(
                "cannot scale by a zero denominator",
            )));
        }
        let scaled = self.amount as u128 * numerator as u128 / denominator as u128;
        let amount = u64::try_from(scaled).map_err(|_| {
            Error::IncompatibleOperation(format!(
                "{} * {}/{} overflows",
                self.amount, numerator, denominator
            ))
        })?;
        Ok(AssetAmount::new(amount, self.asset_id))
    }

    fn check_compatible(&self, other: &AssetAmount, operation: &str) -> Result<()> {
        if self.asset_id != other.asset_id {
            return Err(Error::IncompatibleOperation(format!(
                "cannot {} {} and {}",
                operation, self.asset_id, other.asset_id
            )));
        }
        Ok(())
    }
}

impl ToBytes for AssetAmount {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.amount.write_bytes(bytes);
        self.asset_id.write_bytes(bytes);
    }
}

/// An exchange rate between two assets.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub base: AssetAmount,
    pub quote: AssetAmount,
}

impl ToBytes for Price {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.base.write_bytes(bytes);
        self.quote.write_bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_subtract_test() {
        let a = AssetAmount::new(150, CORE_ASSET);
        let b = AssetAmount::new(50, CORE_ASSET);
        assert_eq!(a.add(&b).unwrap().get_amount(), 200);
        assert_eq!(a.subtract(&b).unwrap().get_amount(), 100);
        assert!(matches!(
            b.subtract(&a),
            Err(Error::IncompatibleOperation(_))
        ));
        assert!(AssetAmount::new(u64::MAX, CORE_ASSET).add(&b).is_err());
    }

    #[test]
    fn mismatched_assets_test() {
        let a = AssetAmount::new(1, CORE_ASSET);
        let b = AssetAmount::new(1, ObjectId::asset(1));
        assert!(matches!(a.add(&b), Err(Error::IncompatibleOperation(_))));
        assert!(matches!(a.subtract(&b), Err(Error::IncompatibleOperation(_))));
    }

    #[test]
    fn multiply_test() {
        let a = AssetAmount::new(1000, CORE_ASSET);
        assert_eq!(a.multiply(3, 2).unwrap().get_amount(), 1500);
        assert_eq!(a.multiply(1, 3).unwrap().get_amount(), 333);
        assert!(a.multiply(1, 0).is_err());
        assert!(AssetAmount::new(u64::MAX, CORE_ASSET).multiply(2, 1).is_err());
    }

    #[test]
    fn asset_amount_bytes_and_json_test() {
        let a = AssetAmount::new(1, ObjectId::asset(0));
        assert_eq!(a.to_bytes(), vec![1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::json!({"amount": 1, "asset_id": "1.3.0"})
        );
    }
}
