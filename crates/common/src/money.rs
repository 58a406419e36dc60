//! Integer money amounts and the platform commission.

use serde::{Deserialize, Serialize};

/// Money amount in the smallest currency unit.
///
/// Prices and balances are stored as `BIGINT`, so no fractional amounts
/// ever reach the database.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub const fn new(units: i64) -> Self {
        Self(units)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, or `None` if the product leaves `i64`.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Subtracts `rhs`, or `None` on overflow.
    pub fn checked_sub(&self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Money {
    fn from(units: i64) -> Self {
        Self(units)
    }
}

// Operators panic on overflow in debug builds. Amounts derived from catalog
// prices go through the checked methods.
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

const BASIS_POINTS: i64 = 10_000;

/// Fraction of each sale retained by the platform, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u16);

impl CommissionRate {
    /// The rate applied to every sale unless configured otherwise: 2%.
    pub const STANDARD: CommissionRate = CommissionRate(200);

    /// Creates a rate from basis points, clamped to 100%.
    pub fn from_basis_points(bps: u16) -> Self {
        Self(bps.min(BASIS_POINTS as u16))
    }

    pub fn basis_points(&self) -> u16 {
        self.0
    }

    /// Share of `gross` credited to the seller, rounded down.
    ///
    /// The rounding remainder stays with the platform.
    pub fn seller_share(&self, gross: Money) -> Money {
        let kept = i128::from(BASIS_POINTS - i64::from(self.0));
        let share = i128::from(gross.units()) * kept / i128::from(BASIS_POINTS);
        // |share| <= |gross|, so it always fits back into i64
        Money::new(share as i64)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_arithmetic() {
        let a = Money::new(1000);
        let b = Money::new(500);

        assert_eq!((a + b).units(), 1500);
        assert_eq!((a - b).units(), 500);
        assert_eq!(a.checked_mul(3), Some(Money::new(3000)));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let half = Money::new(i64::MAX / 2 + 1);
        assert_eq!(half.checked_mul(2), None);
        assert_eq!(half.checked_add(half), None);
        assert_eq!(Money::new(i64::MIN).checked_sub(Money::new(1)), None);
        assert_eq!(
            Money::new(i64::MAX / 2).checked_add(Money::new(i64::MAX / 2)),
            Some(Money::new(i64::MAX - 1))
        );
    }

    #[test]
    fn money_sign_checks() {
        assert!(Money::new(100).is_positive());
        assert!(Money::zero().is_zero());
        assert!((Money::new(10) - Money::new(20)).is_negative());
    }

    #[test]
    fn money_sums_over_iterators() {
        let total: Money = [Money::new(60), Money::new(50)].into_iter().sum();
        assert_eq!(total, Money::new(110));
    }

    #[test]
    fn money_assign_ops() {
        let mut money = Money::new(100);
        money += Money::new(50);
        money -= Money::new(30);
        assert_eq!(money.units(), 120);
    }

    #[test]
    fn standard_commission_keeps_two_percent() {
        let rate = CommissionRate::STANDARD;
        assert_eq!(rate.seller_share(Money::new(100)), Money::new(98));
        assert_eq!(rate.seller_share(Money::new(5000)), Money::new(4900));
        assert_eq!(rate.to_string(), "2.00%");
    }

    #[test]
    fn commission_rounds_seller_share_down() {
        // 2% of 75 is 1.5; the seller gets 73, not 73.5
        assert_eq!(
            CommissionRate::STANDARD.seller_share(Money::new(75)),
            Money::new(73)
        );
    }

    #[test]
    fn commission_on_huge_gross_does_not_overflow() {
        let gross = Money::new(1_000_000_000_000_000_000);
        assert_eq!(
            CommissionRate::STANDARD.seller_share(gross),
            Money::new(980_000_000_000_000_000)
        );
        assert_eq!(
            CommissionRate::STANDARD.seller_share(Money::new(i64::MAX)),
            Money::new((i128::from(i64::MAX) * 9_800 / 10_000) as i64)
        );
    }

    #[test]
    fn commission_is_clamped_to_whole_sale() {
        let rate = CommissionRate::from_basis_points(20_000);
        assert_eq!(rate.basis_points(), 10_000);
        assert_eq!(rate.seller_share(Money::new(500)), Money::zero());
    }
}
