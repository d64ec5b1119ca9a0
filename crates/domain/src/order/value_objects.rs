//! Value objects for the order domain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::OrderError;

/// Identifier of a store user, owned by the user service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a catalog product, owned by the product service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Error returned when a decimal amount string cannot be read as [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid amount '{0}': expected a decimal with at most two fraction digits")]
pub struct MoneyParseError(String);

/// Currency-exact amount held in minor units (cents, paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Saturates at the `i64` bounds; use [`Money::checked_multiply`] where
    /// overflow must be rejected.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyParseError;

    /// Parses `"120"`, `"120.5"` or `"120.50"` into minor units.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MoneyParseError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A line of a placed order.
///
/// The unit price is the one captured from the cart at placement time and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Price × quantity.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Sums item quantities per product, in first-seen order. Lines for the same
/// product at different prices share one stock reservation.
pub fn quantities_by_product(items: &[OrderItem]) -> Result<Vec<(ProductId, u32)>, OrderError> {
    let mut totals: Vec<(ProductId, u32)> = Vec::with_capacity(items.len());
    for item in items {
        match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or(OrderError::QuantityOverflow {
                        product_id: item.product_id,
                    })?;
            }
            None => totals.push((item.product_id, item.quantity)),
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_amounts() {
        assert_eq!("50.00".parse::<Money>().unwrap(), Money::from_cents(5000));
        assert_eq!("120".parse::<Money>().unwrap(), Money::from_cents(12000));
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from_cents(50));
        assert_eq!("-3.07".parse::<Money>().unwrap(), Money::from_cents(-307));
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", "abc", "1.234", ".50", "1,00", "1.-5"] {
            assert!(bad.parse::<Money>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Money::from_cents(12000).to_string(), "120.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
    }

    #[test]
    fn item_total_is_price_times_quantity() {
        let item = OrderItem::new(10, 2, Money::from_cents(5000));
        assert_eq!(item.total_price(), Money::from_cents(10000));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Money::from_cents(i64::MAX / 100);
        assert_eq!(huge.checked_multiply(200), None);
        assert_eq!(
            Money::from_cents(5000).checked_multiply(3),
            Some(Money::from_cents(15000))
        );
        assert_eq!(huge.checked_add(Money::from_cents(i64::MAX)), None);
        assert_eq!(huge.multiply(200), Money::from_cents(i64::MAX));
    }

    #[test]
    fn quantities_fold_per_product() {
        let items = [
            OrderItem::new(10, 1, Money::from_cents(5000)),
            OrderItem::new(11, 4, Money::from_cents(2000)),
            OrderItem::new(10, 2, Money::from_cents(5500)),
        ];
        assert_eq!(
            quantities_by_product(&items).unwrap(),
            vec![(ProductId::new(10), 3), (ProductId::new(11), 4)]
        );

        let overflowing = [
            OrderItem::new(10, u32::MAX, Money::from_cents(1)),
            OrderItem::new(10, 1, Money::from_cents(2)),
        ];
        assert!(matches!(
            quantities_by_product(&overflowing),
            Err(OrderError::QuantityOverflow { product_id }) if product_id == ProductId::new(10)
        ));
    }

    #[test]
    fn money_sums() {
        let total: Money = [Money::from_cents(10000), Money::from_cents(2000)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(12000));
    }
}
