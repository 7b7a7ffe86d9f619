use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use epistock_core::{DomainError, DomainResult, Entity, ItemId};

/// One stock-tracked equipment unit type (e.g. "safety goggles").
///
/// `quantity` is the number of units currently available for checkout. It is
/// never written directly by callers: every mutation goes through
/// [`InventoryItem::reserved`] / [`InventoryItem::released`], applied by a
/// store under its own atomicity guarantee. The `quantity >= 0` invariant is
/// therefore held inside this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    name: String,
    category: String,
    quantity: i64,
    expires_on: NaiveDate,
}

impl InventoryItem {
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: i64,
        expires_on: NaiveDate,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            category: category.into(),
            quantity,
            expires_on,
        })
    }

    pub fn item_id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn expires_on(&self) -> NaiveDate {
        self.expires_on
    }

    /// Whether at least one unit is available for checkout.
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }

    /// Expiry is informational only; it never gates a checkout.
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expires_on < on
    }

    /// The conditional decrement: succeeds only while `quantity > 0`.
    ///
    /// Pure decision half of the reserve operation. A store applies it inside
    /// a single atomic section, making the whole thing equivalent to
    /// `UPDATE .. SET quantity = quantity - 1 WHERE quantity > 0`.
    pub fn reserved(&self) -> DomainResult<Self> {
        if self.quantity <= 0 {
            return Err(DomainError::out_of_stock(format!(
                "'{}' is unavailable (quantity: {})",
                self.name, self.quantity
            )));
        }
        let mut next = self.clone();
        next.quantity -= 1;
        Ok(next)
    }

    /// The unconditional increment. No upper bound: the ledger guarantees at
    /// most one increment per loan terminal event, so quantity only grows
    /// past its registered level through explicit item updates.
    pub fn released(&self) -> Self {
        let mut next = self.clone();
        next.quantity += 1;
        next
    }
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    fn test_item(quantity: i64) -> InventoryItem {
        InventoryItem::new(ItemId::new(), "Safety goggles", "eye protection", quantity, test_date())
            .unwrap()
    }

    #[test]
    fn rejects_negative_quantity_at_registration() {
        let err = InventoryItem::new(ItemId::new(), "Gloves", "hand protection", -1, test_date())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_blank_name() {
        let err =
            InventoryItem::new(ItemId::new(), "  ", "hand protection", 3, test_date()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reserve_decrements_while_available() {
        let item = test_item(2);
        let item = item.reserved().unwrap();
        assert_eq!(item.quantity(), 1);
        let item = item.reserved().unwrap();
        assert_eq!(item.quantity(), 0);
    }

    #[test]
    fn reserve_fails_at_zero_and_leaves_quantity_unchanged() {
        let item = test_item(0);
        let err = item.reserved().unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock(_)));
        assert_eq!(item.quantity(), 0);
    }

    #[test]
    fn out_of_stock_message_names_the_item() {
        let item = test_item(0);
        let err = item.reserved().unwrap_err();
        assert_eq!(
            err.to_string(),
            "out of stock: 'Safety goggles' is unavailable (quantity: 0)"
        );
    }

    #[test]
    fn release_increments_without_upper_bound() {
        let item = test_item(0);
        let item = item.released().released();
        assert_eq!(item.quantity(), 2);
    }

    #[test]
    fn expiry_is_a_strict_date_comparison() {
        let item = test_item(1);
        assert!(!item.is_expired(test_date()));
        assert!(item.is_expired(NaiveDate::from_ymd_opt(2030, 1, 2).unwrap()));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: starting from any registered quantity, no sequence of
        /// reserve/release operations ever drives quantity below zero.
        #[test]
        fn quantity_never_negative(
            start in 0i64..20,
            ops in prop::collection::vec(any::<bool>(), 0..64)
        ) {
            let mut item = test_item(start);
            for reserve in ops {
                if reserve {
                    // Failed reserves must leave the item untouched.
                    match item.reserved() {
                        Ok(next) => item = next,
                        Err(_) => prop_assert_eq!(item.quantity(), 0),
                    }
                } else {
                    item = item.released();
                }
                prop_assert!(item.quantity() >= 0);
            }
        }
    }
}
