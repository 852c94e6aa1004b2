use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns the first 8 hex characters, used in human-facing
            /// references like "Purchase #1a2b3c4d".
            pub fn short(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an order.
    OrderId
}

uuid_id! {
    /// Unique identifier for a product.
    ProductId
}

uuid_id! {
    /// Unique identifier for a purchasable variant (SKU-level unit).
    VariantId
}

uuid_id! {
    /// Unique identifier for a registered customer.
    CustomerId
}

/// Caller-supplied token identifying one logical checkout attempt.
///
/// Clients retrying the same attempt must reuse the same key; a new
/// attempt gets a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdempotencyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who performed a stock-affecting or point-affecting action.
///
/// Replaces the original nullable user id so accrual logic can match
/// exhaustively instead of null-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "customer_id", rename_all = "snake_case")]
pub enum Actor {
    /// An unauthenticated shopper.
    Guest,
    /// A registered customer.
    Registered(CustomerId),
    /// Background or administrative process.
    System,
}

impl Actor {
    /// Returns the customer ID for registered actors.
    pub fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Actor::Registered(id) => Some(*id),
            Actor::Guest | Actor::System => None,
        }
    }

    /// Returns true if this is a registered customer.
    pub fn is_registered(&self) -> bool {
        matches!(self, Actor::Registered(_))
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Guest => write!(f, "guest"),
            Actor::Registered(id) => write!(f, "customer:{id}"),
            Actor::System => write!(f, "system"),
        }
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Returns `percent`% of this amount, rounding half-up on cents.
    ///
    /// Used for the conservation pledge: $40.00 at 10% is exactly $4.00,
    /// $0.05 at 10% rounds to $0.01.
    pub fn percent_of(&self, percent: u32) -> Money {
        let scaled = self.cents * percent as i64;
        Money {
            cents: (scaled + 50) / 100,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_new_creates_unique_ids() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn variant_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = VariantId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = OrderId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn idempotency_key_string_conversion() {
        let key = IdempotencyKey::new("checkout-123");
        assert_eq!(key.as_str(), "checkout-123");

        let key2: IdempotencyKey = "checkout-456".into();
        assert_eq!(key2.as_str(), "checkout-456");
    }

    #[test]
    fn actor_customer_id() {
        let customer = CustomerId::new();
        assert_eq!(Actor::Registered(customer).customer_id(), Some(customer));
        assert_eq!(Actor::Guest.customer_id(), None);
        assert_eq!(Actor::System.customer_id(), None);
        assert!(Actor::Registered(customer).is_registered());
        assert!(!Actor::Guest.is_registered());
    }

    #[test]
    fn actor_serialization_roundtrip() {
        let actor = Actor::Registered(CustomerId::new());
        let json = serde_json::to_string(&actor).unwrap();
        let deserialized: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(actor, deserialized);
    }

    #[test]
    fn money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.dollars(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(100).to_string(), "$1.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn money_percent_of_exact() {
        // $40.00 at 10% = $4.00
        assert_eq!(Money::from_cents(4000).percent_of(10).cents(), 400);
    }

    #[test]
    fn money_percent_of_rounds_half_up() {
        // $0.05 at 10% = 0.5 cents, rounds up to 1
        assert_eq!(Money::from_cents(5).percent_of(10).cents(), 1);
        // $0.04 at 10% = 0.4 cents, rounds down to 0
        assert_eq!(Money::from_cents(4).percent_of(10).cents(), 0);
        // $33.33 at 15% = 499.95 cents -> $5.00
        assert_eq!(Money::from_cents(3333).percent_of(15).cents(), 500);
    }

    #[test]
    fn money_sum() {
        let total: Money = [100, 250, 4650].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 5000);
    }
}
