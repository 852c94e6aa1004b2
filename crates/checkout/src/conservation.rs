//! Conservation pledge policy.
//!
//! Every order pledges a percentage of its subtotal toward habitat
//! conservation in a named region. The pledge is computed here and
//! persisted inside the checkout unit of work; marking it `Donated`
//! happens in an external disbursement process.

use common::Money;
use order_store::PlannedDonation;

/// Default share of the subtotal pledged per order.
pub const DEFAULT_DONATION_PERCENT: u32 = 10;

/// Region the pledge is earmarked for.
pub const DEFAULT_REGION: &str = "South Padre Island";

/// Computes the pledge for a subtotal, rounding half-up on cents.
pub fn pledge_amount(subtotal: Money, percent: u32) -> Money {
    subtotal.percent_of(percent)
}

/// Builds the donation row for a checkout plan.
pub fn pledge_for(subtotal: Money, percent: u32, region: &str) -> PlannedDonation {
    PlannedDonation {
        amount: pledge_amount(subtotal, percent),
        percent,
        region: region.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_percent_of_forty_dollars() {
        assert_eq!(
            pledge_amount(Money::from_cents(4000), DEFAULT_DONATION_PERCENT).cents(),
            400
        );
    }

    #[test]
    fn sub_cent_amounts_round_half_up() {
        assert_eq!(pledge_amount(Money::from_cents(5), 10).cents(), 1);
        assert_eq!(pledge_amount(Money::from_cents(4), 10).cents(), 0);
    }

    #[test]
    fn pledge_row_carries_region_and_percent() {
        let donation = pledge_for(Money::from_cents(2500), 20, DEFAULT_REGION);
        assert_eq!(donation.amount.cents(), 500);
        assert_eq!(donation.percent, 20);
        assert_eq!(donation.region, "South Padre Island");
    }

    #[test]
    fn zero_subtotal_pledges_nothing() {
        assert!(pledge_amount(Money::zero(), 10).is_zero());
    }
}
