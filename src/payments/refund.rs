use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::models::{PaymentStatus, RefundStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundKind {
    /// Both participants flagged the date as not good.
    Full,
    /// Any other combination: half the deposit comes back.
    Partial,
}

impl RefundKind {
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            RefundKind::Full => PaymentStatus::Refunded,
            RefundKind::Partial => PaymentStatus::PartialRefund,
        }
    }

    pub fn participant_status(&self) -> RefundStatus {
        match self {
            RefundKind::Full => RefundStatus::FullRefund,
            RefundKind::Partial => RefundStatus::PartialRefund,
        }
    }
}

/// Amounts in minor currency units for one participant's refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefundQuote {
    pub kind: RefundKind,
    pub base_cents: i64,
    pub fee_cents: i64,
    pub refund_cents: i64,
}

impl RefundQuote {
    pub fn compute(amount_cents: i64, both_not_good: bool, fee_percent: Decimal) -> Self {
        let (kind, base_cents) = if both_not_good {
            (RefundKind::Full, amount_cents)
        } else {
            (
                RefundKind::Partial,
                round_cents(Decimal::from(amount_cents) * dec!(0.5)),
            )
        };
        let fee_cents = round_cents(Decimal::from(base_cents) * fee_percent / dec!(100));
        let refund_cents = (base_cents - fee_cents).max(0);

        Self {
            kind,
            base_cents,
            fee_cents,
            refund_cents,
        }
    }
}

/// Half-up to the nearest minor unit. Inputs are never negative.
fn round_cents(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_not_good_refunds_the_deposit_minus_fee() {
        let quote = RefundQuote::compute(1000, true, dec!(10));
        assert_eq!(quote.kind, RefundKind::Full);
        assert_eq!(quote.base_cents, 1000);
        assert_eq!(quote.fee_cents, 100);
        assert_eq!(quote.refund_cents, 900);
    }

    #[test]
    fn otherwise_half_the_deposit_comes_back() {
        let quote = RefundQuote::compute(1000, false, dec!(10));
        assert_eq!(quote.kind, RefundKind::Partial);
        assert_eq!(quote.base_cents, 500);
        assert_eq!(quote.fee_cents, 50);
        assert_eq!(quote.refund_cents, 450);
    }

    #[test]
    fn odd_amounts_round_half_up() {
        // 1001 / 2 = 500.5 -> 501; 501 * 10% = 50.1 -> 50
        let quote = RefundQuote::compute(1001, false, dec!(10));
        assert_eq!(quote.base_cents, 501);
        assert_eq!(quote.fee_cents, 50);
        assert_eq!(quote.refund_cents, 451);

        // 25 * 10% = 2.5 -> 3
        let quote = RefundQuote::compute(25, true, dec!(10));
        assert_eq!(quote.fee_cents, 3);
        assert_eq!(quote.refund_cents, 22);
    }

    #[test]
    fn fractional_fee_percent_is_supported() {
        let quote = RefundQuote::compute(1000, true, dec!(7.5));
        assert_eq!(quote.fee_cents, 75);
        assert_eq!(quote.refund_cents, 925);
    }

    #[test]
    fn refund_never_goes_negative() {
        let quote = RefundQuote::compute(1000, true, dec!(100));
        assert_eq!(quote.refund_cents, 0);

        for amount in [0_i64, 1, 2, 3, 99, 1000, 12345] {
            for both in [true, false] {
                for pct in [dec!(0), dec!(10), dec!(33.3), dec!(100)] {
                    let quote = RefundQuote::compute(amount, both, pct);
                    assert!(quote.refund_cents >= 0);
                    assert_eq!(quote.refund_cents, (quote.base_cents - quote.fee_cents).max(0));
                }
            }
        }
    }

    #[test]
    fn kinds_map_to_ledger_and_participant_statuses() {
        assert_eq!(RefundKind::Full.payment_status(), PaymentStatus::Refunded);
        assert_eq!(RefundKind::Full.participant_status(), RefundStatus::FullRefund);
        assert_eq!(RefundKind::Partial.payment_status(), PaymentStatus::PartialRefund);
        assert_eq!(
            RefundKind::Partial.participant_status(),
            RefundStatus::PartialRefund
        );
    }
}
