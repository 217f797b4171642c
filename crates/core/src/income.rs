//! Income aggregation: turns a raw transaction feed into an [`IncomeProfile`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;

use crate::models::{IncomeProfile, MonthlyIncome, PaymentFrequency, Transaction};

/// Lower bound (inclusive) of payments per month for `weekly`.
pub const WEEKLY_MIN_RATE: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
/// Lower bound (inclusive) of payments per month for `bi-weekly`.
pub const BIWEEKLY_MIN_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 0);
/// Lower bound (inclusive) of payments per month for `monthly`.
pub const MONTHLY_MIN_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

/// Aggregate a transaction set, stamping `last_updated` with the current time.
pub fn aggregate(transactions: &[Transaction]) -> IncomeProfile {
    aggregate_at(transactions, Utc::now())
}

/// Aggregate a transaction set with an explicit computation time.
///
/// Total over its input: an empty set yields zero income and `irregular`.
pub fn aggregate_at(transactions: &[Transaction], now: DateTime<Utc>) -> IncomeProfile {
    let mut months: BTreeMap<(i32, u32), (Decimal, usize)> = BTreeMap::new();
    let mut payers: HashSet<&str> = HashSet::new();
    let mut total_income = Decimal::ZERO;

    for tx in transactions {
        total_income = add_amount(total_income, tx.amount);
        let key = (tx.timestamp.year(), tx.timestamp.month());
        let slot = months.entry(key).or_insert((Decimal::ZERO, 0));
        slot.0 = add_amount(slot.0, tx.amount);
        slot.1 += 1;
        payers.insert(tx.from.as_str());
    }

    let distinct_months = months.len();
    let average_monthly_income = if distinct_months > 0 {
        total_income / Decimal::from(distinct_months as u64)
    } else {
        Decimal::ZERO
    };

    // Vec::sort_by is stable, so equal timestamps keep input order.
    let mut sorted = transactions.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let monthly_breakdown = months
        .into_iter()
        .rev()
        .map(|((year, month), (total, payment_count))| MonthlyIncome {
            year,
            month,
            total,
            payment_count,
        })
        .collect();

    let profile = IncomeProfile {
        total_income,
        average_monthly_income,
        payment_count: transactions.len(),
        employer_count: payers.len() as u64,
        payment_frequency: classify(transactions.len(), distinct_months),
        distinct_months,
        monthly_breakdown,
        transactions: sorted,
        last_updated: now,
    };

    tracing::debug!(
        payments = profile.payment_count,
        months = profile.distinct_months,
        employers = profile.employer_count,
        frequency = %profile.payment_frequency,
        "Aggregated income profile"
    );

    profile
}

/// Sum that saturates at `Decimal::MAX` instead of panicking. Only reachable
/// with transactions built around [`Transaction::new`]'s amount bound.
fn add_amount(acc: Decimal, amount: Decimal) -> Decimal {
    acc.checked_add(amount).unwrap_or_else(|| {
        tracing::warn!(acc = %acc, amount = %amount, "Income total saturated");
        Decimal::MAX
    })
}

/// Average payments per distinct calendar month, `0` when there are no months.
pub fn payments_per_month(payment_count: usize, distinct_months: usize) -> Decimal {
    if distinct_months == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(payment_count as u64) / Decimal::from(distinct_months as u64)
}

/// Classify payment frequency. Bounds are inclusive below, exclusive above.
pub fn classify(payment_count: usize, distinct_months: usize) -> PaymentFrequency {
    let rate = payments_per_month(payment_count, distinct_months);
    if rate >= WEEKLY_MIN_RATE {
        PaymentFrequency::Weekly
    } else if rate >= BIWEEKLY_MIN_RATE {
        PaymentFrequency::BiWeekly
    } else if rate >= MONTHLY_MIN_RATE {
        PaymentFrequency::Monthly
    } else {
        PaymentFrequency::Irregular
    }
}
