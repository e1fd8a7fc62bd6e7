//! Proportional pool allocation with deterministic remainder handling.
//!
//! Splitting a pooled fund across members by share ratio cannot simply
//! multiply and round: cent-level drift across hundreds of members would
//! silently create or destroy money. Each pool is split with the
//! largest-remainder method at cent precision: every member's raw slice is
//! truncated to cents, then the leftover cents are handed out one at a time
//! to the largest fractional remainders, ties broken by member id ascending.
//! The allocated amounts always sum exactly to the pool.

use bigdecimal::BigDecimal;
use uuid::Uuid;

/// A member's stake in a cycle, in share units.
#[derive(Debug, Clone)]
pub struct Stake {
    pub member_id: Uuid,
    pub shares: i64,
}

/// One member's slice of an allocated pool.
#[derive(Debug, Clone)]
pub struct AllocatedShare {
    pub member_id: Uuid,
    pub percentage: BigDecimal,
    pub amount: BigDecimal,
}

fn one_cent() -> BigDecimal {
    "0.01".parse().expect("literal cent")
}

/// Split `pool` across `stakes` proportionally to share counts.
///
/// Stakes are processed in member-id order so the remainder policy is
/// deterministic regardless of input order. A zero total stake yields all-zero
/// slices (the division guard); zero-share members always receive zero.
pub fn allocate_proportional(pool: &BigDecimal, stakes: &[Stake]) -> Vec<AllocatedShare> {
    let zero = BigDecimal::from(0);

    let mut ordered: Vec<Stake> = stakes.to_vec();
    ordered.sort_by(|a, b| a.member_id.cmp(&b.member_id));

    let total_shares: i64 = ordered.iter().map(|s| s.shares).sum();
    if total_shares == 0 {
        return ordered
            .into_iter()
            .map(|s| AllocatedShare {
                member_id: s.member_id,
                percentage: zero.clone(),
                amount: zero.clone(),
            })
            .collect();
    }

    let total = BigDecimal::from(total_shares);

    // An empty pool still carries meaningful percentages (the member's claim
    // on the cycle), just nothing to hand out.
    if pool <= &zero {
        return ordered
            .into_iter()
            .map(|s| AllocatedShare {
                percentage: BigDecimal::from(s.shares) / &total,
                member_id: s.member_id,
                amount: zero.clone(),
            })
            .collect();
    }
    let mut slices: Vec<AllocatedShare> = Vec::with_capacity(ordered.len());
    let mut remainders: Vec<(usize, BigDecimal)> = Vec::with_capacity(ordered.len());
    let mut allocated = zero.clone();

    for (idx, stake) in ordered.iter().enumerate() {
        let percentage = BigDecimal::from(stake.shares) / &total;
        let raw = pool * &percentage;
        let floored = raw.with_scale(2);
        let remainder = &raw - &floored;

        allocated += &floored;
        remainders.push((idx, remainder));
        slices.push(AllocatedShare {
            member_id: stake.member_id,
            percentage,
            amount: floored,
        });
    }

    // Largest remainder first; member-id order breaks ties (slices are
    // already sorted by member id, so index order is id order).
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let cent = one_cent();
    let mut leftover = pool - allocated;
    let mut cursor = remainders.iter().cycle();
    while leftover >= cent {
        let (idx, _) = cursor.next().expect("non-empty remainder list");
        slices[*idx].amount += &cent;
        leftover -= &cent;
    }

    slices
}

/// Sum of slice percentages; the engine checks this against 1.0 within
/// epsilon as a consistency guard.
pub fn percentage_sum(slices: &[AllocatedShare]) -> BigDecimal {
    slices
        .iter()
        .fold(BigDecimal::from(0), |acc, s| acc + &s.percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn stakes(shares: &[i64]) -> Vec<Stake> {
        // Fixed ids keep remainder tie-breaks deterministic in assertions.
        shares
            .iter()
            .enumerate()
            .map(|(i, &n)| Stake {
                member_id: Uuid::from_u128(i as u128 + 1),
                shares: n,
            })
            .collect()
    }

    #[test]
    fn splits_profit_pool_exactly() {
        // 10/5/3 shares over a 900 pool: 500 / 250 / 150.
        let slices = allocate_proportional(&BigDecimal::from(900), &stakes(&[10, 5, 3]));

        assert_eq!(slices[0].amount, dec("500.00"));
        assert_eq!(slices[1].amount, dec("250.00"));
        assert_eq!(slices[2].amount, dec("150.00"));

        let total: BigDecimal = slices.iter().fold(BigDecimal::from(0), |a, s| a + &s.amount);
        assert_eq!(total, dec("900.00"));
    }

    #[test]
    fn leftover_cent_goes_to_lowest_member_id_on_tie() {
        // 100 over three equal stakes floors to 33.33 each; the stray cent
        // lands on the first member by id.
        let slices = allocate_proportional(&BigDecimal::from(100), &stakes(&[1, 1, 1]));

        assert_eq!(slices[0].amount, dec("33.34"));
        assert_eq!(slices[1].amount, dec("33.33"));
        assert_eq!(slices[2].amount, dec("33.33"));
    }

    #[test]
    fn larger_remainder_wins_the_cent() {
        // 3 shares vs 4 shares over 1.00: raw slices 0.4285.. and 0.5714..;
        // both floor to cents leaving 0.01 for the larger remainder (3/7).
        let slices = allocate_proportional(&dec("1.00"), &stakes(&[3, 4]));

        assert_eq!(slices[0].amount, dec("0.43"));
        assert_eq!(slices[1].amount, dec("0.57"));
    }

    #[test]
    fn empty_pool_keeps_percentages() {
        let slices = allocate_proportional(&BigDecimal::from(0), &stakes(&[3, 1]));
        assert_eq!(slices[0].amount, BigDecimal::from(0));
        assert_eq!(slices[0].percentage, dec("0.75"));
        assert_eq!(slices[1].percentage, dec("0.25"));
    }

    #[test]
    fn zero_total_stake_yields_zero_slices() {
        let slices = allocate_proportional(&BigDecimal::from(500), &stakes(&[0, 0]));
        for slice in &slices {
            assert_eq!(slice.amount, BigDecimal::from(0));
            assert_eq!(slice.percentage, BigDecimal::from(0));
        }
    }

    #[test]
    fn zero_share_member_gets_nothing() {
        let slices = allocate_proportional(&BigDecimal::from(100), &stakes(&[10, 0]));
        assert_eq!(slices[0].amount, dec("100.00"));
        assert_eq!(slices[1].amount, dec("0.00"));
        assert_eq!(slices[1].percentage, BigDecimal::from(0));
    }

    #[test]
    fn percentages_sum_to_one() {
        let slices = allocate_proportional(&BigDecimal::from(777), &stakes(&[7, 11, 13, 2]));
        let sum = percentage_sum(&slices);
        let diff = (sum - BigDecimal::from(1)).abs();
        assert!(diff < dec("0.000001"), "diff {diff}");
    }

    #[test]
    fn allocation_conserves_the_pool() {
        let pool = dec("1234.56");
        let slices = allocate_proportional(&pool, &stakes(&[1, 2, 3, 4, 5, 6, 7]));
        let total: BigDecimal = slices.iter().fold(BigDecimal::from(0), |a, s| a + &s.amount);
        assert_eq!(total, pool.with_scale(2));
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = stakes(&[10, 5, 3]);
        shuffled.reverse();
        let slices = allocate_proportional(&BigDecimal::from(900), &shuffled);

        // Output is in member-id order regardless of input order.
        assert_eq!(slices[0].member_id, Uuid::from_u128(1));
        assert_eq!(slices[0].amount, dec("500.00"));
        assert_eq!(slices[2].amount, dec("150.00"));
    }
}
