use std::num::NonZeroUsize;

/// Splits `total` into `parts` shares that sum to exactly `total`.
///
/// Share `i` is `floor((total + i) / parts)`, so every share is either
/// `floor(total / parts)` or `ceil(total / parts)` and the larger shares come last.
/// Computed as quotient plus carry so `total + i` can never overflow.
#[must_use]
pub fn split(total: usize, parts: NonZeroUsize) -> Vec<usize> {
    let n = parts.get();
    let quotient = total / n;
    let remainder = total % n;
    (0..n)
        .map(|i| quotient + usize::from(remainder + i >= n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn matches_floor_formula() {
        for total in 0..64 {
            for n in 1..12 {
                let expected: Vec<usize> = (0..n).map(|i| (total + i) / n).collect();
                assert_eq!(expected, split(total, nz(n)), "total={total} n={n}");
            }
        }
    }

    #[test]
    fn sum_is_exact_and_spread_is_at_most_one() {
        for total in [0, 1, 2, 7, 10, 99, 1000, 10_007] {
            for n in [1, 2, 3, 4, 8, 16, 33] {
                let shares = split(total, nz(n));
                assert_eq!(n, shares.len());
                assert_eq!(total, shares.iter().sum::<usize>());
                let max = shares.iter().max().unwrap();
                let min = shares.iter().min().unwrap();
                assert!(max - min <= 1, "total={total} n={n} shares={shares:?}");
            }
        }
    }

    #[test]
    fn ten_over_three() {
        assert_eq!(vec![3, 3, 4], split(10, nz(3)));
    }

    #[test]
    fn zero_total_gives_all_zero_shares() {
        assert_eq!(vec![0; 5], split(0, nz(5)));
    }

    #[test]
    fn fewer_connections_than_parts() {
        assert_eq!(vec![0, 0, 1, 1], split(2, nz(4)));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(split(12_345, nz(7)), split(12_345, nz(7)));
    }

    #[test]
    fn huge_totals_do_not_overflow() {
        assert_eq!(vec![usize::MAX / 3; 3], split(usize::MAX, nz(3)));
        assert_eq!(
            vec![usize::MAX / 2, usize::MAX / 2 + 1],
            split(usize::MAX, nz(2))
        );
    }
}
