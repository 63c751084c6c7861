// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Exact hypergeometric coincidence test.  For two clonotypes seen in n1 and n2 of n samples,
// the chance of seeing them together in exactly k samples follows the hypergeometric
// distribution with support max(0, n1+n2-n) <= k <= min(n1, n2).  The test statistic is the
// mid-P cumulative mass at the observed overlap, computed by a multiplicative recurrence over
// the support, so no large binomial coefficients are ever formed.  Each ratio in the
// recurrence stays near one in the dominant regime, which keeps the computation stable in
// f64.

// Mid-P cumulative hypergeometric mass at k, in [0, 1].  The mass is accumulated
// unnormalized, starting from 1 at the lower support bound, and normalized by the total at
// the end.  The recorded partial mass subtracts half the term at k (mid-P correction); at
// k equal to the lower bound itself the full term is kept.

pub fn hyper_mid_p(k: usize, n1: usize, n2: usize, n: usize) -> f64 {
    let v = (n1 + n2).saturating_sub(n);
    let w = std::cmp::min(n1, n2);
    assert!(
        v <= k && k <= w,
        "hypergeometric support violated: n12 = {} outside [{}, {}] for n1 = {}, n2 = {}, \
         n = {}",
        k,
        v,
        w,
        n1,
        n2,
        n
    );
    let mut p = 1.0_f64;
    let mut t = p;
    let mut s = p;
    for i in v + 1..=w {
        p *= ((n1 - i + 1) * (n2 - i + 1)) as f64 / (i * (n + i - n1 - n2)) as f64;
        t += p;
        if i == k {
            s = t - 0.5 * p;
        }
    }
    s / t
}

// Symmetric two-sided p-value in [0, 0.5].

pub fn two_sided_p(k: usize, n1: usize, n2: usize, n: usize) -> f64 {
    let p = hyper_mid_p(k, n1, n2, n);
    p.min(1.0 - p)
}

// Observed/expected joint incidence on a log10 scale, clamped to [-20, 20].  Zero overlap
// lands exactly on the lower clamp.

pub fn log_odds(n12: usize, n1: usize, n2: usize, n: usize) -> f64 {
    ((n12 * n) as f64 / n1 as f64 / n2 as f64)
        .log10()
        .max(-20.0)
        .min(20.0)
}

// log10 with a small floor so that a zero p-value cannot produce negative infinity.

pub fn log10_floored(p: f64) -> f64 {
    (p + 1e-100).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{Discrete, DiscreteCDF, Hypergeometric};

    // n = 10, n1 = n2 = 5, overlap 2: the plain CDF at 2 is
    // (C(5,0)C(5,5) + C(5,1)C(5,4) + C(5,2)C(5,3)) / C(10,5) = 126/252 = 0.5 and the mass at
    // 2 is 100/252, so the mid-P statistic is 0.5 - 50/252.

    #[test]
    fn test_known_value() {
        let p = hyper_mid_p(2, 5, 5, 10);
        let expect = 0.5 - 50.0 / 252.0;
        assert!((p - expect).abs() < 1e-12, "got {}, expected {}", p, expect);
        assert!((two_sided_p(2, 5, 5, 10) - expect).abs() < 1e-12);
        let lo = log_odds(2, 5, 5, 10);
        assert!((lo - (20.0_f64 / 25.0).log10()).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_in_margins() {
        for n in [7usize, 10, 25] {
            for n1 in 1..=n {
                for n2 in 1..=n {
                    let v = (n1 + n2).saturating_sub(n);
                    let w = std::cmp::min(n1, n2);
                    for k in v..=w {
                        let a = hyper_mid_p(k, n1, n2, n);
                        let b = hyper_mid_p(k, n2, n1, n);
                        assert!((a - b).abs() < 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_two_sided_range() {
        for n1 in 1..=12usize {
            for n2 in 1..=12usize {
                let v = (n1 + n2).saturating_sub(12);
                let w = std::cmp::min(n1, n2);
                for k in v..=w {
                    let p = two_sided_p(k, n1, n2, 12);
                    assert!(
                        (0.0..=0.5).contains(&p),
                        "p = {} for k={} n1={} n2={}",
                        p,
                        k,
                        n1,
                        n2
                    );
                }
            }
        }
    }

    // Cross-check the recurrence against the reference distribution.  Above the lower support
    // bound the statistic is cdf(k) - pmf(k)/2; at the bound itself it is pmf(v).

    #[test]
    fn test_against_statrs() {
        for n in [10usize, 20, 37] {
            for n1 in 1..=n {
                for n2 in 1..=n {
                    let dist =
                        Hypergeometric::new(n as u64, n1 as u64, n2 as u64).unwrap();
                    let v = (n1 + n2).saturating_sub(n);
                    let w = std::cmp::min(n1, n2);
                    for k in v..=w {
                        let got = hyper_mid_p(k, n1, n2, n);
                        let expect = if k == v {
                            dist.pmf(k as u64)
                        } else {
                            dist.cdf(k as u64) - 0.5 * dist.pmf(k as u64)
                        };
                        assert!(
                            (got - expect).abs() < 1e-9,
                            "k={} n1={} n2={} n={}: got {}, expected {}",
                            k,
                            n1,
                            n2,
                            n,
                            got,
                            expect
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_log_odds_clamped() {
        assert_eq!(log_odds(0, 5, 5, 10), -20.0);
        for n12 in 1..=5 {
            let lo = log_odds(n12, 5, 5, 10);
            assert!((-20.0..=20.0).contains(&lo));
        }
    }

    #[test]
    fn test_log10_floored_finite() {
        assert!(log10_floored(0.0).is_finite());
        assert_eq!(log10_floored(0.0), -100.0);
    }

    #[test]
    #[should_panic]
    fn test_support_violation() {
        hyper_mid_p(6, 5, 5, 10);
    }
}
