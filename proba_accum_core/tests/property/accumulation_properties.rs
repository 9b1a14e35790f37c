//! Property tests for accumulation, buffer bounds and cooldown arithmetic.

use proptest::prelude::*;

use proba_accum_core::*;

fn vectors(classes: usize, max_len: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(0.01f64..1.0, classes), 1..max_len)
}

fn sample() -> impl Strategy<Value = (usize, Vec<Vec<f64>>)> {
    (2usize..6).prop_flat_map(|n| (Just(n), vectors(n, 12)))
}

proptest! {
    #[test]
    fn mean_is_order_independent((_, buf) in sample()) {
        let forward = normalize(&Accumulation::Mean.fold(buf.iter().map(Vec::as_slice))).unwrap();
        let backward = normalize(&Accumulation::Mean.fold(buf.iter().rev().map(Vec::as_slice))).unwrap();
        for (a, b) in forward.iter().zip(&backward) {
            prop_assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn mean_equals_scaled_sum((n, buf) in sample()) {
        let folded = normalize(&Accumulation::Mean.fold(buf.iter().map(Vec::as_slice))).unwrap();
        let sums: Vec<f64> = (0..n).map(|c| buf.iter().map(|v| v[c]).sum()).collect();
        let total: f64 = sums.iter().sum();
        for (got, s) in folded.iter().zip(&sums) {
            prop_assert!((got - s / total).abs() < 1e-9);
        }
    }

    #[test]
    fn bayesian_equals_scaled_product((n, buf) in sample()) {
        let folded = normalize(&Accumulation::Bayesian.fold(buf.iter().map(Vec::as_slice))).unwrap();
        let prods: Vec<f64> = (0..n).map(|c| buf.iter().map(|v| v[c]).product()).collect();
        let total: f64 = prods.iter().sum();
        for (got, p) in folded.iter().zip(&prods) {
            prop_assert!((got - p / total).abs() < 1e-9);
        }
    }

    #[test]
    fn bayesian_zero_poisons_class((n, mut buf) in sample(), pick in 0usize..64, class in 0usize..64) {
        let row = pick % buf.len();
        let class = class % n;
        buf[row][class] = 0.0;
        let folded = Accumulation::Bayesian.fold(buf.iter().map(Vec::as_slice));
        prop_assert_eq!(folded[class], 0.0);
    }

    #[test]
    fn buffer_never_exceeds_cap(cap in 1usize..10, pushes in 0usize..40) {
        let mut b = EvidenceBuffer::new(cap);
        for i in 0..pushes {
            b.push(vec![i as f64]);
            prop_assert!(b.len() <= cap);
        }
        let kept: Vec<f64> = b.iter().map(|v| v[0]).collect();
        let expected: Vec<f64> = (pushes.saturating_sub(cap)..pushes).map(|i| i as f64).collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn decisions_reset_state(
        (_, buf) in sample(),
        threshold in 0.3f64..3.0,
        min in 0usize..4,
        max in 4usize..8,
        scoring in prop_oneof![Just(Scoring::Ratio), Just(Scoring::Highest), Just(Scoring::Iteration)]
    ) {
        let mut acc = Accumulator::new(AccumulatorCfg {
            scoring,
            threshold,
            min_buffer_size: min,
            max_buffer_size: max,
            recovery: 0,
            ..AccumulatorCfg::default()
        }).unwrap();
        let mut shadow: Vec<Vec<f64>> = Vec::new();
        let mut iterations = 0u64;
        for (t, v) in buf.into_iter().enumerate() {
            shadow.push(v.clone());
            if shadow.len() > max {
                shadow.remove(0);
            }
            iterations += 1;
            let scores = normalize(&Accumulation::Bayesian.fold(shadow.iter().map(Vec::as_slice))).unwrap();
            let expected = scoring.score(&scores, iterations).unwrap();

            let step = acc.submit(v, t as i64).unwrap();
            match step.decision {
                Some(d) => {
                    prop_assert!(d.score >= threshold);
                    prop_assert!(shadow.len() >= min);
                    prop_assert_eq!(d.score, expected);
                    prop_assert_eq!(acc.buffer_len(), 0);
                    prop_assert_eq!(acc.iterations(), 0);
                    shadow.clear();
                    iterations = 0;
                }
                None => {
                    prop_assert!(shadow.len() < min || expected < threshold);
                    prop_assert_eq!(acc.buffer_len(), shadow.len());
                }
            }
        }
    }

    #[test]
    fn cooldown_window_edges(t0 in -1_000_000i64..1_000_000, w in 2i64..1_000_000) {
        let mut g = CooldownGuard::new(w, WindowMode::Fixed);
        g.activate(t0);
        prop_assert!(!g.check(t0 + w - 1));

        let mut g = CooldownGuard::new(w, WindowMode::Sliding);
        g.activate(t0);
        prop_assert!(g.check(t0 + w + 1));
    }
}
