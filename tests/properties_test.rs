//! Property tests over generated holdings, deltas and price series.

mod common;

use common::*;
use holdflow::domain::alignment::{align_returns, forward_returns};
use holdflow::domain::delta::{infer_deltas, Action, DeltaConfig, Lookback};
use holdflow::domain::exposure::{aggregate_exposure, NetExposureChange};
use holdflow::domain::quarter::Quarter;
use holdflow::domain::quarter_close::resolve_quarter_closes;
use holdflow::domain::stats::{directional_accuracy, ols, pearson};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn quarter_at(index: u32) -> Quarter {
    Quarter::new(2015 + (index / 4) as i32, (index % 4 + 1) as u8).unwrap()
}

fn unlimited() -> DeltaConfig {
    DeltaConfig {
        lookback: Lookback::Unlimited,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn delta_count_is_distinct_periods_minus_one(
        quarters in prop::collection::btree_map(0u32..40, 0.0f64..1e6, 0..20)
    ) {
        let records: Vec<HoldingRecord> = quarters
            .iter()
            .map(|(&i, &shares)| {
                HoldingRecord::new("F", "T", quarter_at(i).end_date()).with_shares(shares)
            })
            .collect();

        let deltas = infer_deltas(&records, &unlimited());

        prop_assert_eq!(deltas.len(), quarters.len().saturating_sub(1));
        for d in &deltas {
            let expected = if d.delta > 0.0 {
                Action::Buy
            } else if d.delta < 0.0 {
                Action::Sell
            } else {
                Action::Hold
            };
            prop_assert_eq!(d.action, expected);
            prop_assert_eq!(d.delta, d.quantity - d.prev_quantity);
        }
    }

    #[test]
    fn capped_lookback_bounds_delta_count(
        quarters in prop::collection::btree_set(0u32..40, 0..30),
        depth in 0usize..15,
    ) {
        let records: Vec<HoldingRecord> = quarters
            .iter()
            .map(|&i| HoldingRecord::new("F", "T", quarter_at(i).end_date()).with_shares(i as f64))
            .collect();
        let config = DeltaConfig {
            lookback: Lookback::Capped(depth),
            ..Default::default()
        };

        let deltas = infer_deltas(&records, &config);

        prop_assert_eq!(deltas.len(), quarters.len().saturating_sub(1).min(depth));
        if let (Some(last), Some(&latest)) = (deltas.last(), quarters.iter().next_back()) {
            prop_assert_eq!(last.period, quarter_at(latest).end_date());
        }
    }

    #[test]
    fn net_exposure_is_sum_of_filer_deltas(
        holdings in prop::collection::vec((0usize..3, 0u32..12, 0.0f64..1e4), 0..40)
    ) {
        let filers = ["Filer A", "Filer B", "Filer C"];
        let records: Vec<HoldingRecord> = holdings
            .iter()
            .map(|&(f, q, shares)| {
                HoldingRecord::new(filers[f], "T", quarter_at(q).end_date()).with_shares(shares)
            })
            .collect();

        let deltas = infer_deltas(&records, &unlimited());
        let exposure = aggregate_exposure(&deltas);

        let mut expected: BTreeMap<chrono::NaiveDate, f64> = BTreeMap::new();
        for d in &deltas {
            *expected.entry(d.period).or_default() += d.delta;
        }

        prop_assert_eq!(exposure.len(), expected.len());
        for NetExposureChange { period, net_change, .. } in &exposure {
            let sum = expected[period];
            prop_assert!((net_change - sum).abs() <= 1e-9 * (1.0 + sum.abs()));
        }
    }

    #[test]
    fn quarter_close_is_latest_bar(
        bars in prop::collection::vec((0i64..730, 1.0f64..500.0), 1..60)
    ) {
        let start = date(2023, 1, 1);
        let price_bars: Vec<PriceBar> = bars
            .iter()
            .map(|&(offset, close)| PriceBar::new("T", start + chrono::Duration::days(offset), close))
            .collect();

        let closes = resolve_quarter_closes(&price_bars);

        let quarters: BTreeSet<Quarter> =
            price_bars.iter().map(|b| Quarter::containing(b.date)).collect();
        prop_assert_eq!(closes.len(), quarters.len());
        for qc in &closes {
            let quarter = Quarter::containing(qc.trade_date);
            prop_assert_eq!(qc.period, quarter.end_date());
            let latest = price_bars
                .iter()
                .filter(|b| Quarter::containing(b.date) == quarter)
                .map(|b| b.date)
                .max()
                .unwrap();
            prop_assert_eq!(qc.trade_date, latest);
        }
    }

    #[test]
    fn forward_returns_only_for_consecutive_quarters(
        quarters in prop::collection::btree_map(0u32..24, 1.0f64..1e3, 0..24)
    ) {
        let bars: Vec<PriceBar> = quarters
            .iter()
            .map(|(&i, &close)| PriceBar::new("T", quarter_at(i).end_date(), close))
            .collect();
        let closes = resolve_quarter_closes(&bars);

        let returns = forward_returns(&closes).unwrap();

        let expected = quarters.keys().filter(|&&i| quarters.contains_key(&(i + 1))).count();
        prop_assert_eq!(returns.len(), expected);
        for r in &returns {
            let quarter = Quarter::containing(r.period);
            let next_close = bars
                .iter()
                .find(|b| Quarter::containing(b.date) == quarter.next())
                .map(|b| b.close)
                .unwrap();
            prop_assert_eq!(r.close_next, next_close);
            prop_assert!((r.forward_return - (r.close_next / r.close - 1.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn aligned_rows_always_have_next_close(
        shares in prop::collection::vec(0.0f64..1e4, 2..12),
        present in prop::collection::vec(any::<bool>(), 13),
    ) {
        let records: Vec<HoldingRecord> = shares
            .iter()
            .enumerate()
            .map(|(i, &s)| HoldingRecord::new("F", "T", quarter_at(i as u32).end_date()).with_shares(s))
            .collect();
        let bars: Vec<PriceBar> = present
            .iter()
            .enumerate()
            .filter(|&(_, &keep)| keep)
            .map(|(i, _)| PriceBar::new("T", quarter_at(i as u32).end_date(), 10.0 + i as f64))
            .collect();

        let exposure = aggregate_exposure(&infer_deltas(&records, &unlimited()));
        let observations = align_returns(&exposure, &resolve_quarter_closes(&bars)).unwrap();

        for obs in &observations {
            let quarter = Quarter::containing(obs.period);
            prop_assert!(bars.iter().any(|b| Quarter::containing(b.date) == quarter));
            prop_assert!(bars.iter().any(|b| Quarter::containing(b.date) == quarter.next()));
            prop_assert!(exposure.iter().any(|e| e.period == obs.period));
        }
    }

    #[test]
    fn hit_rate_in_unit_interval(
        pairs in prop::collection::vec((-5i32..=5, -5i32..=5), 1..50)
    ) {
        let (x, y): (Vec<f64>, Vec<f64>) =
            pairs.iter().map(|&(a, b)| (a as f64, b as f64)).unzip();

        let d = directional_accuracy(&x, &y).unwrap();

        prop_assert!((0.0..=1.0).contains(&d.hit_rate));
        prop_assert!(d.hits <= d.n);
        prop_assert!((0.0..=1.0).contains(&d.p_value));
    }

    #[test]
    fn regression_beta_sign_matches_pearson_r(
        pairs in prop::collection::vec((-1e6f64..1e6, -1.0f64..1.0), 3..40)
    ) {
        let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        prop_assume!(x.iter().any(|&v| v != x[0]));
        prop_assume!(y.iter().any(|&v| v != y[0]));

        let r = pearson(&x, &y).unwrap().r;
        let beta = ols(&x, &y).unwrap().beta;
        prop_assume!(r != 0.0);

        prop_assert_eq!(beta.signum(), r.signum());
    }
}
