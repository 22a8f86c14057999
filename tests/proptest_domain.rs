//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the belief model, the strategies and the
//! evaluator keep their invariants across random inputs.

use chrono::Utc;
use proptest::prelude::*;

use prediction_edge_bot::domain::{
    BayesianPredictor, EventLikelihoods, EventType, GameEvent, MarketMakerConfig,
    MarketMakerStrategy, MarketPrices, MomentumConfig, MomentumStrategy, Team, TradeEvaluator,
    TradeSide, TradingStrategy, bayes_update,
};

const EPS: f64 = 1e-9;

fn event_type() -> impl Strategy<Value = EventType> {
    prop_oneof![
        Just(EventType::Kill),
        Just(EventType::Dragon),
        Just(EventType::Baron),
        Just(EventType::Tower),
        Just(EventType::Inhibitor),
        Just(EventType::Roshan),
        Just(EventType::Unknown),
    ]
}

fn team() -> impl Strategy<Value = Team> {
    prop_oneof![
        Just(Team::Blue),
        Just(Team::Red),
        Just(Team::Radiant),
        Just(Team::Dire),
    ]
}

fn game_events() -> impl Strategy<Value = Vec<GameEvent>> {
    prop::collection::vec((event_type(), team()), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (event_type, team))| GameEvent {
                event_type,
                team,
                timestamp: Utc::now(),
                event_id: format!("evt-{i}"),
                details: serde_json::Value::Null,
            })
            .collect()
    })
}

fn side() -> impl Strategy<Value = TradeSide> {
    prop_oneof![Just(TradeSide::Buy), Just(TradeSide::Sell)]
}

// ── Belief Model Properties ─────────────────────────────────

proptest! {
    /// A single Bayes step never leaves the open unit interval.
    #[test]
    fn bayes_step_stays_in_unit_interval(
        prior in 0.01f64..0.99,
        given_a in 0.01f64..0.99,
        given_b in 0.01f64..0.99,
    ) {
        let posterior = bayes_update(prior, EventLikelihoods { given_a_wins: given_a, given_b_wins: given_b });
        prop_assert!(posterior > 0.0 && posterior < 1.0, "posterior {posterior}");
    }

    /// Evidence favouring side A never lowers the posterior.
    #[test]
    fn favourable_evidence_raises_posterior(
        prior in 0.01f64..0.99,
        given_b in 0.01f64..0.49,
        lift in 0.01f64..0.49,
    ) {
        let given_a = given_b + lift;
        let posterior = bayes_update(prior, EventLikelihoods { given_a_wins: given_a, given_b_wins: given_b });
        prop_assert!(posterior >= prior - EPS);
    }

    /// History grows by one point per known, unseen event and the
    /// posterior stays in (0, 1).
    #[test]
    fn history_tracks_accepted_events(events in game_events()) {
        let mut predictor = BayesianPredictor::default();
        let mut accepted = 0usize;
        for event in &events {
            if predictor.update(event) {
                accepted += 1;
            }
        }
        let known = events.iter().filter(|e| e.event_type != EventType::Unknown).count();
        prop_assert_eq!(accepted, known);
        prop_assert_eq!(predictor.history().len(), 1 + known);
        prop_assert_eq!(predictor.update_count(), known as u64);

        let p = predictor.posterior();
        prop_assert!(p > 0.0 && p < 1.0, "posterior {p}");
    }

    /// A long one-sided run of high-impact objectives never pins the
    /// posterior to 0 or 1.
    #[test]
    fn one_sided_run_stays_inside_unit_interval(
        event_type in prop_oneof![
            Just(EventType::Baron),
            Just(EventType::Inhibitor),
            Just(EventType::Roshan),
        ],
        team in team(),
        prior in 0.05f64..0.95,
    ) {
        let mut predictor = BayesianPredictor::new(prior);
        for i in 0..200 {
            predictor.update(&GameEvent {
                event_type,
                team,
                timestamp: Utc::now(),
                event_id: format!("run-{i}"),
                details: serde_json::Value::Null,
            });
            let p = predictor.posterior();
            prop_assert!(p > 0.0 && p < 1.0, "posterior {p} after {} events", i + 1);
        }
    }

    /// Replaying an already processed batch changes nothing.
    #[test]
    fn replayed_events_are_ignored(events in game_events()) {
        let mut predictor = BayesianPredictor::default();
        for event in &events {
            predictor.update(event);
        }
        let posterior = predictor.posterior();
        let history_len = predictor.history().len();

        for event in &events {
            prop_assert!(!predictor.update(event));
        }
        prop_assert_eq!(predictor.posterior(), posterior);
        prop_assert_eq!(predictor.history().len(), history_len);
    }
}

// ── Strategy Properties ─────────────────────────────────────

proptest! {
    /// Inventory equals the signed sum of fills and fill_count their number.
    #[test]
    fn fills_conserve_inventory(
        fills in prop::collection::vec((side(), 0.01f64..0.99, 1u32..50), 0..60),
    ) {
        let mut strategy = MarketMakerStrategy::default();
        let mut expected = 0i64;
        let mut cash = 0.0f64;
        for (side, price, size) in &fills {
            strategy.on_fill(*side, *price, *size);
            expected += side.signed(*size);
            cash -= side.signed(*size) as f64 * price;
        }
        let state = strategy.state();
        prop_assert_eq!(state.inventory, expected);
        prop_assert_eq!(state.fill_count, fills.len() as u64);
        prop_assert!((state.realized_pnl - cash).abs() < 1e-6);
    }

    /// Quotes stay inside the price band with bid strictly below ask, even
    /// under inventory far beyond the cap.
    #[test]
    fn quotes_are_ordered_and_bounded(
        ticks in prop::collection::vec((0.01f64..0.99, 0.01f64..0.99), 1..60),
        inventory in -300i64..300,
    ) {
        let mut strategy = MarketMakerStrategy::new(MarketMakerConfig {
            rebalance_threshold: 10.0,
            ..MarketMakerConfig::default()
        });
        if inventory != 0 {
            let side = if inventory > 0 { TradeSide::Buy } else { TradeSide::Sell };
            strategy.on_fill(side, 0.5, u32::try_from(inventory.unsigned_abs()).unwrap());
        }

        for (yes, no) in ticks {
            strategy.evaluate_trade(yes, no);
            let state = strategy.state();
            let bid = state.bid_price.unwrap();
            let ask = state.ask_price.unwrap();
            prop_assert!(bid >= 0.01 - EPS && ask <= 0.99 + EPS, "bid {bid} ask {ask}");
            prop_assert!(bid < ask, "bid {bid} ask {ask}");
        }
    }

    /// Above the rebalance threshold the market maker only trades toward
    /// flat and never past it.
    #[test]
    fn rebalance_reduces_inventory(
        held in 71i64..200,
        long in any::<bool>(),
        yes in 0.05f64..0.95,
    ) {
        let mut strategy = MarketMakerStrategy::default();
        let side = if long { TradeSide::Buy } else { TradeSide::Sell };
        strategy.on_fill(side, 0.5, held as u32);

        let signal = strategy.evaluate_trade(yes, 1.0 - yes).unwrap();
        let expected = if long { TradeSide::Sell } else { TradeSide::Buy };
        prop_assert_eq!(signal.side, expected);
        prop_assert!(i64::from(signal.size) <= held);
        prop_assert!((signal.price - yes).abs() < EPS);
        prop_assert_eq!(signal.edge, 0.0);
    }

    /// Momentum respects its inventory cap in both directions, whatever
    /// the order size.
    #[test]
    fn momentum_never_exceeds_cap(
        ticks in prop::collection::vec(0.02f64..0.98, 1..120),
        order_size in 1u32..80,
        cap in 1i64..150,
    ) {
        let mut strategy = MomentumStrategy::new(MomentumConfig {
            order_size,
            max_inventory: cap,
            ..MomentumConfig::default()
        });
        for yes in ticks {
            if let Some(signal) = strategy.evaluate_trade(yes, 1.0 - yes) {
                strategy.on_fill(signal.side, signal.price, signal.size);
            }
            let inventory = strategy.state().inventory;
            prop_assert!(inventory.abs() <= cap, "inventory {inventory} cap {cap}");
        }
    }
}

proptest! {
    /// Market-maker signals never take the book past its cap, including the
    /// 1.5x size on the inventory-reducing side.
    #[test]
    fn market_maker_never_exceeds_cap(
        ticks in prop::collection::vec((0.02f64..0.98, 0.02f64..0.98), 1..120),
        order_size in 1u32..80,
        cap in 1i64..150,
    ) {
        let mut strategy = MarketMakerStrategy::new(MarketMakerConfig {
            order_size,
            max_inventory: cap,
            rebalance_threshold: 10.0,
            ..MarketMakerConfig::default()
        });
        for (yes, no) in ticks {
            if let Some(signal) = strategy.evaluate_trade(yes, no) {
                prop_assert!(signal.size > 0);
                strategy.on_fill(signal.side, signal.price, signal.size);
            }
            let inventory = strategy.state().inventory;
            prop_assert!(inventory.abs() <= cap, "inventory {inventory} cap {cap}");
        }
    }
}

// ── Evaluator Properties ────────────────────────────────────

proptest! {
    /// Any signal clears the threshold and is priced at most 99¢.
    #[test]
    fn evaluator_signals_clear_threshold(
        model in 0.0f64..1.0,
        yes in 0.01f64..0.99,
        no in 0.01f64..0.99,
        threshold in 0.0f64..0.5,
    ) {
        let evaluator = TradeEvaluator::new(threshold);
        let prices = MarketPrices::now(yes, no);
        if let Some(signal) = evaluator.evaluate(model, &prices, 10) {
            prop_assert!(signal.edge > threshold);
            prop_assert!(signal.price <= 0.99 + EPS);
            prop_assert_eq!(signal.size, 10);
            match signal.side {
                TradeSide::Buy => prop_assert!((signal.edge - (model - yes)).abs() < EPS),
                TradeSide::Sell => prop_assert!((signal.edge - ((1.0 - model) - no)).abs() < EPS),
            }
        }
    }
}
