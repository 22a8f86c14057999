//! Hot-Path Benchmarks — Per-Tick Decision Cost
//!
//! Benchmarks the domain work done on every market quote and every game
//! event, plus listener fan-out on the event bus.
//!
//! Run with: cargo bench --bench hot_path_bench

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use prediction_edge_bot::domain::{
    BayesianPredictor, EventType, GameEvent, MarketMakerStrategy, MarketPrices, MomentumStrategy,
    Team, TradeEvaluator, TradingStrategy,
};
use prediction_edge_bot::usecases::{BotEvent, EventBus};

/// Deterministic oscillating YES asks around 0.50.
fn price_path(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.50 + 0.04 * ((i as f64) * 0.37).sin())
        .collect()
}

/// Market maker tick on a warm 100-sample window.
fn bench_market_maker_tick(c: &mut Criterion) {
    let mut strategy = MarketMakerStrategy::default();
    for yes in price_path(100) {
        strategy.evaluate_trade(yes, 1.0 - yes);
    }
    let path = price_path(256);
    let mut i = 0usize;

    c.bench_function("market_maker_tick", |b| {
        b.iter(|| {
            let yes = path[i % path.len()];
            i += 1;
            black_box(strategy.evaluate_trade(black_box(yes), black_box(1.0 - yes)))
        });
    });
}

fn bench_momentum_tick(c: &mut Criterion) {
    let mut strategy = MomentumStrategy::default();
    let path = price_path(256);
    let mut i = 0usize;

    c.bench_function("momentum_tick", |b| {
        b.iter(|| {
            let yes = path[i % path.len()];
            i += 1;
            black_box(strategy.evaluate_trade(black_box(yes), black_box(1.0 - yes)))
        });
    });
}

/// One genuine Bayesian update. Each iteration gets a fresh predictor so
/// the event id is never a duplicate.
fn bench_predictor_update(c: &mut Criterion) {
    let event = GameEvent {
        event_type: EventType::Baron,
        team: Team::Blue,
        timestamp: Utc::now(),
        event_id: "1500_baron".to_string(),
        details: serde_json::Value::Null,
    };

    c.bench_function("predictor_update", |b| {
        b.iter_batched(
            BayesianPredictor::default,
            |mut predictor| black_box(predictor.update(black_box(&event))),
            BatchSize::SmallInput,
        );
    });
}

fn bench_evaluator(c: &mut Criterion) {
    let evaluator = TradeEvaluator::default();
    let prices = MarketPrices::now(0.40, 0.60);

    c.bench_function("evaluator_signal", |b| {
        b.iter(|| black_box(evaluator.evaluate(black_box(0.65), black_box(&prices), 10)));
    });
}

/// Synchronous delivery of one quote event to eight listeners.
fn bench_event_fan_out(c: &mut Criterion) {
    let bus = EventBus::new();
    let counter = Arc::new(AtomicU64::new(0));
    let _subs: Vec<_> = (0..8)
        .map(|_| {
            let counter = Arc::clone(&counter);
            bus.subscribe(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        })
        .collect();
    let event = BotEvent::Prices(MarketPrices::now(0.52, 0.49));

    c.bench_function("event_bus_emit_8_listeners", |b| {
        b.iter(|| bus.emit(black_box(&event)));
    });
}

criterion_group!(
    benches,
    bench_market_maker_tick,
    bench_momentum_tick,
    bench_predictor_update,
    bench_evaluator,
    bench_event_fan_out,
);
criterion_main!(benches);
