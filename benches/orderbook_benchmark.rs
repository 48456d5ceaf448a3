//! Benchmarks for the book and view hot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use order_book_visualizer::orderbook::{OrderBook, Side};
use order_book_visualizer::parser::{DepthDiff, FeedMessage, PriceLevelUpdate, StreamKind};
use order_book_visualizer::publisher::Snapshot;
use order_book_visualizer::view::{DepthLadder, OrderBookView};
use order_book_visualizer::MockFeed;

fn level(price: f64, quantity: f64) -> PriceLevelUpdate {
    PriceLevelUpdate {
        price: format!("{:.2}", price),
        quantity,
    }
}

fn populated_book(levels: usize) -> OrderBook {
    let diff = DepthDiff {
        bids: (0..levels).map(|i| level(50000.0 - i as f64, 1.5)).collect(),
        asks: (0..levels).map(|i| level(50001.0 + i as f64, 1.5)).collect(),
        ..DepthDiff::default()
    };
    let mut book = OrderBook::new();
    book.apply_diff(&diff);
    book
}

fn depth_message() -> String {
    serde_json::json!({
        "e": "depthUpdate",
        "E": 1672531200000u64,
        "s": "BTCUSDT",
        "U": 1001,
        "u": 1002,
        "b": [["49999.00", "2.0"], ["49998.00", "0"]],
        "a": [["50001.00", "2.5"], ["50002.00", "0.00000000"]]
    })
    .to_string()
}

fn benchmark_apply_diff(c: &mut Criterion) {
    let mut book = populated_book(1000);
    let diff = DepthDiff {
        bids: vec![level(49999.0, 2.0), level(49998.0, 0.0)],
        asks: vec![level(50001.0, 2.5), level(50002.0, 0.0)],
        ..DepthDiff::default()
    };

    c.bench_function("apply_diff", |b| {
        b.iter(|| {
            black_box(book.apply_diff(black_box(&diff)));
        })
    });
}

fn benchmark_parse(c: &mut Criterion) {
    let raw = depth_message();

    c.bench_function("parse_depth_message", |b| {
        b.iter(|| {
            black_box(FeedMessage::parse(StreamKind::Depth, black_box(&raw)).ok());
        })
    });
}

fn benchmark_view(c: &mut Criterion) {
    let book = populated_book(1000);
    let bids = book.bids();

    c.bench_function("ladder_1000_levels_depth_15", |b| {
        b.iter(|| {
            black_box(DepthLadder::build(black_box(&bids), Side::Bid, 15));
        })
    });

    let mut snapshot = Snapshot::empty("btcusdt", false);
    snapshot.bids = book.bids();
    snapshot.asks = book.asks();
    snapshot.connected = true;

    c.bench_function("view_from_snapshot", |b| {
        b.iter(|| {
            black_box(OrderBookView::from_snapshot(black_box(&snapshot), 15));
        })
    });
}

fn benchmark_mock_step(c: &mut Criterion) {
    let mut feed = MockFeed::seeded(7);
    let mut now = 1672531200000u64;

    c.bench_function("mock_feed_step", |b| {
        b.iter(|| {
            now += 500;
            black_box(feed.step(now));
        })
    });
}

criterion_group!(
    benches,
    benchmark_apply_diff,
    benchmark_parse,
    benchmark_view,
    benchmark_mock_step
);
criterion_main!(benches);
