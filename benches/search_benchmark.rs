use chess::Board;
use chess_opponent_engine::{
    AlphaBeta, ChessGame, Evaluator, MoveSelector, RulesEngine, SearchConfig, TerminalScoring,
    SCORE_INFINITY,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::str::FromStr;

const POSITIONS: [(&str, &str); 4] = [
    ("start", "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
    ("italian", "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/3P1N2/PPP2PPP/RNBQK2R b KQkq - 0 4"),
    ("middlegame", "r2q1rk1/ppp2ppp/2np1n2/2b1p1B1/2B1P1b1/2NP1N2/PPP2PPP/R2Q1RK1 w - - 4 8"),
    ("endgame", "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"),
];

fn benchmark_evaluation(c: &mut Criterion) {
    let evaluator = Evaluator::new();
    let boards: Vec<Board> = POSITIONS
        .iter()
        .map(|(_, fen)| Board::from_str(fen).expect("Valid FEN"))
        .collect();

    c.bench_function("evaluate_positions", |b| {
        b.iter(|| {
            for board in &boards {
                black_box(evaluator.evaluate(black_box(board)));
            }
        })
    });
}

fn benchmark_pruning(c: &mut Criterion) {
    let evaluator = Evaluator::new();
    let mut group = c.benchmark_group("depth_3_search");
    group.sample_size(10);

    for (name, fen) in POSITIONS {
        let game = ChessGame::from_fen(fen).expect("Valid FEN");
        let maximizing = game.board().side_to_move() == chess::Color::White;

        group.bench_with_input(BenchmarkId::new("alpha_beta", name), &game, |b, game| {
            b.iter(|| {
                let mut position = game.clone();
                let mut searcher = AlphaBeta::new(&evaluator, TerminalScoring::Decisive);
                black_box(
                    searcher
                        .search(&mut position, 3, -SCORE_INFINITY, SCORE_INFINITY, maximizing)
                        .expect("search"),
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("minimax", name), &game, |b, game| {
            b.iter(|| {
                let mut position = game.clone();
                let mut searcher = AlphaBeta::new(&evaluator, TerminalScoring::Decisive);
                black_box(
                    searcher
                        .minimax(&mut position, 3, maximizing)
                        .expect("search"),
                )
            })
        });
    }
    group.finish();
}

fn benchmark_move_selection(c: &mut Criterion) {
    let evaluator = Evaluator::new();
    let mut group = c.benchmark_group("select_move");
    group.sample_size(10);

    for (label, config) in [
        ("default", SearchConfig::default()),
        ("unnarrowed_root", SearchConfig {
            narrow_root_window: false,
            ..SearchConfig::default()
        }),
    ] {
        group.bench_function(label, |b| {
            let selector = MoveSelector::new(&evaluator, config.clone());
            b.iter(|| {
                let mut game = ChessGame::from_fen(POSITIONS[2].1).expect("Valid FEN");
                let side = game.board().side_to_move();
                black_box(selector.select_move(&mut game, side).expect("search"))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_evaluation,
    benchmark_pruning,
    benchmark_move_selection
);
criterion_main!(benches);
