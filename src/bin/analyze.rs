use chess_opponent_engine::{
    ChessGame, EngineConfig, Evaluator, MoveSelector, RulesEngine, SearchConfig, TerminalScoring,
    START_FEN,
};
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("Chess Opponent Analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate a position and report the engine's choice")
        .arg(
            Arg::new("fen")
                .value_name("FEN")
                .help("Position to analyze (defaults to the initial position)"),
        )
        .arg(
            Arg::new("depth")
                .short('d')
                .long("depth")
                .value_name("DEPTH")
                .help("Search depth in plies below each root move")
                .value_parser(clap::value_parser!(u32).range(0..=6)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON engine configuration file"),
        )
        .arg(
            Arg::new("static_terminals")
                .long("static-terminals")
                .help("Score checkmates and draws with the static evaluator")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Print the score of every root move")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log search details to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut search = SearchConfig {
        depth: matches
            .get_one::<u32>("depth")
            .copied()
            .unwrap_or(config.search.depth),
        ..config.search.clone()
    };
    if matches.get_flag("static_terminals") {
        search.terminal_scoring = TerminalScoring::Static;
    }
    search.validate()?;

    let fen = matches
        .get_one::<String>("fen")
        .map(String::as_str)
        .unwrap_or(START_FEN);
    let mut game = ChessGame::from_fen(fen)?;
    let evaluator = Evaluator::with_piece_values(config.piece_values);

    println!("Chess Opponent - Position Analyzer");
    println!("==================================");
    println!("FEN: {}", game.fen());
    println!("Side to move: {:?}", game.side_to_move());
    println!();
    print!("{}", evaluator.evaluate_detailed(game.board()).display());
    println!();

    if game.is_terminal() {
        println!("No search: the position is terminal");
        return Ok(());
    }

    let side = game.side_to_move();
    let result = MoveSelector::new(&evaluator, search).search_root(&mut game, side)?;

    match result.best_move {
        Some(mv) => println!("Best move: {} ({})", game.san(mv), mv),
        None => println!("Best move: none"),
    }
    println!("Score: {} cp (White's view)", result.evaluation);
    println!("Depth: {}", result.depth);
    println!("Nodes: {}", result.nodes_searched);
    println!("Cutoffs: {}", result.cutoffs);
    println!("Time: {:.1} ms", result.time_elapsed.as_secs_f64() * 1000.0);

    if matches.get_flag("all") {
        println!();
        println!("Root moves:");
        for (mv, score) in &result.root_scores {
            println!("  {:<8} {}", game.san(*mv), score);
        }
    }
    Ok(())
}
