use chess::{Color, File, Piece, Rank, Square};
use chess_opponent_engine::{
    parse_square, EngineConfig, GameSession, MoveReport, PlayerColor, RulesEngine, SquareClick,
    START_FEN,
};
use clap::{Arg, ArgAction, Command};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("Chess Opponent")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play a game of chess against the engine in the terminal")
        .arg(
            Arg::new("color")
                .short('c')
                .long("color")
                .value_name("COLOR")
                .help("Color you play (white/black)")
                .value_parser(["white", "black"]),
        )
        .arg(
            Arg::new("depth")
                .short('d')
                .long("depth")
                .value_name("DEPTH")
                .help("Engine search depth in plies")
                .value_parser(clap::value_parser!(u32).range(0..=6)),
        )
        .arg(
            Arg::new("fen")
                .long("fen")
                .value_name("FEN")
                .help("Start from this position instead of the initial one"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON engine configuration file"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .help("Seed for the fallback move generator")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("delay")
                .long("delay")
                .value_name("MILLISECONDS")
                .help("Pause before the engine replies")
                .value_parser(clap::value_parser!(u64).range(0..=10000)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log search details to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(color) = matches.get_one::<String>("color") {
        config.human_color = color.parse::<PlayerColor>()?;
    }
    if let Some(depth) = matches.get_one::<u32>("depth") {
        config.search.depth = *depth;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    if let Some(delay) = matches.get_one::<u64>("delay") {
        config.engine_delay_ms = *delay;
    }

    let fen = matches
        .get_one::<String>("fen")
        .map(String::as_str)
        .unwrap_or(START_FEN);
    let mut session = GameSession::from_fen(fen, config)?;

    println!("Chess Opponent - you play {}", session.config().human_color);
    println!("Type 'help' for commands.");
    run(&mut session)?;

    println!();
    println!("{}", session.to_pgn());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(session: &mut GameSession) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_board(session);
        let status = session.status();
        println!("{status}");
        if status.is_over() {
            return Ok(());
        }

        if !session.is_human_turn() {
            session.request_engine_reply();
            println!("Engine is thinking...");
            match session.wait_engine_reply()? {
                Some(report) => print_report("Engine", &report),
                None => println!("Engine has no reply"),
            }
            continue;
        }

        print!("> ");
        io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };

        if !handle_command(session, line.trim()) {
            return Ok(());
        }
    }
}

/// Returns false when the player wants to stop
fn handle_command(session: &mut GameSession, input: &str) -> bool {
    let mut words = input.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => return true,
    };
    let argument = words.next();

    match (command, argument) {
        ("quit" | "exit", _) => return false,
        ("help", _) => print_help(),
        ("undo" | "takeback", _) => match session.take_back() {
            Ok(plies) => println!("Took back {plies} half-move(s)"),
            Err(e) => println!("Cannot take back: {e}"),
        },
        ("moves", Some(square)) => match parse_square(square) {
            Ok(square) => {
                let targets = session.target_names(square);
                if targets.is_empty() {
                    println!("No legal moves from {square}");
                } else {
                    println!("{square}: {}", targets.join(" "));
                }
            }
            Err(e) => println!("{e}"),
        },
        ("moves", None) => {
            let moves: Vec<String> = session
                .game()
                .legal_moves()
                .into_iter()
                .map(|mv| session.game().san(mv))
                .collect();
            println!("{}", moves.join(" "));
        }
        ("click", Some(square)) => match parse_square(square) {
            Ok(square) => match session.click_square(square) {
                Ok(SquareClick::Selected { square, targets }) => {
                    let names: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                    println!("Selected {square}: {}", names.join(" "));
                }
                Ok(SquareClick::Moved(report)) => print_report("You", &report),
                Ok(SquareClick::Deselected) => println!("Selection cleared"),
                Ok(SquareClick::Ignored) => println!("Nothing to select on {square}"),
                Err(e) => println!("{e}"),
            },
            Err(e) => println!("{e}"),
        },
        ("history", _) => {
            for row in session.move_history() {
                println!("{row}");
            }
        }
        ("captured", _) => {
            let captured = session.captured_pieces();
            println!("White has taken: {}", piece_list(&captured.by_white, Color::Black));
            println!("Black has taken: {}", piece_list(&captured.by_black, Color::White));
        }
        ("eval", _) => println!("Evaluation: {} (White's view)", session.evaluation()),
        ("fen", _) => println!("{}", session.game().fen()),
        ("pgn", _) => println!("{}", session.to_pgn()),
        _ => match session.play_human_text(input) {
            Ok(report) => print_report("You", &report),
            Err(e) => println!("{e}"),
        },
    }
    true
}

fn print_help() {
    println!("Enter a move as e2e4, e7e8q or SAN (Nf3, O-O).");
    println!("  click <sq>   select a piece or move the selected one");
    println!("  moves [sq]   list legal moves (from a square)");
    println!("  undo         take back your last move and the reply");
    println!("  history      numbered move list");
    println!("  captured     captured pieces");
    println!("  eval         static evaluation");
    println!("  fen | pgn    export the game");
    println!("  quit");
}

fn print_report(who: &str, report: &MoveReport) {
    if report.gives_check {
        println!("{who} played {} - check!", report.san);
    } else {
        println!("{who} played {}", report.san);
    }
}

fn piece_list(pieces: &[Piece], color: Color) -> String {
    if pieces.is_empty() {
        return "-".to_string();
    }
    pieces
        .iter()
        .map(|piece| piece.to_string(color))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_board(session: &GameSession) {
    let game = session.game();
    let flipped = session.config().human_color == PlayerColor::Black;
    let selected = session.selected_square();

    let mut ranks: Vec<usize> = (0..8).collect();
    let mut files: Vec<usize> = (0..8).collect();
    if flipped {
        files.reverse();
    } else {
        ranks.reverse();
    }

    println!();
    for &rank in &ranks {
        print!(" {} ", rank + 1);
        for &file in &files {
            let square = Square::make_square(Rank::from_index(rank), File::from_index(file));
            let symbol = match game.piece_on(square) {
                Some((piece, color)) => piece.to_string(color),
                None => ".".to_string(),
            };
            if selected == Some(square) {
                print!("[{symbol}]");
            } else {
                print!(" {symbol} ");
            }
        }
        println!();
    }
    let labels: String = files
        .iter()
        .map(|&file| format!(" {} ", (b'a' + file as u8) as char))
        .collect();
    println!("   {labels}");
    println!();
}
