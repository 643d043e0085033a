use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use engine::facade::{BestMove, Engine};
use engine::search::time_control::SearchLimits;
use engine::search::SearchConfig;
use engine::worker::{WorkerHandle, WorkerRequest, WorkerResponse};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Parser)]
#[command(name = "corvid", about = "The Corvid chess engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the best move for a position
    BestMove {
        #[arg(short, long, default_value = STARTPOS)]
        fen: String,

        #[arg(short, long, value_name = "DEPTH", default_value = "6")]
        depth: usize,
    },

    /// Statically evaluate a position, with a per-term breakdown
    Eval {
        #[arg(short, long, default_value = STARTPOS)]
        fen: String,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Count leaf nodes at a given depth from a position
    Perft {
        #[arg(short, long, default_value = STARTPOS)]
        fen: String,

        #[arg(short, long, value_name = "DEPTH", default_value = "5")]
        depth: usize,
    },

    /// Read worker-protocol lines from stdin, reusing one warm engine
    Serve {
        #[arg(long, default_value = "64")]
        tt_size_mib: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::BestMove { fen, depth } => run_best_move(fen, depth),
        Command::Eval { fen, verbose } => run_eval(fen, verbose),
        Command::Perft { fen, depth } => run_perft(fen, depth),
        Command::Serve { tt_size_mib } => run_serve(tt_size_mib),
    }
}

fn run_best_move(fen: String, depth: usize) -> Result<()> {
    let mut engine = Engine::new(64, 0);
    let config = SearchConfig { limits: SearchLimits::depth(depth), ..SearchConfig::default() };

    let result = engine.best_move(&fen, &config)?;

    match result {
        BestMove::Book { mv, eco, .. } => {
            print!("{} {}", "book:".bright_black(), mv.to_string().bright_green());
            if let Some(eco) = eco {
                print!(" {}", format!("({eco})").bright_black());
            }
            println!();
        }
        BestMove::Searched(report) => {
            let line = report.lines.first().context("search returned no line")?;
            println!(
                "{} {} {} depth={} nodes={} time={}ms",
                "search:".bright_black(),
                line.mv.to_string().bright_green(),
                format!("score={}", line.score).bright_black(),
                report.depth,
                report.nodes,
                report.elapsed_ms,
            );
        }
    }

    Ok(())
}

fn run_eval(fen: String, verbose: bool) -> Result<()> {
    let mut engine = Engine::new(1, 0);

    if verbose {
        let breakdown = engine.breakdown(&fen)?;
        for term in &breakdown.terms {
            println!("{:<16} {}", term.name.bright_black(), term.value);
        }
        println!("{:<16} {}", "total".bold(), breakdown.total);
    } else {
        let score = engine.evaluate(&fen)?;
        println!("{score}");
    }

    Ok(())
}

fn run_perft(fen: String, depth: usize) -> Result<()> {
    let nodes = Engine::perft(&fen, depth)?;
    println!("{}", nodes.to_string().bright_green());
    Ok(())
}

/// Read worker-protocol lines from stdin, one request per line, writing
/// `RESULT`/`STOPPED`/`CLEARED`/`ERROR` responses to stdout. A dedicated
/// worker thread keeps the transposition table and history warm across
/// requests within the session.
fn run_serve(tt_size_mib: usize) -> Result<()> {
    let worker = WorkerHandle::spawn(tt_size_mib, 0);
    let stdin = io::stdin();
    let is_tty = stdin.is_terminal();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read a line from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match line.parse::<WorkerRequest>() {
            Ok(request) => {
                worker.send(request)?;
                worker.recv()?
            }
            Err(err) => WorkerResponse::Error(err.to_string()),
        };

        if is_tty {
            println!("{}", format!("{response}").bright_cyan());
        } else {
            println!("{response}");
        }
        io::stdout().flush().ok();
    }

    Ok(())
}
