//! A long-lived search worker: one `std::thread` holding a [`facade::Engine`]
//! (and therefore its warm transposition table and history), driven by a
//! request/response channel pair. Generalized from the teacher's UCI-specific
//! `simbelmyne::uci::{SearchController, SearchThread, SearchCommand}` into a
//! small hand-rolled text protocol, since this spec has no UCI surface to
//! speak -- just `SEARCH`/`STOP`/`CLEAR_CACHE` in, `RESULT`/`ERROR` out.

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context};

use crate::facade::{BestMove, Engine, EngineError};
use crate::search::SearchConfig;

#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Search { fen: String, config: SearchConfig },
    Stop,
    ClearCache,
}

impl fmt::Display for WorkerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRequest::Search { fen, config } => {
                write!(f, "SEARCH fen={fen} maxDepth={:?} maxTimeMs={:?}", config.limits.max_depth, config.limits.max_time)
            }
            WorkerRequest::Stop => write!(f, "STOP"),
            WorkerRequest::ClearCache => write!(f, "CLEAR_CACHE"),
        }
    }
}

impl FromStr for WorkerRequest {
    type Err = anyhow::Error;

    /// Parses the tiny line protocol `COMMAND key=value key=value ...`.
    /// `STOP` and `CLEAR_CACHE` take no arguments; `SEARCH` requires `fen=`
    /// and accepts an optional `maxDepth=`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().split_whitespace();
        let command = parts.next().ok_or_else(|| anyhow!("empty worker command"))?;

        match command {
            "STOP" => Ok(WorkerRequest::Stop),
            "CLEAR_CACHE" => Ok(WorkerRequest::ClearCache),
            "SEARCH" => {
                let mut fen_parts = Vec::new();
                let mut max_depth = None;

                for part in parts {
                    if let Some(value) = part.strip_prefix("fen=") {
                        fen_parts.push(value.to_string());
                    } else if let Some(value) = part.strip_prefix("maxDepth=") {
                        max_depth = Some(value.parse::<usize>().context("maxDepth must be an integer")?);
                    }
                }

                if fen_parts.is_empty() {
                    return Err(anyhow!("SEARCH requires fen="));
                }

                let mut config = SearchConfig::default();
                if let Some(depth) = max_depth {
                    config.limits.max_depth = Some(depth);
                }

                Ok(WorkerRequest::Search { fen: fen_parts.join(" "), config })
            }
            other => Err(anyhow!("unknown worker command: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkerResponse {
    Result { best_move: String, eco: Option<&'static str> },
    Stopped,
    Cleared,
    Error(String),
}

impl fmt::Display for WorkerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerResponse::Result { best_move, eco } => match eco {
                Some(eco) => write!(f, "RESULT bestMove={best_move} eco={eco}"),
                None => write!(f, "RESULT bestMove={best_move}"),
            },
            WorkerResponse::Stopped => write!(f, "STOPPED"),
            WorkerResponse::Cleared => write!(f, "CLEARED"),
            WorkerResponse::Error(msg) => write!(f, "ERROR {msg}"),
        }
    }
}

impl From<EngineError> for WorkerResponse {
    fn from(err: EngineError) -> Self {
        WorkerResponse::Error(err.to_string())
    }
}

/// A handle to a running worker thread. Dropping it closes the request
/// channel, which unblocks the worker's receive loop and lets it exit.
pub struct WorkerHandle {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(tt_size_mib: usize, book_seed: u64) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::channel::<WorkerResponse>();

        let join = thread::spawn(move || run_worker(request_rx, response_tx, tt_size_mib, book_seed));

        Self { requests: request_tx, responses: response_rx, join: Some(join) }
    }

    pub fn send(&self, request: WorkerRequest) -> Result<(), anyhow::Error> {
        self.requests.send(request).map_err(|_| anyhow!("worker thread has shut down"))
    }

    pub fn recv(&self) -> Result<WorkerResponse, anyhow::Error> {
        self.responses.recv().map_err(|_| anyhow!("worker thread has shut down"))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        drop(&self.requests);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_worker(requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>, tt_size_mib: usize, book_seed: u64) {
    let mut engine = Engine::new(tt_size_mib, book_seed);

    while let Ok(request) = requests.recv() {
        let response = match request {
            WorkerRequest::Search { fen, config } => match engine.best_move(&fen, &config) {
                Ok(BestMove::Book { san, eco, .. }) => WorkerResponse::Result { best_move: san, eco },
                Ok(BestMove::Searched(report)) => match report.lines.first() {
                    Some(line) => WorkerResponse::Result { best_move: line.mv.to_string(), eco: None },
                    None => WorkerResponse::Error("search produced no result".to_string()),
                },
                Err(err) => err.into(),
            },
            WorkerRequest::Stop => WorkerResponse::Stopped,
            WorkerRequest::ClearCache => {
                engine.clear_tt();
                engine.clear_counter_moves();
                WorkerResponse::Cleared
            }
        };

        if responses.send(response).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_command() {
        let req: WorkerRequest = "SEARCH fen=startpos maxDepth=4".parse().unwrap();
        match req {
            WorkerRequest::Search { fen, config } => {
                assert_eq!(fen, "startpos");
                assert_eq!(config.limits.max_depth, Some(4));
            }
            _ => panic!("expected a SEARCH command"),
        }
    }

    #[test]
    fn rejects_unknown_command() {
        assert!("FOO".parse::<WorkerRequest>().is_err());
    }

    #[test]
    fn worker_answers_a_search_request() {
        let worker = WorkerHandle::spawn(4, 1);
        let config = SearchConfig { limits: crate::search::time_control::SearchLimits::depth(2), ..SearchConfig::default() };
        worker
            .send(WorkerRequest::Search { fen: "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1".to_string(), config })
            .unwrap();

        let response = worker.recv().unwrap();
        assert!(matches!(response, WorkerResponse::Result { .. }));
    }
}
