//! A small built-in opening book: a fingerprint (the first four
//! space-separated FEN fields -- board, side to move, castling rights, en
//! passant square) maps to a list of replies, each a SAN move with a
//! sampling weight and an optional ECO name. Lookups fall through to search
//! when a fingerprint isn't in the table.
//!
//! The catalogue below is illustrative, not a claim of opening-theory
//! completeness: Italian, Ruy Lopez, Sicilian, French, Caro-Kann, Queen's
//! Gambit, English, and King's Indian starts, plus their most common
//! replies, are enough to exercise sampling and ECO attribution end to end.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct BookEntry {
    pub san: String,
    pub weight: u32,
    pub eco: Option<&'static str>,
}

fn entry(san: &str, weight: u32, eco: Option<&'static str>) -> BookEntry {
    BookEntry { san: san.to_string(), weight, eco }
}

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

pub struct OpeningBook {
    entries: HashMap<String, Vec<BookEntry>>,
}

impl OpeningBook {
    pub fn new() -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            STARTPOS.to_string(),
            vec![
                entry("e4", 40, None),
                entry("d4", 30, None),
                entry("Nf3", 15, None),
                entry("c4", 15, Some("A10 English Opening")),
            ],
        );

        entries.insert(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -".to_string(),
            vec![
                entry("e5", 45, None),
                entry("c5", 35, Some("B20 Sicilian Defence")),
                entry("e6", 10, Some("C00 French Defence")),
                entry("c6", 10, Some("B10 Caro-Kann Defence")),
            ],
        );

        entries.insert(
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq -".to_string(),
            vec![entry("Nf3", 60, None), entry("Bc4", 20, Some("C50 Italian Game")), entry("Nc3", 20, None)],
        );

        entries.insert(
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq -".to_string(),
            vec![entry("Bb5", 50, Some("C60 Ruy Lopez")), entry("Bc4", 50, Some("C50 Italian Game"))],
        );

        entries.insert(
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -".to_string(),
            vec![entry("Nc6", 60, None), entry("Nf6", 40, Some("C42 Petrov's Defence"))],
        );

        entries.insert(
            "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq -".to_string(),
            vec![entry("Nf3", 60, None), entry("Nc3", 40, None)],
        );

        entries.insert(
            "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq -".to_string(),
            vec![
                entry("d5", 40, Some("D06 Queen's Gambit")),
                entry("Nf6", 35, Some("A45 Indian Defence")),
                entry("g6", 25, Some("E60 King's Indian Defence")),
            ],
        );

        Self { entries }
    }

    fn fingerprint(fen: &str) -> String {
        fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
    }

    pub fn lookup(&self, fen: &str) -> Option<&[BookEntry]> {
        self.entries.get(&Self::fingerprint(fen)).map(|v| v.as_slice())
    }

    /// Sample a reply using `rng`, weighted by each entry's `weight`.
    /// Returns `None` if the position isn't in the book.
    pub fn sample(&self, fen: &str, rng: &mut StdRng) -> Option<&BookEntry> {
        let entries = self.lookup(fen)?;
        let total: u32 = entries.iter().map(|e| e.weight).sum();
        if total == 0 {
            return entries.first();
        }

        let mut roll = rng.gen_range(0..total);
        for entry in entries {
            if roll < entry.weight {
                return Some(entry);
            }
            roll -= entry.weight;
        }
        entries.last()
    }
}

impl Default for OpeningBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn startpos_hits_the_book() {
        let book = OpeningBook::new();
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        assert!(book.lookup(fen).is_some());
    }

    #[test]
    fn unknown_position_falls_through() {
        let book = OpeningBook::new();
        let fen = "8/8/8/8/8/8/8/k6K w - - 0 1";
        assert!(book.lookup(fen).is_none());
    }

    #[test]
    fn sampling_is_deterministic_for_a_fixed_seed() {
        let book = OpeningBook::new();
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);

        let a = book.sample(fen, &mut rng_a).unwrap().san.clone();
        let b = book.sample(fen, &mut rng_b).unwrap().san.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn eco_names_are_attached_where_curated() {
        let book = OpeningBook::new();
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let entries = book.lookup(fen).unwrap();
        assert!(entries.iter().any(|e| e.eco.is_some()));
    }
}
