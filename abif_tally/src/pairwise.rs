// ********* Pairwise (Condorcet) and Copeland tally ***********

use crate::model::ElectionModel;
use crate::{Notice, TallyError};
use log::debug;
use std::collections::HashMap;
use std::fmt::Write as _;

/// The full round-robin preference matrix.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseMatrix {
    candidates: Vec<String>,
    counts: HashMap<String, HashMap<String, u64>>,
}

impl PairwiseMatrix {
    fn new(candidates: Vec<String>) -> PairwiseMatrix {
        let counts = candidates
            .iter()
            .map(|a| {
                let row = candidates
                    .iter()
                    .filter(|b| *b != a)
                    .map(|b| (b.clone(), 0u64))
                    .collect();
                (a.clone(), row)
            })
            .collect();
        PairwiseMatrix { candidates, counts }
    }

    /// Candidate tokens in declaration order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Ballot weight preferring `a` over `b`.
    pub fn preferring(&self, a: &str, b: &str) -> u64 {
        self.counts
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(0)
    }

    fn record(&mut self, a: &str, b: &str, weight: u64) {
        if let Some(cell) = self.counts.get_mut(a).and_then(|row| row.get_mut(b)) {
            *cell += weight;
        }
    }
}

/// Win/tie/loss record of one candidate against the rest of the field.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CopelandRow {
    pub token: String,
    pub wins: u64,
    pub ties: u64,
    pub losses: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseResult {
    pub matrix: PairwiseMatrix,
    /// Copeland records derived from `matrix`, sorted by descending wins,
    /// stable on declaration order.
    pub copeland: Vec<CopelandRow>,
    /// Candidate(s) with the maximal win count.
    pub winners: Vec<String>,
    pub notices: Vec<Notice>,
}

/// Computes the pairwise matrix once and derives the Copeland ranking from
/// that same matrix. Recomputing the matchups independently could diverge on
/// tie edge cases, so consumers must read both from this single result.
pub fn pairwise_tally(model: &ElectionModel) -> Result<PairwiseResult, TallyError> {
    if model.candidate_count() == 0 {
        return Err(TallyError::EmptyElection);
    }
    let mut matrix = PairwiseMatrix::new(model.candidate_tokens());

    for ballot in &model.ballots {
        // Rank position per token; unranked candidates sit below every
        // ranked one, equal ranks prefer neither way.
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (depth, group) in ballot.ranks.iter().enumerate() {
            for t in group {
                position.entry(t.as_str()).or_insert(depth);
            }
        }
        let tokens = matrix.candidates.clone();
        for (i, a) in tokens.iter().enumerate() {
            for b in tokens.iter().skip(i + 1) {
                let pa = position.get(a.as_str()).copied().unwrap_or(usize::MAX);
                let pb = position.get(b.as_str()).copied().unwrap_or(usize::MAX);
                if pa < pb {
                    matrix.record(a, b, ballot.count);
                } else if pb < pa {
                    matrix.record(b, a, ballot.count);
                }
            }
        }
    }

    let copeland = copeland_from_matrix(&matrix);
    let winners = copeland_winners(&copeland);
    debug!("pairwise_tally: winners {:?}", winners);
    Ok(PairwiseResult {
        matrix,
        copeland,
        winners,
        notices: Vec::new(),
    })
}

/// Copeland records for every candidate, computed from the given matrix.
pub fn copeland_from_matrix(matrix: &PairwiseMatrix) -> Vec<CopelandRow> {
    let mut rows: Vec<CopelandRow> = matrix
        .candidates()
        .iter()
        .map(|a| {
            let mut row = CopelandRow {
                token: a.clone(),
                wins: 0,
                ties: 0,
                losses: 0,
            };
            for b in matrix.candidates() {
                if a == b {
                    continue;
                }
                let ab = matrix.preferring(a, b);
                let ba = matrix.preferring(b, a);
                if ab > ba {
                    row.wins += 1;
                } else if ba > ab {
                    row.losses += 1;
                } else {
                    row.ties += 1;
                }
            }
            row
        })
        .collect();
    rows.sort_by(|x, y| y.wins.cmp(&x.wins));
    rows
}

/// All candidates holding the maximal win count.
pub fn copeland_winners(rows: &[CopelandRow]) -> Vec<String> {
    let top = rows.iter().map(|r| r.wins).max().unwrap_or(0);
    rows.iter()
        .filter(|r| r.wins == top)
        .map(|r| r.token.clone())
        .collect()
}

/// A plain-text summary of the win/loss/tie record, one candidate per line.
pub fn victory_summary(model: &ElectionModel, result: &PairwiseResult) -> String {
    let mut out = String::new();
    for row in &result.copeland {
        let _ = writeln!(
            out,
            "{}: {} victories, {} ties, {} losses",
            model.display_name(&row.token),
            row.wins,
            row.ties,
            row.losses
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, ParseOptions};

    const TENNESSEE: &str = "\
=Memph:[Memphis, TN]
=Nash:[Nashville, TN]
=Chat:[Chattanooga, TN]
=Knox:[Knoxville, TN]
42:Memph>Nash>Chat>Knox
26:Nash>Chat>Knox>Memph
15:Chat>Knox>Nash>Memph
17:Knox>Chat>Nash>Memph
";

    #[test]
    fn nashville_is_the_condorcet_winner() {
        let model = parse(TENNESSEE, &ParseOptions::default()).unwrap();
        let res = pairwise_tally(&model).unwrap();
        assert_eq!(res.winners, vec!["Nash"]);
        let nash = res.copeland.iter().find(|r| r.token == "Nash").unwrap();
        assert_eq!((nash.wins, nash.ties, nash.losses), (3, 0, 0));
        // 58 voters rank Nashville over Memphis.
        assert_eq!(res.matrix.preferring("Nash", "Memph"), 58);
        assert_eq!(res.matrix.preferring("Memph", "Nash"), 42);
    }

    #[test]
    fn copeland_winners_match_the_matrix() {
        let model = parse(TENNESSEE, &ParseOptions::default()).unwrap();
        let res = pairwise_tally(&model).unwrap();
        // Recompute win counts straight from the bundled matrix and check
        // they coincide with the reported Copeland winners.
        let rows = copeland_from_matrix(&res.matrix);
        assert_eq!(copeland_winners(&rows), res.winners);
    }

    #[test]
    fn unranked_candidates_lose_to_ranked_ones() {
        let model = parse("=A:[Alice]\n=B:[Bob]\n=C:[Carol]\n3:A>B\n", &ParseOptions::default())
            .unwrap();
        let res = pairwise_tally(&model).unwrap();
        assert_eq!(res.matrix.preferring("A", "C"), 3);
        assert_eq!(res.matrix.preferring("C", "A"), 0);
    }

    #[test]
    fn equal_ranks_prefer_neither() {
        let model = parse("4:A=B>C\n", &ParseOptions::default()).unwrap();
        let res = pairwise_tally(&model).unwrap();
        assert_eq!(res.matrix.preferring("A", "B"), 0);
        assert_eq!(res.matrix.preferring("B", "A"), 0);
        assert_eq!(res.matrix.preferring("A", "C"), 4);
    }

    #[test]
    fn perfect_cycle_ties_everyone() {
        let model = parse("1:A>B>C\n1:B>C>A\n1:C>A>B\n", &ParseOptions::default()).unwrap();
        let res = pairwise_tally(&model).unwrap();
        assert_eq!(res.winners.len(), 3);
        assert!(res.copeland.iter().all(|r| r.wins == 1 && r.losses == 1));
    }

    #[test]
    fn summary_names_candidates() {
        let model = parse(TENNESSEE, &ParseOptions::default()).unwrap();
        let res = pairwise_tally(&model).unwrap();
        let text = victory_summary(&model, &res);
        assert!(text.starts_with("Nashville, TN: 3 victories"));
    }
}
