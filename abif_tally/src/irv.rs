// ********* Instant-runoff tally ***********

use crate::model::ElectionModel;
use crate::TallyError;
use log::{debug, info};
use std::collections::HashMap;

/// Options for [`irv_tally_with`].
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct IrvOptions {
    /// Record the per-round transfer breakdown in [`IrvRound::transfers`].
    pub include_extra: bool,
    /// Number of seats to fill. Only single-winner elections are implemented;
    /// any other value is reported as an unsupported option.
    pub winners_sought: u32,
}

impl Default for IrvOptions {
    fn default() -> IrvOptions {
        IrvOptions {
            include_extra: false,
            winners_sought: 1,
        }
    }
}

/// Elimination metadata for one counting round.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct IrvRound {
    /// 1-based round number.
    pub round: u32,
    /// Continuing candidates and their votes, in declaration order.
    pub tally: Vec<(String, u64)>,
    /// Candidate(s) eliminated in this round. Empty for the final round.
    pub eliminated: Vec<String>,
    /// All candidates eliminated so far, in elimination order.
    pub all_eliminated: Vec<String>,
    /// True when a bottom tie had to be resolved by simulated random
    /// selection, or when the round ended in an all-tied final.
    pub tiebreak: bool,
    /// The candidates tied at the bottom count when `tiebreak` is set.
    pub tied: Vec<String>,
    /// The vote count shared by the tied candidates.
    pub bottom_votes: u64,
    /// Ballot weight with no continuing candidate left.
    pub exhausted: u64,
    /// Extended diagnostics: (from, to, weight) transfers out of the
    /// eliminated candidate; `None` marks exhausted ballots. Populated only
    /// when requested through [`IrvOptions::include_extra`].
    pub transfers: Vec<(String, Option<String>, u64)>,
}

/// The outcome of an instant-runoff election.
#[derive(PartialEq, Debug, Clone)]
pub struct IrvTally {
    pub winners: Vec<String>,
    /// True when any round was decided by tie-break.
    pub has_tie: bool,
    /// Majority threshold of the final round.
    pub threshold: u64,
    pub rounds: Vec<IrvRound>,
    pub final_tally: Vec<(String, u64)>,
    /// Final-round percentages of active votes; 0.0 when no votes are active.
    pub final_percentages: Vec<(String, f64)>,
}

pub fn irv_tally(model: &ElectionModel) -> Result<IrvTally, TallyError> {
    irv_tally_with(model, &IrvOptions::default())
}

/// Runs instant-runoff rounds until a candidate reaches a majority of the
/// active votes, eliminating the bottom candidate each round.
///
/// Bottom ties are resolved by a deterministic permutation of the tied
/// tokens (see [`tie_break_order`]), standing in for drawing lots. A round
/// in which every continuing candidate holds the same count ends the
/// election with all of them as co-winners and no elimination.
pub fn irv_tally_with(
    model: &ElectionModel,
    options: &IrvOptions,
) -> Result<IrvTally, TallyError> {
    if model.candidate_count() == 0 {
        return Err(TallyError::EmptyElection);
    }
    if options.winners_sought != 1 {
        return Err(TallyError::UnsupportedOption {
            option: format!("winners_sought={}", options.winners_sought),
        });
    }

    // Flatten each ballot to a strict preference order. Equal-rank groups
    // are laid out in declaration order; repeated tokens keep their first
    // position.
    let ballots: Vec<(Vec<String>, u64)> = model
        .ballots
        .iter()
        .map(|b| {
            let mut prefs: Vec<String> = Vec::new();
            for group in &b.ranks {
                let mut group_sorted: Vec<&String> = group.iter().collect();
                group_sorted.sort_by_key(|t| model.declaration_index(t));
                for t in group_sorted {
                    if !prefs.contains(t) {
                        prefs.push(t.clone());
                    }
                }
            }
            (prefs, b.count)
        })
        .collect();

    let mut continuing: Vec<String> = model.candidate_tokens();
    let mut all_eliminated: Vec<String> = Vec::new();
    let mut rounds: Vec<IrvRound> = Vec::new();
    let mut has_tie = false;
    let max_rounds = model.candidate_count() as u32 + 1;

    loop {
        let round_num = rounds.len() as u32 + 1;
        if round_num > max_rounds {
            return Err(TallyError::NoConvergence);
        }

        let mut counts: HashMap<&str, u64> =
            continuing.iter().map(|t| (t.as_str(), 0u64)).collect();
        let mut exhausted: u64 = 0;
        for (prefs, count) in &ballots {
            match prefs.iter().find(|t| continuing.contains(t)) {
                Some(t) => {
                    if let Some(c) = counts.get_mut(t.as_str()) {
                        *c += count;
                    }
                }
                None => exhausted += count,
            }
        }
        let tally: Vec<(String, u64)> = continuing
            .iter()
            .map(|t| (t.clone(), counts.get(t.as_str()).copied().unwrap_or(0)))
            .collect();
        let active: u64 = tally.iter().map(|(_, n)| *n).sum();
        let threshold = if active == 0 { 0 } else { active / 2 + 1 };
        let top = tally.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let bottom = tally.iter().map(|(_, n)| *n).min().unwrap_or(0);
        info!(
            "irv round {}: active {} threshold {} tally {:?}",
            round_num, active, threshold, tally
        );

        // A majority winner, or the last candidate standing.
        if continuing.len() == 1 || (active > 0 && top >= threshold && top > bottom) {
            let winners: Vec<String> = tally
                .iter()
                .filter(|(_, n)| *n == top)
                .map(|(t, _)| t.clone())
                .collect();
            rounds.push(IrvRound {
                round: round_num,
                tally: tally.clone(),
                all_eliminated: all_eliminated.clone(),
                exhausted,
                ..IrvRound::default()
            });
            return Ok(finish(winners, has_tie, threshold, rounds, tally, active));
        }

        let tied: Vec<String> = tally
            .iter()
            .filter(|(_, n)| *n == bottom)
            .map(|(t, _)| t.clone())
            .collect();

        if tied.len() == continuing.len() {
            // Everyone left holds the same count. With no votes at all this
            // is just a degenerate election; with votes it is a final-round
            // tie and all continuing candidates are declared co-winners.
            let tiebreak = active > 0;
            if tiebreak {
                has_tie = true;
            }
            rounds.push(IrvRound {
                round: round_num,
                tally: tally.clone(),
                all_eliminated: all_eliminated.clone(),
                tiebreak,
                tied: if tiebreak { tied } else { Vec::new() },
                bottom_votes: bottom,
                exhausted,
                ..IrvRound::default()
            });
            return Ok(finish(
                continuing.clone(),
                has_tie,
                threshold,
                rounds,
                tally,
                active,
            ));
        }

        let (loser, tiebreak) = if tied.len() > 1 {
            has_tie = true;
            let order = tie_break_order(&tied, round_num);
            debug!("irv round {}: tie-break order {:?}", round_num, order);
            (order[0].clone(), true)
        } else {
            (tied[0].clone(), false)
        };

        let transfers = if options.include_extra {
            transfer_breakdown(&ballots, &continuing, &loser, model)
        } else {
            Vec::new()
        };

        continuing.retain(|t| *t != loser);
        all_eliminated.push(loser.clone());
        rounds.push(IrvRound {
            round: round_num,
            tally,
            eliminated: vec![loser],
            all_eliminated: all_eliminated.clone(),
            tiebreak,
            tied: if tiebreak { tied } else { Vec::new() },
            bottom_votes: bottom,
            exhausted,
            transfers,
        });
    }
}

fn finish(
    winners: Vec<String>,
    has_tie: bool,
    threshold: u64,
    rounds: Vec<IrvRound>,
    final_tally: Vec<(String, u64)>,
    active: u64,
) -> IrvTally {
    let final_percentages: Vec<(String, f64)> = final_tally
        .iter()
        .map(|(t, n)| {
            let pct = if active == 0 {
                0.0
            } else {
                *n as f64 * 100.0 / active as f64
            };
            (t.clone(), pct)
        })
        .collect();
    IrvTally {
        winners,
        has_tie,
        threshold,
        rounds,
        final_tally,
        final_percentages,
    }
}

/// Where the loser's ballots go next, aggregated per receiving candidate.
fn transfer_breakdown(
    ballots: &[(Vec<String>, u64)],
    continuing: &[String],
    loser: &str,
    model: &ElectionModel,
) -> Vec<(String, Option<String>, u64)> {
    let mut agg: HashMap<Option<String>, u64> = HashMap::new();
    for (prefs, count) in ballots {
        let current = prefs.iter().find(|t| continuing.contains(t));
        if current.map(|t| t.as_str()) != Some(loser) {
            continue;
        }
        let next = prefs
            .iter()
            .find(|t| t.as_str() != loser && continuing.contains(t))
            .cloned();
        *agg.entry(next).or_insert(0) += count;
    }
    let mut out: Vec<(String, Option<String>, u64)> = agg
        .into_iter()
        .map(|(to, n)| (loser.to_string(), to, n))
        .collect();
    out.sort_by_key(|(_, to, _)| match to {
        Some(t) => model.declaration_index(t),
        None => usize::MAX,
    });
    out
}

/// A deterministic permutation of tied candidates, hard to guess in advance.
/// Tokens are ordered by the sha256 digest of the round number and token,
/// simulating a random draw while staying reproducible across runs.
pub fn tie_break_order(tied: &[String], round: u32) -> Vec<String> {
    let mut keyed: Vec<(String, String)> = tied
        .iter()
        .map(|t| (sha256::digest(format!("{:08}{}", round, t)), t.clone()))
        .collect();
    keyed.sort();
    keyed.into_iter().map(|(_, t)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, ParseOptions};

    const FOUR_WAY: &str = "42:A>B>C>D\n26:B>C>D>A\n15:C>D>B>A\n17:D>C>B>A\n";

    #[test]
    fn four_way_example_converges() {
        let model = parse(FOUR_WAY, &ParseOptions::default()).unwrap();
        let res = irv_tally(&model).unwrap();
        // C goes out first (15), then B (26), leaving D with B's and C's
        // transfers against A.
        assert_eq!(res.rounds[0].eliminated, vec!["C"]);
        assert_eq!(res.rounds[1].eliminated, vec!["B"]);
        assert_eq!(res.winners, vec!["D"]);
        assert_eq!(res.final_tally, vec![("A".to_string(), 42), ("D".to_string(), 58)]);
        assert!(!res.has_tie);
        assert_eq!(res.threshold, 51);
        let pct_d = res.final_percentages.iter().find(|(t, _)| t == "D").unwrap().1;
        assert!((pct_d - 58.0).abs() < 1e-9);
    }

    #[test]
    fn bottom_tie_is_resolved_and_flagged() {
        let model = parse("3:A\n2:B>A\n2:C>A\n", &ParseOptions::default()).unwrap();
        let res = irv_tally(&model).unwrap();
        assert!(res.has_tie);
        let first = &res.rounds[0];
        assert!(first.tiebreak);
        assert_eq!(first.tied, vec!["B", "C"]);
        assert_eq!(first.bottom_votes, 2);
        assert_eq!(first.eliminated.len(), 1);
        assert!(first.tied.contains(&first.eliminated[0]));
        assert_eq!(res.winners, vec!["A"]);
        // Deterministic across runs.
        assert_eq!(res, irv_tally(&model).unwrap());
    }

    #[test]
    fn all_tied_final_round_declares_co_winners() {
        let model = parse("2:A>B\n2:B>A\n", &ParseOptions::default()).unwrap();
        let res = irv_tally(&model).unwrap();
        assert_eq!(res.winners, vec!["A", "B"]);
        assert!(res.has_tie);
        let last = res.rounds.last().unwrap();
        assert!(last.tiebreak);
        assert!(last.eliminated.is_empty());
        assert_eq!(last.tied, vec!["A", "B"]);
    }

    #[test]
    fn no_tie_election_has_no_flag() {
        let model = parse(FOUR_WAY, &ParseOptions::default()).unwrap();
        let res = irv_tally(&model).unwrap();
        assert!(!res.has_tie);
        assert!(res.rounds.iter().all(|r| !r.tiebreak && r.tied.is_empty()));
    }

    #[test]
    fn extended_diagnostics_record_transfers() {
        let model = parse(FOUR_WAY, &ParseOptions::default()).unwrap();
        let opts = IrvOptions {
            include_extra: true,
            ..IrvOptions::default()
        };
        let res = irv_tally_with(&model, &opts).unwrap();
        // C's 15 ballots all continue to D.
        assert_eq!(
            res.rounds[0].transfers,
            vec![("C".to_string(), Some("D".to_string()), 15)]
        );
    }

    #[test]
    fn multi_winner_request_is_unsupported() {
        let model = parse("2:A>B\n", &ParseOptions::default()).unwrap();
        let opts = IrvOptions {
            winners_sought: 2,
            ..IrvOptions::default()
        };
        match irv_tally_with(&model, &opts) {
            Err(TallyError::UnsupportedOption { option }) => {
                assert!(option.contains("winners_sought"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn zero_ballots_is_a_quiet_degenerate_case() {
        let mut model = ElectionModel::new();
        model.declare_candidate("A", "Alice");
        model.declare_candidate("B", "Bob");
        let res = irv_tally(&model).unwrap();
        assert_eq!(res.winners, vec!["A", "B"]);
        assert!(!res.has_tie);
        assert!(res.final_percentages.iter().all(|(_, p)| *p == 0.0));
    }
}
