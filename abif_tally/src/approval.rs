// ********* Approval tally ***********

use crate::model::ElectionModel;
use crate::{Notice, TallyError};
use std::collections::HashMap;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ApprovalResult {
    /// Approval count per candidate, declaration order.
    pub counts: Vec<(String, u64)>,
    pub winners: Vec<String>,
    pub total_ballots: u64,
    pub notices: Vec<Notice>,
}

/// Counts ballots approving each candidate.
///
/// With native ratings, a ballot approves the candidates it rates above half
/// of the model's rating ceiling. Ranked-only ballots approve the top half
/// (rounded up) of their rank groups; that estimation is reported in an info
/// notice.
pub fn approval_tally(model: &ElectionModel) -> Result<ApprovalResult, TallyError> {
    if model.candidate_count() == 0 {
        return Err(TallyError::EmptyElection);
    }

    let native_ratings = model.has_ratings() && !model.metadata.ratings_synthesized;
    let ceiling = model.max_rating();
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut estimated_from_ranks = false;

    for ballot in &model.ballots {
        if native_ratings {
            for (token, rating) in &ballot.ratings {
                if rating * 2 > ceiling {
                    *counts.entry(token.as_str()).or_insert(0) += ballot.count;
                }
            }
        } else {
            let approved_groups = (ballot.ranks.len() + 1) / 2;
            estimated_from_ranks = estimated_from_ranks || !ballot.ranks.is_empty();
            for group in ballot.ranks.iter().take(approved_groups) {
                for token in group {
                    *counts.entry(token.as_str()).or_insert(0) += ballot.count;
                }
            }
        }
    }

    let counts: Vec<(String, u64)> = model
        .candidates()
        .iter()
        .map(|c| (c.token.clone(), counts.get(c.token.as_str()).copied().unwrap_or(0)))
        .collect();
    let top = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let winners: Vec<String> = counts
        .iter()
        .filter(|(_, n)| *n == top)
        .map(|(t, _)| t.clone())
        .collect();

    let mut notices = Vec::new();
    if estimated_from_ranks {
        notices.push(Notice::info(
            "Approvals estimated from rankings",
            "The ballots do not carry explicit approvals; candidates ranked \
             in the top half of each ballot are counted as approved."
                .to_string(),
        ));
    }

    Ok(ApprovalResult {
        counts,
        winners,
        total_ballots: model.total_ballots(),
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, ParseOptions};

    #[test]
    fn ratings_above_half_the_ceiling_approve() {
        let model = parse("3:A/5>B/3>C/0\n2:B/4>C/3>A/1\n", &ParseOptions::default()).unwrap();
        // Ceiling 5: approve on ratings 3 and up.
        let res = approval_tally(&model).unwrap();
        assert_eq!(
            res.counts,
            vec![
                ("A".to_string(), 3),
                ("B".to_string(), 5),
                ("C".to_string(), 2)
            ]
        );
        assert_eq!(res.winners, vec!["B"]);
        assert!(res.notices.is_empty());
    }

    #[test]
    fn rankings_approve_the_top_half_with_notice() {
        let model = parse("4:A>B>C>D\n1:C>D>A>B\n", &ParseOptions::default()).unwrap();
        let res = approval_tally(&model).unwrap();
        // Four groups: the top two are approved.
        assert_eq!(
            res.counts,
            vec![
                ("A".to_string(), 4),
                ("B".to_string(), 4),
                ("C".to_string(), 1),
                ("D".to_string(), 1)
            ]
        );
        assert_eq!(res.winners, vec!["A", "B"]);
        assert_eq!(res.notices.len(), 1);
        assert!(res.notices[0].long.contains("top half"));
    }

    #[test]
    fn synthesized_ratings_still_count_as_estimates() {
        let opts = ParseOptions {
            synthesize_ratings: true,
            ..ParseOptions::default()
        };
        let model = parse("2:A>B>C\n", &opts).unwrap();
        let res = approval_tally(&model).unwrap();
        assert!(!res.notices.is_empty());
    }

    #[test]
    fn zero_ballots_tie_everyone_at_zero() {
        let mut model = ElectionModel::new();
        model.declare_candidate("A", "Alice");
        model.declare_candidate("B", "Bob");
        let res = approval_tally(&model).unwrap();
        assert_eq!(res.winners, vec!["A", "B"]);
        assert_eq!(res.total_ballots, 0);
    }
}
