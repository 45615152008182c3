// ********* First-past-the-post tally ***********

use crate::model::ElectionModel;
use crate::{Notice, TallyError};
use log::debug;
use std::collections::HashMap;

/// First-choice counts and winner set.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FptpResult {
    /// Top-choice count per candidate, in declaration order. Every declared
    /// candidate appears, including those with zero votes.
    pub toppicks: Vec<(String, u64)>,
    /// All candidates sharing the maximal count.
    pub winners: Vec<String>,
    /// Ballot weight that produced a usable first choice.
    pub total_countable: u64,
    pub notices: Vec<Notice>,
}

/// Counts each ballot's single top choice.
///
/// A ballot whose top rank group names more than one candidate has no single
/// first choice and is not countable here; the skipped weight is reported in
/// an info notice.
pub fn fptp_tally(model: &ElectionModel) -> Result<FptpResult, TallyError> {
    if model.candidate_count() == 0 {
        return Err(TallyError::EmptyElection);
    }

    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut countable: u64 = 0;
    let mut skipped: u64 = 0;
    for ballot in &model.ballots {
        match ballot.ranks.first() {
            Some(group) if group.len() == 1 => {
                *counts.entry(group[0].as_str()).or_insert(0) += ballot.count;
                countable += ballot.count;
            }
            Some(_) => skipped += ballot.count,
            None => {}
        }
    }

    let toppicks: Vec<(String, u64)> = model
        .candidates()
        .iter()
        .map(|c| (c.token.clone(), counts.get(c.token.as_str()).copied().unwrap_or(0)))
        .collect();
    let top = toppicks.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let winners: Vec<String> = toppicks
        .iter()
        .filter(|(_, n)| *n == top)
        .map(|(t, _)| t.clone())
        .collect();

    let mut notices = Vec::new();
    if skipped > 0 {
        notices.push(Notice::info(
            "Some ballots had no single first choice",
            format!(
                "{} ballot(s) ranked several candidates equally in first \
                 position and could not be counted for first-past-the-post.",
                skipped
            ),
        ));
    }
    debug!("fptp_tally: countable {} skipped {}", countable, skipped);

    Ok(FptpResult {
        toppicks,
        winners,
        total_countable: countable,
        notices,
    })
}
