// ********* Score / STAR tally and ratings synthesis ***********

use crate::model::ElectionModel;
use crate::{Notice, TallyError};
use log::debug;

/// Display scale used by the web layer for star diagrams.
pub const DEFAULT_TARGET_SCALE: u64 = 50;

/// Returns a new model with Borda-like ratings synthesized from rankings.
///
/// The first rank group is rated at the candidate count, each following
/// group one less, bottoming out at 1; unranked candidates stay unrated.
/// The input model is left untouched so that the other tally methods keep
/// working on the unaugmented ballots. A model that already carries ratings
/// is returned as-is.
pub fn augment_with_synthesized_ratings(model: &ElectionModel) -> ElectionModel {
    let mut out = model.clone();
    if model.has_ratings() {
        return out;
    }
    let span = model.candidate_count() as u64;
    for ballot in &mut out.ballots {
        for (depth, group) in ballot.ranks.iter().enumerate() {
            let rating = span.saturating_sub(depth as u64).max(1);
            for t in group {
                ballot.ratings.entry(t.clone()).or_insert(rating);
            }
        }
    }
    out.metadata.ratings_synthesized = true;
    if out.metadata.max_rating.is_none() {
        out.metadata.max_rating = Some(span);
    }
    out
}

/// The automatic-runoff leg of a STAR election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunoffTally {
    /// The two finalists, scoring-round order.
    pub finalists: (String, String),
    /// Ballot weight preferring each finalist, same order as `finalists`.
    pub prefer: (u64, u64),
    /// Ballot weight rating both finalists equally.
    pub no_preference: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoreResult {
    /// Score totals per candidate, declaration order.
    pub totals: Vec<(String, u64)>,
    /// Candidates by descending total, stable on declaration order.
    pub ranklist: Vec<String>,
    pub runoff: Option<RunoffTally>,
    pub winners: Vec<String>,
    pub notices: Vec<Notice>,
}

/// Runs a STAR election: a scoring round summing ratings, then an automatic
/// runoff between the two highest-scoring candidates decided by how many
/// ballots rate one above the other.
pub fn star_tally(model: &ElectionModel) -> Result<ScoreResult, TallyError> {
    if model.candidate_count() == 0 {
        return Err(TallyError::EmptyElection);
    }
    if !model.has_ratings() && !model.ballots.is_empty() {
        return Err(TallyError::NoRatings);
    }

    let totals: Vec<(String, u64)> = model
        .candidates()
        .iter()
        .map(|c| {
            let total = model
                .ballots
                .iter()
                .map(|b| b.count * b.ratings.get(&c.token).copied().unwrap_or(0))
                .sum();
            (c.token.clone(), total)
        })
        .collect();

    let mut ranked = totals.clone();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let ranklist: Vec<String> = ranked.iter().map(|(t, _)| t.clone()).collect();

    let mut notices = Vec::new();
    if model.metadata.ratings_synthesized {
        notices.push(Notice::info(
            "Stars estimated from rankings",
            "Since ratings or stars are not present in the provided ballots, \
             allocated stars are estimated using a Borda-like formula."
                .to_string(),
        ));
    }

    if ranklist.len() < 2 {
        return Ok(ScoreResult {
            totals,
            winners: ranklist.clone(),
            ranklist,
            runoff: None,
            notices,
        });
    }

    let a = ranklist[0].clone();
    let b = ranklist[1].clone();
    let mut prefer_a: u64 = 0;
    let mut prefer_b: u64 = 0;
    let mut no_preference: u64 = 0;
    for ballot in &model.ballots {
        let ra = ballot.ratings.get(&a).copied().unwrap_or(0);
        let rb = ballot.ratings.get(&b).copied().unwrap_or(0);
        if ra > rb {
            prefer_a += ballot.count;
        } else if rb > ra {
            prefer_b += ballot.count;
        } else {
            no_preference += ballot.count;
        }
    }
    debug!(
        "star_tally: runoff {} vs {}: {} / {} ({} no preference)",
        a, b, prefer_a, prefer_b, no_preference
    );

    let winners = if prefer_a > prefer_b {
        vec![a.clone()]
    } else if prefer_b > prefer_a {
        vec![b.clone()]
    } else {
        notices.push(Notice::warning(
            "Automatic runoff tie",
            format!(
                "The automatic runoff between {} and {} ended with no \
                 preference majority; both are declared co-winners.",
                a, b
            ),
        ));
        vec![a.clone(), b.clone()]
    };

    Ok(ScoreResult {
        totals,
        ranklist,
        runoff: Some(RunoffTally {
            finalists: (a, b),
            prefer: (prefer_a, prefer_b),
            no_preference,
        }),
        winners,
        notices,
    })
}

/// One candidate's score scaled for display.
#[derive(PartialEq, Debug, Clone)]
pub struct ScaledScore {
    pub token: String,
    pub score: u64,
    pub scaled_score: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScaledScores {
    /// Per-candidate scaled scores, declaration order.
    pub rows: Vec<ScaledScore>,
    pub total_all_scores: u64,
    pub scaled_total: f64,
    pub target_scale: u64,
}

/// Scales score totals so that they sum to roughly `target_scale`, for
/// fixed-width star diagrams. Zero totals scale to zero rather than failing.
pub fn scaled_scores(
    model: &ElectionModel,
    target_scale: u64,
) -> Result<ScaledScores, TallyError> {
    let star = star_tally(model)?;
    let total_all_scores: u64 = star.totals.iter().map(|(_, n)| *n).sum();
    let factor = if total_all_scores == 0 {
        0.0
    } else {
        target_scale as f64 / total_all_scores as f64
    };
    let rows: Vec<ScaledScore> = star
        .totals
        .iter()
        .map(|(t, n)| ScaledScore {
            token: t.clone(),
            score: *n,
            scaled_score: *n as f64 * factor,
        })
        .collect();
    let scaled_total: f64 = rows.iter().map(|r| r.scaled_score).sum();
    Ok(ScaledScores {
        rows,
        total_all_scores,
        scaled_total,
        target_scale,
    })
}
