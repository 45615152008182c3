//! The result-aggregation engine.
//!
//! A [`ResultConduit`] binds one parsed election model to a [`ResultBundle`]
//! and accumulates the output of each voting-method tally into it. Every
//! route and the preview renderer read the same bundle, so a candidate keeps
//! one ordering and one color across all of them.

use crate::colors;
use abif_tally::{
    approval_tally, fptp_tally, irv_tally_with, pairwise_tally, scaled_scores, star_tally,
    victory_summary, ApprovalResult, ElectionModel, FptpResult, IrvOptions, IrvTally, Notice,
    PairwiseResult, ScaledScores, ScoreResult, TallyError, DEFAULT_TARGET_SCALE,
};
use log::{debug, warn};
use std::collections::BTreeMap;

/// The five supported tally methods, keyed for notice and error maps.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
pub enum Method {
    Fptp,
    Irv,
    Pairwise,
    Star,
    Approval,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Fptp,
        Method::Irv,
        Method::Pairwise,
        Method::Star,
        Method::Approval,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Method::Fptp => "fptp",
            Method::Irv => "irv",
            Method::Pairwise => "pairwise",
            Method::Star => "star",
            Method::Approval => "approval",
        }
    }

    pub fn from_key(key: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.key() == key)
    }
}

/// STAR display row: score, display-scaled score and the candidate's color.
#[derive(PartialEq, Debug, Clone)]
pub struct StarRow {
    pub token: String,
    pub name: String,
    pub score: u64,
    pub scaled: u64,
    pub color: String,
}

/// The STAR result together with its display scaling and caveats.
#[derive(PartialEq, Debug, Clone)]
pub struct StarSummary {
    pub result: ScoreResult,
    pub scaled: ScaledScores,
    /// Rows in scoring-round order, annotated with colors for rendering.
    pub rows: Vec<StarRow>,
    /// Ratio between raw and scaled score totals, 0.0 when nothing scored.
    pub star_ratio: f64,
    /// Set when the displayed stars are estimates rather than cast ratings.
    pub caveat: Option<String>,
}

/// The per-render aggregate of everything the presentation layer needs.
///
/// A bundle is created fresh per render, owned by that render, and never
/// shared or cached. Each method slot is written at most once per update
/// call; re-invoking an adapter overwrites the slot deterministically. All
/// fields are plain values (no sets), ready for serialization.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ResultBundle {
    pub fptp: Option<FptpResult>,
    pub irv: Option<IrvTally>,
    pub pairwise: Option<PairwiseResult>,
    /// Rendered win/loss/tie summary of the pairwise matrix.
    pub pairwise_summary: Option<String>,
    pub star: Option<StarSummary>,
    pub approval: Option<ApprovalResult>,

    /// Copeland winners derived from the bundled pairwise matrix.
    pub copeland_winners: Vec<String>,
    pub copewinner_string: String,
    /// True iff more than one candidate shares the top Copeland win count.
    pub is_copeland_tie: bool,

    /// One candidate ordering shared by every method's presentation.
    pub canonical_order: Vec<String>,
    /// Token to hex color, derived from `canonical_order`.
    pub color_map: BTreeMap<String, String>,

    /// Structured notices filed per method key. An empty list is the
    /// defined no-anomaly state for a method that ran.
    pub notices: BTreeMap<&'static str, Vec<Notice>>,
    /// Method-specific failures: the method's result is absent and the
    /// error message recorded here, other methods are unaffected.
    pub method_errors: BTreeMap<&'static str, String>,
    /// Bundle-level error: set when parsing failed and no adapter ran.
    pub error: Option<String>,
}

impl ResultBundle {
    /// The bundle for an input that failed to parse: an error payload and
    /// no method results.
    pub fn parse_failure(message: impl Into<String>) -> ResultBundle {
        ResultBundle {
            error: Some(message.into()),
            ..ResultBundle::default()
        }
    }
}

/// Accumulates tally results for one election model into a bundle.
///
/// Update calls chain and may run in any order or subset; each one catches
/// its own method's failure, so one broken method never blocks the others.
#[derive(Debug, Clone)]
pub struct ResultConduit {
    model: ElectionModel,
    pub bundle: ResultBundle,
}

impl ResultConduit {
    /// Binds a conduit to a model and computes the shared candidate
    /// ordering and color assignment up front.
    pub fn new(model: ElectionModel) -> ResultConduit {
        let canonical_order = canonical_candidate_order(&model);
        let color_map = colors::candidate_colors(&canonical_order);
        ResultConduit {
            model,
            bundle: ResultBundle {
                canonical_order,
                color_map,
                ..ResultBundle::default()
            },
        }
    }

    pub fn model(&self) -> &ElectionModel {
        &self.model
    }

    pub fn into_parts(self) -> (ElectionModel, ResultBundle) {
        (self.model, self.bundle)
    }

    /// Files a method's notices under its key, replacing any earlier list
    /// for that method. Notices are never mutated after filing.
    fn file_notices(&mut self, method: Method, notices: Vec<Notice>) {
        self.bundle.notices.insert(method.key(), notices);
    }

    fn record_failure(&mut self, method: Method, err: &TallyError) {
        warn!("{} tally failed: {}", method.key(), err);
        self.bundle.method_errors.insert(method.key(), err.to_string());
    }

    pub fn update_fptp(&mut self) -> &mut Self {
        match fptp_tally(&self.model) {
            Ok(res) => {
                self.file_notices(Method::Fptp, res.notices.clone());
                self.bundle.fptp = Some(res);
            }
            Err(e) => self.record_failure(Method::Fptp, &e),
        }
        self
    }

    /// Runs IRV, preferring extended diagnostics when asked for. An engine
    /// that does not implement the requested option is detected through the
    /// typed [`TallyError::UnsupportedOption`] and retried with defaults
    /// instead of failing the render.
    pub fn update_irv(&mut self, include_extra: bool) -> &mut Self {
        let wanted = IrvOptions {
            include_extra,
            ..IrvOptions::default()
        };
        let res = match irv_tally_with(&self.model, &wanted) {
            Err(TallyError::UnsupportedOption { option }) => {
                warn!(
                    "IRV engine does not support {}; retrying with defaults",
                    option
                );
                irv_tally_with(&self.model, &IrvOptions::default())
            }
            other => other,
        };
        match res {
            Ok(tally) => {
                let notices = irv_tie_notices(&self.model, &tally);
                self.file_notices(Method::Irv, notices);
                self.bundle.irv = Some(tally);
            }
            Err(e) => self.record_failure(Method::Irv, &e),
        }
        self
    }

    /// Runs the pairwise tally and derives the Copeland fields from the
    /// same matrix the result carries, never from a recomputed one.
    pub fn update_pairwise(&mut self) -> &mut Self {
        match pairwise_tally(&self.model) {
            Ok(res) => {
                self.bundle.copeland_winners = res.winners.clone();
                self.bundle.copewinner_string = res
                    .winners
                    .iter()
                    .map(|t| self.model.display_name(t).to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                self.bundle.is_copeland_tie = res.winners.len() > 1;
                self.bundle.pairwise_summary = Some(victory_summary(&self.model, &res));
                self.file_notices(Method::Pairwise, res.notices.clone());
                self.bundle.pairwise = Some(res);
            }
            Err(e) => self.record_failure(Method::Pairwise, &e),
        }
        self
    }

    /// Runs STAR over a ratings-carrying view of the election. The caller
    /// supplies the augmented model when ratings had to be synthesized; the
    /// conduit's own model stays unaugmented for the other methods.
    pub fn update_star(&mut self, rated: &ElectionModel) -> &mut Self {
        let star = star_tally(rated).and_then(|result| {
            scaled_scores(rated, DEFAULT_TARGET_SCALE).map(|scaled| (result, scaled))
        });
        match star {
            Ok((result, scaled)) => {
                let rows = self.star_rows(&result, &scaled);
                let star_ratio = if scaled.scaled_total == 0.0 {
                    0.0
                } else {
                    (scaled.total_all_scores as f64 / scaled.scaled_total).round()
                };
                let caveat = if rated.metadata.ratings_synthesized {
                    Some(
                        "NOTE: Since ratings or stars are not present in the provided \
                         ballots, allocated stars are estimated using a Borda-like formula."
                            .to_string(),
                    )
                } else {
                    None
                };
                self.file_notices(Method::Star, result.notices.clone());
                self.bundle.star = Some(StarSummary {
                    rows,
                    star_ratio,
                    caveat,
                    result,
                    scaled,
                });
            }
            Err(e) => self.record_failure(Method::Star, &e),
        }
        self
    }

    fn star_rows(&self, result: &ScoreResult, scaled: &ScaledScores) -> Vec<StarRow> {
        result
            .ranklist
            .iter()
            .map(|token| {
                let row = scaled.rows.iter().find(|r| &r.token == token);
                StarRow {
                    token: token.clone(),
                    name: self.model.display_name(token).to_string(),
                    score: row.map(|r| r.score).unwrap_or(0),
                    scaled: row.map(|r| r.scaled_score.round() as u64).unwrap_or(0),
                    color: self
                        .bundle
                        .color_map
                        .get(token)
                        .cloned()
                        .unwrap_or_else(|| "#cccccc".to_string()),
                }
            })
            .collect()
    }

    pub fn update_approval(&mut self) -> &mut Self {
        match approval_tally(&self.model) {
            Ok(res) => {
                self.file_notices(Method::Approval, res.notices.clone());
                self.bundle.approval = Some(res);
            }
            Err(e) => self.record_failure(Method::Approval, &e),
        }
        self
    }

    /// Runs one method by name, synthesizing ratings for STAR when the
    /// model has none.
    pub fn update_method(&mut self, method: Method, include_irv_extra: bool) -> &mut Self {
        match method {
            Method::Fptp => self.update_fptp(),
            Method::Irv => self.update_irv(include_irv_extra),
            Method::Pairwise => self.update_pairwise(),
            Method::Star => {
                let rated = self.rated_view();
                self.update_star(&rated)
            }
            Method::Approval => self.update_approval(),
        }
    }

    /// Runs all five methods.
    pub fn update_all(&mut self, include_irv_extra: bool) -> &mut Self {
        for method in Method::ALL {
            self.update_method(method, include_irv_extra);
        }
        self
    }

    /// The model to feed STAR: the conduit's own model when it carries
    /// ratings, otherwise a synthesized-ratings copy.
    fn rated_view(&self) -> ElectionModel {
        if self.model.has_ratings() {
            self.model.clone()
        } else {
            debug!("synthesizing ratings for the STAR tally");
            abif_tally::augment_with_synthesized_ratings(&self.model)
        }
    }
}

/// The shared candidate ordering: first-choice totals descending, ties kept
/// in declaration order, falling back to case-insensitive alphabetical
/// tokens when no totals are available. Never fails; a tally error is
/// treated as "no totals".
pub fn canonical_candidate_order(model: &ElectionModel) -> Vec<String> {
    match fptp_tally(model) {
        Ok(res) if !res.toppicks.is_empty() => {
            let mut picks = res.toppicks;
            picks.sort_by(|a, b| b.1.cmp(&a.1));
            picks.into_iter().map(|(token, _)| token).collect()
        }
        _ => {
            let mut tokens = model.candidate_tokens();
            tokens.sort_by_key(|t| t.to_lowercase());
            tokens
        }
    }
}

/// Builds human-readable tie-break notices from IRV round metadata.
///
/// An election without ties yields an empty list, the defined no-tie
/// state, not an absence.
pub fn irv_tie_notices(model: &ElectionModel, irv: &IrvTally) -> Vec<Notice> {
    let mut notices = Vec::new();
    if !irv.has_tie {
        return notices;
    }
    for round in &irv.rounds {
        if !round.tiebreak || round.tied.len() < 2 {
            continue;
        }
        let tied_names: Vec<String> = round
            .tied
            .iter()
            .map(|t| model.display_name(t).to_string())
            .collect();
        let eliminated_names: Vec<String> = round
            .eliminated
            .iter()
            .filter(|t| round.tied.contains(t))
            .map(|t| model.display_name(t).to_string())
            .collect();
        let tied_list = tied_names.join(" and ");

        let long = if !eliminated_names.is_empty() {
            format!(
                "In Round {}, {} were tied with exactly {} votes each for fewest \
                 votes. IRV rules require eliminating the candidate(s) with fewest \
                 votes. This result used simulated random selection, eliminating {}. \
                 In a real election, this would be resolved by lot drawing or other \
                 official tiebreaker procedure.",
                round.round,
                tied_list,
                round.bottom_votes,
                eliminated_names.join(" and ")
            )
        } else {
            format!(
                "In Round {}, {} were tied with exactly {} votes each in the final \
                 round. Since this is a tie for the most votes in the final round, \
                 both candidates are declared IRV winners. In a real election, this \
                 might be resolved by lot drawing or other official tiebreaker \
                 procedure depending on jurisdiction.",
                round.round, tied_list, round.bottom_votes
            )
        };
        notices.push(Notice::warning(
            format!("Round {} tiebreaker used", round.round),
            long,
        ));
    }
    notices
}
