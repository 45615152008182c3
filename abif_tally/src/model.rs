// ********* The parsed election model ***********

use std::collections::HashMap;

/// A declared candidate: a short token used on votelines and a display name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub token: String,
    pub name: String,
}

/// One voteline: a weight and the voter's expression.
///
/// `ranks` holds preference groups from most to least preferred; a group with
/// more than one token records an equal ranking. `ratings` is empty unless the
/// ballots carry explicit ratings or ratings were synthesized from rankings.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Ballot {
    pub count: u64,
    pub ranks: Vec<Vec<String>>,
    pub ratings: HashMap<String, u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// True when ratings were synthesized from rankings rather than cast.
    pub ratings_synthesized: bool,
    /// Declared rating ceiling, when the input provides one.
    pub max_rating: Option<u64>,
    /// Remaining metadata fields, kept as strings.
    pub extra: HashMap<String, String>,
}

/// The in-memory election: candidates in declaration order, ballots and
/// metadata. Consumed read-only by all the tally functions.
///
/// Invariant: every token referenced by a ballot exists in the candidate
/// mapping. The parser maintains this by registering bare tokens on sight.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ElectionModel {
    candidates: Vec<Candidate>,
    index: HashMap<String, usize>,
    pub ballots: Vec<Ballot>,
    pub metadata: Metadata,
}

impl ElectionModel {
    pub fn new() -> ElectionModel {
        ElectionModel::default()
    }

    /// Declares a candidate with a display name. Re-declaring an existing
    /// token updates the name and keeps the original declaration position.
    pub fn declare_candidate(&mut self, token: &str, name: &str) {
        match self.index.get(token) {
            Some(&idx) => {
                self.candidates[idx].name = name.to_string();
            }
            None => {
                self.index.insert(token.to_string(), self.candidates.len());
                self.candidates.push(Candidate {
                    token: token.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    /// Registers a token seen on a voteline, using the token itself as the
    /// display name when the candidate was never declared.
    pub fn ensure_candidate(&mut self, token: &str) {
        if !self.index.contains_key(token) {
            self.declare_candidate(token, token);
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn candidate_tokens(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.token.clone()).collect()
    }

    /// The display name for a token, falling back to the token itself when
    /// it does not resolve.
    pub fn display_name<'a>(&'a self, token: &'a str) -> &'a str {
        match self.index.get(token) {
            Some(&idx) => self.candidates[idx].name.as_str(),
            None => token,
        }
    }

    /// Declaration position of a token. Unknown tokens sort last.
    pub fn declaration_index(&self, token: &str) -> usize {
        self.index.get(token).copied().unwrap_or(usize::MAX)
    }

    pub fn push_ballot(&mut self, ballot: Ballot) {
        self.ballots.push(ballot);
    }

    /// Total ballot weight across all votelines.
    pub fn total_ballots(&self) -> u64 {
        self.ballots.iter().map(|b| b.count).sum()
    }

    pub fn has_ratings(&self) -> bool {
        self.ballots.iter().any(|b| !b.ratings.is_empty())
    }

    /// The rating ceiling: the declared `max_rating` when present, otherwise
    /// the highest rating observed on any ballot.
    pub fn max_rating(&self) -> u64 {
        if let Some(m) = self.metadata.max_rating {
            return m;
        }
        self.ballots
            .iter()
            .flat_map(|b| b.ratings.values())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_is_kept() {
        let mut model = ElectionModel::new();
        model.declare_candidate("B", "Bob");
        model.declare_candidate("A", "Alice");
        model.ensure_candidate("B");
        assert_eq!(model.candidate_tokens(), vec!["B", "A"]);
        assert_eq!(model.declaration_index("B"), 0);
        assert_eq!(model.declaration_index("A"), 1);
    }

    #[test]
    fn display_name_falls_back_to_token() {
        let mut model = ElectionModel::new();
        model.declare_candidate("A", "Alice");
        assert_eq!(model.display_name("A"), "Alice");
        assert_eq!(model.display_name("Z"), "Z");
    }

    #[test]
    fn redeclaring_updates_name_in_place() {
        let mut model = ElectionModel::new();
        model.ensure_candidate("A");
        assert_eq!(model.display_name("A"), "A");
        model.declare_candidate("A", "Alice");
        assert_eq!(model.display_name("A"), "Alice");
        assert_eq!(model.candidate_count(), 1);
    }

    #[test]
    fn max_rating_prefers_metadata() {
        let mut model = ElectionModel::new();
        model.ensure_candidate("A");
        let mut ballot = Ballot {
            count: 1,
            ranks: vec![vec!["A".to_string()]],
            ratings: HashMap::new(),
        };
        ballot.ratings.insert("A".to_string(), 3);
        model.push_ballot(ballot);
        assert_eq!(model.max_rating(), 3);
        model.metadata.max_rating = Some(5);
        assert_eq!(model.max_rating(), 5);
    }
}
