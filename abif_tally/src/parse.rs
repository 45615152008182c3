// ********* ABIF text parser ***********

use crate::model::{Ballot, ElectionModel};
use crate::score::augment_with_synthesized_ratings;
use crate::AbifError;
use log::debug;
use serde_json::Value as JSValue;

/// Options accepted by [`parse`].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Tolerate stray whitespace around tokens and separators.
    pub clean_whitespace: bool,
    /// Synthesize Borda-like ratings when the ballots carry none, and mark
    /// the model accordingly.
    pub synthesize_ratings: bool,
}

/// Parses ABIF text into an [`ElectionModel`].
///
/// The recognized lines are:
/// * `# ...` comments (also allowed at the end of non-metadata lines),
/// * `{"title": "..."}` JSON metadata,
/// * `=tok:[Display Name]` candidate declarations,
/// * `42:A/5>B/3=C/3>D` votelines: a weight, then preference groups separated
///   by `>`, equal ranks joined with `=`, each entry an optional `[bracketed]`
///   token with an optional `/rating`.
pub fn parse(text: &str, options: &ParseOptions) -> Result<ElectionModel, AbifError> {
    let mut model = ElectionModel::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('{') {
            parse_metadata_line(line, lineno, &mut model)?;
            continue;
        }
        let line = strip_inline_comment(line).trim_end();
        if let Some(rest) = line.strip_prefix('=') {
            parse_candidate_line(rest, lineno, &mut model)?;
        } else {
            parse_voteline(line, lineno, options, &mut model)?;
        }
    }

    if model.candidate_count() == 0 && model.ballots.is_empty() {
        return Err(AbifError::EmptyInput);
    }
    debug!(
        "parse: {} candidates, {} votelines, {} ballots",
        model.candidate_count(),
        model.ballots.len(),
        model.total_ballots()
    );

    if options.synthesize_ratings && !model.has_ratings() && !model.ballots.is_empty() {
        model = augment_with_synthesized_ratings(&model);
    }
    Ok(model)
}

fn parse_metadata_line(
    line: &str,
    lineno: usize,
    model: &mut ElectionModel,
) -> Result<(), AbifError> {
    let value: JSValue = serde_json::from_str(line).map_err(|e| AbifError::Metadata {
        line: lineno,
        message: e.to_string(),
    })?;
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            return Err(AbifError::Metadata {
                line: lineno,
                message: "expected a JSON object".to_string(),
            })
        }
    };
    for (key, val) in obj {
        match key.as_str() {
            "title" => model.metadata.title = val.as_str().map(|s| s.to_string()),
            "description" => model.metadata.description = val.as_str().map(|s| s.to_string()),
            "max_rating" => model.metadata.max_rating = val.as_u64(),
            _ => {
                let rendered = match val.as_str() {
                    Some(s) => s.to_string(),
                    None => val.to_string(),
                };
                model.metadata.extra.insert(key.clone(), rendered);
            }
        }
    }
    Ok(())
}

fn parse_candidate_line(
    rest: &str,
    lineno: usize,
    model: &mut ElectionModel,
) -> Result<(), AbifError> {
    let (token, name_part) = rest.split_once(':').ok_or_else(|| AbifError::CandidateDecl {
        line: lineno,
        message: "expected '=token:[Display Name]'".to_string(),
    })?;
    let token = token.trim();
    let name_part = name_part.trim();
    if token.is_empty() {
        return Err(AbifError::CandidateDecl {
            line: lineno,
            message: "empty candidate token".to_string(),
        });
    }
    let name = name_part
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| AbifError::CandidateDecl {
            line: lineno,
            message: format!("display name must be bracketed, got {:?}", name_part),
        })?;
    model.declare_candidate(token, name);
    Ok(())
}

fn parse_voteline(
    line: &str,
    lineno: usize,
    options: &ParseOptions,
    model: &mut ElectionModel,
) -> Result<(), AbifError> {
    let (count_part, prefs_part) = line.split_once(':').ok_or_else(|| AbifError::Voteline {
        line: lineno,
        message: "expected 'count:preferences'".to_string(),
    })?;
    let count: u64 = count_part
        .trim()
        .parse()
        .map_err(|_| AbifError::Voteline {
            line: lineno,
            message: format!("bad ballot count {:?}", count_part.trim()),
        })?;
    if count == 0 {
        return Err(AbifError::Voteline {
            line: lineno,
            message: "ballot count must be at least 1".to_string(),
        });
    }

    let mut ballot = Ballot {
        count,
        ..Ballot::default()
    };
    for group_part in split_outside_brackets(prefs_part, '>') {
        let mut group: Vec<String> = Vec::new();
        for entry in split_outside_brackets(group_part, '=') {
            let entry = if options.clean_whitespace {
                entry.trim()
            } else {
                entry
            };
            let (token, rating) = parse_pref_entry(entry, lineno, options)?;
            if let Some(r) = rating {
                ballot.ratings.insert(token.clone(), r);
            }
            model.ensure_candidate(&token);
            group.push(token);
        }
        if !group.is_empty() {
            ballot.ranks.push(group);
        }
    }
    if ballot.ranks.is_empty() {
        return Err(AbifError::Voteline {
            line: lineno,
            message: "voteline names no candidates".to_string(),
        });
    }
    model.push_ballot(ballot);
    Ok(())
}

/// Parses one preference entry: `Tok`, `Tok/5`, `[Long Name]` or `[Long Name]/5`.
fn parse_pref_entry(
    entry: &str,
    lineno: usize,
    options: &ParseOptions,
) -> Result<(String, Option<u64>), AbifError> {
    let (token_part, rating_part) = match entry.strip_prefix('[') {
        Some(inner) => {
            let close = inner.find(']').ok_or_else(|| AbifError::Voteline {
                line: lineno,
                message: format!("unclosed bracket in {:?}", entry),
            })?;
            let after = inner[close + 1..].trim_start();
            let rating = after.strip_prefix('/');
            (&inner[..close], rating)
        }
        None => match entry.split_once('/') {
            Some((tok, rating)) => (tok, Some(rating)),
            None => (entry, None),
        },
    };
    let token = if options.clean_whitespace {
        token_part.trim()
    } else {
        token_part
    };
    if token.is_empty() || (!options.clean_whitespace && token.contains(char::is_whitespace)) {
        return Err(AbifError::Voteline {
            line: lineno,
            message: format!("bad candidate token in {:?}", entry),
        });
    }
    let rating = match rating_part {
        Some(r) => Some(r.trim().parse::<u64>().map_err(|_| AbifError::Voteline {
            line: lineno,
            message: format!("bad rating {:?}", r.trim()),
        })?),
        None => None,
    };
    Ok((token.to_string(), rating))
}

/// Splits on a separator, ignoring separators inside `[...]`.
fn split_outside_brackets(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Removes a trailing `# ...` comment, ignoring `#` inside brackets.
fn strip_inline_comment(s: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '#' if depth == 0 => return &s[..i],
            _ => {}
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AbifError;

    pub const TENNESSEE: &str = "\
# Tennessee capitol example
{\"title\": \"Tennessee capitol example\"}
=Memph:[Memphis, TN]
=Nash:[Nashville, TN]
=Chat:[Chattanooga, TN]
=Knox:[Knoxville, TN]
42:Memph/400>Nash/200>Chat/133>Knox/45
26:Nash/400>Chat/290>Knox/240>Memph/200
15:Chat/400>Knox/296>Nash/290>Memph/133
17:Knox/400>Chat/296>Nash/240>Memph/45
";

    #[test]
    fn parses_tennessee_example() {
        let model = parse(TENNESSEE, &ParseOptions::default()).unwrap();
        assert_eq!(model.candidate_tokens(), vec!["Memph", "Nash", "Chat", "Knox"]);
        assert_eq!(model.display_name("Nash"), "Nashville, TN");
        assert_eq!(model.total_ballots(), 100);
        assert!(model.has_ratings());
        assert!(!model.metadata.ratings_synthesized);
        assert_eq!(
            model.metadata.title.as_deref(),
            Some("Tennessee capitol example")
        );
        assert_eq!(model.ballots[0].ratings["Memph"], 400);
    }

    #[test]
    fn equal_ranks_share_a_group() {
        let model = parse("3:A>B=C>D\n", &ParseOptions::default()).unwrap();
        assert_eq!(model.ballots[0].ranks[1], vec!["B", "C"]);
        assert_eq!(model.candidate_count(), 4);
    }

    #[test]
    fn bracketed_tokens_can_hold_separators() {
        let model = parse("1:[Ready > Set]>B\n", &ParseOptions::default()).unwrap();
        assert_eq!(model.ballots[0].ranks[0], vec!["Ready > Set"]);
    }

    #[test]
    fn inline_comments_are_ignored() {
        let model = parse("2:A>B # the usual split\n", &ParseOptions::default()).unwrap();
        assert_eq!(model.total_ballots(), 2);
        assert_eq!(model.candidate_count(), 2);
    }

    #[test]
    fn bad_voteline_reports_line_number() {
        let err = parse("1:A>B\noops\n", &ParseOptions::default()).unwrap_err();
        match err {
            AbifError::Voteline { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = parse("0:A>B\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, AbifError::Voteline { line: 1, .. }));
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = parse("# nothing here\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(err, AbifError::EmptyInput);
    }

    #[test]
    fn synthesize_option_marks_the_model() {
        let opts = ParseOptions {
            clean_whitespace: true,
            synthesize_ratings: true,
        };
        let model = parse("2:A>B>C\n1:C>B>A\n", &opts).unwrap();
        assert!(model.has_ratings());
        assert!(model.metadata.ratings_synthesized);
        // Ranked-only input with the option off stays rating-free.
        let plain = parse("2:A>B>C\n", &ParseOptions::default()).unwrap();
        assert!(!plain.has_ratings());
    }

    #[test]
    fn whitespace_is_tolerated_with_cleanws() {
        let opts = ParseOptions {
            clean_whitespace: true,
            ..ParseOptions::default()
        };
        let model = parse("2: A > B = C\n", &opts).unwrap();
        assert_eq!(model.ballots[0].ranks[0], vec!["A"]);
        assert_eq!(model.ballots[0].ranks[1], vec!["B", "C"]);
    }
}
