//! JSON summary assembly and the command-line entry point.

use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fmt::Write as _;
use std::fs;
use std::io::Read as _;

use serde::Serialize;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::conduit::{Method, ResultBundle, ResultConduit};
use abif_tally::{parse, ElectionModel, Notice, ParseOptions};

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error reading input file {path}"))]
    ReadingInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading standard input"))]
    ReadingStdin { source: std::io::Error },
    #[snafu(display("Error writing output file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading reference file {path}"))]
    ReadingReference {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Unknown method {name} (expected fptp, irv, pairwise, star or approval)"))]
    UnknownMethod { name: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

/// The election header of the summary: title, ballot weight and the
/// candidates in canonical order with their assigned colors.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
struct ElectionInfo {
    title: Option<String>,
    ballots: String,
    candidates: Vec<CandidateInfo>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
struct CandidateInfo {
    token: String,
    name: String,
    color: Option<String>,
}

fn read_input(args: &Args) -> AppResult<String> {
    match &args.input {
        Some(path) => fs::read_to_string(path).context(ReadingInputSnafu { path: path.clone() }),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context(ReadingStdinSnafu {})?;
            Ok(buf)
        }
    }
}

fn selected_methods(args: &Args) -> AppResult<Vec<Method>> {
    if args.methods.is_empty() {
        return Ok(Method::ALL.to_vec());
    }
    args.methods
        .iter()
        .map(|name| Method::from_key(name).context(UnknownMethodSnafu { name: name.clone() }))
        .collect()
}

fn counts_to_json(counts: &[(String, u64)]) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (token, count) in counts {
        m.insert(token.clone(), json!(count.to_string()));
    }
    JSValue::Object(m)
}

fn notices_to_json(notices: &[Notice]) -> JSValue {
    let l: Vec<JSValue> = notices
        .iter()
        .map(|n| {
            json!({
                "notice_type": n.kind.as_str(),
                "short": n.short,
                "long": n.long,
            })
        })
        .collect();
    json!(l)
}

fn irv_rounds_to_json(bundle: &ResultBundle) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    let irv = match &bundle.irv {
        Some(x) => x,
        None => return l,
    };
    for round_stat in &irv.rounds {
        let mut tally_results: Vec<JSValue> = Vec::new();
        for loser in &round_stat.eliminated {
            let mut transfers: JSMap<String, JSValue> = JSMap::new();
            for (from, to, count) in &round_stat.transfers {
                if from != loser {
                    continue;
                }
                let key = match to {
                    Some(t) => t.clone(),
                    None => "exhausted".to_string(),
                };
                transfers.insert(key, json!(count.to_string()));
            }
            tally_results.push(json!({
                "eliminated": loser,
                "transfers": transfers
            }));
        }
        l.push(json!({
            "round": round_stat.round,
            "tally": counts_to_json(&round_stat.tally),
            "tallyResults": tally_results,
            "exhausted": round_stat.exhausted.to_string(),
        }));
    }
    l
}

fn pairwise_to_json(model: &ElectionModel, bundle: &ResultBundle) -> JSValue {
    let pairwise = match &bundle.pairwise {
        Some(x) => x,
        None => return JSValue::Null,
    };
    let mut matrix: JSMap<String, JSValue> = JSMap::new();
    for a in pairwise.matrix.candidates() {
        let mut row: JSMap<String, JSValue> = JSMap::new();
        for b in pairwise.matrix.candidates() {
            if a == b {
                continue;
            }
            row.insert(b.clone(), json!(pairwise.matrix.preferring(a, b).to_string()));
        }
        matrix.insert(a.clone(), JSValue::Object(row));
    }
    let copeland: Vec<JSValue> = pairwise
        .copeland
        .iter()
        .map(|r| {
            json!({
                "candidate": r.token,
                "name": model.display_name(&r.token),
                "wins": r.wins,
                "ties": r.ties,
                "losses": r.losses,
            })
        })
        .collect();
    json!({
        "matrix": matrix,
        "copeland": copeland,
        "winners": pairwise.winners,
        "copelandTie": bundle.is_copeland_tie,
        "copewinnerString": bundle.copewinner_string,
        "summary": bundle.pairwise_summary,
    })
}

fn star_to_json(bundle: &ResultBundle) -> JSValue {
    let star = match &bundle.star {
        Some(x) => x,
        None => return JSValue::Null,
    };
    let rows: Vec<JSValue> = star
        .rows
        .iter()
        .map(|r| {
            json!({
                "candidate": r.token,
                "name": r.name,
                "score": r.score.to_string(),
                "scaledScore": r.scaled.to_string(),
                "color": r.color,
            })
        })
        .collect();
    let runoff = star.result.runoff.as_ref().map(|r| {
        json!({
            "finalists": [r.finalists.0, r.finalists.1],
            "prefer": [r.prefer.0.to_string(), r.prefer.1.to_string()],
            "noPreference": r.no_preference.to_string(),
        })
    });
    json!({
        "totals": counts_to_json(&star.result.totals),
        "rows": rows,
        "runoff": runoff,
        "winners": star.result.winners,
        "starRatio": star.star_ratio,
        "caveat": star.caveat,
    })
}

/// Assembles the whole bundle into one JSON summary.
pub fn summary_js(model: &ElectionModel, bundle: &ResultBundle) -> JSValue {
    let election = ElectionInfo {
        title: model.metadata.title.clone(),
        ballots: model.total_ballots().to_string(),
        candidates: bundle
            .canonical_order
            .iter()
            .map(|token| CandidateInfo {
                token: token.clone(),
                name: model.display_name(token).to_string(),
                color: bundle.color_map.get(token).cloned(),
            })
            .collect(),
    };

    let mut results: JSMap<String, JSValue> = JSMap::new();
    if let Some(fptp) = &bundle.fptp {
        results.insert(
            Method::Fptp.key().to_string(),
            json!({
                "toppicks": counts_to_json(&fptp.toppicks),
                "winners": fptp.winners,
                "countable": fptp.total_countable.to_string(),
            }),
        );
    }
    if let Some(irv) = &bundle.irv {
        let final_percentages: Vec<JSValue> = irv
            .final_percentages
            .iter()
            .map(|(t, pct)| json!({ "candidate": t, "percent": format!("{:.2}", pct) }))
            .collect();
        results.insert(
            Method::Irv.key().to_string(),
            json!({
                "winners": irv.winners,
                "hasTie": irv.has_tie,
                "threshold": irv.threshold.to_string(),
                "rounds": irv_rounds_to_json(bundle),
                "finalTally": counts_to_json(&irv.final_tally),
                "finalPercentages": final_percentages,
            }),
        );
    }
    let pairwise = pairwise_to_json(model, bundle);
    if !pairwise.is_null() {
        results.insert(Method::Pairwise.key().to_string(), pairwise);
    }
    let star = star_to_json(bundle);
    if !star.is_null() {
        results.insert(Method::Star.key().to_string(), star);
    }
    if let Some(approval) = &bundle.approval {
        results.insert(
            Method::Approval.key().to_string(),
            json!({
                "counts": counts_to_json(&approval.counts),
                "winners": approval.winners,
                "ballots": approval.total_ballots.to_string(),
            }),
        );
    }

    let mut notices: JSMap<String, JSValue> = JSMap::new();
    for (key, list) in &bundle.notices {
        notices.insert(key.to_string(), notices_to_json(list));
    }
    let mut method_errors: JSMap<String, JSValue> = JSMap::new();
    for (key, message) in &bundle.method_errors {
        method_errors.insert(key.to_string(), json!(message));
    }

    json!({
        "election": election,
        "results": results,
        "notices": notices,
        "methodErrors": method_errors,
        "error": bundle.error,
    })
}

fn display_list(model: &ElectionModel, tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| model.display_name(t).to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Renders the bundle as a plain-text report for terminal use.
pub fn text_report(model: &ElectionModel, bundle: &ResultBundle) -> String {
    let mut out = String::new();
    if let Some(err) = &bundle.error {
        let _ = writeln!(out, "Input error: {}", err);
        return out;
    }
    if let Some(title) = &model.metadata.title {
        let _ = writeln!(out, "{}", title);
    }
    let _ = writeln!(
        out,
        "{} ballots, {} candidates",
        model.total_ballots(),
        model.candidate_count()
    );

    if let Some(fptp) = &bundle.fptp {
        let _ = writeln!(out, "\nFirst past the post");
        for (token, count) in &fptp.toppicks {
            let _ = writeln!(out, "  {:>6}  {}", count, model.display_name(token));
        }
        let _ = writeln!(out, "  winner(s): {}", display_list(model, &fptp.winners));
    }
    if let Some(irv) = &bundle.irv {
        let _ = writeln!(out, "\nInstant runoff (threshold {})", irv.threshold);
        for round in &irv.rounds {
            let tally: Vec<String> = round
                .tally
                .iter()
                .map(|(t, n)| format!("{} {}", model.display_name(t), n))
                .collect();
            let _ = writeln!(out, "  round {}: {}", round.round, tally.join(", "));
            for loser in &round.eliminated {
                let _ = writeln!(out, "    eliminated: {}", model.display_name(loser));
            }
        }
        let _ = writeln!(out, "  winner(s): {}", display_list(model, &irv.winners));
    }
    if bundle.pairwise.is_some() {
        let _ = writeln!(out, "\nPairwise (Copeland)");
        if let Some(summary) = &bundle.pairwise_summary {
            for line in summary.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
        let _ = writeln!(out, "  winner(s): {}", bundle.copewinner_string);
    }
    if let Some(star) = &bundle.star {
        let _ = writeln!(out, "\nSTAR");
        for row in &star.rows {
            let _ = writeln!(out, "  {:>6}  {}", row.score, row.name);
        }
        if let Some(runoff) = &star.result.runoff {
            let _ = writeln!(
                out,
                "  runoff: {} {} vs {} {} ({} no preference)",
                model.display_name(&runoff.finalists.0),
                runoff.prefer.0,
                model.display_name(&runoff.finalists.1),
                runoff.prefer.1,
                runoff.no_preference
            );
        }
        let _ = writeln!(
            out,
            "  winner(s): {}",
            display_list(model, &star.result.winners)
        );
    }
    if let Some(approval) = &bundle.approval {
        let _ = writeln!(out, "\nApproval");
        for (token, count) in &approval.counts {
            let _ = writeln!(out, "  {:>6}  {}", count, model.display_name(token));
        }
        let _ = writeln!(
            out,
            "  winner(s): {}",
            display_list(model, &approval.winners)
        );
    }

    let mut header_written = false;
    for (key, list) in &bundle.notices {
        for notice in list {
            if !header_written {
                let _ = writeln!(out, "\nNotices");
                header_written = true;
            }
            let _ = writeln!(out, "  [{}] {}: {}", key, notice.kind.as_str(), notice.long);
        }
    }
    for (key, message) in &bundle.method_errors {
        let _ = writeln!(out, "  {} failed: {}", key, message);
    }
    out
}

fn read_summary(path: &str) -> AppResult<JSValue> {
    let contents =
        fs::read_to_string(path).context(ReadingReferenceSnafu { path: path.to_string() })?;
    debug!("read reference content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn write_summary(args: &Args, pretty: &str) -> AppResult<()> {
    match args.out.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty);
            Ok(())
        }
        Some(path) => {
            info!("Writing summary to {}", path);
            fs::write(path, pretty).context(WritingOutputSnafu { path: path.to_string() })
        }
    }
}

pub fn run(args: &Args) -> AppResult<()> {
    let methods = selected_methods(args)?;
    let input = read_input(args)?;
    let options = ParseOptions {
        clean_whitespace: args.cleanws,
        synthesize_ratings: false,
    };

    let (model, bundle) = match parse(input.as_str(), &options) {
        Ok(model) => {
            info!(
                "parsed election: {} candidates, {} ballots",
                model.candidate_count(),
                model.total_ballots()
            );
            let mut conduit = ResultConduit::new(model);
            for method in &methods {
                conduit.update_method(*method, args.irv_extra);
            }
            conduit.into_parts()
        }
        Err(e) => {
            warn!("input failed to parse: {}", e);
            (ElectionModel::new(), ResultBundle::parse_failure(e.to_string()))
        }
    };

    let summary = summary_js(&model, &bundle);
    let pretty_js_stats = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
    if args.text {
        write_summary(args, &text_report(&model, &bundle))?;
    } else {
        write_summary(args, &pretty_js_stats)?;
    }

    // The reference summary, if provided for comparison
    if let Some(reference) = &args.reference {
        let summary_ref = read_summary(reference)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUNCH: &str = "\
{\"title\": \"Office lunch\"}
=T:[Thai Palace]
=P:[Pizza Corner]
=S:[Soup & Salad]
5:T/5>P/2>S/1
4:P/5>S/4>T/0
2:S/5>P/4>T/1
";

    fn full_bundle() -> (ElectionModel, ResultBundle) {
        let model = parse(LUNCH, &ParseOptions::default()).unwrap();
        let mut conduit = ResultConduit::new(model);
        conduit.update_all(false);
        conduit.into_parts()
    }

    #[test]
    fn summary_lists_candidates_in_canonical_order() {
        let (model, bundle) = full_bundle();
        let js = summary_js(&model, &bundle);
        assert_eq!(js["election"]["title"], json!("Office lunch"));
        assert_eq!(js["election"]["ballots"], json!("11"));
        let candidates = js["election"]["candidates"].as_array().unwrap();
        // First-choice totals: T 5, P 4, S 2.
        assert_eq!(candidates[0]["token"], json!("T"));
        assert_eq!(candidates[1]["token"], json!("P"));
        assert_eq!(candidates[2]["token"], json!("S"));
        assert!(candidates[0]["color"].as_str().unwrap().starts_with('#'));
    }

    #[test]
    fn summary_carries_every_method_section() {
        let (model, bundle) = full_bundle();
        let js = summary_js(&model, &bundle);
        for key in ["fptp", "irv", "pairwise", "star", "approval"] {
            assert!(js["results"].get(key).is_some(), "missing {}", key);
            assert!(js["notices"].get(key).is_some(), "missing notices {}", key);
        }
        assert_eq!(js["results"]["fptp"]["winners"], json!(["T"]));
        assert_eq!(js["results"]["pairwise"]["winners"], json!(["P"]));
        assert_eq!(js["results"]["pairwise"]["copelandTie"], json!(false));
        assert_eq!(js["error"], JSValue::Null);
        assert_eq!(js["methodErrors"], json!({}));
    }

    #[test]
    fn counts_are_rendered_as_strings() {
        let (model, bundle) = full_bundle();
        let js = summary_js(&model, &bundle);
        assert_eq!(js["results"]["fptp"]["toppicks"]["T"], json!("5"));
        assert_eq!(
            js["results"]["pairwise"]["matrix"]["P"]["T"],
            json!("6")
        );
    }

    #[test]
    fn parse_failure_summary_carries_the_error() {
        let bundle = ResultBundle::parse_failure("line 2: bad voteline: oops");
        let js = summary_js(&ElectionModel::new(), &bundle);
        assert_eq!(js["error"], json!("line 2: bad voteline: oops"));
        assert_eq!(js["results"], json!({}));
    }

    #[test]
    fn text_report_covers_every_method() {
        let (model, bundle) = full_bundle();
        let text = text_report(&model, &bundle);
        assert!(text.starts_with("Office lunch\n11 ballots, 3 candidates"));
        for header in [
            "First past the post",
            "Instant runoff",
            "Pairwise (Copeland)",
            "STAR",
            "Approval",
        ] {
            assert!(text.contains(header), "missing {}", header);
        }
        assert!(text.contains("Pizza Corner: 2 victories"));
    }

    #[test]
    fn text_report_shows_a_parse_failure() {
        let bundle = ResultBundle::parse_failure("line 2: bad voteline: oops");
        let text = text_report(&ElectionModel::new(), &bundle);
        assert_eq!(text, "Input error: line 2: bad voteline: oops\n");
    }

    #[test]
    fn method_selection_rejects_unknown_names() {
        let args = Args {
            input: None,
            out: None,
            reference: None,
            methods: vec!["fptp".to_string(), "borda".to_string()],
            text: false,
            irv_extra: false,
            cleanws: false,
            verbose: false,
        };
        match selected_methods(&args) {
            Err(AppError::UnknownMethod { name }) => assert_eq!(name, "borda"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_method_list_selects_all_five() {
        let args = Args {
            input: None,
            out: None,
            reference: None,
            methods: Vec::new(),
            text: false,
            irv_extra: false,
            cleanws: false,
            verbose: false,
        };
        assert_eq!(selected_methods(&args).unwrap(), Method::ALL.to_vec());
    }
}
