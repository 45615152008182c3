/*!

# Quick start

This example runs every supported method over a small ABIF election.

ABIF describes an election as plain text: `=token:[Display Name]` lines
declare candidates, and votelines carry a ballot weight followed by the
ranked (and optionally rated) preferences:

```text
{"title": "Office lunch"}
=T:[Thai Palace]
=P:[Pizza Corner]
=S:[Soup & Salad]
5:T/5>P/2>S/1
4:P/5>S/4>T/0
2:S/5>P/4>T/1
```

Parsing and tallying:

```
use abif_tally::{approval_tally, fptp_tally, irv_tally, pairwise_tally,
                 parse, star_tally, ParseOptions};

let text = "5:T/5>P/2>S/1\n4:P/5>S/4>T/0\n2:S/5>P/4>T/1\n";
let model = parse(text, &ParseOptions::default())?;

let fptp = fptp_tally(&model).unwrap();
assert_eq!(fptp.winners, vec!["T"]);

let irv = irv_tally(&model).unwrap();
let pairwise = pairwise_tally(&model).unwrap();
let star = star_tally(&model).unwrap();
let approval = approval_tally(&model).unwrap();
assert_eq!(pairwise.winners, vec!["P"]);
assert!(!irv.has_tie);
assert!(star.runoff.is_some());
assert!(approval.winners.contains(&"P".to_string()));
# Ok::<(), abif_tally::AbifError>(())
```

Ballots without ratings can still feed the STAR method after synthesizing
Borda-like ratings with [`crate::augment_with_synthesized_ratings`]; the
result then carries an estimation notice.

The `abifcond` command line renders all five methods at once and emits a
JSON summary:

```bash
abifcond --input lunch.abif --out results.json
```

*/
