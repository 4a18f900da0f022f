//! Pure lifecycle decision — `config-review decide`.

use config_review::lifecycle::{EventKind, ReviewState, Verdict, decide};

pub fn cmd_decide(state: ReviewState, event: EventKind, verdict: Verdict) {
    println!("{}", decide(state, event, verdict));
}
