//! Replay a recorded request trace against a fresh replica.
//!
//! Usage: `concord-replay <trace.json>` (or `-` for stdin). Set `RUST_LOG`
//! (e.g. `RUST_LOG=concord=trace`) to watch the translation paths.
//!
//! Trace format:
//!
//! ```text
//! {
//!   "owner": 0,
//!   "initial_text": "ab",
//!   "config": { "tie_break": "cascade" },
//!   "requests": [
//!     { "kind": "do", "user": 1, "vector": {}, "operation": { "op": "insert", ... } },
//!     { "kind": "undo", "user": 1, "vector": { "1": 1 } }
//!   ]
//! }
//! ```

use std::io::Read;
use std::process::ExitCode;

use concord::Buffer;
use concord::Config;
use concord::Request;
use concord::State;
use concord::UserId;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
struct Trace {
    #[serde(default)]
    owner: UserId,
    #[serde(default)]
    initial_text: String,
    #[serde(default)]
    config: Config,
    requests: Vec<Request>,
}

fn read_input(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    return std::fs::read_to_string(path);
}

fn run(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let trace: Trace = serde_json::from_str(&read_input(path)?)?;
    let mut state = State::with_buffer(Buffer::from_text(trace.owner, &trace.initial_text), trace.config);

    for (index, request) in trace.requests.into_iter().enumerate() {
        match state.submit(request) {
            Ok(Some(executed)) => info!(index, user = %executed.user, vector = %state.vector(), "applied"),
            Ok(None) => info!(index, "deferred or dropped"),
            Err(err) => return Err(format!("request {}: {}", index, err).into()),
        }
    }
    state.execute_all()?;

    println!("text:        {:?}", state.text());
    println!("vector:      {}", state.vector());
    println!("fingerprint: {}", state.fingerprint());
    println!("log:         {} requests", state.log().len());
    if !state.queued().is_empty() {
        println!("queued:      {} requests never became ready", state.queued().len());
    }
    if state.absorbed() > 0 {
        println!("absorbed:    {} duplicates", state.absorbed());
    }
    return Ok(());
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: concord-replay <trace.json | ->");
        return ExitCode::from(2);
    };
    return match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    };
}
