//! Saving and restoring replicas.

use concord::Buffer;
use concord::Config;
use concord::Cid;
use concord::DoRequest;
use concord::HistoryRequest;
use concord::Operation;
use concord::Request;
use concord::Snapshot;
use concord::State;
use concord::TieBreak;
use concord::UserId;
use concord::Vector;

const SEED: UserId = UserId(0);
const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);

fn insert(user: UserId, vector: Vector, position: u64, text: &str) -> Request {
    let op = Operation::insert(position, Buffer::from_text(user, text));
    return Request::Do(DoRequest::new(user, vector, op));
}

fn delete(user: UserId, vector: Vector, position: u64, len: u64) -> Request {
    return Request::Do(DoRequest::new(user, vector, Operation::delete(position, len)));
}

/// A replica that has seen concurrent edits, an undo and a redo.
fn edited_state() -> State {
    let v0 = Vector::new();
    let mut state = State::from_text(SEED, "hello world");
    state.submit(insert(ALICE, v0.clone(), 5, ",")).unwrap();
    state.submit(delete(BOB, v0, 3, 4)).unwrap();
    let at = state.vector().clone();
    state.submit(Request::Undo(HistoryRequest::new(ALICE, at))).unwrap();
    let at = state.vector().clone();
    state.submit(Request::Redo(HistoryRequest::new(ALICE, at))).unwrap();
    return state;
}

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn snapshot_json_round_trip() {
    let state = edited_state();
    assert_eq!(state.text(), "hel,orld");

    let json = state.to_json().unwrap();
    let restored = State::from_json(&json, Config::default()).unwrap();

    assert_eq!(restored.snapshot(), state.snapshot());
    assert_eq!(restored.fingerprint(), state.fingerprint());
    assert_eq!(restored.cached_translations(), 0);
    assert!(restored.queued().is_empty());
}

#[test]
fn restored_state_keeps_editing() {
    let state = edited_state();
    let mut original = state.clone();
    let mut restored = State::from_json(&state.to_json().unwrap(), Config::default()).unwrap();

    // bob undoes his delete, and someone new joins late
    let requests = [
        Request::Undo(HistoryRequest::new(BOB, state.vector().clone())),
        insert(UserId(3), Vector::new(), 0, ">"),
    ];
    for request in requests {
        original.submit(request.clone()).unwrap();
        restored.submit(request).unwrap();
    }

    assert_eq!(original.text(), ">hello, world");
    assert_eq!(restored.text(), original.text());
    assert_eq!(restored.fingerprint(), original.fingerprint());
}

#[test]
fn restored_state_absorbs_known_requests() {
    let state = edited_state();
    let mut restored = State::from_json(&state.to_json().unwrap(), Config::default()).unwrap();

    let known: Vec<Request> = state.log().iter().cloned().collect();
    for request in known {
        assert_eq!(restored.submit(request).unwrap(), None);
    }
    assert_eq!(restored.absorbed(), 4);
    assert_eq!(restored.fingerprint(), state.fingerprint());
}

#[test]
fn snapshot_with_other_config() {
    let state = edited_state();
    let config = Config {
        translation_cache: false,
        tie_break: TieBreak::UserId,
    };
    let restored = State::from_snapshot(state.snapshot(), config.clone());
    assert_eq!(restored.config(), &config);
    assert_eq!(restored.text(), state.text());
}

#[test]
fn malformed_snapshot_is_an_error() {
    assert!(State::from_json("{\"buffer\": 3}", Config::default()).is_err());
    assert!(State::from_json("not json", Config::default()).is_err());
}

// =============================================================================
// Wire shapes
// =============================================================================

#[test]
fn every_request_kind_round_trips() {
    let at = Vector::new().increment(ALICE, 2).increment(BOB, 1);
    let requests = [
        Request::Do(DoRequest::new(ALICE, at.clone(), Operation::NoOp)),
        insert(ALICE, at.clone(), 1, "abc"),
        delete(BOB, at.clone(), 2, 5),
        Request::Undo(HistoryRequest::new(ALICE, at.clone())),
        Request::Redo(HistoryRequest::new(BOB, at)),
    ];
    for request in requests {
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request, "{}", json);
    }
}

#[test]
fn split_with_recorded_pieces_round_trips() {
    // bob's delete of "bcdef" loses "cd" to alice's delete, then is split
    // by carol's insert
    let bob = Operation::delete(1, 5);
    let alice = Operation::Delete(concord::ot::Delete::reversible(2, Buffer::from_text(SEED, "cd")));
    let carol = Operation::insert(2, Buffer::from_text(UserId(3), "Z"));

    let shrunk = bob.transform(&alice, Cid::Other).unwrap();
    let split = shrunk.transform(&carol, Cid::Other).unwrap();
    assert!(matches!(split, Operation::Split { .. }));

    let request = Request::Do(DoRequest::new(BOB, Vector::new().increment(ALICE, 1), split));
    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"recon\""), "{}", json);
    let back: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(back, request);
}

#[test]
fn snapshot_json_shape() {
    let mut state = State::from_text(SEED, "a");
    state.submit(insert(ALICE, Vector::new(), 1, "b")).unwrap();

    let value: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
    assert_eq!(
        value["buffer"],
        serde_json::json!([{"user": 0, "text": "a"}, {"user": 1, "text": "b"}])
    );
    assert_eq!(value["vector"], serde_json::json!({"1": 1}));
    assert_eq!(value["log"][0]["kind"], "do");

    let snapshot: Snapshot = serde_json::from_value(value).unwrap();
    assert_eq!(snapshot, state.snapshot());
}
