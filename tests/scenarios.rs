//! Hand-checked editing sessions.

use concord::Buffer;
use concord::Cid;
use concord::DoRequest;
use concord::HistoryRequest;
use concord::Operation;
use concord::Request;
use concord::State;
use concord::UserId;
use concord::Vector;
use concord::ot::Delete;

const SEED: UserId = UserId(0);
const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const CAROL: UserId = UserId(3);

fn insert(user: UserId, vector: Vector, position: u64, text: &str) -> Request {
    let op = Operation::insert(position, Buffer::from_text(user, text));
    return Request::Do(DoRequest::new(user, vector, op));
}

fn delete(user: UserId, vector: Vector, position: u64, len: u64) -> Request {
    return Request::Do(DoRequest::new(user, vector, Operation::delete(position, len)));
}

fn undo(user: UserId, vector: Vector) -> Request {
    return Request::Undo(HistoryRequest::new(user, vector));
}

fn deliver_all(state: &mut State, requests: &[Request]) {
    for request in requests {
        state.submit(request.clone()).unwrap();
    }
}

// =============================================================================
// Basic scenarios
// =============================================================================

#[test]
fn concurrent_insert_and_delete_converge() {
    let from_alice = insert(ALICE, Vector::new(), 1, "X");
    let from_bob = delete(BOB, Vector::new(), 0, 1);

    let mut a = State::from_text(SEED, "ab");
    deliver_all(&mut a, &[from_alice.clone(), from_bob.clone()]);
    let mut b = State::from_text(SEED, "ab");
    deliver_all(&mut b, &[from_bob, from_alice]);

    assert_eq!(a.text(), "Xb");
    assert_eq!(b.text(), "Xb");
    assert_eq!(a.vector(), b.vector());
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn reversible_delete_mirrors_back() {
    let mut buffer = Buffer::from_text(SEED, "abc");
    let op = Operation::Delete(Delete::reversible(0, Buffer::from_text(SEED, "a")));

    op.apply(&mut buffer).unwrap();
    assert_eq!(buffer.to_string(), "bc");
    op.mirror().unwrap().apply(&mut buffer).unwrap();
    assert_eq!(buffer.to_string(), "abc");
}

#[test]
fn undo_of_first_insert() {
    let mut state = State::new();
    state.submit(insert(ALICE, Vector::new(), 0, "hi")).unwrap();

    let request = undo(ALICE, state.vector().clone());
    assert_eq!(request.associated_request(state.log()), Some(0));

    let applied = state.submit(request).unwrap().unwrap();
    assert_eq!(state.text(), "");
    assert_eq!(state.vector().get(ALICE), 2);
    assert_eq!(
        applied.operation,
        Operation::Delete(Delete::reversible(0, Buffer::from_text(ALICE, "hi")))
    );
}

#[test]
fn requests_out_of_order_from_one_user_wait() {
    let first = insert(ALICE, Vector::new(), 0, "a");
    let second = insert(ALICE, Vector::new().increment(ALICE, 1), 1, "b");
    let third = delete(ALICE, Vector::new().increment(ALICE, 2), 0, 1);

    let mut state = State::new();
    deliver_all(&mut state, &[third, second, first]);
    assert_eq!(state.text(), "b");
    assert!(state.queued().is_empty());
    assert_eq!(state.log().len(), 3);
}

// =============================================================================
// Undo across replicas
// =============================================================================

#[test]
fn undo_converges_with_concurrent_insert() {
    let v0 = Vector::new();
    let from_alice = insert(ALICE, v0.clone(), 0, "hi");
    let alice_undo = undo(ALICE, v0.increment(ALICE, 1));
    let from_bob = insert(BOB, v0, 0, "X");

    // alice undoes before hearing from bob
    let mut a = State::new();
    deliver_all(&mut a, &[from_alice.clone(), alice_undo.clone(), from_bob.clone()]);
    // bob hears alice's insert and undo after his own edit
    let mut b = State::new();
    deliver_all(&mut b, &[from_bob, from_alice, alice_undo]);

    assert_eq!(a.text(), "X");
    assert_eq!(b.text(), "X");
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn undo_restores_text_removed_by_length() {
    let v0 = Vector::new();
    let from_alice = delete(ALICE, v0.clone(), 1, 3);
    let from_bob = delete(BOB, v0.clone(), 2, 3);
    let alice_undo = undo(ALICE, v0.increment(ALICE, 1).increment(BOB, 1));

    let mut a = State::from_text(SEED, "abcdefg");
    deliver_all(&mut a, &[from_alice.clone(), from_bob.clone(), alice_undo.clone()]);
    let mut b = State::from_text(SEED, "abcdefg");
    deliver_all(&mut b, &[from_bob, from_alice, alice_undo]);

    // alice removed "bcd", bob "cde"; undoing alice brings back only "b",
    // since bob's removal of "cd" still stands
    assert_eq!(a.text(), "abfg");
    assert_eq!(b.text(), "abfg");
    assert_eq!(a.fingerprint(), b.fingerprint());
}

// =============================================================================
// More than two users
// =============================================================================

#[test]
fn three_users_in_every_delivery_order() {
    let v0 = Vector::new();
    let requests = [
        insert(ALICE, v0.clone(), 1, "a"),
        insert(BOB, v0.clone(), 5, "b"),
        delete(CAROL, v0, 8, 1),
    ];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut fingerprints = Vec::new();
    for order in orders {
        let mut state = State::from_text(SEED, "0123456789");
        for index in order {
            state.submit(requests[index].clone()).unwrap();
        }
        assert_eq!(state.text(), "0a1234b5679", "order {:?}", order);
        fingerprints.push(state.fingerprint());
    }
    assert!(fingerprints.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn same_position_inserts_order_by_user() {
    let v0 = Vector::new();
    let requests = [
        insert(ALICE, v0.clone(), 2, "A"),
        insert(BOB, v0.clone(), 2, "B"),
        insert(CAROL, v0, 2, "C"),
    ];
    let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];

    for order in orders {
        let mut state = State::from_text(SEED, "xxxx");
        for index in order {
            state.submit(requests[index].clone()).unwrap();
        }
        // lower ids yield, so higher ids end up first
        assert_eq!(state.text(), "xxCBAxx", "order {:?}", order);
    }
}

// =============================================================================
// Transform laws on concrete operations
// =============================================================================

#[test]
fn transform_against_split_matches_manual_steps() {
    let split = Operation::split(Operation::delete(1, 1), Operation::delete(4, 2));
    let op = Operation::insert(5, Buffer::from_text(ALICE, "Z"));

    let direct = op.transform(&split, Cid::Other).unwrap();
    let Operation::Split { first, second } = &split else {
        unreachable!();
    };
    let moved = second.transform(first, Cid::Own).unwrap();
    let manual = op
        .transform(first, Cid::Other)
        .unwrap()
        .transform(&moved, Cid::Other)
        .unwrap();
    assert_eq!(direct, manual);
    assert_eq!(direct, Operation::insert(3, Buffer::from_text(ALICE, "Z")));
}

#[test]
fn reversible_deletes_merge() {
    let a = Delete::reversible(2, Buffer::from_text(SEED, "cd"));
    let b = Delete::reversible(4, Buffer::from_text(SEED, "ef"));
    let merged = a.merge(&b).unwrap();
    assert_eq!(merged, Delete::reversible(2, Buffer::from_text(SEED, "cdef")));

    let (left, right) = merged.split(2).unwrap();
    assert_eq!((left, right), (a, b));
}
