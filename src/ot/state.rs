//! A replica of a shared document.
//!
//! A `State` owns the text, the vector of requests it has incorporated, the
//! log of executed requests, the queue of requests that arrived too early
//! and a cache of translations. Requests from any user can be submitted in
//! any order as long as each user's own requests arrive in the order they
//! were issued; the state waits until a request is causally ready and then
//! translates it to the current vector before applying it.
//!
//! Translation is recursive. To bring a request to a target vector the
//! state either
//! - mirrors the request an undo or redo refers to ("late mirror"),
//! - folds over a do/undo pair of another user that cancels out, or
//! - transforms against the last request of another user that the target
//!   includes, after translating both to the state just before it.
//!
//! Each step strictly lowers the target, so the recursion terminates. Only
//! targets some replica could actually have been in are used; see
//! [`State::reachable`].

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::config::Config;
use crate::config::TieBreak;
use crate::error::Error;
use crate::error::Result;
use crate::log::Log;
use crate::ot::op::Cid;
use crate::ot::primitives::Buffer;
use crate::ot::primitives::UserId;
use crate::ot::primitives::Vector;
use crate::ot::request::DoRequest;
use crate::ot::request::Request;

/// Type tag for a vector component in a fingerprint.
const TYPE_COMPONENT: u8 = 0x00;

/// Type tag for a buffer segment in a fingerprint.
const TYPE_SEGMENT: u8 = 0x01;

/// Where a request stands relative to a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Already incorporated. Executing it again changes nothing.
    Stale,
    /// Depends on requests the state has not seen yet.
    Waiting,
    /// Can be executed now.
    Ready,
    /// An undo or redo that is causally ready but refers to nothing.
    Malformed,
}

/// The persisted part of a state. The queue and cache are not included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub buffer: Buffer,
    pub vector: Vector,
    pub log: Log,
}

/// A digest of a state's text, authorship and vector. Two replicas that
/// have converged have equal fingerprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        return Ok(());
    }
}

/// One replica of a document.
#[derive(Clone, Debug)]
pub struct State {
    pub(crate) buffer: Buffer,
    pub(crate) vector: Vector,
    log: Log,
    queue: Vec<Request>,
    cache: FxHashMap<(Request, Vector), DoRequest>,
    config: Config,
    absorbed: u64,
}

impl Default for State {
    fn default() -> State {
        return State::new();
    }
}

impl State {
    /// An empty document with the default configuration.
    pub fn new() -> State {
        return State::with_config(Config::default());
    }

    pub fn with_config(config: Config) -> State {
        return State::with_buffer(Buffer::new(), config);
    }

    /// A document whose text exists before any request is made.
    pub fn with_buffer(buffer: Buffer, config: Config) -> State {
        return State {
            buffer,
            vector: Vector::new(),
            log: Log::new(),
            queue: Vec::new(),
            cache: FxHashMap::default(),
            config,
            absorbed: 0,
        };
    }

    /// A document seeded with `text` written by `user`.
    pub fn from_text(user: UserId, text: &str) -> State {
        return State::with_buffer(Buffer::from_text(user, text), Config::default());
    }

    pub fn buffer(&self) -> &Buffer {
        return &self.buffer;
    }

    /// The current text without authorship.
    pub fn text(&self) -> String {
        return self.buffer.to_string();
    }

    pub fn vector(&self) -> &Vector {
        return &self.vector;
    }

    pub fn log(&self) -> &Log {
        return &self.log;
    }

    pub fn config(&self) -> &Config {
        return &self.config;
    }

    /// Requests waiting for their causal predecessors.
    pub fn queued(&self) -> &[Request] {
        return &self.queue;
    }

    /// Number of duplicate deliveries dropped so far.
    pub fn absorbed(&self) -> u64 {
        return self.absorbed;
    }

    /// Number of memoized translations.
    pub fn cached_translations(&self) -> usize {
        return self.cache.len();
    }

    /// Put a request in the queue without trying to execute it.
    pub fn queue(&mut self, request: Request) {
        debug!(user = %request.user(), vector = %request.vector(), "queued");
        self.queue.push(request);
    }

    /// Classify a request against the current state.
    pub fn readiness(&self, request: &Request) -> Readiness {
        let own = request.own_count();
        let seen = self.vector.get(request.user());
        if own < seen {
            return Readiness::Stale;
        }
        return match request {
            Request::Do(request) => {
                if request.vector <= self.vector {
                    Readiness::Ready
                } else {
                    Readiness::Waiting
                }
            }
            Request::Undo(_) | Request::Redo(_) => {
                if own > seen {
                    Readiness::Waiting
                } else if request.associated_request(&self.log).is_some() {
                    Readiness::Ready
                } else {
                    Readiness::Malformed
                }
            }
        };
    }

    /// Whether `request` can be executed right now.
    pub fn can_execute(&self, request: &Request) -> bool {
        return self.readiness(request) == Readiness::Ready;
    }

    /// Execute `request`, or the first queued request that is no longer
    /// waiting when `None` is given.
    ///
    /// Returns the request as it was applied, translated to the state it
    /// was applied to, or `None` when nothing was applied: the request was
    /// queued, was a duplicate, or the queue had nothing ready.
    pub fn execute(&mut self, request: Option<Request>) -> Result<Option<DoRequest>> {
        let request = match request {
            Some(request) => request,
            None => match self.take_unblocked() {
                Some(request) => request,
                None => return Ok(None),
            },
        };

        return match self.readiness(&request) {
            Readiness::Stale => {
                self.absorbed += 1;
                warn!(
                    user = %request.user(),
                    vector = %request.vector(),
                    state = %self.vector,
                    "dropping request that was already executed"
                );
                Ok(None)
            }
            Readiness::Waiting => {
                self.queue(request);
                Ok(None)
            }
            Readiness::Malformed => {
                warn!(user = %request.user(), vector = %request.vector(), "dropping malformed history request");
                Err(Error::MalformedHistoryReference {
                    user: request.user(),
                    vector: request.vector().clone(),
                })
            }
            Readiness::Ready => self.apply(request).map(Some),
        };
    }

    /// Execute queued requests until none is ready. Returns the applied
    /// requests in order. A queued undo or redo that turns out to refer to
    /// nothing is dropped and the drain goes on.
    pub fn execute_all(&mut self) -> Result<Vec<DoRequest>> {
        let mut executed = Vec::new();
        while !self.queue.is_empty() {
            let before = self.queue.len();
            match self.execute(None) {
                Ok(Some(request)) => executed.push(request),
                Ok(None) if self.queue.len() >= before => break,
                Ok(None) => {}
                Err(Error::MalformedHistoryReference { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        return Ok(executed);
    }

    /// Execute a request received from anywhere, then anything it unblocked.
    /// Returns the translated form of `request` if it was applied.
    pub fn submit(&mut self, request: Request) -> Result<Option<DoRequest>> {
        let executed = self.execute(Some(request))?;
        if executed.is_some() {
            self.execute_all()?;
        }
        return Ok(executed);
    }

    /// Remove and return the first queued request that does not have to
    /// wait any longer.
    fn take_unblocked(&mut self) -> Option<Request> {
        let index = self
            .queue
            .iter()
            .position(|request| self.readiness(request) != Readiness::Waiting)?;
        return Some(self.queue.remove(index));
    }

    fn apply(&mut self, request: Request) -> Result<DoRequest> {
        // Anchor an undo or redo at the request it refers to, keeping its
        // own position in the issuer's history.
        let request = if request.is_history() {
            let associated = self.associated(&request)?;
            let vector = associated.vector().with(request.user(), request.own_count());
            request.with_vector(vector)
        } else {
            request
        };

        let target = self.vector.clone();
        let translated = self.translate(&request, &target)?;

        let logged = match &request {
            Request::Do(original) if original.operation.is_irreversible_delete() => {
                Request::Do(original.make_reversible(&translated, &self.buffer)?)
            }
            _ => request,
        };

        translated.execute(self)?;
        debug!(
            user = %translated.user,
            vector = %self.vector,
            len = self.buffer.len(),
            "executed request"
        );
        self.log.push(logged);
        return Ok(translated);
    }

    /// The logged request an undo or redo refers to.
    fn associated(&self, request: &Request) -> Result<Request> {
        let index = request.associated_request(&self.log);
        return match index.and_then(|index| self.log.get(index)) {
            Some(associated) => Ok(associated.clone()),
            None => Err(Error::MalformedHistoryReference {
                user: request.user(),
                vector: request.vector().clone(),
            }),
        };
    }

    /// Bring `request` to the state described by `target`.
    pub fn translate(&mut self, request: &Request, target: &Vector) -> Result<DoRequest> {
        if let Request::Do(request) = request {
            if request.vector == *target {
                return Ok(request.clone());
            }
        }
        if !self.config.translation_cache {
            return self.translate_uncached(request, target);
        }

        let key = (request.clone(), target.clone());
        if let Some(hit) = self.cache.get(&key) {
            trace!(user = %request.user(), to = %target, "translation cache hit");
            return Ok(hit.clone());
        }
        let translated = self.translate_uncached(request, target)?;
        self.cache.insert(key, translated.clone());
        return Ok(translated);
    }

    fn translate_uncached(&mut self, request: &Request, target: &Vector) -> Result<DoRequest> {
        let issuer = request.user();

        if request.is_history() {
            let associated = self.associated(request)?;
            let mirror_at = target.with(issuer, associated.vector().get(issuer));
            if self.reachable(&mirror_at) {
                let Some(by) = target.get(issuer).checked_sub(mirror_at.get(issuer)) else {
                    return Err(Error::UnreachableState { vector: target.clone() });
                };
                let translated = self.translate(&associated, &mirror_at)?;
                trace!(user = %issuer, at = %mirror_at, by, "late mirror");
                return translated.mirror(by);
            }
        }

        let users: Vec<UserId> = target.users().collect();
        for user in users {
            if user == issuer || target.get(user) <= request.vector().get(user) {
                continue;
            }

            let last = self.log.request_by_user(user, target.get(user) - 1).cloned();
            if let Some(last) = last.filter(Request::is_history) {
                let associated = self.associated(&last)?;
                let by = target.get(user) - associated.vector().get(user);
                let fold_at = target.decrement(user, by);
                if by % 2 == 0 && self.reachable(&fold_at) && *request.vector() <= fold_at {
                    trace!(user = %user, at = %fold_at, by, "fold");
                    return self.translate(request, &fold_at)?.fold(user, by);
                }
            }

            let transform_at = target.decrement(user, 1);
            if !self.reachable(&transform_at) {
                continue;
            }
            let Some(last) = self.log.request_by_user(user, transform_at.get(user)).cloned() else {
                continue;
            };
            let ours = self.translate(request, &transform_at)?;
            let theirs = self.translate(&last, &transform_at)?;
            let cid = if ours.operation.requires_cid() {
                self.resolve_cid(request, &last, &ours, &theirs)?
            } else {
                Cid::Other
            };
            trace!(user = %user, at = %transform_at, ?cid, "transform");
            return ours.transform(&theirs, cid);
        }

        error!(
            user = %issuer,
            from = %request.vector(),
            to = %target,
            "no translation path"
        );
        return Err(Error::UnreachableState { vector: target.clone() });
    }

    /// Decide which of two conflicting requests yields. `ours` and `theirs`
    /// are `request` and `last` translated to the state where they meet.
    fn resolve_cid(&mut self, request: &Request, last: &Request, ours: &DoRequest, theirs: &DoRequest) -> Result<Cid> {
        if let Some(cid) = ours.operation.cid(&theirs.operation) {
            return Ok(cid);
        }

        if self.config.tie_break == TieBreak::Cascade {
            let meet = request.vector().sup(last.vector());
            if self.reachable(&meet) {
                let ours_then = self.translate(request, &meet)?;
                let theirs_then = self.translate(last, &meet)?;
                if let Some(cid) = ours_then.operation.cid(&theirs_then.operation) {
                    trace!(at = %meet, ?cid, "tie broken at common successor");
                    return Ok(cid);
                }
            }
        }

        // The lower user id yields.
        if ours.user < theirs.user {
            return Ok(Cid::Own);
        }
        return Ok(Cid::Other);
    }

    /// Whether some replica could have been in the state `vector`.
    ///
    /// A vector built by picking counts per user independently may describe
    /// a state that never existed: e.g. one containing an edit but not a
    /// request the edit was made after. Every user named by the state or by
    /// `vector` must pass [`State::reachable_user`].
    pub fn reachable(&self, vector: &Vector) -> bool {
        return self
            .vector
            .users()
            .chain(vector.users())
            .all(|user| self.reachable_user(vector, user));
    }

    /// Walk back through `user`'s history from `vector[user]`. The state is
    /// reachable along this axis if the walk gets back to the start of the
    /// user's log, or if the last real edit on the way was made in a state
    /// contained in `vector`. Undos and redos are skipped over by jumping
    /// to the request they refer to.
    pub fn reachable_user(&self, vector: &Vector, user: UserId) -> bool {
        let first = self.log.first_count(user).unwrap_or(self.vector.get(user));
        let mut n = vector.get(user);
        loop {
            if n == first {
                return true;
            }
            if n == 0 {
                return false;
            }
            let Some(request) = self.log.request_by_user(user, n - 1) else {
                return false;
            };
            match request {
                Request::Do(request) => return request.vector.increment(user, 1) <= *vector,
                Request::Undo(_) | Request::Redo(_) => match self.associated(request) {
                    Ok(associated) => n = associated.vector().get(user),
                    Err(_) => return false,
                },
            }
        }
    }

    /// A digest of the text, its authorship and the vector.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        for (user, count) in self.vector.iter() {
            hasher.update(&[TYPE_COMPONENT]);
            hasher.update(&user.0.to_le_bytes());
            hasher.update(&count.to_le_bytes());
        }
        for segment in self.buffer.segments() {
            hasher.update(&[TYPE_SEGMENT]);
            hasher.update(&segment.user.0.to_le_bytes());
            hasher.update(&(segment.text.len() as u64).to_le_bytes());
            hasher.update(segment.text.as_bytes());
        }
        return Fingerprint(*hasher.finalize().as_bytes());
    }

    pub fn snapshot(&self) -> Snapshot {
        return Snapshot {
            buffer: self.buffer.clone(),
            vector: self.vector.clone(),
            log: self.log.clone(),
        };
    }

    /// Rebuild a state from a snapshot. The queue and cache start empty.
    pub fn from_snapshot(snapshot: Snapshot, config: Config) -> State {
        return State {
            buffer: snapshot.buffer,
            vector: snapshot.vector,
            log: snapshot.log,
            queue: Vec::new(),
            cache: FxHashMap::default(),
            config,
            absorbed: 0,
        };
    }

    pub fn to_json(&self) -> Result<String> {
        return Ok(serde_json::to_string(&self.snapshot())?);
    }

    pub fn from_json(text: &str, config: Config) -> Result<State> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        return Ok(State::from_snapshot(snapshot, config));
    }
}
