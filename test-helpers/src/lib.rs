//! Shared fixtures and scripted backends for exercising the state
//! managers in integration tests: a deterministic person directory, a
//! filterable in-memory search backend with failure injection, and
//! hand-controlled gates for pinning down async interleavings.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use derive_more::Display;
use fetchstate::{FetchError, Filters, Object, ResultSet, TaskFuture};
use futures::FutureExt;
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Stable id for a directory person.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub Uuid);

/// One entry of the in-memory person directory used across tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub seq: u64,
    pub name: String,
    pub city: String,
}

/// Deterministic person: the id is derived from the sequence number.
pub fn person(seq: u64, name: &str, city: &str) -> Person {
    Person {
        id: PersonId(Uuid::from_u128(u128::from(seq) + 1)),
        seq,
        name: name.into(),
        city: city.into(),
    }
}

/// A directory of `n` people with generated names and rotating cities.
pub fn people(n: u64) -> Vec<Person> {
    const CITIES: [&str; 3] = ["Lisbon", "Porto", "Braga"];
    (0..n)
        .map(|seq| {
            person(
                seq,
                &format!("Person {:03}", seq),
                CITIES[(seq % 3) as usize],
            )
        })
        .collect()
}

/// Small fixed directory with recognizable names.
pub fn sample_people() -> Vec<Person> {
    vec![
        person(0, "Maria Silva", "Lisbon"),
        person(1, "Miguel Santos", "Porto"),
        person(2, "Sofia Costa", "Lisbon"),
        person(3, "Maria Oliveira", "Braga"),
    ]
}

/// Builds an [`Object`] from a `json!` literal.
///
/// Panics if the literal is not a JSON object.
pub fn object(value: Value) -> Object {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object literal, got {}", other),
    }
}

/// The person as an open-shaped record, for form tests.
pub fn person_object(person: &Person) -> Object {
    object(json!({
        "id": person.id,
        "seq": person.seq,
        "name": person.name,
        "city": person.city,
    }))
}

/// Applies directory criteria to a person list: `name` is a
/// case-insensitive substring match, `city` an exact match. The window
/// is read through the filters' configured offset/limit keys; the count
/// is the total number of matches before windowing.
pub fn filter_people(people: &[Person], filters: &Filters) -> ResultSet<Person> {
    let name = filters
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_lowercase);
    let city = filters.get("city").and_then(Value::as_str);
    let matches: Vec<&Person> = people
        .iter()
        .filter(|person| {
            name.as_deref()
                .is_none_or(|name| person.name.to_lowercase().contains(name))
                && city.is_none_or(|city| person.city == city)
        })
        .collect();
    let count = matches.len() as u64;
    let results = matches
        .into_iter()
        .skip(filters.offset() as usize)
        .take(filters.limit() as usize)
        .cloned()
        .collect();
    ResultSet::new(count, results)
}

/// Shared call counter for asserting that an operation did (or did not)
/// reach the backend.
#[derive(Clone, Default)]
pub struct CallCount(Rc<Cell<u32>>);

impl CallCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

/// Order-preserving record of lifecycle callback firings.
#[derive(Clone, Default)]
pub struct CallbackLog(Rc<RefCell<Vec<String>>>);

impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Fails the next `n` backend calls, then lets calls succeed again.
#[derive(Clone, Default)]
pub struct FailSwitch(Rc<Cell<u32>>);

impl FailSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.0.set(n);
    }

    /// Consumes one queued failure; true means this call should fail.
    pub fn take(&self) -> bool {
        let remaining = self.0.get();
        if remaining > 0 {
            self.0.set(remaining - 1);
            true
        } else {
            false
        }
    }
}

/// Scripted directory backend: [`filter_people`] plus a call counter,
/// failure injection, and a record of the filters each call received.
#[derive(Clone)]
pub struct DirectoryBackend {
    people: Rc<RefCell<Vec<Person>>>,
    pub calls: CallCount,
    pub failures: FailSwitch,
    seen: Rc<RefCell<Vec<Object>>>,
}

impl DirectoryBackend {
    pub fn new(people: Vec<Person>) -> Self {
        Self {
            people: Rc::new(RefCell::new(people)),
            calls: CallCount::new(),
            failures: FailSwitch::new(),
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn set_people(&self, people: Vec<Person>) {
        *self.people.borrow_mut() = people;
    }

    /// The filters received by the `n`-th backend call (0-based).
    pub fn seen(&self, n: usize) -> Object {
        self.seen.borrow()[n].clone()
    }

    pub fn last_seen(&self) -> Object {
        self.seen
            .borrow()
            .last()
            .cloned()
            .expect("no search call recorded")
    }

    /// A search function for `SearchConfig::new`. Calls settle
    /// immediately with the filtered window (or an injected failure).
    pub fn search_fn(&self) -> impl Fn(&Filters) -> TaskFuture<ResultSet<Person>> + 'static {
        let backend = self.clone();
        move |filters: &Filters| {
            backend.calls.bump();
            backend.seen.borrow_mut().push(filters.as_object().clone());
            let outcome = if backend.failures.take() {
                Err(FetchError::new("directory unavailable"))
            } else {
                Ok(filter_people(&backend.people.borrow(), filters))
            };
            async move { outcome }.boxed_local()
        }
    }
}

/// Hand-controlled async tasks: each backend call takes the next queued
/// gate and settles only when the test fires the matching trigger. Lets
/// a test hold several calls in flight and decide their completion
/// order.
pub struct Gates<T> {
    slots: Rc<RefCell<VecDeque<oneshot::Receiver<Result<T, FetchError>>>>>,
    calls: CallCount,
}

impl<T> Clone for Gates<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
            calls: self.calls.clone(),
        }
    }
}

impl<T: 'static> Gates<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(VecDeque::new())),
            calls: CallCount::new(),
        }
    }

    /// Queues a gate for one future backend call and returns its
    /// trigger. Triggers may fire before or after the call arrives.
    pub fn expect(&self) -> oneshot::Sender<Result<T, FetchError>> {
        let (sender, receiver) = oneshot::channel();
        self.slots.borrow_mut().push_back(receiver);
        sender
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    /// An async producer for `Resolver::task`.
    pub fn producer(&self) -> impl Fn() -> TaskFuture<T> + 'static {
        let gates = self.clone();
        move || gates.next()
    }

    /// A search function for `SearchConfig::new`; the received filters
    /// are ignored.
    pub fn search_fn(&self) -> impl Fn(&Filters) -> TaskFuture<T> + 'static {
        let gates = self.clone();
        move |_| gates.next()
    }

    fn next(&self) -> TaskFuture<T> {
        self.calls.bump();
        let receiver = self
            .slots
            .borrow_mut()
            .pop_front()
            .expect("backend called more times than gates were queued");
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(FetchError::new("gate dropped")))
        }
        .boxed_local()
    }
}

impl<T: 'static> Default for Gates<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a fmt subscriber honoring `RUST_LOG`, once per process.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
