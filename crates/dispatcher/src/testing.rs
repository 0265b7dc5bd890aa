//! Predicates, compilers and registries for unit tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use contracts::{
    ContractError, Event, FilterCompiler, FilterPredicate, SourceDescriptor, SourceId,
    SourceRegistry,
};

pub struct AcceptAll;

impl FilterPredicate for AcceptAll {
    fn evaluate(&self, _event: &mut Event) -> Result<bool, ContractError> {
        Ok(true)
    }

    fn source_text(&self) -> &str {
        "true"
    }
}

pub struct RejectAll;

impl FilterPredicate for RejectAll {
    fn evaluate(&self, _event: &mut Event) -> Result<bool, ContractError> {
        Ok(false)
    }

    fn source_text(&self) -> &str {
        "false"
    }
}

/// Always returns an evaluation error
pub struct Failing;

impl FilterPredicate for Failing {
    fn evaluate(&self, event: &mut Event) -> Result<bool, ContractError> {
        Err(ContractError::payload_parse(event.num, event.source_id, "broken payload"))
    }

    fn source_text(&self) -> &str {
        "failing"
    }
}

pub struct Panicking;

impl FilterPredicate for Panicking {
    fn evaluate(&self, _event: &mut Event) -> Result<bool, ContractError> {
        panic!("predicate exploded")
    }

    fn source_text(&self) -> &str {
        "panicking"
    }
}

/// Accepts after sleeping
pub struct Slow(pub Duration);

impl FilterPredicate for Slow {
    fn evaluate(&self, _event: &mut Event) -> Result<bool, ContractError> {
        std::thread::sleep(self.0);
        Ok(true)
    }

    fn source_text(&self) -> &str {
        "slow"
    }
}

/// Sleeps for the number of milliseconds in the payload, accepts unless the
/// event number is odd
pub struct DelayByPayload;

impl FilterPredicate for DelayByPayload {
    fn evaluate(&self, event: &mut Event) -> Result<bool, ContractError> {
        let millis: u64 = event.payload_str().parse().unwrap_or(0);
        std::thread::sleep(Duration::from_millis(millis));
        Ok(event.num % 2 == 0)
    }

    fn source_text(&self) -> &str {
        "delay"
    }
}

/// Manually opened latch
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.cv.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cv.wait(&mut open);
        }
    }
}

/// Accepts everything; events with payload `block` wait for the gate first
pub struct Gated(pub Arc<Gate>);

impl FilterPredicate for Gated {
    fn evaluate(&self, event: &mut Event) -> Result<bool, ContractError> {
        if event.payload.as_ref() == b"block" {
            self.0.wait();
        }
        Ok(true)
    }

    fn source_text(&self) -> &str {
        "gated"
    }
}

/// Hands out a fixed predicate for any non-empty text
pub struct FixedCompiler(pub Arc<dyn FilterPredicate>);

impl FixedCompiler {
    pub fn new(predicate: impl FilterPredicate + 'static) -> Arc<Self> {
        Arc::new(Self(Arc::new(predicate)))
    }
}

impl FilterCompiler for FixedCompiler {
    fn compile(&self, text: &str) -> Result<Arc<dyn FilterPredicate>, ContractError> {
        if text.trim().is_empty() {
            return Err(ContractError::filter_syntax(0, "empty filter"));
        }
        Ok(Arc::clone(&self.0))
    }
}

/// Registry that counts lookups per id
#[derive(Default)]
pub struct CountingRegistry {
    sources: HashMap<SourceId, Arc<SourceDescriptor>>,
    lookups: Mutex<HashMap<SourceId, usize>>,
}

impl CountingRegistry {
    pub fn with_sources(ids: &[SourceId]) -> Arc<Self> {
        let sources = ids
            .iter()
            .map(|&id| (id, Arc::new(SourceDescriptor::new(id, format!("plugin{id}"), "syscall"))))
            .collect();
        Arc::new(Self {
            sources,
            ..Self::default()
        })
    }

    pub fn lookups(&self, id: SourceId) -> usize {
        self.lookups.lock().get(&id).copied().unwrap_or(0)
    }
}

impl SourceRegistry for CountingRegistry {
    fn lookup(&self, id: SourceId) -> Option<Arc<SourceDescriptor>> {
        *self.lookups.lock().entry(id).or_insert(0) += 1;
        self.sources.get(&id).cloned()
    }

    fn len(&self) -> usize {
        self.sources.len()
    }
}
