//! Names for synthesized classes
//!
//! Every synthesized class is named `<base>_roled_<counter>_<engine>`, where
//! `<base>` is the class being extended, `<counter>` a per-engine sequence
//! starting at 1 and `<engine>` the engine instance id. Names double as
//! registry keys, so they must never repeat within a process.
//!
//! Numbers are drawn through a [`NameReservation`] that holds the engine's
//! synthesis lock. Numbers handed out by a reservation become permanent only
//! on [`NameReservation::commit`]; dropping the reservation returns them.

use parking_lot::{Mutex, MutexGuard};
use persona_core::EngineId;
use std::fmt;

const ROLED_INFIX: &str = "_roled_";

/// Build a synthesized class name
pub fn format_class_name(base: &str, counter: u64, engine: EngineId) -> String {
    format!("{base}{ROLED_INFIX}{counter}_{engine}")
}

/// Components of a synthesized class name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedName<'a> {
    /// Name of the class that was extended, itself possibly synthesized
    pub base: &'a str,
    pub counter: u64,
    pub engine: EngineId,
}

impl fmt::Display for SynthesizedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{ROLED_INFIX}{}_{}", self.base, self.counter, self.engine)
    }
}

/// Split the outermost synthesis step off a class name
///
/// Returns `None` for names that were not produced by [`format_class_name`].
pub fn parse_class_name(name: &str) -> Option<SynthesizedName<'_>> {
    let split = name.rfind(ROLED_INFIX)?;
    let (base, rest) = (&name[..split], &name[split + ROLED_INFIX.len()..]);
    let (counter, engine) = rest.split_once('_')?;
    if base.is_empty() {
        return None;
    }
    Some(SynthesizedName {
        base,
        counter: counter.parse().ok()?,
        engine: EngineId::from_raw(engine.parse().ok()?),
    })
}

/// Name of the application base class a name was derived from
pub fn root_class_name(name: &str) -> &str {
    let mut current = name;
    while let Some(parsed) = parse_class_name(current) {
        current = parsed.base;
    }
    current
}

/// Per-engine counter for synthesized class names
#[derive(Debug)]
pub struct ClassNamer {
    engine: EngineId,
    next: Mutex<u64>,
}

impl ClassNamer {
    pub fn new(engine: EngineId) -> Self {
        Self {
            engine,
            next: Mutex::new(1),
        }
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// Counter value the next committed synthesis will use
    pub fn peek(&self) -> u64 {
        *self.next.lock()
    }

    /// Take the synthesis lock; held until the reservation is committed or dropped
    pub fn reserve(&self) -> NameReservation<'_> {
        NameReservation {
            next: self.next.lock(),
            engine: self.engine,
            issued: 0,
        }
    }
}

/// Exclusive, tentative claim on the next counter values
pub struct NameReservation<'a> {
    next: MutexGuard<'a, u64>,
    engine: EngineId,
    issued: u64,
}

impl NameReservation<'_> {
    /// Next tentative name for a class extending `base`
    pub fn next_name(&mut self, base: &str) -> String {
        let counter = *self.next + self.issued;
        self.issued += 1;
        format_class_name(base, counter, self.engine)
    }

    /// Number of names handed out so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Make the issued numbers permanent and release the synthesis lock
    pub fn commit(mut self) -> u64 {
        *self.next += self.issued;
        self.issued
    }
}

impl fmt::Debug for NameReservation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameReservation")
            .field("engine", &self.engine)
            .field("first", &*self.next)
            .field("issued", &self.issued)
            .finish()
    }
}
