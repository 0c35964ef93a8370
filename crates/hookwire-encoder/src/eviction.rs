//! When a session may forget ids it handed out.

use crate::session::EncodingSession;
use hookwire_core::collections::map::HashSet;

/// Ids referenced by one encoded document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct References {
    pub objects: HashSet<u64>,
    pub callables: HashSet<String>,
}

/// Ids a policy wants released, in the order they should be reported.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub objects: Vec<u64>,
    pub callables: Vec<String>,
}

impl Eviction {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.callables.is_empty()
    }
}

/// Consulted after every successful encode.
pub trait EvictionPolicy {
    fn select(&mut self, session: &EncodingSession, referenced: &References) -> Eviction;
}

/// Never forget anything: ids live as long as the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepAll;

impl EvictionPolicy for KeepAll {
    fn select(&mut self, _session: &EncodingSession, _referenced: &References) -> Eviction {
        Eviction::default()
    }
}

/// Release every id the latest document no longer references.
///
/// Suits hosts that always send full documents: the receiver can drop its
/// copies as soon as they are reported released.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvictUnreferenced;

impl EvictionPolicy for EvictUnreferenced {
    fn select(&mut self, session: &EncodingSession, referenced: &References) -> Eviction {
        Eviction {
            objects: session
                .object_ids()
                .filter(|id| !referenced.objects.contains(id))
                .collect(),
            callables: session
                .callable_ids()
                .filter(|id| !referenced.callables.contains(*id))
                .map(str::to_owned)
                .collect(),
        }
    }
}
