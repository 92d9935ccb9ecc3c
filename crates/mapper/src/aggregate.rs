//! Aggregator: turns a record stream into one keyed document.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use kubemap_core::{DuplicatePolicy, MapError, Mode, Record, Triple};
use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// namespace → name → kind → record
pub type NestedTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, Record>>>;

/// The aggregated document. Keys are kept sorted so output is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    Flat { separator: String, entries: BTreeMap<String, Record> },
    Nested(NestedTree),
}

impl Aggregated {
    pub fn empty(mode: &Mode) -> Self {
        match mode {
            Mode::Flat { separator } => Aggregated::Flat { separator: separator.clone(), entries: BTreeMap::new() },
            Mode::Nested => Aggregated::Nested(BTreeMap::new()),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Aggregated::Flat { separator, .. } => Mode::flat(separator.clone()),
            Aggregated::Nested(_) => Mode::Nested,
        }
    }

    /// Number of leaf records.
    pub fn len(&self) -> usize {
        match self {
            Aggregated::Flat { entries, .. } => entries.len(),
            Aggregated::Nested(tree) => tree.values().flat_map(|names| names.values()).map(|kinds| kinds.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf records in key order (namespace, then name, then kind for nested).
    pub fn records(&self) -> Vec<&Record> {
        match self {
            Aggregated::Flat { entries, .. } => entries.values().collect(),
            Aggregated::Nested(tree) => tree
                .values()
                .flat_map(|names| names.values())
                .flat_map(|kinds| kinds.values())
                .collect(),
        }
    }

    /// Look up the record stored for `triple`.
    pub fn get(&self, triple: &Triple) -> Option<&Record> {
        match self {
            Aggregated::Flat { separator, entries } => entries.get(&triple.path(separator)),
            Aggregated::Nested(tree) => tree
                .get(&triple.namespace)
                .and_then(|names| names.get(&triple.name))
                .and_then(|kinds| kinds.get(&triple.kind)),
        }
    }

    /// Triples recovered from the structure itself, paired with their records.
    /// Flat keys are split on the separator; `None` if any key does not split into three parts.
    pub fn entries(&self) -> Option<Vec<(Triple, &Record)>> {
        match self {
            Aggregated::Flat { separator, entries } => entries
                .iter()
                .map(|(path, rec)| Triple::split_path(path, separator).map(|t| (t, rec)))
                .collect(),
            Aggregated::Nested(tree) => {
                let mut out = Vec::with_capacity(self.len());
                for (ns, names) in tree {
                    for (name, kinds) in names {
                        for (kind, rec) in kinds {
                            out.push((Triple::new(ns.as_str(), name.as_str(), kind.as_str()), rec));
                        }
                    }
                }
                Some(out)
            }
        }
    }

    /// The structure as a single YAML value.
    pub fn to_document(&self) -> Value {
        fn text(s: &str) -> Value {
            Value::String(s.to_string())
        }
        match self {
            Aggregated::Flat { entries, .. } => {
                Value::Mapping(entries.iter().map(|(k, v)| (text(k), v.clone())).collect())
            }
            Aggregated::Nested(tree) => Value::Mapping(
                tree.iter()
                    .map(|(ns, names)| {
                        let names: Mapping = names
                            .iter()
                            .map(|(name, kinds)| {
                                let kinds: Mapping = kinds.iter().map(|(k, v)| (text(k), v.clone())).collect();
                                (text(name), Value::Mapping(kinds))
                            })
                            .collect();
                        (text(ns), Value::Mapping(names))
                    })
                    .collect(),
            ),
        }
    }
}

impl Serialize for Aggregated {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Aggregated::Flat { entries, .. } => entries.serialize(serializer),
            Aggregated::Nested(tree) => tree.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// Records consumed from the input stream.
    pub records: usize,
    /// Distinct entries in the aggregated structure.
    pub entries: usize,
    /// Records replaced by a later record with the same key.
    pub overwritten: usize,
}

// Slot a record lands in. Flat mode compares joined keys, so two different
// triples can still collide when the separator occurs inside a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Path(String),
    Triple(Triple),
}

/// Incremental aggregator; feed records in stream order, then call [`Aggregator::finish`].
pub struct Aggregator {
    out: Aggregated,
    duplicates: DuplicatePolicy,
    seen: FxHashMap<Slot, usize>,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new(mode: &Mode, duplicates: DuplicatePolicy) -> Result<Self, MapError> {
        if let Mode::Flat { separator } = mode {
            if separator.is_empty() {
                return Err(MapError::EmptySeparator);
            }
        }
        Ok(Self {
            out: Aggregated::empty(mode),
            duplicates,
            seen: FxHashMap::default(),
            stats: AggregateStats::default(),
        })
    }

    pub fn push(&mut self, record: Record) -> Result<(), MapError> {
        let index = self.stats.records;
        let triple = Triple::from_record(&record).map_err(|e| MapError::record(index, e))?;
        let slot = match &self.out {
            Aggregated::Flat { separator, .. } => Slot::Path(triple.path(separator)),
            Aggregated::Nested(_) => Slot::Triple(triple.clone()),
        };

        if let Some(&first) = self.seen.get(&slot) {
            match self.duplicates {
                DuplicatePolicy::Reject => {
                    return Err(MapError::DuplicateTriple { triple, first, second: index });
                }
                DuplicatePolicy::Overwrite => {
                    warn!(key = %triple, first, second = index, "record overwrites an earlier record with the same key");
                    self.stats.overwritten += 1;
                }
            }
        }
        self.seen.insert(slot, index);

        match &mut self.out {
            Aggregated::Flat { separator, entries } => {
                entries.insert(triple.path(separator), record);
            }
            Aggregated::Nested(tree) => {
                let Triple { namespace, name, kind } = triple;
                tree.entry(namespace).or_default().entry(name).or_default().insert(kind, record);
            }
        }
        self.stats.records += 1;
        Ok(())
    }

    pub fn finish(mut self) -> (Aggregated, AggregateStats) {
        self.stats.entries = self.out.len();
        debug!(records = self.stats.records, entries = self.stats.entries, overwritten = self.stats.overwritten, "aggregation finished");
        (self.out, self.stats)
    }
}

/// Aggregate a whole record sequence.
pub fn aggregate<I>(records: I, mode: &Mode, duplicates: DuplicatePolicy) -> Result<(Aggregated, AggregateStats), MapError>
where
    I: IntoIterator<Item = Record>,
{
    let mut agg = Aggregator::new(mode, duplicates)?;
    for record in records {
        agg.push(record)?;
    }
    Ok(agg.finish())
}
