//! Aggregation pipelines, evaluated stage by stage over JSON documents.
//!
//! ```txt
//! Match  -> keep documents matching a filter
//! Unwind -> one document per element of an array field
//! Group  -> one document per distinct `_id`, folding accumulators
//! Sort   -> order by one or more fields
//! Limit  -> keep the first n documents
//! ```

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Map, Value};

use super::{
    Document,
    query::{Filter, Sort, compare_values, lookup, sort_documents},
};

pub const GROUP_ID: &str = "_id";

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    /// top level array field
    Unwind(String),
    Group(Group),
    Sort(Vec<Sort>),
    Limit(usize),
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Min(String),
    Max(String),
    Sum(String),
    Count,
}

/// Groups documents by the values at `id` paths. Group order is the order in
/// which each `_id` was first seen.
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// output name, path
    id: Vec<(String, String)>,
    /// output name, accumulator
    fields: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, name: &str, path: &str) -> Self {
        self.id.push((name.to_string(), path.to_string()));
        self
    }

    pub fn field(mut self, name: &str, accumulator: Accumulator) -> Self {
        self.fields.push((name.to_string(), accumulator));
        self
    }

    fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut lut: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();

        for doc in &docs {
            let id: Map<String, Value> = self
                .id
                .iter()
                .map(|(name, path)| (name.clone(), lookup(doc, path).cloned().unwrap_or(Value::Null)))
                .collect();
            let id = Value::Object(id);

            let idx = *lut.entry(id.to_string()).or_insert_with(|| {
                groups.push((id, self.fields.iter().map(|(_, a)| AccumulatorState::new(a)).collect()));
                groups.len() - 1
            });

            for ((_, acc), state) in self.fields.iter().zip(groups[idx].1.iter_mut()) {
                state.add(acc, doc);
            }
        }

        groups
            .into_iter()
            .map(|(id, states)| {
                let mut out = Map::new();
                out.insert(GROUP_ID.to_string(), id);
                for ((name, _), state) in self.fields.iter().zip(states) {
                    out.insert(name.clone(), state.finish());
                }
                Value::Object(out)
            })
            .collect()
    }
}

enum AccumulatorState {
    /// min and max keep the input value so integers stay integers
    Extreme(Option<Value>),
    Sum { int: i64, float: f64, all_int: bool },
    Count(u64),
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Min(_) | Accumulator::Max(_) => Self::Extreme(None),
            Accumulator::Sum(_) => Self::Sum {
                int: 0,
                float: 0.,
                all_int: true,
            },
            Accumulator::Count => Self::Count(0),
        }
    }

    fn add(&mut self, acc: &Accumulator, doc: &Document) {
        match (self, acc) {
            (Self::Extreme(cur), Accumulator::Min(path) | Accumulator::Max(path)) => {
                let Some(value) = lookup(doc, path).filter(|v| v.is_number()) else {
                    return;
                };
                let wanted = match acc {
                    Accumulator::Min(_) => Ordering::Less,
                    _ => Ordering::Greater,
                };
                let replace = match cur.as_ref() {
                    Some(cur) => compare_values(value, cur) == Some(wanted),
                    None => true,
                };
                if replace {
                    *cur = Some(value.clone());
                }
            }
            (Self::Sum { int, float, all_int }, Accumulator::Sum(path)) => {
                let Some(Value::Number(n)) = lookup(doc, path) else {
                    return;
                };
                match n.as_i64() {
                    Some(i) if *all_int => *int += i,
                    _ => *all_int = false,
                }
                *float += n.as_f64().unwrap_or(0.);
            }
            (Self::Count(n), Accumulator::Count) => *n += 1,
            _ => {}
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Extreme(value) => value.unwrap_or(Value::Null),
            Self::Sum { int, all_int: true, .. } => Value::from(int),
            Self::Sum { float, .. } => Value::from(float),
            Self::Count(n) => Value::from(n),
        }
    }
}

fn unwind(docs: Vec<Document>, field: &str) -> Vec<Document> {
    let mut out = Vec::new();
    for doc in docs {
        let Some(Value::Array(items)) = doc.get(field) else {
            continue;
        };
        for item in items {
            let mut unwound = doc.clone();
            unwound[field] = item.clone();
            out.push(unwound);
        }
    }
    out
}

pub fn execute(mut docs: Vec<Document>, stages: &[Stage]) -> Vec<Document> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|doc| filter.matches(doc)).collect(),
            Stage::Unwind(field) => unwind(docs, field),
            Stage::Group(group) => group.apply(docs),
            Stage::Sort(sort) => {
                sort_documents(&mut docs, sort);
                docs
            }
            Stage::Limit(n) => {
                docs.truncate(*n);
                docs
            }
        };
    }
    docs
}
