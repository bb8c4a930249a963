//! Raw query builder: filter plus projection, sort, skip, limit and populate.

use crate::filter::{Filter, resolve_path};
use doclayer_model::{ID_FIELD, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Inclusive projection. `_id` is always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<String>,
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply(&self, record: Record) -> Record {
        record
            .into_map()
            .into_iter()
            .filter(|(key, _)| key == ID_FIELD || self.fields.iter().any(|f| f == key))
            .collect()
    }
}

/// Where a populate path's ids point to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTarget {
    pub collection: String,
    pub foreign_field: String,
}

/// A relation path to hydrate in place.
///
/// The target is filled in by the repository from the entity's reference
/// declarations when the caller only names the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatePath {
    pub path: String,
    pub target: Option<RelationTarget>,
}

impl PopulatePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: None,
        }
    }

    pub fn to(
        path: impl Into<String>,
        collection: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            target: Some(RelationTarget {
                collection: collection.into(),
                foreign_field: foreign_field.into(),
            }),
        }
    }
}

/// A store query, built fluently and executed by a `DocumentStore`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Filter,
    pub projection: Option<Projection>,
    pub sort: Vec<SortKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub populate: Vec<PopulatePath>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn populate(mut self, path: PopulatePath) -> Self {
        self.populate.push(path);
        self
    }

    /// Orders `records` by the query's sort keys; stable for equal keys.
    pub fn sort_records(&self, records: &mut [Record]) {
        if self.sort.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for key in &self.sort {
                let ordering = compare_values(
                    resolve_path(a, &key.field),
                    resolve_path(b, &key.field),
                );
                let ordering = match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Applies skip and limit to an already filtered and sorted result.
    pub fn window(&self, records: Vec<Record>) -> Vec<Record> {
        let skip = self.skip.unwrap_or(0);
        let iter = records.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Missing and null sort first, then booleans, numbers, strings, others.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
