//! Query, update and pipeline evaluation for the in-memory store.
//!
//! Covers the subset of the MongoDB query language the repository layer and
//! its tests rely on. Anything outside that subset is rejected with
//! `StoreError::UnsupportedOperator` rather than silently ignored.

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use crate::store::{StoreError, StoreResult};

// ============================================================================
// Field paths
// ============================================================================

/// Resolves a dotted field path such as `address.city`.
pub(crate) fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                other => Err(StoreError::invalid_query(format!(
                    "cannot create field '{}' in element {{{}: {}}}",
                    rest, head, other
                ))),
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

// ============================================================================
// Value comparison
// ============================================================================

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn as_count(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(v) => u64::try_from(*v).ok(),
        Bson::Int64(v) => u64::try_from(*v).ok(),
        Bson::Double(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
        _ => None,
    }
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Ordering between two values of comparable types, `None` otherwise.
fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (Bson::String(l), Bson::String(r)) => Some(l.cmp(r)),
        (Bson::Boolean(l), Bson::Boolean(r)) => Some(l.cmp(r)),
        (Bson::DateTime(l), Bson::DateTime(r)) => Some(l.cmp(r)),
        (Bson::ObjectId(l), Bson::ObjectId(r)) => Some(l.bytes().cmp(&r.bytes())),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Canonical type rank used when sorting values of different types.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let by_rank = type_rank(left).cmp(&type_rank(right));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (left, right) {
        (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Returns whether `doc` satisfies `filter`. An empty filter matches everything.
pub(crate) fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => sub_filters(key, condition)?
                .iter()
                .try_fold(true, |acc, sub| Ok::<_, StoreError>(acc && matches(doc, sub)?))?,
            "$or" => sub_filters(key, condition)?
                .iter()
                .try_fold(false, |acc, sub| Ok::<_, StoreError>(acc || matches(doc, sub)?))?,
            "$nor" => !sub_filters(key, condition)?
                .iter()
                .try_fold(false, |acc, sub| Ok::<_, StoreError>(acc || matches(doc, sub)?))?,
            op if op.starts_with('$') => return Err(StoreError::unsupported(op)),
            path => matches_field(lookup_path(doc, path), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(operator: &str, condition: &'a Bson) -> StoreResult<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(StoreError::invalid_query(format!(
            "{} argument must be an array",
            operator
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => Ok(sub),
            _ => Err(StoreError::invalid_query(format!(
                "{} entries must be documents",
                operator
            ))),
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(doc) => doc.keys().next().is_some_and(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
    if !is_operator_document(condition) {
        return Ok(matches_equal(value, condition));
    }
    let Bson::Document(operators) = condition else {
        return Ok(false);
    };
    for (operator, argument) in operators {
        if !matches_operator(value, operator, argument)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_equal(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) => {
            items.iter().any(|item| values_equal(item, target))
                || matches!(target, Bson::Array(_)) && value == Some(target)
        }
        Some(found) => values_equal(found, target),
    }
}

fn matches_range(value: Option<&Bson>, argument: &Bson, accept: fn(Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, argument).is_some_and(accept)),
        Some(found) => compare_values(found, argument).is_some_and(accept),
        None => false,
    }
}

fn matches_in(value: Option<&Bson>, operator: &str, argument: &Bson) -> StoreResult<bool> {
    let Bson::Array(candidates) = argument else {
        return Err(StoreError::invalid_query(format!(
            "{} needs an array",
            operator
        )));
    };
    Ok(candidates
        .iter()
        .any(|candidate| matches_equal(value, candidate)))
}

fn matches_operator(value: Option<&Bson>, operator: &str, argument: &Bson) -> StoreResult<bool> {
    let result = match operator {
        "$eq" => matches_equal(value, argument),
        "$ne" => !matches_equal(value, argument),
        "$gt" => matches_range(value, argument, |o| o == Ordering::Greater),
        "$gte" => matches_range(value, argument, |o| o != Ordering::Less),
        "$lt" => matches_range(value, argument, |o| o == Ordering::Less),
        "$lte" => matches_range(value, argument, |o| o != Ordering::Greater),
        "$in" => matches_in(value, operator, argument)?,
        "$nin" => !matches_in(value, operator, argument)?,
        "$exists" => {
            let wanted = match argument {
                Bson::Boolean(flag) => *flag,
                other => as_f64(other).is_some_and(|n| n != 0.0),
            };
            value.is_some() == wanted
        }
        other => return Err(StoreError::unsupported(other)),
    };
    Ok(result)
}

// ============================================================================
// Updates
// ============================================================================

/// Applies an update expression in place.
///
/// Only operator updates are accepted; a plain document is rejected the same
/// way MongoDB rejects a replacement passed to an update call.
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> StoreResult<()> {
    if update.is_empty() {
        return Err(StoreError::invalid_query("update document must not be empty"));
    }
    for (operator, argument) in update {
        let Bson::Document(fields) = argument else {
            if operator.starts_with('$') {
                return Err(StoreError::invalid_query(format!(
                    "{} argument must be a document",
                    operator
                )));
            }
            return Err(StoreError::invalid_query(
                "update document requires atomic operators",
            ));
        };
        for (path, value) in fields {
            if path == "_id" || path.starts_with("_id.") {
                return Err(StoreError::invalid_query("field '_id' is immutable"));
            }
            match operator.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$unset" => remove_path(doc, path),
                "$inc" => increment(doc, path, value)?,
                op if op.starts_with('$') => return Err(StoreError::unsupported(op)),
                _ => {
                    return Err(StoreError::invalid_query(
                        "update document requires atomic operators",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn increment(doc: &mut Document, path: &str, delta: &Bson) -> StoreResult<()> {
    if as_f64(delta).is_none() {
        return Err(StoreError::invalid_query(format!(
            "cannot increment '{}' by a non-numeric value",
            path
        )));
    }
    let next = match lookup_path(doc, path) {
        None => delta.clone(),
        Some(current) => add_numbers(current, delta).ok_or_else(|| {
            StoreError::invalid_query(format!(
                "cannot apply $inc to non-numeric field '{}'",
                path
            ))
        })?,
    };
    set_path(doc, path, next)
}

fn add_numbers(left: &Bson, right: &Bson) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(l), Bson::Int32(r)) => Some(
            l.checked_add(*r)
                .map(Bson::Int32)
                .unwrap_or_else(|| Bson::Int64(i64::from(*l) + i64::from(*r))),
        ),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            as_i64(left)?.checked_add(as_i64(right)?).map(Bson::Int64)
        }
        _ => Some(Bson::Double(as_f64(left)? + as_f64(right)?)),
    }
}

// ============================================================================
// Aggregation pipelines
// ============================================================================

/// Runs `pipeline` over `documents` and returns the resulting documents.
pub(crate) fn run_pipeline(
    mut documents: Vec<Document>,
    pipeline: &[Document],
) -> StoreResult<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, argument)), None) = (entries.next(), entries.next()) else {
            return Err(StoreError::invalid_query(
                "a pipeline stage must have exactly one field",
            ));
        };
        documents = match name.as_str() {
            "$match" => {
                let filter = stage_document(name, argument)?;
                let mut kept = Vec::with_capacity(documents.len());
                for doc in documents {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$skip" => {
                let skip = stage_count(name, argument)?;
                documents
                    .into_iter()
                    .skip(usize::try_from(skip).unwrap_or(usize::MAX))
                    .collect()
            }
            "$limit" => {
                let limit = stage_count(name, argument)?;
                if limit == 0 {
                    return Err(StoreError::invalid_query("$limit must be positive"));
                }
                documents.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                documents
            }
            "$sort" => {
                let keys = stage_document(name, argument)?;
                sort_documents(&mut documents, keys)?;
                documents
            }
            "$project" => {
                let spec = stage_document(name, argument)?;
                project_documents(documents, spec)?
            }
            "$count" => {
                let Bson::String(field) = argument else {
                    return Err(StoreError::invalid_query("$count needs a field name"));
                };
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let total = i64::try_from(documents.len()).unwrap_or(i64::MAX);
                    let value = i32::try_from(total)
                        .map(Bson::Int32)
                        .unwrap_or(Bson::Int64(total));
                    let mut counted = Document::new();
                    counted.insert(field.as_str(), value);
                    vec![counted]
                }
            }
            other => return Err(StoreError::unsupported(other)),
        };
    }
    Ok(documents)
}

fn stage_document<'a>(stage: &str, argument: &'a Bson) -> StoreResult<&'a Document> {
    match argument {
        Bson::Document(doc) => Ok(doc),
        _ => Err(StoreError::invalid_query(format!(
            "{} stage needs a document",
            stage
        ))),
    }
}

fn stage_count(stage: &str, argument: &Bson) -> StoreResult<u64> {
    as_count(argument).ok_or_else(|| {
        StoreError::invalid_query(format!("{} needs a non-negative integer", stage))
    })
}

pub(crate) fn sort_documents(documents: &mut [Document], keys: &Document) -> StoreResult<()> {
    let mut order = Vec::with_capacity(keys.len());
    for (path, direction) in keys {
        let descending = match as_f64(direction) {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => {
                return Err(StoreError::invalid_query(format!(
                    "sort direction for '{}' must be 1 or -1",
                    path
                )));
            }
        };
        order.push((path.as_str(), descending));
    }
    documents.sort_by(|a, b| {
        for (path, descending) in &order {
            let ordering = sort_order(lookup_path(a, path), lookup_path(b, path));
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn project_documents(documents: Vec<Document>, spec: &Document) -> StoreResult<Vec<Document>> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for (path, flag) in spec {
        let keep = match flag {
            Bson::Boolean(b) => *b,
            other => as_f64(other)
                .map(|n| n != 0.0)
                .ok_or_else(|| StoreError::unsupported(format!("$project expression on '{}'", path)))?,
        };
        if path == "_id" {
            include_id = keep;
        } else if keep {
            included.push(path.as_str());
        } else {
            excluded.push(path.as_str());
        }
    }
    if !included.is_empty() && !excluded.is_empty() {
        return Err(StoreError::invalid_query(
            "cannot mix inclusion and exclusion in $project",
        ));
    }
    check_path_collisions(included.iter().chain(&excluded).copied())?;

    documents
        .into_iter()
        .map(|mut doc| {
            if included.is_empty() {
                for path in &excluded {
                    remove_path(&mut doc, path);
                }
                if !include_id {
                    doc.remove("_id");
                }
                return Ok(doc);
            }
            let mut out = Document::new();
            if include_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id", id.clone());
                }
            }
            for path in &included {
                if let Some(value) = lookup_path(&doc, path) {
                    set_path(&mut out, path, value.clone())?;
                }
            }
            Ok(out)
        })
        .collect()
}

/// Rejects projections naming the same path twice or a path together with
/// one of its sub-paths, e.g. `a` and `a.b`.
fn check_path_collisions<'a>(paths: impl Iterator<Item = &'a str>) -> StoreResult<()> {
    let mut seen: Vec<&str> = Vec::new();
    for path in paths {
        let collides = seen.iter().any(|other| {
            let (short, long) = if other.len() <= path.len() {
                (*other, path)
            } else {
                (path, *other)
            };
            long == short
                || (long.starts_with(short) && long.as_bytes().get(short.len()) == Some(&b'.'))
        });
        if collides {
            return Err(StoreError::invalid_query(format!(
                "Path collision at {}",
                path
            )));
        }
        seen.push(path);
    }
    Ok(())
}
