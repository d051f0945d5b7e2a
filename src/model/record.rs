use burn::module::Module;
use burn::record::{FullPrecisionSettings, Record};
use burn::tensor::backend::Backend;
use serde_json::{Map, Value};

use crate::error::CheckpointError;

/// Outcome of restoring a saved module record into a live module, by
/// field path (`encoder.weight`, `layers.0.bias`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    /// Saved entries the live module has no field for.
    pub unknown: Vec<String>,
    /// Entries present on both sides whose tensor shapes differ.
    pub shape_mismatch: Vec<String>,
    /// Live fields absent from the saved record. They keep their current
    /// values.
    pub missing: Vec<String>,
}

impl RestoreReport {
    fn sort(&mut self) {
        self.restored.sort();
        self.unknown.sort();
        self.shape_mismatch.sort();
        self.missing.sort();
    }

    pub fn is_exact(&self) -> bool {
        self.unknown.is_empty() && self.shape_mismatch.is_empty() && self.missing.is_empty()
    }
}

/// Full-precision record item of `module`, as JSON.
pub fn export_record<B: Backend, M: Module<B>>(module: &M) -> Result<Value, CheckpointError> {
    let item = module
        .clone()
        .into_record()
        .into_item::<FullPrecisionSettings>();
    Ok(serde_json::to_value(item)?)
}

/// Load every saved parameter whose path and shape match a field of
/// `module`. Everything else is skipped and reported; skipped live
/// parameters keep their values.
pub fn restore_record<B: Backend, M: Module<B>>(
    module: M,
    saved: &Value,
    device: &B::Device,
) -> Result<(M, RestoreReport), CheckpointError> {
    let live = export_record(&module)?;
    let mut report = RestoreReport::default();
    let merged = merge(live, saved, "", &mut report);
    report.sort();

    let item: <M::Record as Record<B>>::Item<FullPrecisionSettings> =
        serde_json::from_value(merged)?;
    let record = <M::Record as Record<B>>::from_item::<FullPrecisionSettings>(item, device);
    Ok((module.load_record(record), report))
}

/// Paths of all parameters in a saved module record.
pub fn parameter_paths(saved: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_parameters(saved, "", &mut paths);
    paths
}

fn collect_parameters(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(fields) if is_parameter(fields) => out.push(path.to_string()),
        Value::Object(fields) => {
            for (name, child) in fields {
                collect_parameters(child, &join(path, name), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_parameters(child, &join(path, &i.to_string()), out);
            }
        }
        _ => {}
    }
}

fn merge(live: Value, saved: &Value, path: &str, report: &mut RestoreReport) -> Value {
    match (live, saved) {
        (Value::Object(live), Value::Object(saved)) if is_parameter(&live) => {
            if shapes(&live) == shapes(saved) {
                report.restored.push(path.to_string());
                Value::Object(saved.clone())
            } else {
                report.shape_mismatch.push(path.to_string());
                Value::Object(live)
            }
        }
        (Value::Object(live), Value::Object(saved)) => {
            for name in saved.keys().filter(|name| !live.contains_key(*name)) {
                report.unknown.push(join(path, name));
            }
            let mut merged = Map::new();
            for (name, value) in live {
                let child = join(path, &name);
                let value = match saved.get(&name) {
                    Some(saved) => merge(value, saved, &child, report),
                    None => {
                        report.missing.push(child);
                        value
                    }
                };
                merged.insert(name, value);
            }
            Value::Object(merged)
        }
        (Value::Array(live), Value::Array(saved)) if live.len() == saved.len() => Value::Array(
            live.into_iter()
                .zip(saved)
                .enumerate()
                .map(|(i, (live, saved))| merge(live, saved, &join(path, &i.to_string()), report))
                .collect(),
        ),
        (live, saved) if same_kind(&live, saved) => saved.clone(),
        (live, _) => {
            report.shape_mismatch.push(path.to_string());
            live
        }
    }
}

/// A parameter (`{id, param}`) or a bare tensor (`{shape, ...}`) is restored
/// as a unit.
fn is_parameter(fields: &Map<String, Value>) -> bool {
    fields.contains_key("param") || fields.contains_key("shape")
}

fn shapes(fields: &Map<String, Value>) -> Vec<&Value> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        match value {
            Value::Object(fields) => {
                for (name, child) in fields {
                    if name == "shape" {
                        out.push(child);
                    } else {
                        walk(child, out);
                    }
                }
            }
            Value::Array(items) => items
                .iter()
                .filter(|item| item.is_object())
                .for_each(|item| walk(item, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    for (name, child) in fields {
        if name == "shape" {
            out.push(child);
        } else {
            walk(child, &mut out);
        }
    }
    out
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Null, Value::Null)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
    )
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
