use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::coerce;
use crate::error::{Error, Result};
use crate::loader::Sources;
use crate::path::KeyPath;
use crate::reload::HotReload;
use crate::schema::{Schema, ValidationResult};
use crate::value::Value;

pub(crate) type Layer = BTreeMap<KeyPath, Value>;

/// Merged configuration. `data` holds loaded and explicitly set values,
/// `defaults` holds programmatic fallbacks. The two layers are only
/// combined at lookup time. Within one layer no stored key is a prefix of
/// another: see `insert_entry`.
#[derive(Debug, Default)]
pub struct Config {
    pub(crate) data: Layer,
    pub(crate) defaults: Layer,
    pub(crate) schema: Option<Arc<Schema>>,
    pub(crate) sources: Sources,
    pub(crate) hot_reload: Option<HotReload>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: &Sources) -> Result<Self> {
        let mut config = Self::new();
        config.load(sources)?;
        Ok(config)
    }

    /// Runs every loader in `sources` and applies the results on top of the
    /// current data. Nothing is applied if any required source fails.
    pub fn load(&mut self, sources: &Sources) -> Result<()> {
        let entries = sources.collect()?;
        tracing::debug!(keys = entries.len(), "applying loaded configuration");
        for (path, value) in entries {
            insert_entry(&mut self.data, path, value);
        }

        self.sources.files.extend(sources.files.iter().cloned());
        if sources.env.is_some() {
            self.sources.env.clone_from(&sources.env);
        }
        if sources.args.is_some() {
            self.sources.args.clone_from(&sources.args);
        }
        Ok(())
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        insert_entry(&mut self.data, KeyPath::parse(key)?, value.into());
        Ok(())
    }

    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        insert_entry(&mut self.defaults, KeyPath::parse(key)?, value.into());
        Ok(())
    }

    /// Removes an explicitly set or loaded value, including everything
    /// stored below it. Defaults stay in place.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let path = KeyPath::parse(key).ok()?;
        let removed = value_at(&self.data, &path).ok().flatten()?;
        remove_entry(&mut self.data, &path);
        Some(removed)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.resolve(key).ok().flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Like `get`, but reports malformed keys and out-of-range array indexes.
    ///
    /// Lookup order: `data`, then `defaults` (maps from both layers are
    /// merged, data on top), then the underscore-flattened form of a dotted
    /// key as a compatibility fallback. A bad array descent in one layer is
    /// only reported when no other layer resolves the key.
    pub fn resolve(&self, key: &str) -> Result<Option<Value>> {
        let path = KeyPath::parse(key)?;

        let mut failure = None;
        let from_data = miss_on_error(value_at(&self.data, &path), &mut failure);
        let from_defaults = miss_on_error(value_at(&self.defaults, &path), &mut failure);
        let resolved = match (from_data, from_defaults) {
            (Some(Value::Map(overlay)), Some(Value::Map(mut base))) => {
                merge_maps(&mut base, overlay);
                Some(Value::Map(base))
            }
            (Some(Value::Null), Some(fallback)) => Some(fallback),
            (Some(value), _) => Some(value),
            (None, fallback) => fallback,
        };
        if resolved.is_some() {
            return Ok(resolved);
        }
        if path.len() < 2 {
            return failure.map_or(Ok(None), Err);
        }

        let flattened = path.flattened();
        match self.data.get(&flattened).or_else(|| self.defaults.get(&flattened)) {
            Some(value) => Ok(Some(value.clone())),
            None => failure.map_or(Ok(None), Err),
        }
    }

    /// Flat view of every stored key, data over defaults, in key order.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.defaults
            .iter()
            .chain(self.data.iter())
            .map(|(path, value)| (path.to_string(), value.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_keys().collect()
    }

    /// Nested JSON rendering of the effective configuration.
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = BTreeMap::new();
        for (path, value) in self.defaults.iter().chain(self.data.iter()) {
            insert_nested(&mut root, path.segments(), value.clone());
        }
        serde_json::Value::from(&Value::Map(root))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        coerce::to_bool(key, &self.require(key)?)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.lookup(key)? {
            Some(value) => coerce::to_bool(key, &value),
            None => Ok(default),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        coerce::to_int(key, &self.require(key)?)
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.lookup(key)? {
            Some(value) => coerce::to_int(key, &value),
            None => Ok(default),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        coerce::to_float(key, &self.require(key)?)
    }

    pub fn get_float_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.lookup(key)? {
            Some(value) => coerce::to_float(key, &value),
            None => Ok(default),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        coerce::to_string(key, &self.require(key)?)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String> {
        match self.lookup(key)? {
            Some(value) => coerce::to_string(key, &value),
            None => Ok(default.to_owned()),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<Vec<Value>> {
        coerce::to_array(key, &self.require(key)?)
    }

    pub fn get_array_or(&self, key: &str, default: Vec<Value>) -> Result<Vec<Value>> {
        match self.lookup(key)? {
            Some(value) => coerce::to_array(key, &value),
            None => Ok(default),
        }
    }

    pub fn get_map(&self, key: &str) -> Result<BTreeMap<String, Value>> {
        coerce::to_map(key, &self.require(key)?)
    }

    pub fn get_map_or(
        &self,
        key: &str,
        default: BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        match self.lookup(key)? {
            Some(value) => coerce::to_map(key, &value),
            None => Ok(default),
        }
    }

    /// Deserializes the value (or assembled section) under `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.require(key)?;
        serde_json::from_value(serde_json::Value::from(&value)).map_err(|err| {
            Error::type_mismatch(key, std::any::type_name::<T>(), err)
        })
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Attaches a shared schema and registers its declared defaults where
    /// no default was set yet.
    pub fn set_schema(&mut self, schema: Arc<Schema>) {
        for (path, value) in schema.defaults() {
            if matches!(value_at(&self.defaults, &path), Ok(None)) {
                insert_entry(&mut self.defaults, path, value);
            }
        }
        self.schema = Some(schema);
    }

    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.set_schema(schema);
        self
    }

    pub fn validate(&self) -> ValidationResult {
        match &self.schema {
            Some(schema) => schema.validate(self),
            None => {
                let mut result = ValidationResult::default();
                result
                    .warnings
                    .push("no schema attached; nothing was validated".to_owned());
                result
            }
        }
    }

    /// Stored nulls read as absent.
    fn lookup(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.resolve(key)?.filter(|value| !value.is_null()))
    }

    fn require(&self, key: &str) -> Result<Value> {
        self.lookup(key)?.ok_or_else(|| Error::MissingKey(key.to_owned()))
    }
}

fn miss_on_error(found: Result<Option<Value>>, failure: &mut Option<Error>) -> Option<Value> {
    found.unwrap_or_else(|err| {
        failure.get_or_insert(err);
        None
    })
}

/// Looks `path` up in one layer: the exact key, else a stored ancestor
/// descended with the remaining segments, else a map assembled from the
/// keys stored below `path`.
fn value_at(layer: &Layer, path: &KeyPath) -> Result<Option<Value>> {
    if let Some(value) = layer.get(path) {
        return Ok(Some(value.clone()));
    }
    for mid in (1..path.len()).rev() {
        let (ancestor, rest) = path.split_at(mid);
        if let Some(parent) = layer.get(&ancestor) {
            return descend(parent, rest, &ancestor.to_string());
        }
    }

    let mut assembled = BTreeMap::new();
    for (candidate, value) in descendants(layer, path) {
        insert_nested(
            &mut assembled,
            &candidate.segments()[path.len()..],
            value.clone(),
        );
    }
    if assembled.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Map(assembled)))
}

/// Entries stored strictly below `path`.
fn descendants<'a>(
    layer: &'a Layer,
    path: &'a KeyPath,
) -> impl Iterator<Item = (&'a KeyPath, &'a Value)> + 'a {
    layer
        .range(path.clone()..)
        .skip_while(move |(candidate, _)| *candidate == path)
        .take_while(move |(candidate, _)| candidate.starts_with(path))
}

/// Stores `value` at `path`, replacing everything the layer held at or
/// below it. When an ancestor of `path` is stored, the value is written
/// into that ancestor instead, so no stored key is a prefix of another.
pub(crate) fn insert_entry(layer: &mut Layer, path: KeyPath, value: Value) {
    let below: Vec<KeyPath> = descendants(layer, &path)
        .map(|(candidate, _)| candidate.clone())
        .collect();
    for candidate in below {
        layer.remove(&candidate);
    }

    for mid in (1..path.len()).rev() {
        let (ancestor, rest) = path.split_at(mid);
        if let Some(parent) = layer.get_mut(&ancestor) {
            write_into(parent, rest, value);
            return;
        }
    }
    layer.insert(path, value);
}

/// Writes `value` at `segments` inside `target`. Array items are addressed
/// by index (the length appends); anything that cannot hold the segment is
/// replaced by a map.
fn write_into(target: &mut Value, segments: &[String], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Ok(index) = segment.parse::<usize>() {
            if index == items.len() {
                items.push(Value::Null);
            }
            if let Some(item) = items.get_mut(index) {
                write_into(item, rest, value);
                return;
            }
        }
    }
    if !matches!(target, Value::Map(_)) {
        *target = Value::Map(BTreeMap::new());
    }
    if let Value::Map(entries) = target {
        let child = entries.entry(segment.clone()).or_insert(Value::Null);
        write_into(child, rest, value);
    }
}

fn remove_entry(layer: &mut Layer, path: &KeyPath) {
    if layer.remove(path).is_some() {
        return;
    }
    for mid in (1..path.len()).rev() {
        let (ancestor, rest) = path.split_at(mid);
        if let Some(parent) = layer.get_mut(&ancestor) {
            remove_within(parent, rest);
            return;
        }
    }
    let below: Vec<KeyPath> = descendants(layer, path)
        .map(|(candidate, _)| candidate.clone())
        .collect();
    for candidate in below {
        layer.remove(&candidate);
    }
}

fn remove_within(target: &mut Value, segments: &[String]) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    match target {
        Value::Map(entries) if rest.is_empty() => {
            entries.remove(segment);
        }
        Value::Map(entries) => {
            if let Some(child) = entries.get_mut(segment) {
                remove_within(child, rest);
            }
        }
        Value::Array(items) => {
            let Ok(index) = segment.parse::<usize>() else {
                return;
            };
            if rest.is_empty() && index < items.len() {
                items.remove(index);
            } else if let Some(child) = items.get_mut(index) {
                remove_within(child, rest);
            }
        }
        _ => {}
    }
}

fn descend(value: &Value, segments: &[String], at: &str) -> Result<Option<Value>> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(Some(value.clone()));
    };

    match value {
        Value::Map(entries) => match entries.get(segment) {
            Some(child) => descend(child, rest, &format!("{at}.{segment}")),
            None => Ok(None),
        },
        Value::Array(items) => {
            let index: usize = segment.parse().map_err(|_| {
                Error::InvalidPath(format!("'{segment}' is not an index into array '{at}'"))
            })?;
            match items.get(index) {
                Some(child) => descend(child, rest, &format!("{at}.{segment}")),
                None => Err(Error::InvalidArrayIndex {
                    path: at.to_owned(),
                    index,
                    len: items.len(),
                }),
            }
        }
        _ => Ok(None),
    }
}

fn insert_nested(map: &mut BTreeMap<String, Value>, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        merge_maps(map, BTreeMap::from([(first.clone(), value)]));
        return;
    }

    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Map(BTreeMap::new()));
    if !matches!(entry, Value::Map(_)) {
        *entry = Value::Map(BTreeMap::new());
    }
    if let Value::Map(child) = entry {
        insert_nested(child, rest, value);
    }
}

fn merge_maps(base: &mut BTreeMap<String, Value>, overlay: BTreeMap<String, Value>) {
    for (key, value) in overlay {
        if let Value::Map(incoming) = value {
            if let Some(Value::Map(existing)) = base.get_mut(&key) {
                merge_maps(existing, incoming);
                continue;
            }
            base.insert(key, Value::Map(incoming));
        } else {
            base.insert(key, value);
        }
    }
}
