// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Ordered name→value field table for decoded responses.
//!
//! `HashMap`/`BTreeMap` do not preserve insertion order, and stable
//! pretty-printing/dict export needs it (`spec.md` §3, §9). This is the
//! "parallel vector of keys" construction the spec names explicitly: an
//! insertion-ordered `Vec` backs iteration and serialization, with a
//! `HashMap` index alongside for O(1) lookup by name.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

/// A single decoded value: a human-readable rendering plus the typed
/// value and the raw bytes it was decoded from, so callers can either
/// print `display` or consume `typed`/`raw` for round-trip verification.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub display: String,
    pub typed: Typed,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    Numeric(i128),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn numeric(display: impl Into<String>, value: i128, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            display: display.into(),
            typed: Typed::Numeric(value),
            raw: raw.into(),
        }
    }

    pub fn text(display: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        let display = display.into();
        Self {
            typed: Typed::Text(display.clone()),
            display,
            raw: raw.into(),
        }
    }

    pub fn bytes(display: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        Self {
            display: display.into(),
            typed: Typed::Bytes(raw.clone()),
            raw,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.display)
    }
}

/// An insertion-ordered `name -> FieldValue` table.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    order: Vec<(String, FieldValue)>,
    index: HashMap<String, usize>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        if let Some(&pos) = self.index.get(&name) {
            self.order[pos].1 = value;
        } else {
            self.index.insert(name.clone(), self.order.len());
            self.order.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.index.get(name).map(|&i| &self.order[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.order.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Serialize for FieldTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (k, v) in &self.order {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
