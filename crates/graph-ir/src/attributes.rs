// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator and graph attribute storage (compile-time parameters).
//!
//! Attributes are a string-keyed tagged union over scalars and arrays of
//! `i64`, `f64`, and `String` — the parameter vocabulary an importer
//! needs to describe operators (axes, permutations, epsilons, strides).

use crate::GraphError;
use std::collections::HashMap;
use std::fmt;

/// A single attribute payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strs(Vec<String>),
}

impl Attribute {
    /// A short label for the stored type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Attribute::Int(_) => "int",
            Attribute::Float(_) => "float",
            Attribute::Str(_) => "string",
            Attribute::Ints(_) => "ints",
            Attribute::Floats(_) => "floats",
            Attribute::Strs(_) => "strings",
        }
    }
}

impl From<i64> for Attribute {
    fn from(v: i64) -> Self {
        Attribute::Int(v)
    }
}
impl From<f64> for Attribute {
    fn from(v: f64) -> Self {
        Attribute::Float(v)
    }
}
impl From<&str> for Attribute {
    fn from(v: &str) -> Self {
        Attribute::Str(v.to_string())
    }
}
impl From<String> for Attribute {
    fn from(v: String) -> Self {
        Attribute::Str(v)
    }
}
impl From<Vec<i64>> for Attribute {
    fn from(v: Vec<i64>) -> Self {
        Attribute::Ints(v)
    }
}
impl From<Vec<f64>> for Attribute {
    fn from(v: Vec<f64>) -> Self {
        Attribute::Floats(v)
    }
}
impl From<Vec<String>> for Attribute {
    fn from(v: Vec<String>) -> Self {
        Attribute::Strs(v)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, "]")
        }
        match self {
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::Float(v) => write!(f, "{v}"),
            Attribute::Str(v) => write!(f, "\"{v}\""),
            Attribute::Ints(v) => join(f, v),
            Attribute::Floats(v) => join(f, v),
            Attribute::Strs(v) => join(f, v),
        }
    }
}

/// String-keyed attribute map attached to operators and graphs.
///
/// # Examples
/// ```
/// use graph_ir::AttributeMap;
///
/// let mut attrs = AttributeMap::new();
/// attrs.set("axis", 1i64);
/// attrs.set("epsilon", 1e-5f64);
/// assert_eq!(attrs.get_int("axis").unwrap(), 1);
/// assert!(attrs.get_int("epsilon").is_err()); // type mismatch
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttributeMap {
    attrs: HashMap<String, Attribute>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an attribute, replacing any previous value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Attribute>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Attribute> {
        self.attrs.remove(key)
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Raw access for inspection and debugging.
    pub fn raw(&self) -> &HashMap<String, Attribute> {
        &self.attrs
    }

    /// Untyped lookup.
    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.attrs.get(key)
    }

    fn typed_get<'a, T>(
        &'a self,
        key: &str,
        expected: &'static str,
        extract: impl Fn(&'a Attribute) -> Option<T>,
    ) -> Result<T, GraphError> {
        let attr = self.attrs.get(key).ok_or_else(|| GraphError::AttributeMissing {
            key: key.to_string(),
        })?;
        extract(attr).ok_or_else(|| GraphError::AttributeTypeMismatch {
            key: key.to_string(),
            expected,
            actual: attr.type_name(),
        })
    }

    /// Typed lookup; fails on a missing key or a stored type mismatch.
    pub fn get_int(&self, key: &str) -> Result<i64, GraphError> {
        self.typed_get(key, "int", |a| match a {
            Attribute::Int(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_float(&self, key: &str) -> Result<f64, GraphError> {
        self.typed_get(key, "float", |a| match a {
            Attribute::Float(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_str(&self, key: &str) -> Result<&str, GraphError> {
        self.typed_get(key, "string", |a| match a {
            Attribute::Str(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn get_ints(&self, key: &str) -> Result<&[i64], GraphError> {
        self.typed_get(key, "ints", |a| match a {
            Attribute::Ints(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    pub fn get_floats(&self, key: &str) -> Result<&[f64], GraphError> {
        self.typed_get(key, "floats", |a| match a {
            Attribute::Floats(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    pub fn get_strs(&self, key: &str) -> Result<&[String], GraphError> {
        self.typed_get(key, "strings", |a| match a {
            Attribute::Strs(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    /// Non-failing typed lookup.
    pub fn try_int(&self, key: &str) -> Option<i64> {
        self.get_int(key).ok()
    }

    pub fn try_float(&self, key: &str) -> Option<f64> {
        self.get_float(key).ok()
    }

    pub fn try_str(&self, key: &str) -> Option<&str> {
        self.get_str(key).ok()
    }
}

impl fmt::Display for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut keys: Vec<&String> = self.attrs.keys().collect();
        keys.sort();
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={}", self.attrs[*key])?;
        }
        write!(f, "}}")
    }
}

/// Well-known attribute keys shared between importers and operators.
pub mod attr_names {
    pub const AXIS: &str = "axis";
    pub const AXES: &str = "axes";
    pub const ALPHA: &str = "alpha";
    pub const BETA: &str = "beta";
    pub const GAMMA: &str = "gamma";
    pub const EPSILON: &str = "epsilon";
    pub const KEEP_DIMS: &str = "keepdims";
    pub const PERM: &str = "perm";
    pub const TRANS_A: &str = "transA";
    pub const TRANS_B: &str = "transB";
    pub const STRIDES: &str = "strides";
    pub const PADS: &str = "pads";
    pub const DILATIONS: &str = "dilations";
    pub const KERNEL_SHAPE: &str = "kernel_shape";
    pub const GROUP: &str = "group";
}
