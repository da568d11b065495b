//! Property sources and typed property binding.
//!
//! # Responsibilities
//! - Hold flattened `dotted.key = value` properties
//! - Layer sources: DSL defaults < property files < environment
//! - Bind every key under a prefix onto a `Deserialize` type
//!
//! # Design Decisions
//! - Keys are normalized (lowercase, `-` → `_`) so `max-size` binds `max_size`
//! - Environment names map `CITY_NAME` → `city.name`
//! - Values stay strings until binding; the target type decides how to parse

use std::collections::BTreeMap;

use serde::de::{
    self, value::MapDeserializer, value::SeqDeserializer, DeserializeOwned, Deserializer,
    IntoDeserializer, Unexpected, Visitor,
};
use serde::forward_to_deserialize_any;

/// Failure to bind properties onto a typed target.
#[derive(Debug, thiserror::Error)]
#[error("failed to bind properties under `{prefix}`: {source}")]
pub struct PropertyError {
    pub prefix: String,
    #[source]
    pub source: de::value::Error,
}

/// A flat, ordered set of properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySource {
    values: BTreeMap<String, String>,
}

impl PropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    pub fn from_env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut source = Self::new();
        for (name, value) in vars {
            let name = name.as_ref();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                continue;
            }
            let key: Vec<&str> = name.split('_').filter(|s| !s.is_empty()).collect();
            if !key.is_empty() {
                source.set(&key.join("."), value);
            }
        }
        source
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` on top of this source; `other` wins on conflicts.
    pub fn extend(&mut self, other: &PropertySource) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Bind every property under `prefix.` onto `T`.
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, PropertyError> {
        let prefix = normalize_key(prefix);
        let scope = format!("{prefix}.");
        let mut root = Tree::Node(BTreeMap::new());

        for (key, value) in self.values.range(scope.clone()..) {
            let Some(rest) = key.strip_prefix(&scope) else {
                break;
            };
            root.insert(rest.split('.'), value);
        }

        T::deserialize(TreeDeserializer(&root)).map_err(|source| PropertyError { prefix, source })
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

#[derive(Debug)]
enum Tree {
    Leaf(String),
    Node(BTreeMap<String, Tree>),
}

impl Tree {
    fn insert<'a>(&mut self, mut path: impl Iterator<Item = &'a str>, value: &str) {
        let Some(segment) = path.next() else {
            // a leaf never replaces a subtree
            if !matches!(self, Tree::Node(children) if !children.is_empty()) {
                *self = Tree::Leaf(value.to_string());
            }
            return;
        };
        if let Tree::Leaf(_) = self {
            *self = Tree::Node(BTreeMap::new());
        }
        if let Tree::Node(children) = self {
            children
                .entry(segment.to_string())
                .or_insert_with(|| Tree::Node(BTreeMap::new()))
                .insert(path, value);
        }
    }
}

type BindError = de::value::Error;

/// Deserializes a single string value into whatever the visitor asks for.
#[derive(Clone, Copy)]
struct LeafDeserializer<'a>(&'a str);

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident : $ty:ty, $expected:literal;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
                match self.0.trim().parse::<$ty>() {
                    Ok(value) => visitor.$visit(value),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(self.0), &$expected)),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for LeafDeserializer<'_> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_str(self.0)
    }

    parse_scalar! {
        deserialize_bool => visit_bool: bool, "a boolean";
        deserialize_i8 => visit_i8: i8, "an integer";
        deserialize_i16 => visit_i16: i16, "an integer";
        deserialize_i32 => visit_i32: i32, "an integer";
        deserialize_i64 => visit_i64: i64, "an integer";
        deserialize_u8 => visit_u8: u8, "an unsigned integer";
        deserialize_u16 => visit_u16: u16, "an unsigned integer";
        deserialize_u32 => visit_u32: u32, "an unsigned integer";
        deserialize_u64 => visit_u64: u64, "an unsigned integer";
        deserialize_f32 => visit_f32: f32, "a number";
        deserialize_f64 => visit_f64: f64, "a number";
        deserialize_char => visit_char: char, "a single character";
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.0.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    /// Comma-separated values: `a, b, c`.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let items = self
            .0
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(LeafDeserializer);
        let mut seq = SeqDeserializer::<_, BindError>::new(items);
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_enum(IntoDeserializer::<'de, BindError>::into_deserializer(self.0.trim()))
    }

    forward_to_deserialize_any! {
        str string bytes byte_buf unit_struct tuple
        tuple_struct map struct identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, BindError> for LeafDeserializer<'_> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

#[derive(Clone, Copy)]
struct TreeDeserializer<'a>(&'a Tree);

macro_rules! leaf_or_any {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
                match self.0 {
                    Tree::Leaf(value) => LeafDeserializer(value).$method(visitor),
                    Tree::Node(_) => self.deserialize_any(visitor),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for TreeDeserializer<'_> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.0 {
            Tree::Leaf(value) => visitor.visit_str(value),
            Tree::Node(children) => {
                let entries = children
                    .iter()
                    .map(|(key, child)| (key.as_str(), TreeDeserializer(child)));
                let mut map: MapDeserializer<'de, _, BindError> = MapDeserializer::new(entries);
                let value = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(value)
            }
        }
    }

    leaf_or_any! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_unit
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.0 {
            Tree::Leaf(value) => LeafDeserializer(value).deserialize_option(visitor),
            Tree::Node(_) => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    /// Indexed keys (`hosts.0`, `hosts.1`) or a comma-separated leaf.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.0 {
            Tree::Leaf(value) => LeafDeserializer(value).deserialize_seq(visitor),
            Tree::Node(children) => {
                let mut indexed = Vec::with_capacity(children.len());
                for (key, child) in children {
                    let index: usize = key.parse().map_err(|_| {
                        de::Error::invalid_value(Unexpected::Str(key), &"a list index")
                    })?;
                    indexed.push((index, child));
                }
                indexed.sort_by_key(|(index, _)| *index);
                let mut seq = SeqDeserializer::<_, BindError>::new(
                    indexed.into_iter().map(|(_, child)| TreeDeserializer(child)),
                );
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        match self.0 {
            Tree::Leaf(value) => LeafDeserializer(value).deserialize_enum(name, variants, visitor),
            Tree::Node(_) => Err(de::Error::invalid_type(Unexpected::Map, &"a unit variant")),
        }
    }

    forward_to_deserialize_any! {
        str string bytes byte_buf unit_struct tuple
        tuple_struct map struct identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, BindError> for TreeDeserializer<'_> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}
