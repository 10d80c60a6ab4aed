// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::clause::Op;

/// The type family a field belongs to (spec.md §3). Numeric families
/// disable quoting and forbid wildcards in range expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Char,
    Int,
    Float,
    Bool,
    Date,
    Time,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, FieldType::Char)
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Char
    }
}

/// A field's alias relationship, per spec.md §3/§4.3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AliasTarget {
    #[default]
    None,
    /// Renames the leaf's field to `a` in place.
    Single(String),
    /// Rewrites the leaf into an OR of one leaf per alias target.
    Many(Vec<String>),
}

/// A rewriter invoked during serialization with `(field, op, value)`; its
/// return is used verbatim in place of the default rendering.
pub trait FieldCallback: fmt::Debug + Send + Sync {
    fn call(&self, field: &str, op: Op, value: &str) -> String;
}

/// Validates a scalar value for a field. The default accepts everything.
pub trait FieldValidator: fmt::Debug + Send + Sync {
    fn validate(&self, value: &str) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptAllValidator;

impl FieldValidator for AcceptAllValidator {
    fn validate(&self, _value: &str) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Metadata about a searchable field: name, aliases, type, optional
/// per-field rendering callback and validator (spec.md §3 C2).
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub alias_for: AliasTarget,
    pub field_type: FieldType,
    pub callback: Option<Arc<dyn FieldCallback>>,
    pub validator: Arc<dyn FieldValidator>,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("alias_for", &self.alias_for)
            .field("field_type", &self.field_type)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        FieldDescriptor {
            name: name.into(),
            alias_for: AliasTarget::None,
            field_type: FieldType::Char,
            callback: None,
            validator: Arc::new(AcceptAllValidator),
        }
    }

    pub fn with_alias(mut self, alias_for: AliasTarget) -> Self {
        self.alias_for = alias_for;
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn FieldCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validator = validator;
        self
    }
}

/// A name -> descriptor mapping owned by the parser configuration
/// (spec.md §3 "Field registry").
#[derive(Clone, Default)]
pub struct FieldRegistry(HashMap<String, FieldDescriptor>);

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("fields", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldRegistry {
    pub fn new() -> Self {
        FieldRegistry(HashMap::new())
    }

    pub fn insert(&mut self, descriptor: FieldDescriptor) {
        self.0.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Field names in a stable, sorted order (used when a dialect needs
    /// to expand a field-less clause to "all fields").
    pub fn names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Builds a registry from a plain list of names, each defaulting to
    /// `FieldType::Char` with no alias.
    pub fn from_names(names: &[&str]) -> Self {
        let mut reg = FieldRegistry::new();
        for name in names {
            reg.insert(FieldDescriptor::new(*name));
        }
        reg
    }

    /// Builds a registry from a list of `(name, descriptor-minus-name)`
    /// pairs, as produced when a caller supplies a map of name -> spec.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        let mut reg = FieldRegistry::new();
        for d in descriptors {
            reg.insert(d);
        }
        reg
    }
}
