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

use std::fmt;
use std::fmt::Write as _;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ast::tree::QueryTree;
use crate::error::{QueryError, Result};
use crate::field::FieldRegistry;

pub mod native;
pub mod sql;
pub mod swish;

/// `query_class_opts` for the SQL dialect (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SqlOptions {
    /// Keyword used for a fuzzy/contains match; its negation is derived
    /// by prefixing `NOT `.
    pub like_keyword: String,
    pub quote_fields: bool,
    /// Append the wildcard unless one is already present.
    pub fuzzify: bool,
    /// Surround the value with wildcards on both sides.
    pub fuzzify2: bool,
}

impl Default for SqlOptions {
    fn default() -> Self {
        SqlOptions {
            like_keyword: "ILIKE".to_string(),
            quote_fields: false,
            fuzzify: false,
            fuzzify2: false,
        }
    }
}

/// `query_class_opts` for the SWISH dialect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwishOptions {
    /// The implicit field registered when the caller didn't provide one.
    pub default_field: String,
}

impl Default for SwishOptions {
    fn default() -> Self {
        SwishOptions {
            default_field: "swishdefault".to_string(),
        }
    }
}

/// The target dialect a query tree renders to (spec.md §4.5). Modeled as
/// a tagged variant over the shared AST rather than the source's
/// inheritance tree, per spec.md §9's design note.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DialectKind {
    Native,
    Sql(SqlOptions),
    Swish(SwishOptions),
}

impl DialectKind {
    pub fn native() -> Self {
        DialectKind::Native
    }

    pub fn sql_default() -> Self {
        DialectKind::Sql(SqlOptions::default())
    }

    pub fn swish_default() -> Self {
        DialectKind::Swish(SwishOptions::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::Native => "Native",
            DialectKind::Sql(_) => "SQL",
            DialectKind::Swish(_) => "SWISH",
        }
    }
}

/// A type that can render itself into a target dialect's string form.
/// Kept close to the teacher's `DialectDisplay` trait shape
/// (`fmt`/convenience string method) but parameterized over the field
/// registry as well, since several dialects need field-type lookups to
/// decide quoting and wildcard rules.
pub trait DialectDisplay {
    fn fmt(&self, f: &mut dyn fmt::Write, dialect: &DialectKind, fields: &FieldRegistry) -> Result<()>;

    fn render(&self, dialect: &DialectKind, fields: &FieldRegistry) -> Result<String>
    where
        Self: Sized,
    {
        let mut buf = String::new();
        DialectDisplay::fmt(self, &mut buf, dialect, fields)?;
        Ok(buf)
    }
}

impl DialectDisplay for QueryTree {
    fn fmt(&self, f: &mut dyn fmt::Write, dialect: &DialectKind, fields: &FieldRegistry) -> Result<()> {
        let rendered = render_tree(self, dialect, fields)?;
        f.write_str(&rendered).map_err(QueryError::from)
    }
}

/// Entry point used by `QueryTree::to_string_dialect`/`to_string_default`.
pub fn render_tree(tree: &QueryTree, dialect: &DialectKind, fields: &FieldRegistry) -> Result<String> {
    match dialect {
        DialectKind::Native => native::render(tree, fields),
        DialectKind::Sql(opts) => sql::render(tree, fields, opts),
        DialectKind::Swish(opts) => swish::render(tree, fields, opts),
    }
}

/// Expand an inclusive integer range into its enumerated decimal string
/// members, as used by the Native and SWISH range-expansion rules
/// (spec.md §4.5, §8). Returns a `Dialect` error for a non-numeric or
/// malformed bound.
pub(crate) fn expand_int_range(lo: &str, hi: &str) -> Result<Vec<String>> {
    let lo: i64 = lo
        .parse()
        .map_err(|_| QueryError::dialect(format!("non-numeric range bound: {}", lo)))?;
    let hi: i64 = hi
        .parse()
        .map_err(|_| QueryError::dialect(format!("non-numeric range bound: {}", hi)))?;
    if lo > hi {
        return Err(QueryError::dialect(format!(
            "invalid range: {} is greater than {}",
            lo, hi
        )));
    }
    Ok((lo..=hi).map(|v| v.to_string()).collect())
}
