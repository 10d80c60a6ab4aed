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

//! A polyglot search-query library: tokenize and parse a Lucene/Google-style
//! query string into a boolean AST, rewrite it against a field registry
//! (aliases, validation), and serialize it back out as a Native, SQL, or
//! SWISH-E query string.
//!
//! ```
//! use queryq::{parser, DialectKind, FieldRegistry, ParserConfigBuilder};
//! use std::sync::Arc;
//!
//! let config = ParserConfigBuilder::new()
//!     .fields(FieldRegistry::from_names(&["title", "author"]))
//!     .dialect(DialectKind::sql_default())
//!     .build()
//!     .unwrap();
//! let tree = parser(Arc::new(config)).parse("+title:rust -author:doe").unwrap();
//! assert_eq!(
//!     tree.to_string_default().unwrap(),
//!     "title ILIKE 'rust' AND NOT (author ILIKE 'doe')"
//! );
//! ```

pub mod ast;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expand;
pub mod field;
pub mod parser;

pub use ast::clause::{Clause, ClauseValue, Op, Quote};
pub use ast::tree::{is_all_negatives, Bucket, QueryTree, TreeSnapshot};
pub use config::{DefaultBoolOp, ParserConfig, ParserConfigBuilder, TermExpander, TokenPatterns};
pub use dialect::{DialectDisplay, DialectKind, SqlOptions, SwishOptions};
pub use error::{QueryError, Result};
pub use field::{
    AcceptAllValidator, AliasTarget, FieldCallback, FieldDescriptor, FieldRegistry, FieldType, FieldValidator,
};
pub use parser::{parser, Parser};

/// Parse `input` with `parser`'s configuration and run alias expansion,
/// field validation, and term expansion over the result in one call —
/// the common case when a caller doesn't need the raw pre-expansion
/// tree (spec.md §4, C9).
pub fn parse_and_expand(p: &Parser, input: &str) -> Result<QueryTree> {
    let mut tree = p.parse(input)?;
    expand::expand(&mut tree, p.config(), input)?;
    Ok(tree)
}
