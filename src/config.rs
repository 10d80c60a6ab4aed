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
use std::sync::Arc;

use regex::Regex;

use crate::ast::clause::Op;
use crate::dialect::DialectKind;
use crate::error::{QueryError, Result};
use crate::field::FieldRegistry;

/// The sign a clause carries when the user wrote no explicit `+`/`-`
/// prefix (spec.md §6 `default_boolop`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultBoolOp {
    /// `+` — implicit AND.
    And,
    /// `""` — implicit OR.
    Or,
}

impl Default for DefaultBoolOp {
    fn default() -> Self {
        DefaultBoolOp::And
    }
}

/// Rewrites a bareword term into zero or more replacement terms during
/// parsing (spec.md §4.6). Fires before alias expansion.
pub trait TermExpander: fmt::Debug + Send + Sync {
    fn expand(&self, term: &str) -> Vec<String>;
}

/// The compiled token-class patterns that drive the tokenizer (spec.md
/// §4.1). Each is anchored at the current cursor position when matched.
#[derive(Debug, Clone)]
pub struct TokenRegexes {
    pub term: Regex,
    pub field: Regex,
    pub op: Regex,
    pub op_nofield: Regex,
    pub and: Regex,
    pub or: Regex,
    pub not: Regex,
    pub near: Regex,
    pub range: Regex,
}

const DEFAULT_TERM: &str = r"[^\s()]+";
const DEFAULT_FIELD: &str = r"[.\w]+";
const DEFAULT_OP: &str = r"~\d+|==|<=|>=|!=|=~|!~|[:=<>~#]";
const DEFAULT_OP_NOFIELD: &str = r"=~|!~|[~:#]";
const DEFAULT_AND: &str = r"(?i)AND";
const DEFAULT_OR: &str = r"(?i)OR";
const DEFAULT_NOT: &str = r"(?i)NOT";
const DEFAULT_NEAR: &str = r"(?i)NEAR\d+";
const DEFAULT_RANGE: &str = r"\.\.";

impl TokenRegexes {
    fn compile(source: &str) -> Result<Regex> {
        Regex::new(&format!("^(?:{})", source))
            .map_err(|e| QueryError::config(format!("invalid regex /{}/: {}", source, e)))
    }

    pub fn from_patterns(patterns: &TokenPatterns) -> Result<Self> {
        Ok(TokenRegexes {
            term: Self::compile(&patterns.term)?,
            field: Self::compile(&patterns.field)?,
            op: Self::compile(&patterns.op)?,
            op_nofield: Self::compile(&patterns.op_nofield)?,
            and: Self::compile(&patterns.and)?,
            or: Self::compile(&patterns.or)?,
            not: Self::compile(&patterns.not)?,
            near: Self::compile(&patterns.near)?,
            range: Self::compile(&patterns.range)?,
        })
    }
}

/// The source strings for `TokenRegexes`, as a caller would override them
/// via the `*_regex` configuration keys in spec.md §6.
#[derive(Debug, Clone)]
pub struct TokenPatterns {
    pub term: String,
    pub field: String,
    pub op: String,
    pub op_nofield: String,
    pub and: String,
    pub or: String,
    pub not: String,
    pub near: String,
    pub range: String,
}

impl Default for TokenPatterns {
    fn default() -> Self {
        TokenPatterns {
            term: DEFAULT_TERM.to_string(),
            field: DEFAULT_FIELD.to_string(),
            op: DEFAULT_OP.to_string(),
            op_nofield: DEFAULT_OP_NOFIELD.to_string(),
            and: DEFAULT_AND.to_string(),
            or: DEFAULT_OR.to_string(),
            not: DEFAULT_NOT.to_string(),
            near: DEFAULT_NEAR.to_string(),
            range: DEFAULT_RANGE.to_string(),
        }
    }
}

/// Frozen, immutable parser configuration, built once and shared (via
/// `Arc`) across parser instances (spec.md §5, §6).
#[derive(Clone)]
pub struct ParserConfig {
    pub default_boolop: DefaultBoolOp,
    pub default_field: Option<String>,
    pub default_op: Op,
    pub fields: Arc<FieldRegistry>,
    pub dialect: DialectKind,
    pub croak_on_error: bool,
    pub sloppy: bool,
    pub term_expander: Option<Arc<dyn TermExpander>>,
    pub phrase_delim: char,
    pub regexes: Arc<TokenRegexes>,
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("default_boolop", &self.default_boolop)
            .field("default_field", &self.default_field)
            .field("default_op", &self.default_op)
            .field("fields", &self.fields)
            .field("dialect", &self.dialect)
            .field("croak_on_error", &self.croak_on_error)
            .field("sloppy", &self.sloppy)
            .field("has_term_expander", &self.term_expander.is_some())
            .field("phrase_delim", &self.phrase_delim)
            .finish()
    }
}

/// Builder for `ParserConfig`, mirroring the option table in spec.md §6.
#[derive(Debug, Clone, Default)]
pub struct ParserConfigBuilder {
    default_boolop: DefaultBoolOp,
    default_field: Option<String>,
    default_op: Option<Op>,
    fields: Option<FieldRegistry>,
    dialect: Option<DialectKind>,
    croak_on_error: bool,
    sloppy: bool,
    term_expander: Option<Arc<dyn TermExpander>>,
    phrase_delim: Option<char>,
    patterns: TokenPatterns,
}

impl ParserConfigBuilder {
    pub fn new() -> Self {
        ParserConfigBuilder {
            croak_on_error: true,
            ..Default::default()
        }
    }

    pub fn default_boolop(mut self, op: DefaultBoolOp) -> Self {
        self.default_boolop = op;
        self
    }

    pub fn default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    pub fn default_op(mut self, op: Op) -> Self {
        self.default_op = Some(op);
        self
    }

    pub fn fields(mut self, fields: FieldRegistry) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn croak_on_error(mut self, croak: bool) -> Self {
        self.croak_on_error = croak;
        self
    }

    pub fn sloppy(mut self, sloppy: bool) -> Self {
        self.sloppy = sloppy;
        self
    }

    pub fn term_expander(mut self, expander: Arc<dyn TermExpander>) -> Self {
        self.term_expander = Some(expander);
        self
    }

    pub fn phrase_delim(mut self, delim: char) -> Self {
        self.phrase_delim = Some(delim);
        self
    }

    pub fn term_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.term = pattern.into();
        self
    }

    pub fn field_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.field = pattern.into();
        self
    }

    pub fn op_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.op = pattern.into();
        self
    }

    pub fn and_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.and = pattern.into();
        self
    }

    pub fn or_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.or = pattern.into();
        self
    }

    pub fn not_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.not = pattern.into();
        self
    }

    pub fn near_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.near = pattern.into();
        self
    }

    pub fn range_regex(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.range = pattern.into();
        self
    }

    pub fn build(self) -> Result<ParserConfig> {
        let regexes = TokenRegexes::from_patterns(&self.patterns)?;
        Ok(ParserConfig {
            default_boolop: self.default_boolop,
            default_field: self.default_field,
            default_op: self.default_op.unwrap_or(Op::Contains),
            fields: Arc::new(self.fields.unwrap_or_default()),
            dialect: self.dialect.unwrap_or(DialectKind::Native),
            croak_on_error: self.croak_on_error,
            sloppy: self.sloppy,
            term_expander: self.term_expander,
            phrase_delim: self.phrase_delim.unwrap_or('"'),
            regexes: Arc::new(regexes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    #[test]
    fn build_succeeds_with_defaults() {
        let cfg = ParserConfigBuilder::new().build().unwrap();
        assert_eq!(cfg.default_op, Op::Contains);
        assert!(cfg.croak_on_error);
        assert!(!cfg.sloppy);
    }

    #[test]
    fn bad_regex_surfaces_config_error() {
        let err = ParserConfigBuilder::new()
            .term_regex("(unclosed")
            .build()
            .unwrap_err();
        assert_matches!(err, QueryError::Config { .. });
    }
}
