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

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ast::tree::QueryTree;

/// A single leaf or group node of a query tree.
///
/// A leaf clause has a scalar or range `value`; a group clause has
/// `op == Op::Group` and a `ClauseValue::Sub` subtree. `proximity` is only
/// meaningful when `quote == Quote::Double` (a phrase).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clause {
    /// Absent/empty means "default field" at serialization time.
    pub field: Option<String>,
    pub op: Op,
    pub value: ClauseValue,
    /// The quote delimiter the user typed, retained for re-emission.
    pub quote: Quote,
    /// `~N` proximity suffix on a quoted phrase.
    pub proximity: Option<u32>,
}

impl Clause {
    pub fn new(field: Option<String>, op: Op, value: ClauseValue) -> Self {
        Clause {
            field,
            op,
            value,
            quote: Quote::None,
            proximity: None,
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_proximity(mut self, proximity: Option<u32>) -> Self {
        self.proximity = proximity;
        self
    }

    pub fn is_group(&self) -> bool {
        matches!(self.op, Op::Group)
    }

    /// Field name, falling back to `default` when unset.
    pub fn field_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.field.as_deref().unwrap_or(default)
    }

    pub fn scalar_value(&self) -> Option<&str> {
        match &self.value {
            ClauseValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn range_value(&self) -> Option<(&str, &str)> {
        match &self.value {
            ClauseValue::Range(lo, hi) => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn sub_tree(&self) -> Option<&QueryTree> {
        match &self.value {
            ClauseValue::Sub(tree) => Some(tree),
            _ => None,
        }
    }
}

/// The operators recognized by the grammar (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Op {
    /// `:` — contains (the default operator)
    Contains,
    /// `=` — exact
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `~` — regex/fuzzy match
    Fuzzy,
    /// `!~` — negated regex/fuzzy match
    NotFuzzy,
    /// `=~`
    FuzzyEq,
    /// `#` — set membership
    SetMember,
    /// `..` — range
    Range,
    /// `!..` — negated range
    NotRange,
    /// `()` — parenthesized group; `value` is always `ClauseValue::Sub`
    Group,
}

impl Op {
    /// `true` for `Op::Range`/`Op::NotRange`.
    pub fn is_range(&self) -> bool {
        matches!(self, Op::Range | Op::NotRange)
    }

    /// Flip a plain range operator to its negated form and vice versa.
    /// Non-range operators are returned unchanged.
    pub fn negate_range(&self) -> Op {
        match self {
            Op::Range => Op::NotRange,
            Op::NotRange => Op::Range,
            other => *other,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Op::Contains => ":",
            Op::Eq => "=",
            Op::EqEq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Fuzzy => "~",
            Op::NotFuzzy => "!~",
            Op::FuzzyEq => "=~",
            Op::SetMember => "#",
            Op::Range => "..",
            Op::NotRange => "!..",
            Op::Group => "()",
        }
    }

    /// Map a token matched by `op_regex`/`op_nofield_regex` to its `Op`.
    /// A bare `~N` (a fuzzy-match tolerance, distinct from the `~N`
    /// proximity suffix on a quoted phrase) maps to `Op::Fuzzy`.
    pub fn from_token(tok: &str) -> Option<Op> {
        if tok.len() > 1 && tok.starts_with('~') && tok[1..].bytes().all(|b| b.is_ascii_digit()) {
            return Some(Op::Fuzzy);
        }
        match tok {
            ":" => Some(Op::Contains),
            "=" => Some(Op::Eq),
            "==" => Some(Op::EqEq),
            "!=" => Some(Op::Ne),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Le),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Ge),
            "~" => Some(Op::Fuzzy),
            "!~" => Some(Op::NotFuzzy),
            "=~" => Some(Op::FuzzyEq),
            "#" => Some(Op::SetMember),
            _ => None,
        }
    }
}

/// The value carried by a clause.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClauseValue {
    Scalar(String),
    /// `[lo, hi]`
    Range(String, String),
    /// Present only on `Op::Group` clauses.
    Sub(QueryTree),
}

/// The quote delimiter a value was typed with, recorded for re-emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quote {
    #[default]
    None,
    Double,
    Single,
}

impl Quote {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '"' => Some(Quote::Double),
            '\'' => Some(Quote::Single),
            _ => None,
        }
    }

    pub fn as_char(&self) -> &'static str {
        match self {
            Quote::None => "",
            Quote::Double => "\"",
            Quote::Single => "'",
        }
    }

    pub fn is_phrase(&self) -> bool {
        matches!(self, Quote::Double)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_range_round_trips() {
        assert_eq!(Op::Range.negate_range(), Op::NotRange);
        assert_eq!(Op::NotRange.negate_range(), Op::Range);
        assert_eq!(Op::Eq.negate_range(), Op::Eq);
    }

    #[test]
    fn from_token_recognizes_fuzzy_tolerance_suffix() {
        assert_eq!(Op::from_token("~2"), Some(Op::Fuzzy));
        assert_eq!(Op::from_token("=="), Some(Op::EqEq));
        assert_eq!(Op::from_token("???"), None);
    }

    #[test]
    fn field_or_falls_back_to_default() {
        let c = Clause::new(None, Op::Contains, ClauseValue::Scalar("bar".into()));
        assert_eq!(c.field_or("default"), "default");
        let c2 = Clause::new(
            Some("foo".into()),
            Op::Contains,
            ClauseValue::Scalar("bar".into()),
        );
        assert_eq!(c2.field_or("default"), "foo");
    }
}
