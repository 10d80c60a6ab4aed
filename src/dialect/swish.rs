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

use crate::ast::clause::{Clause, ClauseValue, Op};
use crate::ast::tree::QueryTree;
use crate::error::Result;
use crate::field::FieldRegistry;

use super::{expand_int_range, SwishOptions};

/// Render a tree as a SWISH-E boolean query string (spec.md §4.5 C8).
///
/// Unlike Native, SWISH has no bucket-prefix syntax: the three buckets are
/// joined with the keyword `AND`, the `""` (should) bucket's members are
/// joined with `OR`, and a `-` (must-not) member is rendered through its
/// own negated form rather than a leading sign. A clause with no field is
/// rendered against `opts.default_field`.
pub fn render(tree: &QueryTree, fields: &FieldRegistry, opts: &SwishOptions) -> Result<String> {
    Ok(combine(bucket_conjuncts(tree, fields, opts)?))
}

/// One conjunct per non-empty bucket, carrying whether it's a raw
/// (unparenthesized) `OR`-join so `combine` only brackets it when it is
/// actually being combined with something else.
struct Conjunct {
    text: String,
    is_or: bool,
}

/// The must/should/must_not buckets, each reduced to one conjunct.
fn bucket_conjuncts(tree: &QueryTree, fields: &FieldRegistry, opts: &SwishOptions) -> Result<Vec<Conjunct>> {
    let mut conjuncts = Vec::new();
    if !tree.must.is_empty() {
        let mut parts = Vec::with_capacity(tree.must.len());
        for clause in &tree.must {
            parts.push(render_clause(clause, fields, opts, false)?);
        }
        conjuncts.push(Conjunct { text: parts.join(" AND "), is_or: false });
    }
    if !tree.should.is_empty() {
        let mut parts = Vec::with_capacity(tree.should.len());
        for clause in &tree.should {
            parts.push(render_clause(clause, fields, opts, false)?);
        }
        conjuncts.push(Conjunct { text: parts.join(" OR "), is_or: parts.len() > 1 });
    }
    if !tree.must_not.is_empty() {
        let mut parts = Vec::with_capacity(tree.must_not.len());
        for clause in &tree.must_not {
            parts.push(render_clause(clause, fields, opts, true)?);
        }
        conjuncts.push(Conjunct { text: parts.join(" AND "), is_or: false });
    }
    Ok(conjuncts)
}

/// Join bucket conjuncts with `AND`. A lone conjunct is returned as-is
/// (even an unparenthesized `OR`-join) since there is nothing to
/// disambiguate it against; multiple conjuncts bracket any `OR`-join
/// among them so `AND`/`OR` precedence doesn't get reinterpreted.
fn combine(conjuncts: Vec<Conjunct>) -> String {
    if conjuncts.len() == 1 {
        return conjuncts.into_iter().next().unwrap().text;
    }
    conjuncts
        .into_iter()
        .map(|c| if c.is_or { format!("({})", c.text) } else { c.text })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn render_clause(clause: &Clause, fields: &FieldRegistry, opts: &SwishOptions, negate: bool) -> Result<String> {
    if clause.is_group() {
        render_group(clause, fields, opts, negate)
    } else {
        render_leaf(clause, fields, opts, negate)
    }
}

/// A single-child group collapses its parentheses (spec.md §4.5); a
/// `-`-prefixed group otherwise always renders as `NOT ( … )`, distinct
/// from a negated leaf's `field=(NOT "value")` form.
fn render_group(clause: &Clause, fields: &FieldRegistry, opts: &SwishOptions, negate: bool) -> Result<String> {
    let sub = clause.sub_tree().expect("group clause always carries a subtree");
    if child_count(sub) == 1 {
        let only = sub
            .must
            .iter()
            .chain(sub.should.iter())
            .chain(sub.must_not.iter())
            .next()
            .expect("child_count == 1");
        return render_clause(only, fields, opts, negate);
    }
    let body = combine(bucket_conjuncts(sub, fields, opts)?);
    Ok(if negate {
        format!("NOT ({})", body)
    } else {
        format!("({})", body)
    })
}

fn child_count(tree: &QueryTree) -> usize {
    tree.must.len() + tree.should.len() + tree.must_not.len()
}

fn render_leaf(clause: &Clause, fields: &FieldRegistry, opts: &SwishOptions, negate: bool) -> Result<String> {
    let field_name = clause.field.as_deref().unwrap_or(&opts.default_field);
    if let Some(desc) = fields.get(field_name) {
        if let Some(cb) = &desc.callback {
            let value = clause.scalar_value().unwrap_or_default();
            return Ok(cb.call(field_name, clause.op, value));
        }
    }
    match &clause.value {
        ClauseValue::Scalar(v) => render_scalar_leaf(clause.op, field_name, v, negate),
        ClauseValue::Range(lo, hi) => render_range_leaf(clause.op, field_name, lo, hi, negate),
        ClauseValue::Sub(_) => unreachable!("group clauses are rendered via render_group"),
    }
}

/// `!~` forces a wildcard onto the value and renders as `NOT field="value*"`
/// regardless of bucket; every other operator renders as a plain quoted
/// `field="value"`, wrapped in `field=(NOT "value")` when `negate` (the
/// clause sits in the `-` bucket).
fn render_scalar_leaf(op: Op, field: &str, value: &str, negate: bool) -> Result<String> {
    if matches!(op, Op::Fuzzy | Op::NotFuzzy) {
        let expr = format!("{}=\"{}\"", field, force_wildcard(value));
        return Ok(if op == Op::NotFuzzy { format!("NOT {}", expr) } else { expr });
    }
    let quoted = format!("\"{}\"", value);
    Ok(if negate {
        format!("{}=(NOT {})", field, quoted)
    } else {
        format!("{}={}", field, quoted)
    })
}

fn force_wildcard(value: &str) -> String {
    if value.contains('*') {
        value.to_string()
    } else {
        format!("{}*", value)
    }
}

/// Numeric ranges enumerate as an `OR`-joined list; a non-numeric bound is
/// a hard error, unlike Native's literal `lo..hi` fallback — SWISH has no
/// range token to fall back to (spec.md §4.5 C8).
fn render_range_leaf(op: Op, field: &str, lo: &str, hi: &str, negate: bool) -> Result<String> {
    let values = expand_int_range(lo, hi)?;
    let enumerated = format!("({})", values.join(" OR "));
    let body = if op == Op::NotRange {
        format!("(NOT {})", enumerated)
    } else {
        enumerated
    };
    Ok(if negate {
        format!("{}=(NOT {})", field, body)
    } else {
        format!("{}={}", field, body)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::ast::tree::group_clause;
    use crate::dialect::DialectKind;
    use std::sync::Arc;

    fn fields() -> Arc<FieldRegistry> {
        Arc::new(FieldRegistry::from_names(&["foo", "color", "date", "name"]))
    }

    fn opts() -> SwishOptions {
        SwishOptions::default()
    }

    #[test]
    fn field_less_leaf_uses_default_field() {
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(Clause::new(None, Op::Contains, ClauseValue::Scalar("hello".into())));
        assert_eq!(render(&t, t.fields(), &opts()).unwrap(), "swishdefault=\"hello\"");
    }

    /// The spec.md §8 scenario: `-color:red (name:john OR foo:bar)` with
    /// fields `{foo,color,name}` renders as
    /// `(name="john" OR foo="bar") AND color=(NOT "red")`.
    #[test]
    fn negated_leaf_and_or_group_match_the_scenario_table() {
        let mut inner = QueryTree::new(DialectKind::swish_default(), fields());
        inner.add_or_clause(Clause::new(Some("name".into()), Op::Contains, ClauseValue::Scalar("john".into())));
        inner.add_or_clause(Clause::new(Some("foo".into()), Op::Contains, ClauseValue::Scalar("bar".into())));

        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(group_clause(None, inner));
        t.add_not_clause(Clause::new(Some("color".into()), Op::Contains, ClauseValue::Scalar("red".into())));

        assert_eq!(
            render(&t, t.fields(), &opts()).unwrap(),
            "(name=\"john\" OR foo=\"bar\") AND color=(NOT \"red\")"
        );
    }

    #[test]
    fn multi_child_group_keeps_its_parens_without_an_extra_wrap() {
        let mut inner = QueryTree::new(DialectKind::swish_default(), fields());
        inner.add_or_clause(Clause::new(Some("color".into()), Op::Eq, ClauseValue::Scalar("red".into())));
        inner.add_or_clause(Clause::new(Some("color".into()), Op::Eq, ClauseValue::Scalar("green".into())));
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(group_clause(None, inner));
        assert_eq!(render(&t, t.fields(), &opts()).unwrap(), "(color=\"red\" OR color=\"green\")");
    }

    #[test]
    fn negated_group_wraps_the_whole_thing_in_not() {
        let mut inner = QueryTree::new(DialectKind::swish_default(), fields());
        inner.add_or_clause(Clause::new(Some("color".into()), Op::Eq, ClauseValue::Scalar("red".into())));
        inner.add_or_clause(Clause::new(Some("color".into()), Op::Eq, ClauseValue::Scalar("green".into())));
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_not_clause(group_clause(None, inner));
        assert_eq!(
            render(&t, t.fields(), &opts()).unwrap(),
            "NOT (color=\"red\" OR color=\"green\")"
        );
    }

    #[test]
    fn not_fuzzy_leaf_forces_a_trailing_wildcard() {
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(Clause::new(Some("name".into()), Op::NotFuzzy, ClauseValue::Scalar("john".into())));
        assert_eq!(render(&t, t.fields(), &opts()).unwrap(), "NOT name=\"john*\"");
    }

    #[test]
    fn not_fuzzy_leaf_does_not_duplicate_an_existing_wildcard() {
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(Clause::new(Some("name".into()), Op::NotFuzzy, ClauseValue::Scalar("joh*".into())));
        assert_eq!(render(&t, t.fields(), &opts()).unwrap(), "NOT name=\"joh*\"");
    }

    #[test]
    fn numeric_range_enumerates_with_or() {
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(Clause::new(
            Some("date".into()),
            Op::Range,
            ClauseValue::Range("1".into(), "3".into()),
        ));
        assert_eq!(render(&t, t.fields(), &opts()).unwrap(), "date=(1 OR 2 OR 3)");
    }

    #[test]
    fn non_numeric_range_is_a_hard_error() {
        let mut t = QueryTree::new(DialectKind::swish_default(), fields());
        t.add_and_clause(Clause::new(
            Some("date".into()),
            Op::Range,
            ClauseValue::Range("jan".into(), "feb".into()),
        ));
        assert!(render(&t, t.fields(), &opts()).is_err());
    }
}
