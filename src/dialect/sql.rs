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
use crate::error::{QueryError, Result};
use crate::field::FieldRegistry;

use super::SqlOptions;

/// Render a tree as a single SQL boolean expression (spec.md §4.5 C7).
/// Unlike Native/SWISH, numeric ranges render as a `>= AND <=`
/// conjunction rather than an enumerated list — building a ten-way `OR`
/// for what a database can do with two comparisons has no upside once
/// the target is a query planner instead of a plain-text matcher.
pub fn render(tree: &QueryTree, fields: &FieldRegistry, opts: &SqlOptions) -> Result<String> {
    let mut conjuncts = Vec::new();
    for clause in &tree.must {
        conjuncts.push(render_positive(clause, fields, opts)?);
    }
    if !tree.should.is_empty() {
        let mut disjuncts = Vec::with_capacity(tree.should.len());
        for clause in &tree.should {
            disjuncts.push(render_positive(clause, fields, opts)?);
        }
        conjuncts.push(if disjuncts.len() == 1 {
            disjuncts.into_iter().next().unwrap()
        } else {
            format!("({})", disjuncts.join(" OR "))
        });
    }
    for clause in &tree.must_not {
        conjuncts.push(format!("NOT ({})", render_positive(clause, fields, opts)?));
    }
    if conjuncts.is_empty() {
        return Ok(String::new());
    }
    Ok(conjuncts.join(" AND "))
}

fn render_positive(clause: &Clause, fields: &FieldRegistry, opts: &SqlOptions) -> Result<String> {
    if clause.is_group() {
        render_group(clause, fields, opts)
    } else {
        render_leaf(clause, fields, opts)
    }
}

/// A single-child group is semantically redundant — `(expr)` doesn't
/// change what `expr` means — so it's rendered without the extra parens.
fn render_group(clause: &Clause, fields: &FieldRegistry, opts: &SqlOptions) -> Result<String> {
    let sub = clause.sub_tree().expect("group clause always carries a subtree");
    let children = child_list(sub);
    if children.len() == 1 {
        return render_positive(children[0], fields, opts);
    }
    Ok(format!("({})", render(sub, fields, opts)?))
}

fn child_list(tree: &QueryTree) -> Vec<&Clause> {
    let mut v = Vec::with_capacity(tree.must.len() + tree.should.len() + tree.must_not.len());
    v.extend(tree.must.iter());
    v.extend(tree.should.iter());
    v.extend(tree.must_not.iter());
    v
}

fn render_leaf(clause: &Clause, fields: &FieldRegistry, opts: &SqlOptions) -> Result<String> {
    match clause.field.as_deref() {
        Some(name) => render_leaf_for_field(clause, name, fields, opts),
        None => {
            let names = fields.names_sorted();
            if names.is_empty() {
                return Err(QueryError::dialect(
                    "SQL dialect needs a field for a field-less clause and no fields are registered",
                ));
            }
            let mut parts = Vec::with_capacity(names.len());
            for name in names {
                parts.push(render_leaf_for_field(clause, name, fields, opts)?);
            }
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}

fn render_leaf_for_field(clause: &Clause, name: &str, fields: &FieldRegistry, opts: &SqlOptions) -> Result<String> {
    if let Some(desc) = fields.get(name) {
        if let Some(cb) = &desc.callback {
            let value = clause.scalar_value().unwrap_or_default();
            return Ok(cb.call(name, clause.op, value));
        }
    }
    let is_numeric = fields.get(name).map(|d| d.field_type.is_numeric()).unwrap_or(false);
    let field_sql = if opts.quote_fields {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    };
    match &clause.value {
        ClauseValue::Scalar(v) => render_scalar_condition(clause.op, &field_sql, v, is_numeric, opts),
        ClauseValue::Range(lo, hi) => Ok(render_range_condition(clause.op, &field_sql, lo, hi)),
        ClauseValue::Sub(_) => unreachable!("group clauses are rendered via render_group"),
    }
}

/// A literal `*` is the dialect-neutral wildcard glyph; SQL rewrites it to
/// `%` and, when one is present, renders through the `LIKE`-keyword branch
/// regardless of the operator that was parsed (spec.md §4.5 C7) — an
/// explicit `Op::Ne`/`Op::Eq` with a wildcarded value still means "doesn't
/// match"/"matches", just expressed as `NOT ... LIKE`/`... LIKE`.
fn render_scalar_condition(op: Op, field: &str, value: &str, is_numeric: bool, opts: &SqlOptions) -> Result<String> {
    let normalized = value.replace('*', "%");
    if normalized.contains('%') {
        let like = format!(
            "{} {} {}",
            field,
            opts.like_keyword,
            sql_literal(&normalized, false)
        );
        return Ok(match op {
            Op::Ne | Op::NotFuzzy => format!("{} NOT {} {}", field, opts.like_keyword, sql_literal(&normalized, false)),
            _ => like,
        });
    }
    Ok(match op {
        Op::Eq | Op::EqEq => format!("{} = {}", field, sql_literal(&normalized, is_numeric)),
        Op::Ne => format!("{} <> {}", field, sql_literal(&normalized, is_numeric)),
        Op::Lt => format!("{} < {}", field, sql_literal(&normalized, is_numeric)),
        Op::Le => format!("{} <= {}", field, sql_literal(&normalized, is_numeric)),
        Op::Gt => format!("{} > {}", field, sql_literal(&normalized, is_numeric)),
        Op::Ge => format!("{} >= {}", field, sql_literal(&normalized, is_numeric)),
        Op::Contains | Op::Fuzzy | Op::FuzzyEq => format!(
            "{} {} {}",
            field,
            opts.like_keyword,
            sql_literal(&fuzzify(&normalized, opts), false)
        ),
        Op::NotFuzzy => format!(
            "{} NOT {} {}",
            field,
            opts.like_keyword,
            sql_literal(&fuzzify(&normalized, opts), false)
        ),
        Op::SetMember => {
            let members: Vec<String> = normalized
                .split(',')
                .map(|part| sql_literal(part.trim(), is_numeric))
                .collect();
            format!("{} IN ({})", field, members.join(", "))
        }
        Op::Range | Op::NotRange | Op::Group => {
            return Err(QueryError::dialect("range operator reached scalar rendering"))
        }
    })
}

fn render_range_condition(op: Op, field: &str, lo: &str, hi: &str) -> String {
    let lo_lit = sql_literal(lo, looks_numeric(lo));
    let hi_lit = sql_literal(hi, looks_numeric(hi));
    match op {
        Op::NotRange => format!("({} < {} OR {} > {})", field, lo_lit, field, hi_lit),
        _ => format!("{} >= {} AND {} <= {}", field, lo_lit, field, hi_lit),
    }
}

fn fuzzify(value: &str, opts: &SqlOptions) -> String {
    if opts.fuzzify2 {
        format!("%{}%", value)
    } else if opts.fuzzify {
        format!("{}%", value)
    } else {
        value.to_string()
    }
}

fn looks_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

fn sql_literal(value: &str, is_numeric: bool) -> String {
    if is_numeric {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::ast::tree::group_clause;
    use crate::dialect::DialectKind;
    use std::sync::Arc;
    use crate::field::{FieldDescriptor, FieldType};

    fn fields() -> Arc<FieldRegistry> {
        let mut reg = FieldRegistry::new();
        reg.insert(FieldDescriptor::new("foo"));
        reg.insert(FieldDescriptor::new("age").with_type(FieldType::Int));
        Arc::new(reg)
    }

    #[test]
    fn eq_clause_renders_quoted_literal() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("bar".into())));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "foo = 'bar'");
    }

    #[test]
    fn numeric_eq_clause_is_unquoted() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("age".into()), Op::Eq, ClauseValue::Scalar("30".into())));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "age = 30");
    }

    #[test]
    fn contains_uses_like_keyword() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("foo".into()), Op::Contains, ClauseValue::Scalar("bar".into())));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "foo ILIKE 'bar'");
    }

    #[test]
    fn embedded_wildcard_glyph_forces_the_like_op() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("ba*r".into())));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "foo ILIKE 'ba%r'");
    }

    #[test]
    fn negated_wildcard_glyph_forces_a_not_like() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("foo".into()), Op::Ne, ClauseValue::Scalar("ba*r".into())));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "foo NOT ILIKE 'ba%r'");
    }

    #[test]
    fn numeric_range_renders_as_conjunction() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(
            Some("age".into()),
            Op::Range,
            ClauseValue::Range("1".into(), "10".into()),
        ));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "age >= 1 AND age <= 10");
    }

    #[test]
    fn must_not_clause_is_negated_with_and() {
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("bar".into())));
        t.add_not_clause(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("baz".into())));
        let opts = SqlOptions::default();
        assert_eq!(
            render(&t, t.fields(), &opts).unwrap(),
            "foo = 'bar' AND NOT (foo = 'baz')"
        );
    }

    #[test]
    fn single_child_group_drops_redundant_parens() {
        let mut inner = QueryTree::new(DialectKind::sql_default(), fields());
        inner.add_or_clause(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("bar".into())));
        let mut t = QueryTree::new(DialectKind::sql_default(), fields());
        t.add_and_clause(group_clause(None, inner));
        let opts = SqlOptions::default();
        assert_eq!(render(&t, t.fields(), &opts).unwrap(), "foo = 'bar'");
    }
}
