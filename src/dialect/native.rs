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

use crate::ast::clause::{Clause, ClauseValue, Op, Quote};
use crate::ast::tree::QueryTree;
use crate::error::Result;
use crate::field::FieldRegistry;

use super::expand_int_range;

/// Render a tree back into the source query language itself (spec.md
/// §4.5 C6) — the identity dialect, modulo normalization (canonical
/// operator spelling, one space between clauses).
pub fn render(tree: &QueryTree, fields: &FieldRegistry) -> Result<String> {
    let mut parts = Vec::new();
    for (clauses, prefix) in [(&tree.must, "+"), (&tree.should, ""), (&tree.must_not, "-")] {
        for clause in clauses {
            parts.push(render_clause(clause, prefix, fields)?);
        }
    }
    Ok(parts.join(" "))
}

fn render_clause(clause: &Clause, prefix: &str, fields: &FieldRegistry) -> Result<String> {
    if clause.is_group() {
        render_group(clause, prefix, fields)
    } else {
        render_leaf(clause, prefix, fields)
    }
}

/// A single-child group collapses its own parentheses: the field/op that
/// would otherwise prefix the parens is redundant when there is only one
/// member, so the member renders as if it sat directly in the parent
/// bucket (spec.md §8 `date=(1..10)` vs. `foo=(this or that)`).
fn render_group(clause: &Clause, prefix: &str, fields: &FieldRegistry) -> Result<String> {
    let sub = clause.sub_tree().expect("group clause always carries a subtree");
    let children = child_list(sub);
    if children.len() == 1 {
        let (child, _) = children[0];
        return render_clause(child, prefix, fields);
    }
    let mut parts = Vec::with_capacity(children.len());
    for (child, child_prefix) in children {
        parts.push(render_clause(child, child_prefix, fields)?);
    }
    let inner = parts.join(" ");
    Ok(format!("{prefix}({inner})", prefix = prefix, inner = inner))
}

fn child_list(tree: &QueryTree) -> Vec<(&Clause, &'static str)> {
    let mut v = Vec::new();
    for c in &tree.must {
        v.push((c, "+"));
    }
    for c in &tree.should {
        v.push((c, ""));
    }
    for c in &tree.must_not {
        v.push((c, "-"));
    }
    v
}

fn render_leaf(clause: &Clause, prefix: &str, fields: &FieldRegistry) -> Result<String> {
    if let Some(name) = clause.field.as_deref() {
        if let Some(desc) = fields.get(name) {
            if let Some(cb) = &desc.callback {
                let value = clause.scalar_value().unwrap_or_default();
                return Ok(format!("{}{}", prefix, cb.call(name, clause.op, value)));
            }
        }
    }
    match &clause.value {
        ClauseValue::Scalar(v) => {
            let field_part = clause
                .field
                .as_deref()
                .map(|f| format!("{}{}", f, clause.op.as_token()))
                .unwrap_or_default();
            Ok(format!("{}{}{}", prefix, field_part, render_scalar(clause, v)))
        }
        ClauseValue::Range(lo, hi) => render_range(clause.op, prefix, clause.field.as_deref(), lo, hi),
        ClauseValue::Sub(_) => unreachable!("group clauses are rendered via render_group"),
    }
}

fn render_scalar(clause: &Clause, value: &str) -> String {
    match clause.quote {
        Quote::Double => match clause.proximity {
            Some(p) => format!("\"{}\"~{}", value, p),
            None => format!("\"{}\"", value),
        },
        Quote::Single => format!("'{}'", value),
        Quote::None => value.to_string(),
    }
}

/// Native has no type awareness: it always tries to enumerate a range as
/// consecutive integers, falling back to the literal `lo..hi` form when
/// the bounds aren't numeric (spec.md §4.5, §8).
fn render_range(op: Op, prefix: &str, field: Option<&str>, lo: &str, hi: &str) -> Result<String> {
    let field_part = field.unwrap_or_default();
    match expand_int_range(lo, hi) {
        Ok(values) => {
            let eq = if op == Op::NotRange { Op::Ne.as_token() } else { Op::Eq.as_token() };
            Ok(format!("{prefix}{field}{eq}({inner})", prefix = prefix, field = field_part, eq = eq, inner = values.join(" ")))
        }
        Err(_) => {
            let token = op.as_token();
            if field_part.is_empty() {
                Ok(format!("{prefix}{lo}{token}{hi}", prefix = prefix, lo = lo, token = token, hi = hi))
            } else {
                Ok(format!("{prefix}{field}:{lo}{token}{hi}", prefix = prefix, field = field_part, lo = lo, token = token, hi = hi))
            }
        }
    }
}
