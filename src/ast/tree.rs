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

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ast::clause::{Clause, ClauseValue, Op};
use crate::dialect::DialectKind;
use crate::error::Result;
use crate::field::FieldRegistry;

/// The three roles a clause may play inside a query tree (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `"+"` — AND-joined, must match.
    Must,
    /// `""` — OR-joined, should match.
    Should,
    /// `"-"` — must not match.
    MustNot,
}

impl Bucket {
    /// The literal mapping key used by `tree()`/`TreeSnapshot`.
    pub fn as_key(&self) -> &'static str {
        match self {
            Bucket::Must => "+",
            Bucket::Should => "",
            Bucket::MustNot => "-",
        }
    }
}

/// A query AST — either the root produced by a parse, or a subtree nested
/// under a group (`Op::Group`) clause.
///
/// Order within each bucket is author-order and must be preserved.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueryTree {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    dialect: DialectKind,
    #[cfg_attr(feature = "serde", serde(skip))]
    fields: Arc<FieldRegistry>,
}

impl PartialEq for QueryTree {
    /// Structural equality: bucket contents and dialect, ignoring which
    /// field registry instance is attached.
    fn eq(&self, other: &Self) -> bool {
        self.must == other.must
            && self.should == other.should
            && self.must_not == other.must_not
            && self.dialect == other.dialect
    }
}

impl QueryTree {
    pub fn new(dialect: DialectKind, fields: Arc<FieldRegistry>) -> Self {
        QueryTree {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            dialect,
            fields,
        }
    }

    pub fn dialect(&self) -> &DialectKind {
        &self.dialect
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    fn buckets(&self) -> [(Bucket, &Vec<Clause>); 3] {
        [
            (Bucket::Must, &self.must),
            (Bucket::Should, &self.should),
            (Bucket::MustNot, &self.must_not),
        ]
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<Clause> {
        match bucket {
            Bucket::Must => &mut self.must,
            Bucket::Should => &mut self.should,
            Bucket::MustNot => &mut self.must_not,
        }
    }

    /// Post-order traversal over `+`, `""`, `-` in that order; group
    /// clauses are recursed into before the group clause itself is
    /// visited.
    pub fn walk<F: FnMut(&Clause, Bucket, usize)>(&self, visitor: &mut F) {
        self.walk_at(visitor, 0);
    }

    fn walk_at<F: FnMut(&Clause, Bucket, usize)>(&self, visitor: &mut F, depth: usize) {
        for (bucket, clauses) in self.buckets() {
            for clause in clauses {
                if let Some(sub) = clause.sub_tree() {
                    sub.walk_at(visitor, depth + 1);
                }
                visitor(clause, bucket, depth);
            }
        }
    }

    /// Recursively rewrite every leaf (non-group) clause via `f`, in
    /// place, preserving bucket membership and order. Group clauses are
    /// recursed into rather than passed to `f`.
    pub fn map_leaves<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(Clause) -> Result<Clause>,
    {
        for bucket in [Bucket::Must, Bucket::Should, Bucket::MustNot] {
            let clauses = std::mem::take(self.bucket_mut(bucket));
            let mut rewritten = Vec::with_capacity(clauses.len());
            for mut clause in clauses {
                if clause.is_group() {
                    if let ClauseValue::Sub(mut sub) = clause.value {
                        sub.map_leaves(f)?;
                        clause.value = ClauseValue::Sub(sub);
                    }
                    rewritten.push(clause);
                } else {
                    rewritten.push(f(clause)?);
                }
            }
            *self.bucket_mut(bucket) = rewritten;
        }
        Ok(())
    }

    /// `tree.add_or_clause(c)` — parse-equivalent to `(orig) OR (c)`.
    pub fn add_or_clause(&mut self, c: Clause) {
        self.should.push(c);
    }

    /// `tree.add_and_clause(c)` — parse-equivalent to `(orig) AND (c)`.
    pub fn add_and_clause(&mut self, c: Clause) {
        self.must.push(c);
    }

    /// `tree.add_not_clause(c)` — parse-equivalent to `(orig) AND NOT (c)`.
    pub fn add_not_clause(&mut self, c: Clause) {
        self.must_not.push(c);
    }

    /// Attach another subtree's clauses bucket-by-bucket.
    pub fn add_sub_clause(&mut self, t: QueryTree) {
        for c in t.must {
            self.add_and_clause(c);
        }
        for c in t.should {
            self.add_or_clause(c);
        }
        for c in t.must_not {
            self.add_not_clause(c);
        }
    }

    /// Structural clone re-bound to a different dialect. The clause data
    /// is unchanged; only the serializer that will be used for rendering
    /// changes. Applies recursively to nested group subtrees.
    pub fn translate_to(&self, dialect: DialectKind) -> QueryTree {
        let mut out = self.clone();
        out.dialect = dialect.clone();
        let retag = |clauses: &mut Vec<Clause>| {
            for c in clauses.iter_mut() {
                if let ClauseValue::Sub(sub) = &mut c.value {
                    *sub = sub.translate_to(dialect.clone());
                }
            }
        };
        retag(&mut out.must);
        retag(&mut out.should);
        retag(&mut out.must_not);
        out
    }

    /// A plain structural snapshot (no back-reference to any parser),
    /// suitable for equality tests and for serializing across dialects.
    pub fn tree(&self) -> TreeSnapshot {
        TreeSnapshot {
            must: self.must.clone(),
            should: self.should.clone(),
            must_not: self.must_not.clone(),
        }
    }

    /// Render using this tree's own dialect and field registry.
    pub fn to_string_default(&self) -> Result<String> {
        crate::dialect::render_tree(self, &self.dialect, &self.fields)
    }

    /// Render using an explicit dialect/registry, without consuming or
    /// mutating the tree's own dialect binding.
    pub fn to_string_dialect(&self, dialect: &DialectKind, fields: &FieldRegistry) -> Result<String> {
        crate::dialect::render_tree(self, dialect, fields)
    }
}

/// A plain mapping of bucket key to clause list, as returned by
/// `QueryTree::tree()`. Field names mirror the bucket keys from spec.md
/// §3 (`"+"`, `""`, `"-"`) for round-trip/equality tests.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeSnapshot {
    #[cfg_attr(feature = "serde", serde(rename = "+"))]
    pub must: Vec<Clause>,
    #[cfg_attr(feature = "serde", serde(rename = ""))]
    pub should: Vec<Clause>,
    #[cfg_attr(feature = "serde", serde(rename = "-"))]
    pub must_not: Vec<Clause>,
}

/// `true` when neither the `+` nor the `""` bucket has an entry while
/// the `-` bucket is non-empty — the "all negatives" rejection case
/// described in spec.md §4.1/§9.
pub fn is_all_negatives(tree: &QueryTree) -> bool {
    tree.must.is_empty() && tree.should.is_empty() && !tree.must_not.is_empty()
}

/// Helper used by `Op::Group` clause construction: wrap a subtree as a
/// `{field: None, op: Op::Group, value: Sub(subtree)}` clause.
pub fn group_clause(field: Option<String>, sub: QueryTree) -> Clause {
    Clause::new(field, Op::Group, ClauseValue::Sub(sub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::clause::{ClauseValue, Op, Quote};
    use crate::field::FieldRegistry;

    fn empty_tree() -> QueryTree {
        QueryTree::new(DialectKind::native(), Arc::new(FieldRegistry::default()))
    }

    #[test]
    fn add_clauses_populate_expected_buckets() {
        let mut t = empty_tree();
        t.add_and_clause(Clause::new(
            Some("foo".into()),
            Op::Contains,
            ClauseValue::Scalar("bar".into()),
        ));
        t.add_or_clause(Clause::new(
            Some("baz".into()),
            Op::Contains,
            ClauseValue::Scalar("qux".into()),
        ));
        t.add_not_clause(Clause::new(
            Some("w".into()),
            Op::Contains,
            ClauseValue::Scalar("x".into()),
        ));
        assert_eq!(t.must.len(), 1);
        assert_eq!(t.should.len(), 1);
        assert_eq!(t.must_not.len(), 1);
    }

    #[test]
    fn walk_visits_group_children_before_the_group_itself() {
        let mut inner = empty_tree();
        inner.add_or_clause(Clause::new(
            Some("a".into()),
            Op::Contains,
            ClauseValue::Scalar("1".into()),
        ));
        let mut t = empty_tree();
        t.add_and_clause(group_clause(None, inner));

        let mut order = Vec::new();
        t.walk(&mut |c, _bucket, _depth| {
            order.push(c.clone());
        });
        assert_eq!(order.len(), 2);
        assert!(!order[0].is_group());
        assert!(order[1].is_group());
    }

    #[test]
    fn tree_snapshot_uses_literal_bucket_keys() {
        assert_eq!(Bucket::Must.as_key(), "+");
        assert_eq!(Bucket::Should.as_key(), "");
        assert_eq!(Bucket::MustNot.as_key(), "-");
    }

    #[test]
    fn translate_to_preserves_structure() {
        let mut t = empty_tree();
        t.add_and_clause(
            Clause::new(Some("a".into()), Op::Contains, ClauseValue::Scalar("1".into()))
                .with_quote(Quote::Double),
        );
        let translated = t.translate_to(DialectKind::swish_default());
        assert_eq!(translated.must, t.must);
        assert_eq!(translated.dialect(), &DialectKind::swish_default());
    }

    #[test]
    fn all_negatives_detected() {
        let mut t = empty_tree();
        assert!(!is_all_negatives(&t));
        t.add_not_clause(Clause::new(
            Some("a".into()),
            Op::Contains,
            ClauseValue::Scalar("1".into()),
        ));
        assert!(is_all_negatives(&t));
    }
}
