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
use crate::ast::tree::{group_clause, QueryTree};
use crate::config::ParserConfig;
use crate::error::{QueryError, Result};
use crate::field::AliasTarget;

/// Rewrite a freshly parsed tree in place: resolve field aliases
/// (renaming or fanning a leaf out into an OR of its alias targets),
/// validate each leaf's value against its field's validator, and run
/// the configured term expander over surviving bareword values
/// (spec.md §4.3, §4.6, C9). Applied bottom-up via `QueryTree::map_leaves`,
/// so group subtrees expand before the clauses that contain them are
/// finalized.
pub fn expand(tree: &mut QueryTree, config: &ParserConfig, original_input: &str) -> Result<()> {
    tree.map_leaves(&mut |clause| expand_leaf(clause, config, original_input))?;
    Ok(())
}

fn expand_leaf(clause: Clause, config: &ParserConfig, original_input: &str) -> Result<Clause> {
    let clause = expand_alias(clause, config, original_input)?;
    if clause.is_group() {
        // Already fanned out by a Many alias; each member was validated
        // individually inside `expand_alias`.
        return Ok(clause);
    }
    Ok(apply_term_expander(clause, config))
}

/// Run the term expander (if any) over a scalar bareword value, after
/// alias resolution has settled the clause's final field. Ranges and
/// already-quoted phrases are left untouched; expansion only makes
/// sense for a single free-standing term.
fn apply_term_expander(clause: Clause, config: &ParserConfig) -> Clause {
    let Some(expander) = &config.term_expander else {
        return clause;
    };
    let ClauseValue::Scalar(value) = &clause.value else {
        return clause;
    };
    if clause.quote.is_phrase() {
        return clause;
    }
    let replacements = expander.expand(value);
    match replacements.len() {
        0 | 1 => clause,
        _ => {
            let mut sub = QueryTree::new(config.dialect.clone(), config.fields.clone());
            for r in replacements {
                sub.add_or_clause(Clause::new(
                    clause.field.clone(),
                    clause.op,
                    ClauseValue::Scalar(r),
                ));
            }
            group_clause(None, sub)
        }
    }
}

fn expand_alias(clause: Clause, config: &ParserConfig, original_input: &str) -> Result<Clause> {
    let Some(field_name) = clause.field.clone() else {
        return validate_leaf(clause, config, original_input);
    };
    let Some(descriptor) = config.fields.get(&field_name) else {
        if config.sloppy {
            return validate_leaf(clause, config, original_input);
        }
        return Err(QueryError::field(original_input, field_name, "unknown field"));
    };
    match &descriptor.alias_for {
        AliasTarget::None => validate_leaf(clause, config, original_input),
        AliasTarget::Single(target) => {
            let mut renamed = clause;
            renamed.field = Some(target.clone());
            validate_leaf(renamed, config, original_input)
        }
        AliasTarget::Many(targets) => {
            let mut sub = QueryTree::new(config.dialect.clone(), config.fields.clone());
            for target in targets {
                let mut fanned = Clause::new(Some(target.clone()), clause.op, clause.value.clone())
                    .with_quote(clause.quote)
                    .with_proximity(clause.proximity);
                fanned = validate_leaf(fanned, config, original_input)?;
                sub.add_or_clause(fanned);
            }
            Ok(group_clause(None, sub))
        }
    }
}

fn validate_leaf(clause: Clause, config: &ParserConfig, original_input: &str) -> Result<Clause> {
    let Some(field_name) = clause.field.clone() else {
        return Ok(clause);
    };
    let Some(descriptor) = config.fields.get(&field_name) else {
        return Ok(clause);
    };
    match &clause.value {
        ClauseValue::Scalar(v) => {
            if let Err(detail) = descriptor.validator.validate(v) {
                return Err(QueryError::field(original_input, field_name, detail));
            }
        }
        ClauseValue::Range(lo, hi) => {
            if let Err(detail) = descriptor.validator.validate(lo) {
                return Err(QueryError::field(original_input, field_name.clone(), detail));
            }
            if let Err(detail) = descriptor.validator.validate(hi) {
                return Err(QueryError::field(original_input, field_name, detail));
            }
        }
        ClauseValue::Sub(_) => {}
    }
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::clause::Quote;
    use crate::config::ParserConfigBuilder;
    use crate::dialect::DialectKind;
    use crate::field::{AliasTarget, FieldDescriptor, FieldRegistry, FieldValidator};
    use matches::assert_matches;
    use std::sync::Arc;

    fn tree_with(clause: Clause, fields: FieldRegistry) -> (QueryTree, Arc<ParserConfig>) {
        let config = Arc::new(
            ParserConfigBuilder::new()
                .fields(fields)
                .build()
                .unwrap(),
        );
        let mut tree = QueryTree::new(DialectKind::native(), config.fields.clone());
        tree.add_and_clause(clause);
        (tree, config)
    }

    #[test]
    fn single_alias_renames_in_place() {
        let mut reg = FieldRegistry::new();
        reg.insert(FieldDescriptor::new("nick").with_alias(AliasTarget::Single("name".into())));
        reg.insert(FieldDescriptor::new("name"));
        let (mut tree, config) =
            tree_with(Clause::new(Some("nick".into()), Op::Eq, ClauseValue::Scalar("x".into())), reg);
        expand(&mut tree, &config, "nick=x").unwrap();
        assert_eq!(tree.must[0].field.as_deref(), Some("name"));
    }

    #[test]
    fn many_alias_fans_out_to_or_group() {
        let mut reg = FieldRegistry::new();
        reg.insert(
            FieldDescriptor::new("title")
                .with_alias(AliasTarget::Many(vec!["subject".into(), "heading".into()])),
        );
        reg.insert(FieldDescriptor::new("subject"));
        reg.insert(FieldDescriptor::new("heading"));
        let (mut tree, config) =
            tree_with(Clause::new(Some("title".into()), Op::Eq, ClauseValue::Scalar("x".into())), reg);
        expand(&mut tree, &config, "title=x").unwrap();
        assert!(tree.must[0].is_group());
        let sub = tree.must[0].sub_tree().unwrap();
        assert_eq!(sub.should.len(), 2);
        assert_eq!(sub.should[0].field.as_deref(), Some("subject"));
        assert_eq!(sub.should[1].field.as_deref(), Some("heading"));
    }

    #[test]
    fn unknown_field_is_rejected_unless_sloppy() {
        let reg = FieldRegistry::from_names(&["known"]);
        let (mut tree, config) =
            tree_with(Clause::new(Some("missing".into()), Op::Eq, ClauseValue::Scalar("x".into())), reg);
        assert!(expand(&mut tree, &config, "missing=x").is_err());
    }

    #[derive(Debug)]
    struct RejectEverything;
    impl FieldValidator for RejectEverything {
        fn validate(&self, _value: &str) -> std::result::Result<(), String> {
            Err("rejected".to_string())
        }
    }

    #[test]
    fn validator_rejection_surfaces_field_error() {
        let mut reg = FieldRegistry::new();
        reg.insert(FieldDescriptor::new("foo").with_validator(Arc::new(RejectEverything)));
        let (mut tree, config) =
            tree_with(Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("x".into())), reg);
        let err = expand(&mut tree, &config, "foo=x").unwrap_err();
        assert_matches!(err, QueryError::Field { .. });
    }

    #[derive(Debug)]
    struct SplitOnComma;
    impl crate::config::TermExpander for SplitOnComma {
        fn expand(&self, term: &str) -> Vec<String> {
            term.split(',').map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn term_expander_fans_out_bareword_values() {
        let reg = FieldRegistry::from_names(&["foo"]);
        let config = Arc::new(
            ParserConfigBuilder::new()
                .fields(reg)
                .term_expander(Arc::new(SplitOnComma))
                .build()
                .unwrap(),
        );
        let mut tree = QueryTree::new(DialectKind::native(), config.fields.clone());
        tree.add_and_clause(
            Clause::new(Some("foo".into()), Op::Eq, ClauseValue::Scalar("a,b".into())).with_quote(Quote::None),
        );
        expand(&mut tree, &config, "foo=a,b").unwrap();
        assert!(tree.must[0].is_group());
        let sub = tree.must[0].sub_tree().unwrap();
        assert_eq!(sub.should.len(), 2);
    }
}
