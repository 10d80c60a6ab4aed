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

use log::trace;
use regex::Regex;

use crate::ast::clause::{Clause, ClauseValue, Op, Quote};
use crate::ast::tree::{is_all_negatives, Bucket, QueryTree};
use crate::config::{DefaultBoolOp, ParserConfig, TokenRegexes};
use crate::dialect::DialectKind;
use crate::error::{QueryError, Result};
use crate::field::FieldRegistry;

/// A compiled, reusable query parser. Cheap to clone: everything it
/// holds is behind the shared `ParserConfig`.
#[derive(Debug, Clone)]
pub struct Parser {
    config: Arc<ParserConfig>,
}

/// Build a parser from a frozen configuration (spec.md §4, §6).
pub fn parser(config: Arc<ParserConfig>) -> Parser {
    Parser::new(config)
}

impl Parser {
    pub fn new(config: Arc<ParserConfig>) -> Self {
        Parser { config }
    }

    pub fn config(&self) -> &Arc<ParserConfig> {
        &self.config
    }

    /// Tokenize and recursive-descent parse `input` into a `QueryTree`
    /// bound to this parser's dialect and field registry (spec.md §4.1).
    pub fn parse(&self, input: &str) -> Result<QueryTree> {
        trace!("parsing query: {:?}", input);
        let mut cursor = Cursor::new(input, &self.config);
        let tree = cursor.parse_query(None, None)?;
        cursor.skip_ws();
        if !cursor.is_at_end() {
            if !self.config.sloppy {
                return Err(QueryError::parse(
                    input,
                    format!("unexpected input at byte {}: {:?}", cursor.pos, cursor.rest()),
                ));
            }
            trace!("sloppy mode: ignoring trailing input {:?}", cursor.rest());
        }
        if tree.is_empty() {
            return Err(QueryError::parse(input, "empty query"));
        }
        if !self.config.sloppy && is_all_negatives(&tree) {
            return Err(QueryError::parse(
                input,
                "a query consisting only of negated clauses matches nothing",
            ));
        }
        Ok(tree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelConnector {
    And,
    Or,
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    regexes: Arc<TokenRegexes>,
    default_field: Option<String>,
    default_op: Op,
    default_boolop: DefaultBoolOp,
    sloppy: bool,
    dialect: DialectKind,
    fields: Arc<FieldRegistry>,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, config: &ParserConfig) -> Self {
        Cursor {
            input,
            pos: 0,
            regexes: config.regexes.clone(),
            default_field: config.default_field.clone(),
            default_op: config.default_op,
            default_boolop: config.default_boolop,
            sloppy: config.sloppy,
            dialect: config.dialect.clone(),
            fields: config.fields.clone(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn match_regex(&mut self, re: &Regex) -> Option<&'a str> {
        let rest = self.rest();
        let m = re.find(rest)?;
        let matched = &rest[..m.end()];
        self.pos += m.end();
        Some(matched)
    }

    /// Match a connector keyword (`AND`/`OR`/`NOT`), requiring that it end
    /// at a word boundary so `android` doesn't parse as `AND` + `roid`.
    fn try_keyword(&mut self, re: &Regex) -> bool {
        let rest = self.rest();
        if let Some(m) = re.find(rest) {
            let boundary_ok = match rest[m.end()..].chars().next() {
                None => true,
                Some(c) => c.is_whitespace() || c == '(' || c == ')',
            };
            if boundary_ok {
                self.pos += m.end();
                return true;
            }
        }
        false
    }

    fn consume_sign(&mut self) -> Option<char> {
        match self.peek_char() {
            Some('+') => {
                self.pos += 1;
                Some('+')
            }
            Some('-') => {
                self.pos += 1;
                Some('-')
            }
            _ => None,
        }
    }

    /// Try to consume a `field<op>` pair with no space between the two.
    /// Returns `(None, None)` and leaves the cursor unmoved when what
    /// follows doesn't look like a field/operator pair at all.
    fn try_field_op(&mut self) -> Result<(Option<String>, Option<Op>)> {
        let start = self.pos;
        let field_re = self.regexes.field.clone();
        if let Some(field_tok) = self.match_regex(&field_re) {
            let field_tok = field_tok.to_string();
            let op_re = self.regexes.op.clone();
            if let Some(op_tok) = self.match_regex(&op_re) {
                let op = Op::from_token(op_tok)
                    .ok_or_else(|| QueryError::parse(self.input, format!("unrecognized operator {:?}", op_tok)))?;
                return Ok((Some(field_tok), Some(op)));
            }
            self.pos = start;
        }
        let nofield_re = self.regexes.op_nofield.clone();
        if let Some(op_tok) = self.match_regex(&nofield_re) {
            let op = Op::from_token(op_tok)
                .ok_or_else(|| QueryError::parse(self.input, format!("unrecognized operator {:?}", op_tok)))?;
            return Ok((None, Some(op)));
        }
        Ok((None, None))
    }

    /// Find the earliest position at which `range_regex` splits `tok`
    /// into a non-empty `lo`/`hi` pair (e.g. `"1..10"` -> `("1", "10")`).
    fn split_range(&self, tok: &str) -> Option<(String, String)> {
        for (i, _) in tok.char_indices() {
            if i == 0 {
                continue;
            }
            if let Some(m) = self.regexes.range.find(&tok[i..]) {
                if m.start() == 0 {
                    let lo = &tok[..i];
                    let hi = &tok[i + m.end()..];
                    if !lo.is_empty() && !hi.is_empty() {
                        return Some((lo.to_string(), hi.to_string()));
                    }
                }
            }
        }
        None
    }

    fn consume_until_char(&mut self, delim: char) -> Result<String> {
        let rest = self.rest();
        match rest.find(delim) {
            Some(idx) => {
                let content = rest[..idx].to_string();
                self.pos += idx;
                Ok(content)
            }
            None if self.sloppy => {
                let content = rest.to_string();
                self.pos = self.input.len();
                Ok(content)
            }
            None => Err(QueryError::parse(
                self.input,
                format!("unterminated phrase, expected closing {:?}", delim),
            )),
        }
    }

    /// Parse one value: a parenthesized subquery, a quoted phrase, or a
    /// bareword term (itself possibly a range or a `NEAR`-joined pair).
    /// Returns the value, the quote style used, any phrase proximity, and
    /// the operator in effect (which `..`/`NEAR` detection may override).
    fn parse_value(&mut self, field: Option<&str>, op: Op) -> Result<(ClauseValue, Quote, Option<u32>, Op)> {
        self.skip_ws();

        if self.consume_char('(') {
            let sub = self.parse_query(field, Some(op))?;
            self.skip_ws();
            if !self.consume_char(')') {
                if !self.sloppy {
                    return Err(QueryError::parse(self.input, "unterminated group, expected ')'"));
                }
                self.pos = self.input.len();
            }
            return Ok((ClauseValue::Sub(sub), Quote::None, None, Op::Group));
        }

        if let Some(q) = self.peek_char().and_then(Quote::from_char) {
            self.pos += 1;
            let phrase = self.consume_until_char(self.peek_quote_close(q))?;
            self.consume_char(self.peek_quote_close(q));
            let mut proximity = None;
            let tilde_re = Regex::new(r"^~\d+").expect("literal proximity regex is valid");
            if let Some(tok) = self.match_regex(&tilde_re) {
                proximity = tok[1..].parse::<u32>().ok();
            }
            return Ok((ClauseValue::Scalar(phrase), q, proximity, op));
        }

        let term_re = self.regexes.term.clone();
        let tok = self
            .match_regex(&term_re)
            .ok_or_else(|| QueryError::parse(self.input, "expected a value"))?
            .to_string();

        if let Some((lo, hi)) = self.split_range(&tok) {
            let range_op = if op == Op::Ne { Op::NotRange } else { Op::Range };
            return Ok((ClauseValue::Range(lo, hi), Quote::None, None, range_op));
        }

        let checkpoint = self.pos;
        self.skip_ws();
        let near_re = self.regexes.near.clone();
        if let Some(near_tok) = self.match_regex(&near_re) {
            let n: u32 = near_tok
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .unwrap_or(0);
            self.skip_ws();
            if let Some(tok2) = self.match_regex(&term_re) {
                let phrase = format!("{} {}", tok, tok2);
                return Ok((ClauseValue::Scalar(phrase), Quote::Double, Some(n), op));
            } else if !self.sloppy {
                return Err(QueryError::parse(self.input, "NEAR must be followed by a term"));
            }
        }
        self.pos = checkpoint;

        Ok((ClauseValue::Scalar(tok), Quote::None, None, op))
    }

    fn peek_quote_close(&self, q: Quote) -> char {
        q.as_char().chars().next().unwrap_or('"')
    }

    /// Parse a sequence of clauses up to end-of-input or a closing `)`.
    /// `parent_field`/`parent_op` are set when recursing into a
    /// parenthesized subquery whose own `field<op>` prefix distributes
    /// onto each of its field-less children.
    ///
    /// Bucket assignment is a second pass over the whole sequence rather
    /// than done clause-by-clause: an explicit `OR` anywhere in the
    /// sequence governs every unsigned clause at this level, including
    /// ones that appeared before it (`red or green` is an OR of both,
    /// not `red` defaulting to AND while `green` becomes OR).
    fn parse_query(&mut self, parent_field: Option<&str>, parent_op: Option<Op>) -> Result<QueryTree> {
        let mut items: Vec<Item> = Vec::new();
        let mut pending_bool: Option<LevelConnector> = None;
        let mut pending_not = false;

        loop {
            self.skip_ws();
            if self.is_at_end() || self.peek_char() == Some(')') {
                break;
            }

            let and_re = self.regexes.and.clone();
            if self.try_keyword(&and_re) {
                pending_bool = Some(LevelConnector::And);
                continue;
            }
            let or_re = self.regexes.or.clone();
            if self.try_keyword(&or_re) {
                pending_bool = Some(LevelConnector::Or);
                continue;
            }
            let not_re = self.regexes.not.clone();
            if self.try_keyword(&not_re) {
                pending_not = true;
                continue;
            }

            let sign = self.consume_sign();
            let (field, op_opt) = self.try_field_op()?;

            if field.is_some() && parent_field.is_some() && !self.sloppy {
                return Err(QueryError::parse(
                    self.input,
                    "nested field name inside a parenthesized group that already carries a field",
                ));
            }

            let effective_field = field
                .or_else(|| parent_field.map(str::to_string))
                .or_else(|| self.default_field.clone());
            let effective_op = op_opt.unwrap_or_else(|| parent_op.unwrap_or(self.default_op));

            let (value, quote, proximity, final_op) =
                self.parse_value(effective_field.as_deref(), effective_op)?;

            // A group clause wraps a subtree, not a scalar/range value: the
            // field was already distributed onto the children above, so the
            // group clause itself carries no field (spec.md §4.1).
            let clause_field = if final_op == Op::Group { None } else { effective_field };
            let clause = Clause::new(clause_field, final_op, value)
                .with_quote(quote)
                .with_proximity(proximity);
            items.push(Item {
                sign,
                connector_before: pending_bool.take(),
                not_before: pending_not,
                clause,
            });
            pending_not = false;
        }

        self.assign_buckets(items)
    }

    fn assign_buckets(&self, items: Vec<Item>) -> Result<QueryTree> {
        let mut explicit: Option<LevelConnector> = None;
        for item in &items {
            if let Some(conn) = item.connector_before {
                match explicit {
                    None => explicit = Some(conn),
                    Some(existing) if existing == conn => {}
                    Some(_) if self.sloppy => {}
                    Some(_) => {
                        return Err(QueryError::parse(
                            self.input,
                            "cannot mix AND and OR at the same nesting level without parentheses",
                        ))
                    }
                }
            }
        }
        let level_connector = explicit.unwrap_or(match self.default_boolop {
            DefaultBoolOp::And => LevelConnector::And,
            DefaultBoolOp::Or => LevelConnector::Or,
        });

        let mut tree = QueryTree::new(self.dialect.clone(), self.fields.clone());
        for item in items {
            let is_negative = item.sign == Some('-') || item.not_before;
            let bucket = if is_negative {
                if level_connector == LevelConnector::Or && !self.sloppy {
                    return Err(QueryError::parse(
                        self.input,
                        "a negated clause cannot appear at an OR level",
                    ));
                }
                Bucket::MustNot
            } else if item.sign == Some('+') {
                Bucket::Must
            } else {
                match level_connector {
                    LevelConnector::And => Bucket::Must,
                    LevelConnector::Or => Bucket::Should,
                }
            };
            match bucket {
                Bucket::Must => tree.add_and_clause(item.clause),
                Bucket::Should => tree.add_or_clause(item.clause),
                Bucket::MustNot => tree.add_not_clause(item.clause),
            }
        }
        Ok(tree)
    }
}

/// One parsed clause plus the sign/connector context it was parsed
/// with; bucket assignment happens once the whole level is known
/// (see `Cursor::assign_buckets`).
struct Item {
    sign: Option<char>,
    connector_before: Option<LevelConnector>,
    not_before: bool,
    clause: Clause,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfigBuilder;
    use crate::field::FieldRegistry;
    use matches::assert_matches;

    /// Initializes `log`'s global logger once so `trace!` output from the
    /// parser is visible under `cargo test -- --nocapture`. Safe to call
    /// from more than one test; a second `init()` call is just ignored.
    fn init_logger() {
        let _ = simple_logger::SimpleLogger::new().init();
    }

    fn build(sloppy: bool) -> Parser {
        let cfg = ParserConfigBuilder::new()
            .fields(FieldRegistry::from_names(&["foo", "color", "date"]))
            .sloppy(sloppy)
            .build()
            .unwrap();
        parser(Arc::new(cfg))
    }

    #[test]
    fn bareword_defaults_to_must_bucket() {
        init_logger();
        let tree = build(false).parse("hello").unwrap();
        assert_eq!(tree.must.len(), 1);
        assert_eq!(tree.must[0].scalar_value(), Some("hello"));
    }

    #[test]
    fn explicit_signs_choose_buckets() {
        // `baz` carries no sign, so it falls back to `default_boolop`
        // (AND by default) and joins `foo` in the must bucket.
        let tree = build(false).parse("+foo -bar baz").unwrap();
        assert_eq!(tree.must.len(), 2);
        assert_eq!(tree.must_not.len(), 1);
        assert_eq!(tree.should.len(), 0);
    }

    #[test]
    fn field_op_pair_is_captured() {
        let tree = build(false).parse("foo=bar").unwrap();
        assert_eq!(tree.must[0].field.as_deref(), Some("foo"));
        assert_eq!(tree.must[0].op, Op::Eq);
    }

    #[test]
    fn quoted_phrase_with_proximity() {
        let tree = build(false).parse("\"foo bar\"~3").unwrap();
        assert_eq!(tree.must[0].scalar_value(), Some("foo bar"));
        assert_eq!(tree.must[0].proximity, Some(3));
    }

    #[test]
    fn parenthesized_group_distributes_field_to_children() {
        let tree = build(false).parse("color=(red or green)").unwrap();
        assert_eq!(tree.must.len(), 1);
        assert_eq!(tree.must[0].field, None);
        let sub = tree.must[0].sub_tree().unwrap();
        assert_eq!(sub.should.len(), 2);
        assert_eq!(sub.should[0].field.as_deref(), Some("color"));
        assert_eq!(sub.should[1].field.as_deref(), Some("color"));
    }

    #[test]
    fn bareword_range_is_captured() {
        let tree = build(false).parse("date=1..10").unwrap();
        assert_eq!(tree.must[0].range_value(), Some(("1", "10")));
    }

    #[test]
    fn mixing_and_or_without_parens_is_rejected() {
        let err = build(false).parse("foo AND bar OR baz").unwrap_err();
        assert_matches!(err, QueryError::Parse { .. });
    }

    #[test]
    fn negated_clause_under_or_is_rejected() {
        let err = build(false).parse("foo OR -bar").unwrap_err();
        assert_matches!(err, QueryError::Parse { .. });
    }

    #[test]
    fn all_negative_query_is_rejected_unless_sloppy() {
        assert!(build(false).parse("-foo -bar").is_err());
        assert!(build(true).parse("-foo -bar").is_ok());
    }

    #[test]
    fn empty_query_is_rejected() {
        assert!(build(false).parse("   ").is_err());
    }

    #[test]
    fn near_keyword_forms_a_proximity_phrase() {
        let tree = build(false).parse("foo NEAR5 bar").unwrap();
        assert_eq!(tree.must[0].scalar_value(), Some("foo bar"));
        assert_eq!(tree.must[0].proximity, Some(5));
    }
}
