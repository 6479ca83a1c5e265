//! Condition fragments and placeholder reconciliation.
//!
//! Each condition call renders one parenthesized fragment in which every value sits behind a
//! placeholder token `?<call>.<term>:<column>@`. Fragments are returned to the caller so they
//! can be nested verbatim into later calls; a nested fragment stops being a root of the
//! final WHERE. At assembly the tokens still present in the text are numbered `$1..$n` by
//! first occurrence, and their params are bound in that order.

use super::{QueryBuilder, resolve};
use crate::error::{MuxError, MuxResult};
use crate::manifest::LogicalType;
use crate::param::{Param, ParamList};
use crate::value::Value;
use std::sync::Arc;

/// Boolean joiner between the criteria of one condition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    fn separator(self) -> &'static str {
        match self {
            Joiner::And => " AND ",
            Joiner::Or => " OR ",
        }
    }
}

/// How a column criterion compares against its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// `column = value`
    Exact,
    /// `column LIKE '%value%'`
    Contains,
    /// `column LIKE 'value%'`
    StartsWith,
    /// `column LIKE '%value'`
    EndsWith,
}

impl Match {
    fn operator(self) -> &'static str {
        match self {
            Match::Exact => "=",
            _ => "LIKE",
        }
    }

    fn pattern(self, column: &str, value: &Value) -> MuxResult<String> {
        if matches!(value, Value::Null | Value::Bytes(_)) {
            return Err(MuxError::request(format!(
                "cannot pattern-match column `{column}` against a {} value",
                value.kind()
            )));
        }
        let term = escape_like(&value.to_string());
        Ok(match self {
            Match::Exact => term,
            Match::Contains => format!("%{term}%"),
            Match::StartsWith => format!("{term}%"),
            Match::EndsWith => format!("%{term}"),
        })
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One entry of a condition call.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Compare a logical column against a value.
    Column(String, Value),
    /// A fragment returned by an earlier condition call, embedded as-is.
    Fragment(String),
}

/// Ordered criteria for one condition call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    terms: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push(Criterion::Column(name.into(), value.into()));
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.terms.push(Criterion::Fragment(fragment.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.terms.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(k, v)| Criterion::Column(k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Criteria {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Criteria {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

fn placeholder(call: u64, term: usize, column: &str) -> String {
    format!("?{call}.{term}:{column}@")
}

/// Placeholder tokens present in `text`, in order of appearance.
fn placeholder_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('?') {
        let candidate = &rest[start..];
        match candidate.find('@') {
            Some(end) if is_placeholder(&candidate[..=end]) => {
                tokens.push(&candidate[..=end]);
                rest = &candidate[end + 1..];
            }
            _ => rest = &candidate[1..],
        }
    }
    tokens
}

fn is_placeholder(token: &str) -> bool {
    let Some(body) = token.strip_prefix('?').and_then(|t| t.strip_suffix('@')) else {
        return false;
    };
    let Some((index, column)) = body.split_once(':') else {
        return false;
    };
    let Some((call, term)) = index.split_once('.') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(call)
        && digits(term)
        && !column.is_empty()
        && column
            .chars()
            .all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

impl QueryBuilder {
    /// Render one condition fragment and add it to the request's WHERE.
    ///
    /// Returns the fragment text so it can be nested into a later call via
    /// [`Criteria::fragment`].
    pub fn condition(
        &mut self,
        kind: Match,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        let result = self.build_condition(kind, joiner, criteria.into());
        self.abandon_on_error(result)
    }

    /// Exact equality on every criterion.
    pub fn matching(&mut self, joiner: Joiner, criteria: impl Into<Criteria>) -> MuxResult<String> {
        self.condition(Match::Exact, joiner, criteria)
    }

    /// Substring containment on every criterion.
    pub fn featuring(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.condition(Match::Contains, joiner, criteria)
    }

    pub fn starts_with(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.condition(Match::StartsWith, joiner, criteria)
    }

    pub fn ends_with(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.condition(Match::EndsWith, joiner, criteria)
    }

    /// Any of the criteria matches exactly.
    pub fn either(&mut self, criteria: impl Into<Criteria>) -> MuxResult<String> {
        self.condition(Match::Exact, Joiner::Or, criteria)
    }

    fn build_condition(
        &mut self,
        kind: Match,
        joiner: Joiner,
        criteria: Criteria,
    ) -> MuxResult<String> {
        if criteria.is_empty() {
            return Err(MuxError::request("condition needs at least one criterion"));
        }

        let model = Arc::clone(&self.model);
        self.state.call_index += 1;
        let call = self.state.call_index;

        let mut parts = Vec::with_capacity(criteria.len());
        for (term, criterion) in criteria.terms.into_iter().enumerate() {
            match criterion {
                Criterion::Fragment(text) => {
                    let unbound = placeholder_tokens(&text).into_iter().find(|token| {
                        !self.state.bound_terms.iter().any(|(bound, _)| bound.as_str() == *token)
                    });
                    if let Some(token) = unbound {
                        return Err(MuxError::request(format!(
                            "fragment term `{token}` is not bound in the current request"
                        )));
                    }
                    if let Some(pos) = self.state.roots.iter().position(|r| *r == text) {
                        self.state.roots.remove(pos);
                    }
                    parts.push(text);
                }
                Criterion::Column(name, value) => {
                    let expr = self.state.register(&model, &name)?;
                    if kind == Match::Exact && value.is_null() {
                        parts.push(format!("{expr} IS NULL"));
                        continue;
                    }

                    let (lhs, param) = if kind == Match::Exact {
                        (expr, model.binding_type(&name).bind(&name, value)?)
                    } else {
                        let pattern = kind.pattern(&name, &value)?;
                        let lhs = if resolve(&model, &name)?.ty == LogicalType::String {
                            expr
                        } else {
                            format!("CAST({expr} AS TEXT)")
                        };
                        (lhs, Param::Text(pattern))
                    };

                    let token = placeholder(call, term, &name);
                    parts.push(format!("{} {} {}", lhs, kind.operator(), token));
                    self.state.bound_terms.push((token, param));
                }
            }
        }

        let fragment = format!("({})", parts.join(joiner.separator()));
        self.state.roots.push(fragment.clone());
        Ok(fragment)
    }
}

/// Join the root fragments with AND and number surviving placeholders by first occurrence.
///
/// Numbering continues from whatever `params` already holds. Terms whose token no longer
/// appears in the text are dropped; a token left without a term is a request error.
pub(super) fn render_where(
    roots: &[String],
    terms: Vec<(String, Param)>,
    params: &mut ParamList,
) -> MuxResult<Option<String>> {
    if roots.is_empty() {
        if !terms.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "pgmux.qb",
                dropped = terms.len(),
                "no condition roots left; dropping bound terms"
            );
        }
        return Ok(None);
    }

    let mut text = roots.join(" AND ");
    let mut located = Vec::with_capacity(terms.len());
    for (token, param) in terms {
        match text.find(&token) {
            Some(pos) => located.push((pos, token, param)),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(target: "pgmux.qb", token = %token, "dropping orphaned term");
            }
        }
    }
    located.sort_by_key(|(pos, _, _)| *pos);

    for (_, token, param) in located {
        let idx = params.push(param);
        text = text.replace(&token, &format!("${idx}"));
    }
    if let Some(token) = placeholder_tokens(&text).first() {
        return Err(MuxError::request(format!(
            "condition term `{token}` has no bound value"
        )));
    }
    Ok(Some(text))
}
