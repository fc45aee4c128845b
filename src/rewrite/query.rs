//! Query string codec.
//!
//! # Responsibilities
//! - Split a raw query into ordered, percent-decoded name/value pairs
//! - Serialize pairs back into a query component
//!
//! # Design Decisions
//! - Never fails: malformed escapes decode lossily, missing `=` yields a value-only pair
//! - Empty segments (including a trailing `&`) are kept as empty pairs and vanish on output
//! - Output always starts with `?&` before the first emitted pair; upstream URI
//!   parsers accept the empty leading segment

use std::borrow::Cow;

use crate::rewrite::rules::RuleSet;

/// A single decoded query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True for the placeholder produced by an empty segment.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.value.is_empty()
    }

    fn rewritten(&self, rules: &RuleSet) -> Self {
        Self {
            name: rules.apply_all(&self.name),
            value: rules.apply_all(&self.value),
        }
    }
}

/// Parse a query component (without the leading `?`).
pub fn parse(query: &str) -> Vec<QueryParam> {
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => QueryParam::new(decode(name), decode(value)),
            None => QueryParam::new(String::new(), decode(segment)),
        })
        .collect()
}

/// Serialize parameters into a query component, including the leading `?`.
pub fn serialize(params: &[QueryParam]) -> String {
    let mut out = String::from("?");
    for param in params {
        if !param.name.is_empty() {
            out.push('&');
            out.push_str(&urlencoding::encode(&param.name));
            out.push('=');
            out.push_str(&urlencoding::encode(&param.value));
        } else if !param.value.is_empty() {
            out.push('&');
            out.push_str(&urlencoding::encode(&param.value));
        }
    }
    out
}

/// Parse, apply `rules` to every name and value, and serialize again.
///
/// An empty query stays empty.
pub fn rewrite(query: &str, rules: &RuleSet) -> String {
    if query.is_empty() {
        return String::new();
    }
    let params: Vec<QueryParam> = parse(query)
        .iter()
        .map(|param| param.rewritten(rules))
        .collect();
    serialize(&params)
}

fn decode(raw: &str) -> String {
    // '+' is a space in form-encoded queries; treat it that way so re-encoding
    // as %20 keeps the meaning intact.
    let raw: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::rules::Rule;

    #[test]
    fn parses_pairs_in_order() {
        let params = parse("q=foo&page=2");
        assert_eq!(
            params,
            vec![QueryParam::new("q", "foo"), QueryParam::new("page", "2")]
        );
    }

    #[test]
    fn first_equals_splits_name_from_value() {
        let params = parse("expr=a=b");
        assert_eq!(params, vec![QueryParam::new("expr", "a=b")]);
    }

    #[test]
    fn segment_without_equals_is_value_only() {
        let params = parse("flag&x=1");
        assert_eq!(
            params,
            vec![QueryParam::new("", "flag"), QueryParam::new("x", "1")]
        );
    }

    #[test]
    fn trailing_separator_yields_empty_pair() {
        let params = parse("a=1&");
        assert_eq!(params.len(), 2);
        assert!(params[1].is_empty());
    }

    #[test]
    fn empty_query_parses_to_nothing() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn decodes_percent_escapes_and_plus() {
        let params = parse("name=J%C3%BCrgen+M&city=K%C3%B6ln");
        assert_eq!(params[0].value, "Jürgen M");
        assert_eq!(params[1].value, "Köln");
    }

    #[test]
    fn malformed_escape_is_lossy_not_fatal() {
        let params = parse("bad=%ZZ%FF");
        assert_eq!(params.len(), 1);
        assert!(params[0].value.starts_with("%ZZ"));
    }

    #[test]
    fn serialize_keeps_leading_separator() {
        let params = vec![QueryParam::new("q", "a b"), QueryParam::new("", "flag")];
        assert_eq!(serialize(&params), "?&q=a%20b&flag");
    }

    #[test]
    fn serialize_drops_empty_pairs() {
        let params = parse("a=1&&b=2&");
        assert_eq!(serialize(&params), "?&a=1&b=2");
    }

    #[test]
    fn decoded_content_survives_serialization() {
        let original = parse("q=caf%C3%A9&lone&x=1%2B1&");
        let reparsed = parse(serialize(&original).trim_start_matches('?'));
        let meaningful: Vec<_> = original.into_iter().filter(|p| !p.is_empty()).collect();
        let reparsed: Vec<_> = reparsed.into_iter().filter(|p| !p.is_empty()).collect();
        assert_eq!(meaningful, reparsed);
    }

    #[test]
    fn rewrite_applies_rules_to_names_and_values() {
        let rules = RuleSet::new(vec![Rule::new("foo", "xxx").unwrap()]);
        assert_eq!(rewrite("q=foo&q=bar", &rules), "?&q=xxx&q=bar");
        assert_eq!(rewrite("foo=1", &rules), "?&xxx=1");
    }

    #[test]
    fn rewrite_leaves_empty_query_empty() {
        let rules = RuleSet::new(vec![Rule::new("^", "x").unwrap()]);
        assert_eq!(rewrite("", &rules), "");
    }
}
