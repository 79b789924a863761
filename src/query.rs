//! Filter-query descriptor: a list of match tokens with per-token polarity.

use thiserror::Error;

use crate::record::{MetaField, MetaRecord};

pub const MAX_QUERY_TOKENS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("too many query tokens (maximum is {MAX_QUERY_TOKENS})")]
    TooManyTokens,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryToken {
    text: String,
    negated: bool,
}

/// A parsed filter expression.
///
/// Matching is an AND across tokens; each token is an OR across the record's
/// text fields (and the filename when `match_filename` is set), compared as
/// case-insensitive substrings. A token written with a leading `!` must NOT
/// match any field. An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    raw: String,
    tokens: Vec<QueryToken>,
    match_filename: bool,
}

impl Query {
    pub fn new(match_filename: bool) -> Query {
        Query {
            raw: String::new(),
            tokens: Vec::new(),
            match_filename,
        }
    }

    /// Parses a whitespace-separated token list, replacing the current query.
    pub fn parse(raw: &str, match_filename: bool) -> Result<Query, QueryParseError> {
        let mut query = Query::new(match_filename);
        query.set_raw(raw);
        for token in raw.split_whitespace() {
            query.add_token(token)?;
        }
        Ok(query)
    }

    /// Stores the literal query text for later display and re-filtering.
    pub fn set_raw(&mut self, raw: &str) {
        self.raw = raw.to_string();
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.raw.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn match_filename(&self) -> bool {
        self.match_filename
    }

    /// Adds one token; a leading `!` negates it and is stripped before
    /// storing. A bare `!` is ignored.
    pub fn add_token(&mut self, token: &str) -> Result<(), QueryParseError> {
        let (text, negated) = match token.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (token, false),
        };
        if text.is_empty() {
            return Ok(());
        }
        if self.tokens.len() == MAX_QUERY_TOKENS {
            return Err(QueryParseError::TooManyTokens);
        }
        self.tokens.push(QueryToken {
            text: text.to_ascii_lowercase(),
            negated,
        });
        Ok(())
    }

    pub fn matches(&self, record: &MetaRecord) -> bool {
        self.tokens.iter().all(|token| {
            let found = self.token_found_in(record, &token.text);
            found != token.negated
        })
    }

    fn token_found_in(&self, record: &MetaRecord, needle: &str) -> bool {
        if self.match_filename && contains_ignore_case(&record.filename, needle) {
            return true;
        }
        MetaField::TEXT_FIELDS.iter().any(|&field| {
            record
                .field(field)
                .is_some_and(|value| contains_ignore_case(value, needle))
        })
    }
}

/// `needle` must already be lowercased.
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
