//! Deterministic marker-based parameter parser.
//!
//! Finds the words that introduce each parameter ("as", "named", "email",
//! the parameter's own name), cuts the message into segments at those
//! markers, and assigns whatever is left over by token type and position.
//! The result is raw string values; coercion happens in [`super::schema`].

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::schema::is_email;
use crate::types::{ParamSpec, ParamType, ToolDeclaration};

/// Command and politeness words that never carry a value.
const NOISE: &[&str] = &[
    "please", "kindly", "can", "could", "would", "will", "you", "i", "i'd", "i'm", "want",
    "wanna", "need", "like", "to", "hey", "hi", "hello", "a", "an", "the", "and", "with",
    "for", "me", "my", "of", "into", "in", "some", "also", "just", "now", "us", "it",
    "this", "that", "is", "are", "be", "by", "from", "at", "his", "her", "their", "its",
];

/// Words skipped between a marker and its value.
const LEADING_FILLERS: &[&str] = &[
    "is", "are", "=", "-", "a", "an", "the", "id", "address", "no", "number", "of", "as",
    "be", "will",
];

/// Words trimmed from the end of a text value.
const TRAILING: &[&str] = &[
    "and", "with", "&", "plus", "also", "then", "his", "her", "their", "whose", "who",
    "is", "has", "having", "to", "the", "in", "into", "database", "db", "directory",
    "records", "system", "please",
];

const BOOLEAN_WORDS: &[&str] = &["yes", "no", "true", "false", "y", "n", "on", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Email,
    Number,
    Group,
    /// A double-quoted span, kept whole so marker words inside it stay text.
    Quoted,
}

#[derive(Debug, Clone)]
struct Token<'a> {
    /// Token text with surrounding punctuation removed. For groups and
    /// quoted spans, the text inside the delimiters.
    text: &'a str,
    lower: String,
    kind: TokenKind,
    /// Offset of the raw token, including any stripped leading quote.
    raw_start: usize,
    start: usize,
    end: usize,
}

/// Two or more parameters competing for one unmarked span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub params: Vec<String>,
    pub span: String,
}

/// Output of a marker parse: raw values by parameter name, plus the
/// ambiguous span if one was left unassigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerParse {
    pub values: Map<String, Value>,
    pub ambiguity: Option<Ambiguity>,
}

#[derive(Debug, Clone, Copy)]
struct MarkerHit {
    param: usize,
    /// First token of the marker phrase.
    at: usize,
    /// First token after the marker phrase.
    after: usize,
}

/// Parse `text` against `decl`.
pub fn parse(text: &str, decl: &ToolDeclaration) -> MarkerParse {
    let tokens = tokenize(text);
    let keywords: HashSet<&str> = decl.keywords.iter().map(String::as_str).collect();
    let mut consumed = vec![false; tokens.len()];
    let mut filled: Vec<Option<String>> = vec![None; decl.params.len()];

    // Markers and their segments.
    let hits = find_markers(&tokens, decl, &keywords);
    for (n, hit) in hits.iter().enumerate() {
        for c in consumed.iter_mut().take(hit.after).skip(hit.at) {
            *c = true;
        }
        let seg_end = hits.get(n + 1).map(|h| h.at).unwrap_or(tokens.len());
        let byte_end = hits
            .get(n + 1)
            .map(|h| tokens[h.at].start)
            .unwrap_or(text.len());
        let spec = &decl.params[hit.param];
        if let Some(value) =
            take_segment(text, &tokens, hit.after, seg_end, byte_end, spec, &mut consumed)
        {
            filled[hit.param] = Some(value);
        }
    }

    // Bracketed groups.
    for (i, token) in tokens.iter().enumerate() {
        if consumed[i] || token.kind != TokenKind::Group {
            continue;
        }
        let target = decl
            .params
            .iter()
            .enumerate()
            .find(|(p, spec)| spec.parenthetical && filled[*p].is_none());
        if let Some((p, _)) = target {
            filled[p] = Some(token.text.to_string());
            consumed[i] = true;
        }
    }

    // Loose typed tokens.
    for (i, token) in tokens.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        let target = decl.params.iter().enumerate().find_map(|(p, spec)| {
            if filled[p].is_some() {
                return None;
            }
            loose_value(token, &spec.ty).map(|v| (p, v))
        });
        if let Some((p, value)) = target {
            filled[p] = Some(value);
            consumed[i] = true;
        } else if token.kind == TokenKind::Word
            && decl.params.iter().any(|s| s.ty.choice_for(&token.lower).is_some())
        {
            // A repeated choice word ("excel sheet") is not free text.
            consumed[i] = true;
        }
    }

    // Unmarked word runs.
    let runs = word_runs(&tokens, &consumed, &keywords);
    let mut ambiguity = None;
    if !runs.is_empty() {
        let (targets, required) = run_targets(decl, &filled);
        if required && runs.len() == 1 && runs[0].len() > 1 && targets.len() > 1 {
            ambiguity = Some(Ambiguity {
                params: targets
                    .iter()
                    .map(|&p| decl.params[p].name.clone())
                    .collect(),
                span: span_text(text, &tokens, &runs[0]),
            });
        } else if !targets.is_empty() {
            let longest = runs
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let ordered = std::iter::once(longest)
                .chain((0..runs.len()).filter(|&i| i != longest));
            for (target, run) in targets.iter().zip(ordered) {
                filled[*target] = Some(span_text(text, &tokens, &runs[run]));
            }
        }
    }

    let mut values = Map::new();
    for (spec, value) in decl.params.iter().zip(filled) {
        if let Some(value) = value {
            values.insert(spec.name.clone(), Value::String(value));
        }
    }
    MarkerParse { values, ambiguity }
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Opening quotes and the quote that closes each.
const QUOTES: &[(char, char)] = &[('"', '"'), ('\u{201c}', '\u{201d}')];

const LEADING_PUNCT: &[char] = &['"', '\'', '\u{201c}', '\u{2018}', '[', '{', '<', '*', ','];
const TRAILING_PUNCT: &[char] = &[
    ',', ';', ':', '!', '?', '.', '"', '\'', '\u{201d}', '\u{2019}', ')', ']', '}', '>', '*',
];

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '(' {
            chars.next();
            let mut inner_end = input.len();
            let mut end = input.len();
            for (i, c) in chars.by_ref() {
                if c == ')' {
                    inner_end = i;
                    end = i + 1;
                    break;
                }
            }
            let inner = input[start + 1..inner_end].trim();
            if !inner.is_empty() {
                tokens.push(Token {
                    text: inner,
                    lower: inner.to_lowercase(),
                    kind: TokenKind::Group,
                    raw_start: start,
                    start,
                    end,
                });
            }
            continue;
        }

        if let Some((token, close_end)) = quoted_token(input, start, c) {
            while chars.peek().is_some_and(|&(i, _)| i < close_end) {
                chars.next();
            }
            if !token.text.is_empty() {
                tokens.push(token);
            }
            continue;
        }

        let mut end = input.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '(' {
                end = i;
                break;
            }
            chars.next();
        }

        let raw = &input[start..end];
        let stripped = raw.trim_start_matches(LEADING_PUNCT);
        let lead = raw.len() - stripped.len();
        let stripped = stripped.trim_end_matches(TRAILING_PUNCT);
        if stripped.is_empty() {
            continue;
        }
        let kind = if is_email(stripped) {
            TokenKind::Email
        } else if is_phone_like(stripped) {
            TokenKind::Number
        } else {
            TokenKind::Word
        };
        tokens.push(Token {
            text: stripped,
            lower: stripped.to_lowercase(),
            kind,
            raw_start: start,
            start: start + lead,
            end: start + lead + stripped.len(),
        });
    }
    tokens
}

/// A quoted span opened by `open` at `start`, and the offset just past
/// its closing quote. Unterminated quotes are left to the plain token path.
fn quoted_token(input: &str, start: usize, open: char) -> Option<(Token<'_>, usize)> {
    let close = QUOTES.iter().find(|(o, _)| *o == open).map(|(_, c)| *c)?;
    let inner_start = start + open.len_utf8();
    let inner_len = input[inner_start..].find(close)?;
    let inner = &input[inner_start..inner_start + inner_len];
    let trimmed = inner.trim();
    let text_start = inner_start + (inner.len() - inner.trim_start().len());
    let token = Token {
        text: trimmed,
        lower: trimmed.to_lowercase(),
        kind: TokenKind::Quoted,
        raw_start: start,
        start: text_start,
        end: text_start + trimmed.len(),
    };
    Some((token, inner_start + inner_len + close.len_utf8()))
}

/// A digit run of at least five digits, optionally with `+` and dashes.
fn is_phone_like(s: &str) -> bool {
    let starts_ok = s.starts_with('+') || s.starts_with(|c: char| c.is_ascii_digit());
    starts_ok
        && s.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-')
        && s.chars().filter(char::is_ascii_digit).count() >= 5
}

// =============================================================================
// Markers and segments
// =============================================================================

/// Marker hits in message order.
///
/// A marker word is taken as part of the previous marker's value while
/// that value is still empty ("about content review" keeps `content` in the
/// subject). A `leading_run` parameter ignores its markers once another
/// marker has been seen, provided unmarked words before the first marker
/// can fill it instead.
fn find_markers(
    tokens: &[Token<'_>],
    decl: &ToolDeclaration,
    keywords: &HashSet<&str>,
) -> Vec<MarkerHit> {
    let mut phrases: Vec<(Vec<&str>, usize)> = decl
        .params
        .iter()
        .enumerate()
        .flat_map(|(p, spec)| {
            spec.markers
                .iter()
                .map(move |m| (m.split_whitespace().collect::<Vec<_>>(), p))
        })
        .filter(|(words, _)| !words.is_empty())
        .collect();
    // Longest first; stable so declaration order breaks ties.
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut hits = Vec::new();
    let mut marked = vec![false; decl.params.len()];
    let mut i = 0;
    while i < tokens.len() {
        if hits
            .last()
            .is_some_and(|prev: &MarkerHit| !has_value(tokens, prev.after, i))
        {
            i += 1;
            continue;
        }
        let lead_run = hits
            .first()
            .is_some_and(|first| has_unmarked_words(tokens, first.at, keywords));
        let hit = phrases.iter().find_map(|(words, p)| {
            if marked[*p] || !phrase_at(tokens, i, words) {
                return None;
            }
            if lead_run && decl.params[*p].leading_run {
                return None;
            }
            let after = i + words.len();
            if !value_follows(tokens, after, &decl.params[*p]) {
                return None;
            }
            Some(MarkerHit {
                param: *p,
                at: i,
                after,
            })
        });
        match hit {
            Some(hit) => {
                marked[hit.param] = true;
                hits.push(hit);
                if decl.params[hit.param].greedy {
                    break;
                }
                i = hit.after;
            }
            None => i += 1,
        }
    }
    hits
}

/// True when tokens `from..to` hold something besides leading fillers.
fn has_value(tokens: &[Token<'_>], from: usize, to: usize) -> bool {
    tokens[from..to]
        .iter()
        .any(|t| !(t.kind == TokenKind::Word && LEADING_FILLERS.contains(&t.lower.as_str())))
}

/// True when the tokens before `end` include a word that could be a value.
fn has_unmarked_words(tokens: &[Token<'_>], end: usize, keywords: &HashSet<&str>) -> bool {
    tokens[..end].iter().any(|t| run_candidate(t, keywords))
}

fn phrase_at(tokens: &[Token<'_>], i: usize, words: &[&str]) -> bool {
    i + words.len() <= tokens.len()
        && words
            .iter()
            .zip(&tokens[i..])
            .all(|(w, t)| t.kind == TokenKind::Word && t.lower == *w)
}

/// Typed parameters only accept a marker when a value of their type
/// follows it, so "want to send" does not mark the `to` address.
fn value_follows(tokens: &[Token<'_>], after: usize, spec: &ParamSpec) -> bool {
    if spec.ty == ParamType::Text {
        return true;
    }
    tokens[after.min(tokens.len())..]
        .iter()
        .find(|t| !(t.kind == TokenKind::Word && LEADING_FILLERS.contains(&t.lower.as_str())))
        .is_some_and(|t| typed_value(t, &spec.ty).is_some())
}

fn take_segment(
    text: &str,
    tokens: &[Token<'_>],
    from: usize,
    to: usize,
    byte_end: usize,
    spec: &ParamSpec,
    consumed: &mut [bool],
) -> Option<String> {
    let mut first = from;
    while first < to
        && tokens[first].kind == TokenKind::Word
        && LEADING_FILLERS.contains(&tokens[first].lower.as_str())
    {
        first += 1;
    }
    if first >= to {
        return None;
    }
    if tokens[first].kind == TokenKind::Quoted && !spec.verbatim {
        return typed_value(&tokens[first], &spec.ty).map(|v| {
            consumed[first] = true;
            v
        });
    }

    match spec.ty {
        ParamType::Text if spec.verbatim => {
            let value = unquote(text[tokens[first].raw_start..byte_end].trim());
            for c in &mut consumed[from..to] {
                *c = true;
            }
            (!value.is_empty()).then(|| value.to_string())
        }
        ParamType::Text => {
            let mut last = first;
            while last < to && tokens[last].kind == TokenKind::Word {
                last += 1;
            }
            while last > first && TRAILING.contains(&tokens[last - 1].lower.as_str()) {
                last -= 1;
            }
            if last == first {
                return None;
            }
            for c in &mut consumed[first..last] {
                *c = true;
            }
            Some(text[tokens[first].start..tokens[last - 1].end].to_string())
        }
        ref ty => (first..to).find_map(|i| {
            typed_value(&tokens[i], ty).map(|v| {
                consumed[i] = true;
                v
            })
        }),
    }
}

fn typed_value(token: &Token<'_>, ty: &ParamType) -> Option<String> {
    match ty {
        ParamType::Text => matches!(token.kind, TokenKind::Word | TokenKind::Quoted)
            .then(|| token.text.to_string()),
        ParamType::Email => (token.kind == TokenKind::Email).then(|| token.text.to_string()),
        ParamType::Phone => (token.kind == TokenKind::Number).then(|| token.text.to_string()),
        ParamType::Integer => token
            .text
            .replace(',', "")
            .parse::<i64>()
            .ok()
            .map(|n| n.to_string()),
        ParamType::Boolean => BOOLEAN_WORDS
            .contains(&token.lower.as_str())
            .then(|| token.lower.clone()),
        ParamType::Choice { .. } => ty.choice_for(&token.lower).map(str::to_string),
    }
}

/// Typed tokens found outside any segment. Plain words never fill
/// text parameters here; that is left to the run assignment.
fn loose_value(token: &Token<'_>, ty: &ParamType) -> Option<String> {
    match (token.kind, ty) {
        (_, ParamType::Text) | (TokenKind::Group, _) => None,
        (TokenKind::Word, ParamType::Boolean) => None,
        _ => typed_value(token, ty),
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim_start_matches([':', '-']).trim();
    QUOTES
        .iter()
        .find_map(|&(open, close)| s.strip_prefix(open)?.strip_suffix(close))
        .map(str::trim)
        .unwrap_or(s)
}

// =============================================================================
// Runs
// =============================================================================

fn word_runs(tokens: &[Token<'_>], consumed: &[bool], keywords: &HashSet<&str>) -> Vec<Vec<usize>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if !consumed[i] && run_candidate(token, keywords) {
            current.push(i);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn run_candidate(token: &Token<'_>, keywords: &HashSet<&str>) -> bool {
    match token.kind {
        TokenKind::Quoted => true,
        TokenKind::Word => {
            !NOISE.contains(&token.lower.as_str()) && !keywords.contains(token.lower.as_str())
        }
        _ => false,
    }
}

/// Parameters that unmarked runs may fill: unfilled required text
/// parameters, or unfilled optional ones when nothing textual is required.
/// The flag tells which of the two it is.
fn run_targets(decl: &ToolDeclaration, filled: &[Option<String>]) -> (Vec<usize>, bool) {
    let text_params = || {
        decl.params
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.ty == ParamType::Text)
    };
    if text_params().any(|(_, spec)| spec.required) {
        let targets = text_params()
            .filter(|(p, spec)| spec.required && filled[*p].is_none())
            .map(|(p, _)| p)
            .collect();
        (targets, true)
    } else {
        let targets = text_params()
            .filter(|(p, spec)| !spec.greedy && filled[*p].is_none())
            .map(|(p, _)| p)
            .collect();
        (targets, false)
    }
}

fn span_text(text: &str, tokens: &[Token<'_>], run: &[usize]) -> String {
    match (run.first(), run.last()) {
        (Some(&first), Some(&last)) => text[tokens[first].start..tokens[last].end].to_string(),
        _ => String::new(),
    }
}
