//! Query-string language understood by the deposit search index.
//!
//! Supported syntax:
//! - `term`, `"a phrase"`, `field:term`, `field:"a phrase"`, `field:prefix*`, `field:*`
//! - `*` or `*:*` to match every document
//! - `+clause` (required), `-clause` (prohibited)
//! - `a AND b`, `a OR b`, `NOT a`; `OR` is the default operator
//!
//! Anything else (`( )`, `[a TO b]`, `{a TO b}`, `^n`, `~n`, `?`, or text glued
//! to a closing quote) is rejected as `InvalidQuery`. Reserved characters are
//! allowed inside quoted phrases.
//!
//! Text fields are tokenized on non-alphanumeric characters and compared
//! case-insensitively. Numeric fields compare by integer equality.

use crate::{CoreError, Deposit};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Id,
    BookingCode,
    UserId,
    CurrencyCode,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Id,
        Field::BookingCode,
        Field::UserId,
        Field::CurrencyCode,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Field::Id),
            "bookingCode" | "booking_code" => Some(Field::BookingCode),
            "userId" | "user_id" => Some(Field::UserId),
            "currencyCode" | "currency_code" => Some(Field::CurrencyCode),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    Any,
    Field(Field),
    /// A field name the index does not know; never matches.
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Pattern {
    All,
    Text { raw: String, tokens: Vec<String> },
    Prefix(String),
    Exists,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Clause {
    occur: Occur,
    target: Target,
    pattern: Pattern,
}

/// A parsed query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

#[derive(Debug, PartialEq, Eq)]
enum Lexeme {
    Word(String),
    Phrase { prefix: String, text: String },
}

/// Grouping, ranges, boosts, fuzziness and single-char wildcards are not supported.
const RESERVED: [char; 9] = ['(', ')', '[', ']', '{', '}', '^', '~', '?'];

fn lex(input: &str) -> Result<Vec<Lexeme>, CoreError> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            if RESERVED.contains(&c) {
                return Err(CoreError::InvalidQuery(format!("unsupported syntax '{}'", c)));
            }
            word.push(c);
            chars.next();
        }
        if chars.peek() == Some(&'"') {
            // Only `"..."`, `field:"..."` and `+"..."`/`-"..."` may open a phrase.
            if !(word.is_empty() || word.ends_with(':') || word == "+" || word == "-") {
                return Err(CoreError::InvalidQuery(format!(
                    "unexpected quote after '{}'",
                    word
                )));
            }
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                text.push(c);
            }
            if !closed {
                return Err(CoreError::InvalidQuery("unterminated quote".into()));
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err(CoreError::InvalidQuery(format!(
                    "unexpected text after phrase \"{}\"",
                    text
                )));
            }
            out.push(Lexeme::Phrase { prefix: word, text });
        } else {
            out.push(Lexeme::Word(word));
        }
    }
    Ok(out)
}

/// Lowercased alphanumeric runs of `s`.
pub fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn text_pattern(raw: &str) -> Pattern {
    Pattern::Text {
        raw: raw.to_string(),
        tokens: tokenize(raw),
    }
}

fn value_pattern(value: &str) -> Pattern {
    if value == "*" {
        return Pattern::Exists;
    }
    match value.strip_suffix('*') {
        Some(prefix) if !prefix.is_empty() => Pattern::Prefix(prefix.to_lowercase()),
        _ => text_pattern(value),
    }
}

fn split_occur(s: &str) -> (Option<Occur>, &str) {
    if let Some(rest) = s.strip_prefix('+') {
        (Some(Occur::Must), rest)
    } else if let Some(rest) = s.strip_prefix('-') {
        (Some(Occur::MustNot), rest)
    } else {
        (None, s)
    }
}

fn target_for(name: &str) -> Result<Target, CoreError> {
    if name.is_empty() {
        return Err(CoreError::InvalidQuery("empty field name".into()));
    }
    Ok(Field::parse(name).map_or(Target::Unknown, Target::Field))
}

fn word_clause(word: &str) -> Result<(Option<Occur>, Target, Pattern), CoreError> {
    let (occur, body) = split_occur(word);
    if body.is_empty() {
        return Err(CoreError::InvalidQuery(format!("dangling operator '{}'", word)));
    }
    if body == "*" || body == "*:*" {
        return Ok((occur, Target::Any, Pattern::All));
    }
    match body.split_once(':') {
        Some((field, value)) => {
            let target = target_for(field)?;
            if value.is_empty() {
                return Err(CoreError::InvalidQuery(format!(
                    "missing value for field '{}'",
                    field
                )));
            }
            Ok((occur, target, value_pattern(value)))
        }
        None => Ok((occur, Target::Any, value_pattern(body))),
    }
}

fn phrase_clause(prefix: &str, text: &str) -> Result<(Option<Occur>, Target, Pattern), CoreError> {
    let (occur, body) = split_occur(prefix);
    let target = match body.strip_suffix(':') {
        Some(field) => target_for(field)?,
        None => Target::Any,
    };
    Ok((occur, target, text_pattern(text)))
}

impl Query {
    /// Parse query text. Empty text matches every document.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut pending_must = false;
        let mut pending_not = false;
        let mut pending_or = false;

        for lexeme in lex(input)? {
            let (explicit, target, pattern) = match &lexeme {
                Lexeme::Word(w) if w == "AND" => {
                    let Some(prev) = clauses.last_mut() else {
                        return Err(CoreError::InvalidQuery("AND without left operand".into()));
                    };
                    if prev.occur == Occur::Should {
                        prev.occur = Occur::Must;
                    }
                    pending_must = true;
                    continue;
                }
                Lexeme::Word(w) if w == "OR" => {
                    if clauses.is_empty() {
                        return Err(CoreError::InvalidQuery("OR without left operand".into()));
                    }
                    pending_or = true;
                    continue;
                }
                Lexeme::Word(w) if w == "NOT" => {
                    pending_not = true;
                    continue;
                }
                Lexeme::Word(w) => word_clause(w)?,
                Lexeme::Phrase { prefix, text } => phrase_clause(prefix, text)?,
            };
            let occur = if pending_not {
                Occur::MustNot
            } else if let Some(o) = explicit {
                o
            } else if pending_must {
                Occur::Must
            } else {
                Occur::Should
            };
            pending_must = false;
            pending_not = false;
            pending_or = false;
            clauses.push(Clause {
                occur,
                target,
                pattern,
            });
        }

        if pending_must || pending_not || pending_or {
            return Err(CoreError::InvalidQuery("query ends with an operator".into()));
        }
        Ok(Self { clauses })
    }

    /// Relevance of `doc`, or `None` when it does not match.
    pub fn score(&self, doc: &Deposit) -> Option<usize> {
        if self.clauses.is_empty() {
            return Some(0);
        }
        let mut score = 0;
        let mut has_required = false;
        let mut has_optional = false;
        let mut optional_hit = false;
        for clause in &self.clauses {
            let hit = clause.matches(doc);
            match clause.occur {
                Occur::MustNot => {
                    if hit {
                        return None;
                    }
                }
                Occur::Must => {
                    has_required = true;
                    if !hit {
                        return None;
                    }
                    score += 1;
                }
                Occur::Should => {
                    has_optional = true;
                    if hit {
                        optional_hit = true;
                        score += 1;
                    }
                }
            }
        }
        if !has_required && has_optional && !optional_hit {
            return None;
        }
        Some(score)
    }

    pub fn matches(&self, doc: &Deposit) -> bool {
        self.score(doc).is_some()
    }

    /// Matching documents ordered by score (descending), then id (ascending).
    pub fn run<'a, I>(&self, docs: I) -> Vec<Deposit>
    where
        I: IntoIterator<Item = &'a Deposit>,
    {
        let mut hits: Vec<(usize, &Deposit)> = docs
            .into_iter()
            .filter_map(|d| self.score(d).map(|s| (s, d)))
            .collect();
        hits.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(a.id.cmp(&b.id)));
        hits.into_iter().map(|(_, d)| d.clone()).collect()
    }
}

impl Clause {
    fn matches(&self, doc: &Deposit) -> bool {
        if self.pattern == Pattern::All {
            return true;
        }
        match &self.target {
            Target::Any => Field::ALL.iter().any(|f| self.matches_field(*f, doc)),
            Target::Field(f) => self.matches_field(*f, doc),
            Target::Unknown => false,
        }
    }

    fn matches_field(&self, field: Field, doc: &Deposit) -> bool {
        match field {
            Field::Id => self.matches_number(doc.id),
            Field::UserId => self.matches_number(doc.user_id),
            Field::BookingCode => self.matches_text(doc.booking_code.as_deref()),
            Field::CurrencyCode => self.matches_text(doc.currency_code.as_deref()),
        }
    }

    fn matches_number(&self, value: Option<i64>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.pattern {
            Pattern::Exists | Pattern::All => true,
            Pattern::Text { raw, .. } => raw.trim().parse::<i64>().is_ok_and(|n| n == value),
            Pattern::Prefix(_) => false,
        }
    }

    fn matches_text(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.pattern {
            Pattern::Exists | Pattern::All => true,
            Pattern::Prefix(p) => tokenize(value).iter().any(|t| t.starts_with(p.as_str())),
            Pattern::Text { tokens, .. } => {
                if tokens.is_empty() {
                    return false;
                }
                let field_tokens = tokenize(value);
                field_tokens
                    .windows(tokens.len())
                    .any(|w| w == tokens.as_slice())
            }
        }
    }
}
