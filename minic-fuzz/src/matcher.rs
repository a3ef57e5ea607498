//! Token matchers.
//!
//! Every terminal in a grammar is backed by a [`TokenMatcher`]: a closed set
//! of matcher variants, each able to
//!
//! - attempt a speculative match against a [`Cursor`], reporting the matched
//!   byte length (`0` means "no match"; matching is inherently speculative
//!   and never an error), and
//! - synthesize a random instance of its own pattern as text.
//!
//! The set is a closed enum rather than a trait object: the matcher kinds
//! are small and fixed, and the generator's boundary-safety reasoning needs
//! to be exhaustive over them.

use crate::cursor::Cursor;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;

/// Alphabet for the first character of an identifier.
const IDENT_START: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_";

/// Alphabet for the remaining characters of an identifier.
const IDENT_CONTINUE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

const DIGITS: &[u8] = b"0123456789";

/// Whitespace characters produced by the whitespace matcher.
const WHITESPACE_CHARS: &[char] = &[' ', '\n', '\t', '\r'];

/// Longest generated integer literal, in digits.
const MAX_INT_DIGITS: usize = 10;

/// A terminal's matching and generation policy.
///
/// Matchers are immutable values; construct them with the associated
/// functions below and register them with
/// [`Grammar::define_token`](crate::Grammar::define_token).
#[derive(Debug, Clone)]
pub enum TokenMatcher {
    /// An exact literal (keyword, operator, punctuation).
    Fixed(String),
    /// A letter or underscore followed by letters, digits or underscores,
    /// consumed greedily up to `max_len` characters.
    Identifier { max_len: usize },
    /// One or more decimal digits, consumed greedily.
    Integer,
    /// A delimited literal with backslash escapes.
    StringLiteral(StringLiteral),
    /// Exactly one whitespace character per match; callers loop to consume
    /// runs.
    Whitespace,
    /// A fixed prefix followed by content up to (and including) one of a set
    /// of terminator characters.
    LineComment(LineComment),
    /// A fixed open token followed by content up to (and including) a fixed
    /// close token.
    BlockComment(BlockComment),
}

/// Configuration for a delimited, escape-aware literal.
#[derive(Debug, Clone)]
pub struct StringLiteral {
    delimiter: char,
    escapable: Vec<char>,
    min_len: usize,
    max_len: usize,
    /// Printable characters that may appear unescaped in generated content.
    alphabet: Vec<char>,
}

impl StringLiteral {
    pub fn new(delimiter: char, escapable: &[char], min_len: usize, max_len: usize) -> Self {
        let alphabet = printable_ascii()
            .filter(|&c| c != delimiter && c != '\\')
            .collect();
        Self {
            delimiter,
            escapable: escapable.to_vec(),
            min_len,
            max_len,
            alphabet,
        }
    }
}

/// Configuration for a single-line comment.
#[derive(Debug, Clone)]
pub struct LineComment {
    prefix: String,
    terminators: Vec<char>,
    max_len: usize,
    alphabet: Vec<char>,
}

impl LineComment {
    pub fn new(prefix: &str, terminators: &[char], max_len: usize) -> Self {
        let alphabet = printable_ascii()
            .filter(|c| !terminators.contains(c))
            .collect();
        Self {
            prefix: prefix.to_string(),
            terminators: terminators.to_vec(),
            max_len,
            alphabet,
        }
    }
}

/// Configuration for a block comment.
#[derive(Debug, Clone)]
pub struct BlockComment {
    open: String,
    close: String,
    max_len: usize,
    /// Content alphabet excludes every character of the close token, so a
    /// generated comment can never contain an early close.
    alphabet: Vec<char>,
}

impl BlockComment {
    pub fn new(open: &str, close: &str, max_len: usize) -> Self {
        let alphabet = printable_ascii()
            .filter(|&c| !close.contains(c))
            .collect();
        Self {
            open: open.to_string(),
            close: close.to_string(),
            max_len,
            alphabet,
        }
    }
}

fn printable_ascii() -> impl Iterator<Item = char> {
    (0x20u8..=0x7e).map(char::from)
}

fn random_string<R: Rng + ?Sized>(alphabet: &[char], len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| alphabet.choose(rng).copied().unwrap_or(' '))
        .collect()
}

impl TokenMatcher {
    pub fn fixed(text: &str) -> Self {
        TokenMatcher::Fixed(text.to_string())
    }

    pub fn identifier(max_len: usize) -> Self {
        TokenMatcher::Identifier { max_len }
    }

    pub fn integer() -> Self {
        TokenMatcher::Integer
    }

    pub fn string_literal(delimiter: char, escapable: &[char], min_len: usize, max_len: usize) -> Self {
        TokenMatcher::StringLiteral(StringLiteral::new(delimiter, escapable, min_len, max_len))
    }

    pub fn whitespace() -> Self {
        TokenMatcher::Whitespace
    }

    pub fn line_comment(prefix: &str, terminators: &[char], max_len: usize) -> Self {
        TokenMatcher::LineComment(LineComment::new(prefix, terminators, max_len))
    }

    pub fn block_comment(open: &str, close: &str, max_len: usize) -> Self {
        TokenMatcher::BlockComment(BlockComment::new(open, close, max_len))
    }

    /// Attempt to match at the cursor's position, returning the matched byte
    /// length. `0` means no match; the caller's own cursor is never moved.
    pub fn matched_len(&self, cursor: Cursor<'_>) -> usize {
        match self {
            TokenMatcher::Fixed(text) => match cursor.read_at(0, text.len()) {
                Some(ahead) if ahead == text.as_str() => text.len(),
                _ => 0,
            },
            TokenMatcher::Identifier { max_len } => {
                let mut cur = cursor;
                match cur.pop_char() {
                    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                    _ => return 0,
                }
                let mut count = 1;
                while count < *max_len {
                    match cur.peek_char() {
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                            cur.pop_char();
                            count += 1;
                        }
                        _ => break,
                    }
                }
                count
            }
            TokenMatcher::Integer => {
                let mut cur = cursor;
                let mut len = 0;
                while matches!(cur.peek_char(), Some(c) if c.is_ascii_digit()) {
                    cur.pop_char();
                    len += 1;
                }
                len
            }
            TokenMatcher::StringLiteral(lit) => {
                let mut cur = cursor;
                match cur.pop_char() {
                    Some(c) if c == lit.delimiter => {}
                    _ => return 0,
                }
                while let Some(c) = cur.pop_char() {
                    if c == '\\' {
                        // The escape always consumes the following character;
                        // a trailing escape at end of input consumes nothing
                        // more and the match ends there.
                        cur.pop_char();
                    } else if c == lit.delimiter {
                        break;
                    }
                }
                cursor.remaining() - cur.remaining()
            }
            TokenMatcher::Whitespace => match cursor.peek_char() {
                Some(c) if c.is_whitespace() => c.len_utf8(),
                _ => 0,
            },
            TokenMatcher::LineComment(comment) => {
                if !cursor.rest().starts_with(&comment.prefix) {
                    return 0;
                }
                let mut cur = cursor;
                cur.advance(comment.prefix.len());
                while let Some(c) = cur.pop_char() {
                    if comment.terminators.contains(&c) {
                        break;
                    }
                }
                // Missing terminator before end of input is accepted; the
                // match simply ends at the end of the buffer.
                cursor.remaining() - cur.remaining()
            }
            TokenMatcher::BlockComment(comment) => {
                let rest = cursor.rest();
                if !rest.starts_with(&comment.open) {
                    return 0;
                }
                match rest[comment.open.len()..].find(&comment.close) {
                    Some(at) => comment.open.len() + at + comment.close.len(),
                    None => rest.len(),
                }
            }
        }
    }

    /// Synthesize a random instance of this matcher's pattern.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            TokenMatcher::Fixed(text) => text.clone(),
            TokenMatcher::Identifier { max_len } => {
                let len = rng.gen_range(1..=(*max_len).max(1));
                let mut s = String::with_capacity(len);
                s.push(IDENT_START.choose(rng).map(|&b| b as char).unwrap_or('_'));
                for _ in 1..len {
                    s.push(IDENT_CONTINUE.choose(rng).map(|&b| b as char).unwrap_or('_'));
                }
                s
            }
            TokenMatcher::Integer => {
                let len = rng.gen_range(1..=MAX_INT_DIGITS);
                (0..len)
                    .map(|_| DIGITS.choose(rng).map(|&b| b as char).unwrap_or('0'))
                    .collect()
            }
            TokenMatcher::StringLiteral(lit) => lit.generate(rng),
            TokenMatcher::Whitespace => {
                WHITESPACE_CHARS.choose(rng).copied().unwrap_or(' ').to_string()
            }
            TokenMatcher::LineComment(comment) => {
                let len = if comment.max_len == 0 {
                    0
                } else {
                    rng.gen_range(0..comment.max_len)
                };
                let mut s = comment.prefix.clone();
                s.push_str(&random_string(&comment.alphabet, len, rng));
                s.push(comment.terminators.choose(rng).copied().unwrap_or('\n'));
                s
            }
            TokenMatcher::BlockComment(comment) => {
                let len = if comment.max_len == 0 {
                    0
                } else {
                    rng.gen_range(0..comment.max_len)
                };
                let mut s = comment.open.clone();
                s.push_str(&random_string(&comment.alphabet, len, rng));
                s.push_str(&comment.close);
                s
            }
        }
    }
}

impl StringLiteral {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let len = rng.gen_range(self.min_len..=self.max_len.max(self.min_len));
        let content: Vec<char> = (0..len)
            .map(|_| self.alphabet.choose(rng).copied().unwrap_or(' '))
            .collect();

        // Escape density is a tunable: up to a quarter of the content span,
        // with duplicate insertion points collapsing, so the actual count
        // may come out lower than drawn.
        let budget = len / 4;
        let escape_count = if budget == 0 { 0 } else { rng.gen_range(0..=budget) };
        let mut escape_points = FxHashSet::default();
        for _ in 0..escape_count {
            escape_points.insert(rng.gen_range(0..len));
        }

        let mut s = String::with_capacity(len + 2);
        s.push(self.delimiter);
        for (i, &c) in content.iter().enumerate() {
            if escape_points.contains(&i) {
                s.push('\\');
                s.push(self.escapable.choose(rng).copied().unwrap_or('\\'));
            } else {
                s.push(c);
            }
        }
        s.push(self.delimiter);
        s
    }
}
