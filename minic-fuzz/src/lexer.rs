//! Lexical analysis over a grammar's token-matcher table.
//!
//! The lexer walks the input with maximal munch: at every position each
//! registered matcher runs against a cursor copy and the longest match wins.
//! Length ties break by per-token priority ([`Lexer::define_precedence`],
//! default 0); ties among equal priorities fall back to registration order
//! (first registered wins). That fallback is a sign of an ambiguous token
//! table, not a runtime error; keyword/identifier style conflicts should
//! be resolved with an explicit priority instead.
//!
//! Positions where no matcher applies are absorbed by an explicitly
//! configured unknown terminal that always consumes exactly one character,
//! so tokenization always makes progress and never backtracks.

use crate::cursor::Cursor;
use crate::grammar::{Grammar, GrammarError, Symbol};
use rustc_hash::FxHashMap;
use tracing::trace;

/// A lexed token: a terminal symbol, the matched text, its byte offset, and
/// whether the terminal is in the grammar's trivia set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'s> {
    pub symbol: Symbol,
    pub text: &'s str,
    pub start: usize,
    pub is_trivia: bool,
}

/// A maximal-munch tokenizer over a [`Grammar`]'s terminal table.
///
/// Built once after the grammar and read-only afterwards; multiple
/// generators may share one lexer.
#[derive(Debug)]
pub struct Lexer<'g> {
    grammar: &'g Grammar,
    precedence: FxHashMap<Symbol, i32>,
    unknown: Symbol,
}

impl<'g> Lexer<'g> {
    /// Create a lexer over `grammar`. `unknown` names the fallback terminal
    /// emitted at positions no matcher accepts; it needs no matcher of its
    /// own but must have been interned (see [`Grammar::symbol`]).
    pub fn new(grammar: &'g Grammar, unknown: &str) -> Result<Self, GrammarError> {
        let unknown = grammar
            .lookup(unknown)
            .ok_or_else(|| GrammarError::UndefinedSymbol(unknown.to_string()))?;
        Ok(Self {
            grammar,
            precedence: FxHashMap::default(),
            unknown,
        })
    }

    /// Override the tie-break priority of a defined terminal (default 0).
    /// Consulted only when two matchers tie on match length.
    pub fn define_precedence(&mut self, name: &str, priority: i32) -> Result<(), GrammarError> {
        let symbol = self
            .grammar
            .lookup(name)
            .filter(|s| self.grammar.is_terminal(*s))
            .ok_or_else(|| GrammarError::UnknownTerminal(name.to_string()))?;
        self.precedence.insert(symbol, priority);
        Ok(())
    }

    /// The tie-break priority of a terminal.
    pub fn precedence_of(&self, symbol: Symbol) -> i32 {
        self.precedence.get(&symbol).copied().unwrap_or(0)
    }

    /// The grammar this lexer reads its matcher table from.
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Tokenize `text` end to end.
    pub fn tokenize<'s>(&self, text: &'s str) -> Vec<Token<'s>> {
        let mut cursor = Cursor::new(text);
        let mut tokens = Vec::new();
        while !cursor.is_empty() {
            let start = cursor.offset();
            let (symbol, len) = match self.longest_match(cursor) {
                Some(won) => won,
                None => {
                    // Dead position: emit one character as the unknown
                    // terminal so the tokenizer always advances.
                    let len = cursor.peek_char().map_or(0, char::len_utf8);
                    trace!(offset = start, "no matcher applies; emitting unknown token");
                    (self.unknown, len)
                }
            };
            cursor.advance(len);
            tokens.push(Token {
                symbol,
                text: &text[start..start + len],
                start,
                is_trivia: self.grammar.is_trivia(symbol),
            });
        }
        tokens
    }

    /// The winning terminal at the cursor position, if any matcher accepts.
    fn longest_match(&self, cursor: Cursor<'_>) -> Option<(Symbol, usize)> {
        let mut best: Option<(Symbol, usize, i32)> = None;
        for (symbol, matcher) in self.grammar.terminals() {
            let len = matcher.matched_len(cursor);
            if len == 0 {
                continue;
            }
            let priority = self.precedence_of(symbol);
            let wins = match best {
                None => true,
                Some((_, best_len, best_priority)) => {
                    len > best_len || (len == best_len && priority > best_priority)
                }
            };
            if wins {
                best = Some((symbol, len, priority));
            }
        }
        best.map(|(symbol, len, _)| (symbol, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TokenMatcher;

    fn comparison_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.define_token("LT", TokenMatcher::fixed("<")).unwrap();
        g.define_token("LE", TokenMatcher::fixed("<=")).unwrap();
        g.define_token("ASSIGN", TokenMatcher::fixed("=")).unwrap();
        g.define_token("WS", TokenMatcher::whitespace()).unwrap();
        g.mark_trivia("WS").unwrap();
        g.symbol("UNKNOWN");
        g
    }

    fn kinds<'s>(lexer: &Lexer<'_>, text: &'s str) -> Vec<(String, &'s str)> {
        lexer
            .tokenize(text)
            .into_iter()
            .map(|t| (lexer.grammar().name(t.symbol).to_string(), t.text))
            .collect()
    }

    #[test]
    fn test_maximal_munch() {
        let g = comparison_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        // "<=" must lex as one LE token, never as LT followed by ASSIGN.
        assert_eq!(kinds(&lexer, "<="), vec![("LE".to_string(), "<=")]);
        assert_eq!(
            kinds(&lexer, "<=<"),
            vec![("LE".to_string(), "<="), ("LT".to_string(), "<")]
        );
    }

    #[test]
    fn test_precedence_tie_break() {
        let mut g = Grammar::new();
        g.define_token("IDENTIFIER", TokenMatcher::identifier(30)).unwrap();
        g.define_token("IF", TokenMatcher::fixed("if")).unwrap();
        g.symbol("UNKNOWN");
        let mut lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        lexer.define_precedence("IF", 1).unwrap();

        let tokens = lexer.tokenize("if");
        assert_eq!(tokens.len(), 1);
        assert_eq!(g.name(tokens[0].symbol), "IF");

        // One more identifier character and the keyword loses on length.
        let tokens = lexer.tokenize("ifx");
        assert_eq!(tokens.len(), 1);
        assert_eq!(g.name(tokens[0].symbol), "IDENTIFIER");
    }

    #[test]
    fn test_equal_priority_falls_back_to_registration_order() {
        let mut g = Grammar::new();
        g.define_token("FIRST", TokenMatcher::fixed("x")).unwrap();
        g.define_token("SECOND", TokenMatcher::fixed("x")).unwrap();
        g.symbol("UNKNOWN");
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let tokens = lexer.tokenize("x");
        assert_eq!(g.name(tokens[0].symbol), "FIRST");
    }

    #[test]
    fn test_unknown_fallback_makes_progress() {
        let g = comparison_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let tokens = lexer.tokenize("@#<");
        assert_eq!(
            kinds(&lexer, "@#<"),
            vec![
                ("UNKNOWN".to_string(), "@"),
                ("UNKNOWN".to_string(), "#"),
                ("LT".to_string(), "<"),
            ]
        );
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_trivia_classification() {
        let g = comparison_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let tokens = lexer.tokenize("< =");
        assert_eq!(tokens.len(), 3);
        assert!(!tokens[0].is_trivia);
        assert!(tokens[1].is_trivia);
        assert!(!tokens[2].is_trivia);
        assert_eq!(tokens[1].start, 1);
    }

    #[test]
    fn test_unknown_name_must_be_interned() {
        let g = Grammar::new();
        assert_eq!(
            Lexer::new(&g, "UNKNOWN").err(),
            Some(GrammarError::UndefinedSymbol("UNKNOWN".to_string()))
        );
    }
}
