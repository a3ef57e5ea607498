//! Grammar tables and EBNF-style combinators.
//!
//! A [`Grammar`] owns three things: the token-matcher table (terminals), the
//! production-rule table (nonterminal → ordered alternatives), and the
//! trivia set. Symbol names are interned once at registration; productions
//! store [`Symbol`] ids.
//!
//! EBNF sugar (grouping, alternation, optionality, repetition) desugars into
//! plain productions under fresh synthetic nonterminals whose names carry a
//! reserved `%` marker. User-supplied names may not start with the marker,
//! so synthetic names can never shadow them. Structurally identical
//! combinator calls are *not* deduplicated: each call mints its own
//! synthetic nonterminal, which is fine because synthetic names are never
//! referenced by hand.
//!
//! A grammar is built once during configuration and treated as read-only
//! afterwards; nothing here mutates at generation time.

use crate::matcher::TokenMatcher;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use string_interner::{DefaultStringInterner, DefaultSymbol};
use thiserror::Error;

/// An interned symbol name: either a terminal or a nonterminal, never both.
pub type Symbol = DefaultSymbol;

/// One alternative for a nonterminal: an ordered sequence of symbols.
///
/// Empty sequences exist only as the synthesized "nothing" alternative of
/// [`Grammar::optional`] (and of [`Grammar::star`] with `min == 0`).
pub type Production = Vec<Symbol>;

/// Marker prefix for synthesized nonterminal names.
const SYNTHETIC_MARKER: char = '%';

/// Fatal grammar-configuration and generation errors.
///
/// Speculative match failures are *not* errors (matchers report them as
/// zero-length matches); everything here indicates a broken grammar and
/// aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("token `{0}` is already defined")]
    DuplicateToken(String),

    #[error("`{0}` already names a nonterminal and cannot be defined as a token")]
    NameIsNonterminal(String),

    #[error("`{0}` already names a token and cannot be given production rules")]
    NameIsTerminal(String),

    #[error("`{0}` starts with the reserved synthetic-rule marker `%`")]
    ReservedName(String),

    #[error("`{0}` is not a defined token")]
    UnknownTerminal(String),

    #[error("empty alternative for nonterminal `{0}`")]
    EmptyProduction(String),

    #[error("combinator requires at least one symbol")]
    EmptyCombinator,

    #[error("symbol `{0}` is referenced but never defined")]
    UndefinedSymbol(String),

    #[error("start symbol is not set")]
    StartUnset,

    #[error("start symbol is already set to `{0}`")]
    StartAlreadySet(String),

    #[error("start symbol `{0}` is not a defined nonterminal")]
    StartNotNonterminal(String),

    #[error("nonterminal `{0}` can never derive a finite token sequence")]
    ForcedRecursion(String),

    #[error("no trivia separator resolves the boundary between `{prev}` and `{next}`")]
    UnresolvableBoundary { prev: String, next: String },

    #[error("token `{0}` keeps generating text that re-lexes as a different token")]
    DegenerateMatcher(String),
}

/// A context-free grammar with a lexical layer.
#[derive(Debug, Default)]
pub struct Grammar {
    interner: DefaultStringInterner,
    terminals: IndexMap<Symbol, TokenMatcher>,
    rules: IndexMap<Symbol, Vec<Production>>,
    trivia: FxHashSet<Symbol>,
    start: Option<Symbol>,
    synthetic_count: u32,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a symbol name without defining it.
    ///
    /// Used for forward references inside productions and for marker names
    /// like the lexer's unknown-token symbol.
    pub fn symbol(&mut self, name: &str) -> Symbol {
        self.interner.get_or_intern(name)
    }

    /// Look up an already-interned symbol name.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.interner.get(name)
    }

    /// The name of an interned symbol.
    pub fn name(&self, symbol: Symbol) -> &str {
        self.interner.resolve(symbol).unwrap_or("")
    }

    /// Register a terminal with its matcher. Duplicate registrations,
    /// reserved names, and names already used as nonterminals are
    /// configuration errors.
    pub fn define_token(&mut self, name: &str, matcher: TokenMatcher) -> Result<Symbol, GrammarError> {
        self.check_not_reserved(name)?;
        let symbol = self.symbol(name);
        if self.terminals.contains_key(&symbol) {
            return Err(GrammarError::DuplicateToken(name.to_string()));
        }
        if self.rules.contains_key(&symbol) {
            return Err(GrammarError::NameIsNonterminal(name.to_string()));
        }
        self.terminals.insert(symbol, matcher);
        Ok(symbol)
    }

    /// Flag an already-registered terminal as trivia (whitespace, comments):
    /// lexically present but insignificant, and eligible for automatic
    /// insertion by the generator.
    pub fn mark_trivia(&mut self, name: &str) -> Result<(), GrammarError> {
        let symbol = self
            .lookup(name)
            .filter(|s| self.terminals.contains_key(s))
            .ok_or_else(|| GrammarError::UnknownTerminal(name.to_string()))?;
        self.trivia.insert(symbol);
        Ok(())
    }

    /// Append one alternative to a nonterminal, creating it on first use.
    /// Returns the nonterminal's symbol.
    pub fn add_rule(&mut self, name: &str, symbols: &[Symbol]) -> Result<Symbol, GrammarError> {
        self.check_not_reserved(name)?;
        if symbols.is_empty() {
            return Err(GrammarError::EmptyProduction(name.to_string()));
        }
        let nonterminal = self.symbol(name);
        if self.terminals.contains_key(&nonterminal) {
            return Err(GrammarError::NameIsTerminal(name.to_string()));
        }
        self.push_rule(nonterminal, symbols.to_vec());
        Ok(nonterminal)
    }

    /// Set the start symbol. Must name a defined nonterminal, and may only
    /// be set once.
    pub fn set_start(&mut self, name: &str) -> Result<Symbol, GrammarError> {
        if let Some(current) = self.start {
            return Err(GrammarError::StartAlreadySet(self.name(current).to_string()));
        }
        let symbol = self
            .lookup(name)
            .filter(|s| self.rules.contains_key(s))
            .ok_or_else(|| GrammarError::StartNotNonterminal(name.to_string()))?;
        self.start = Some(symbol);
        Ok(symbol)
    }

    /// The configured start symbol, if set.
    pub fn start(&self) -> Option<Symbol> {
        self.start
    }

    // ============================================================
    // Combinators
    // ============================================================

    /// Group a sub-sequence under a fresh nonterminal with exactly one
    /// alternative, so it can be passed where a single symbol is expected.
    pub fn concat(&mut self, symbols: &[Symbol]) -> Result<Symbol, GrammarError> {
        if symbols.is_empty() {
            return Err(GrammarError::EmptyCombinator);
        }
        let nonterminal = self.fresh("seq");
        self.push_rule(nonterminal, symbols.to_vec());
        Ok(nonterminal)
    }

    /// A fresh nonterminal with one single-symbol alternative per option.
    pub fn alt(&mut self, options: &[Symbol]) -> Result<Symbol, GrammarError> {
        if options.is_empty() {
            return Err(GrammarError::EmptyCombinator);
        }
        let nonterminal = self.fresh("alt");
        for &option in options {
            self.push_rule(nonterminal, vec![option]);
        }
        Ok(nonterminal)
    }

    /// A fresh nonterminal with two alternatives: nothing, or `symbol`.
    pub fn optional(&mut self, symbol: Symbol) -> Symbol {
        let nonterminal = self.fresh("opt");
        self.push_rule(nonterminal, Vec::new());
        self.push_rule(nonterminal, vec![symbol]);
        nonterminal
    }

    /// A fresh nonterminal denoting `min` or more repetitions of `symbol`,
    /// unbounded above.
    ///
    /// Desugars to a self-referential pair of alternatives: the base case of
    /// exactly `min` copies, and `symbol` followed by the rule itself. Both
    /// stay available at every expansion, so derivation may stop at `min`
    /// repetitions or keep going one at a time.
    pub fn star(&mut self, symbol: Symbol, min: usize) -> Symbol {
        let nonterminal = self.fresh("star");
        self.push_rule(nonterminal, vec![symbol; min]);
        self.push_rule(nonterminal, vec![symbol, nonterminal]);
        nonterminal
    }

    // ============================================================
    // Read-only access (used by the lexer and generator)
    // ============================================================

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        self.terminals.contains_key(&symbol)
    }

    pub fn is_nonterminal(&self, symbol: Symbol) -> bool {
        self.rules.contains_key(&symbol)
    }

    pub fn is_trivia(&self, symbol: Symbol) -> bool {
        self.trivia.contains(&symbol)
    }

    /// The matcher for a terminal.
    pub fn matcher(&self, symbol: Symbol) -> Option<&TokenMatcher> {
        self.terminals.get(&symbol)
    }

    /// The alternatives registered for a nonterminal.
    pub fn alternatives(&self, symbol: Symbol) -> Option<&[Production]> {
        self.rules.get(&symbol).map(Vec::as_slice)
    }

    /// All terminals in registration order.
    pub fn terminals(&self) -> impl Iterator<Item = (Symbol, &TokenMatcher)> {
        self.terminals.iter().map(|(&s, m)| (s, m))
    }

    /// All nonterminals with their alternatives, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = (Symbol, &[Production])> {
        self.rules.iter().map(|(&s, alts)| (s, alts.as_slice()))
    }

    /// Check that every symbol referenced in any production resolves to a
    /// defined terminal or nonterminal. Run before the first generation;
    /// forward references make it impossible to check at registration time.
    pub fn validate(&self) -> Result<(), GrammarError> {
        for (_, alternatives) in self.rules.iter() {
            for production in alternatives {
                for &symbol in production {
                    if !self.is_terminal(symbol) && !self.is_nonterminal(symbol) {
                        return Err(GrammarError::UndefinedSymbol(self.name(symbol).to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_not_reserved(&self, name: &str) -> Result<(), GrammarError> {
        if name.starts_with(SYNTHETIC_MARKER) {
            return Err(GrammarError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    fn fresh(&mut self, kind: &str) -> Symbol {
        self.synthetic_count += 1;
        let name = format!("{SYNTHETIC_MARKER}{kind}{}", self.synthetic_count);
        self.interner.get_or_intern(name)
    }

    fn push_rule(&mut self, nonterminal: Symbol, production: Production) {
        self.rules.entry(nonterminal).or_default().push(production);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_token_rejected() {
        let mut g = Grammar::new();
        g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        assert_eq!(
            g.define_token("X", TokenMatcher::fixed("y")),
            Err(GrammarError::DuplicateToken("X".to_string()))
        );
    }

    #[test]
    fn test_terminal_and_nonterminal_are_disjoint() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        assert_eq!(
            g.add_rule("X", &[x]),
            Err(GrammarError::NameIsTerminal("X".to_string()))
        );

        g.add_rule("list", &[x]).unwrap();
        assert_eq!(
            g.define_token("list", TokenMatcher::fixed("l")),
            Err(GrammarError::NameIsNonterminal("list".to_string()))
        );
    }

    #[test]
    fn test_reserved_names_rejected() {
        let mut g = Grammar::new();
        assert_eq!(
            g.define_token("%X", TokenMatcher::fixed("x")),
            Err(GrammarError::ReservedName("%X".to_string()))
        );
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        assert_eq!(
            g.add_rule("%list", &[x]),
            Err(GrammarError::ReservedName("%list".to_string()))
        );
    }

    #[test]
    fn test_empty_user_production_rejected() {
        let mut g = Grammar::new();
        assert_eq!(
            g.add_rule("list", &[]),
            Err(GrammarError::EmptyProduction("list".to_string()))
        );
    }

    #[test]
    fn test_mark_trivia_requires_defined_token() {
        let mut g = Grammar::new();
        assert_eq!(
            g.mark_trivia("WS"),
            Err(GrammarError::UnknownTerminal("WS".to_string()))
        );
        g.define_token("WS", TokenMatcher::whitespace()).unwrap();
        g.mark_trivia("WS").unwrap();
        let ws = g.lookup("WS").unwrap();
        assert!(g.is_trivia(ws));
    }

    #[test]
    fn test_optional_shape() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        let opt = g.optional(x);
        let alts = g.alternatives(opt).unwrap();
        assert_eq!(alts, &[vec![], vec![x]]);
    }

    #[test]
    fn test_alt_and_concat_shape() {
        let mut g = Grammar::new();
        let a = g.define_token("A", TokenMatcher::fixed("a")).unwrap();
        let b = g.define_token("B", TokenMatcher::fixed("b")).unwrap();

        let alt = g.alt(&[a, b]).unwrap();
        assert_eq!(g.alternatives(alt).unwrap(), &[vec![a], vec![b]]);

        let seq = g.concat(&[a, b]).unwrap();
        assert_eq!(g.alternatives(seq).unwrap(), &[vec![a, b]]);

        assert_eq!(g.alt(&[]), Err(GrammarError::EmptyCombinator));
        assert_eq!(g.concat(&[]), Err(GrammarError::EmptyCombinator));
    }

    #[test]
    fn test_star_shape() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();

        let star = g.star(x, 0);
        assert_eq!(g.alternatives(star).unwrap(), &[vec![], vec![x, star]]);

        let plus = g.star(x, 1);
        assert_eq!(g.alternatives(plus).unwrap(), &[vec![x], vec![x, plus]]);

        let two_plus = g.star(x, 2);
        assert_eq!(
            g.alternatives(two_plus).unwrap(),
            &[vec![x, x], vec![x, two_plus]]
        );
    }

    #[test]
    fn test_synthetic_names_are_unique() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        let first = g.optional(x);
        let second = g.optional(x);
        assert_ne!(first, second);
        assert_ne!(g.name(first), g.name(second));
        assert!(g.name(first).starts_with('%'));
    }

    #[test]
    fn test_start_symbol_set_once() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        g.add_rule("list", &[x]).unwrap();

        assert_eq!(
            g.set_start("X"),
            Err(GrammarError::StartNotNonterminal("X".to_string()))
        );
        assert_eq!(
            g.set_start("missing"),
            Err(GrammarError::StartNotNonterminal("missing".to_string()))
        );

        let list = g.set_start("list").unwrap();
        assert_eq!(g.start(), Some(list));
        assert_eq!(
            g.set_start("list"),
            Err(GrammarError::StartAlreadySet("list".to_string()))
        );
    }

    #[test]
    fn test_validate_flags_undefined_symbols() {
        let mut g = Grammar::new();
        let missing = g.symbol("missing");
        g.add_rule("list", &[missing]).unwrap();
        assert_eq!(
            g.validate(),
            Err(GrammarError::UndefinedSymbol("missing".to_string()))
        );
    }
}
