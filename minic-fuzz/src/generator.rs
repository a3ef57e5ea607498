//! Randomized top-down derivation.
//!
//! The generator walks the grammar from a start symbol, expanding
//! nonterminals by uniform random choice among their alternatives and
//! rendering terminals through their matchers. Two invariants distinguish it
//! from naive "pick random strings and concatenate":
//!
//! - **Boundary safety**: every emitted terminal must re-lex as itself, both
//!   standalone and against the previously emitted text. A candidate that
//!   re-lexes as a different kind (an identifier that happens to spell a
//!   keyword) is regenerated; an unsafe junction (two identifiers that would
//!   fuse, `<` followed by `=`) gets a randomly generated trivia terminal
//!   inserted between them.
//! - **Termination**: derivation carries a depth and output-size budget.
//!   Once the budget is exhausted, expansion is restricted to the
//!   minimal-cost alternatives of each nonterminal, computed up front by
//!   fixpoint. A nonterminal with no finite-cost alternative at all cannot
//!   terminate under any policy and is rejected as a configuration error
//!   before generation starts.
//!
//! Grammar and lexer stay read-only throughout; the only mutable state is
//! the generator's own RNG and per-call bookkeeping, so independent
//! generators can run concurrently over the same tables.

use crate::grammar::{Grammar, GrammarError, Production, Symbol};
use crate::lexer::Lexer;
use crate::matcher::TokenMatcher;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// How many times a terminal may be regenerated before its matcher is
/// declared degenerate.
const MAX_REGEN_ATTEMPTS: usize = 64;

/// How many trivia draws may be spent resolving one emission boundary.
/// Generous because some draws are themselves unsafe against the previous
/// token (a comment separator directly after `/` re-lexes as one comment)
/// and simply get redrawn.
const MAX_SEPARATOR_ATTEMPTS: usize = 64;

/// Recursion and output-size budget for one derivation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationLimits {
    /// Maximum nesting depth before expansion is forced minimal.
    pub max_depth: usize,
    /// Output size (bytes) past which expansion is forced minimal. The
    /// in-flight minimal derivations still run to completion, so the final
    /// text may overshoot this bound.
    pub max_output_bytes: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_output_bytes: 16 * 1024,
        }
    }
}

/// One terminal emitted during derivation, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub symbol: Symbol,
    pub text: String,
    pub is_trivia: bool,
}

/// The result of one derivation: the rendered text and the full record of
/// emitted terminals (inserted trivia included). The text is exactly the
/// concatenation of the token texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub text: String,
    pub tokens: Vec<GeneratedToken>,
}

impl GeneratedSource {
    fn new() -> Self {
        Self {
            text: String::new(),
            tokens: Vec::new(),
        }
    }

    /// The emitted tokens with trivia discarded.
    pub fn significant(&self) -> impl Iterator<Item = &GeneratedToken> {
        self.tokens.iter().filter(|t| !t.is_trivia)
    }
}

/// A stochastic source generator over a shared [`Grammar`] and [`Lexer`].
///
/// Construction validates the grammar (undefined symbol references, forced
/// recursion) and precomputes minimal derivation costs; each generator owns
/// its random-number stream, so generation is a pure function of (grammar,
/// seed).
#[derive(Debug)]
pub struct Generator<'g, R> {
    grammar: &'g Grammar,
    lexer: &'g Lexer<'g>,
    rng: R,
    limits: GenerationLimits,
    min_cost: FxHashMap<Symbol, usize>,
    trivia: Vec<Symbol>,
}

impl<'g, R: Rng> Generator<'g, R> {
    pub fn new(grammar: &'g Grammar, lexer: &'g Lexer<'g>, rng: R) -> Result<Self, GrammarError> {
        grammar.validate()?;
        let min_cost = derivation_costs(grammar)?;
        let trivia = grammar
            .terminals()
            .map(|(symbol, _)| symbol)
            .filter(|&s| grammar.is_trivia(s))
            .collect();
        Ok(Self {
            grammar,
            lexer,
            rng,
            limits: GenerationLimits::default(),
            min_cost,
            trivia,
        })
    }

    /// Replace the default derivation budget.
    pub fn with_limits(mut self, limits: GenerationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Generate from the grammar's configured start symbol.
    pub fn generate(&mut self) -> Result<GeneratedSource, GrammarError> {
        let start = self.grammar.start().ok_or(GrammarError::StartUnset)?;
        self.run(start)
    }

    /// Generate from a named nonterminal instead of the configured start.
    pub fn generate_from(&mut self, name: &str) -> Result<GeneratedSource, GrammarError> {
        let symbol = self
            .grammar
            .lookup(name)
            .filter(|&s| self.grammar.is_nonterminal(s))
            .ok_or_else(|| GrammarError::StartNotNonterminal(name.to_string()))?;
        self.run(symbol)
    }

    fn run(&mut self, start: Symbol) -> Result<GeneratedSource, GrammarError> {
        let mut out = GeneratedSource::new();
        self.derive(start, 0, &mut out)?;
        debug!(
            start = self.grammar.name(start),
            bytes = out.text.len(),
            tokens = out.tokens.len(),
            "derivation finished"
        );
        Ok(out)
    }

    fn derive(&mut self, symbol: Symbol, depth: usize, out: &mut GeneratedSource) -> Result<(), GrammarError> {
        let grammar = self.grammar;
        if let Some(matcher) = grammar.matcher(symbol) {
            let text = self.render_terminal(symbol, matcher)?;
            return self.emit(symbol, text, out);
        }

        let alternatives = grammar
            .alternatives(symbol)
            .ok_or_else(|| GrammarError::UndefinedSymbol(grammar.name(symbol).to_string()))?;

        let within_budget =
            depth < self.limits.max_depth && out.text.len() < self.limits.max_output_bytes;
        let production = if within_budget {
            alternatives.choose(&mut self.rng)
        } else {
            self.minimal_alternative(alternatives)
        }
        .ok_or_else(|| GrammarError::UndefinedSymbol(grammar.name(symbol).to_string()))?;

        for &next in production.iter() {
            self.derive(next, depth + 1, out)?;
        }
        Ok(())
    }

    /// The cheapest alternatives by minimal derivation cost, sampled
    /// uniformly. For a star rule this is the base case; for an optional
    /// rule the empty alternative; in general anything that stops growing
    /// the derivation fastest.
    fn minimal_alternative(&mut self, alternatives: &'g [Production]) -> Option<&'g Production> {
        let cheapest = alternatives
            .iter()
            .filter_map(|p| self.production_cost(p))
            .min()?;
        let minimal: Vec<&'g Production> = alternatives
            .iter()
            .filter(|p| self.production_cost(p) == Some(cheapest))
            .collect();
        minimal.choose(&mut self.rng).copied()
    }

    fn production_cost(&self, production: &Production) -> Option<usize> {
        production
            .iter()
            .try_fold(1usize, |acc, s| {
                Some(acc.saturating_add(*self.min_cost.get(s)?))
            })
    }

    /// Render a terminal, regenerating until the text re-lexes standalone as
    /// exactly one token of its own kind. An identifier matcher can spell a
    /// keyword, and no trivia insertion would ever fix that; regeneration
    /// is the only terminating policy.
    fn render_terminal(
        &mut self,
        symbol: Symbol,
        matcher: &TokenMatcher,
    ) -> Result<String, GrammarError> {
        for _ in 0..MAX_REGEN_ATTEMPTS {
            let text = matcher.generate(&mut self.rng);
            if self.lexes_as(symbol, &text) {
                return Ok(text);
            }
            trace!(
                token = self.grammar.name(symbol),
                %text,
                "candidate re-lexes as a different token; regenerating"
            );
        }
        Err(GrammarError::DegenerateMatcher(
            self.grammar.name(symbol).to_string(),
        ))
    }

    fn lexes_as(&self, symbol: Symbol, text: &str) -> bool {
        let tokens = self.lexer.tokenize(text);
        tokens.len() == 1 && tokens[0].symbol == symbol && tokens[0].text == text
    }

    /// Append a rendered terminal, inserting trivia separators until the
    /// junction with the previously emitted text re-lexes cleanly.
    fn emit(&mut self, symbol: Symbol, text: String, out: &mut GeneratedSource) -> Result<(), GrammarError> {
        let mut attempts = 0;
        loop {
            let safe = match out.tokens.last() {
                None => true,
                Some(prev) => self.boundary_safe(prev.symbol, &prev.text, symbol, &text),
            };
            if safe {
                break;
            }
            if attempts == MAX_SEPARATOR_ATTEMPTS {
                let prev = out.tokens.last().map(|t| self.grammar.name(t.symbol)).unwrap_or("");
                return Err(GrammarError::UnresolvableBoundary {
                    prev: prev.to_string(),
                    next: self.grammar.name(symbol).to_string(),
                });
            }
            attempts += 1;
            self.insert_separator(symbol, &text, out)?;
        }

        out.text.push_str(&text);
        out.tokens.push(GeneratedToken {
            symbol,
            text,
            is_trivia: self.grammar.is_trivia(symbol),
        });
        Ok(())
    }

    /// Draw one trivia terminal and append it if its own junction with the
    /// previous text is safe; otherwise leave the output untouched so the
    /// caller re-checks and retries.
    fn insert_separator(
        &mut self,
        next_symbol: Symbol,
        next_text: &str,
        out: &mut GeneratedSource,
    ) -> Result<(), GrammarError> {
        let prev_name = out.tokens.last().map(|t| self.grammar.name(t.symbol)).unwrap_or("");
        let Some(&trivia) = self.trivia.choose(&mut self.rng) else {
            // No trivia registered at all: the boundary can never be fixed.
            return Err(GrammarError::UnresolvableBoundary {
                prev: prev_name.to_string(),
                next: self.grammar.name(next_symbol).to_string(),
            });
        };
        let grammar = self.grammar;
        let matcher = grammar
            .matcher(trivia)
            .ok_or_else(|| GrammarError::UnknownTerminal(grammar.name(trivia).to_string()))?;
        let trivia_text = self.render_terminal(trivia, matcher)?;

        let prev_safe = match out.tokens.last() {
            None => true,
            Some(prev) => self.boundary_safe(prev.symbol, &prev.text, trivia, &trivia_text),
        };
        if prev_safe {
            trace!(
                separator = grammar.name(trivia),
                next = grammar.name(next_symbol),
                next_text,
                "inserting trivia separator"
            );
            out.text.push_str(&trivia_text);
            out.tokens.push(GeneratedToken {
                symbol: trivia,
                text: trivia_text,
                is_trivia: true,
            });
        }
        Ok(())
    }

    /// Whether re-tokenizing the junction yields exactly the two intended
    /// tokens, unmerged and unsplit. The window is the previous emitted
    /// token plus the candidate, i.e. the emission boundary.
    fn boundary_safe(&self, prev: Symbol, prev_text: &str, next: Symbol, next_text: &str) -> bool {
        let joined = format!("{prev_text}{next_text}");
        let tokens = self.lexer.tokenize(&joined);
        tokens.len() == 2
            && tokens[0].symbol == prev
            && tokens[0].text == prev_text
            && tokens[1].symbol == next
            && tokens[1].text == next_text
    }
}

/// Minimal derivation cost per symbol: terminals cost 1, a nonterminal costs
/// 1 plus the cheapest sum over one of its alternatives. Computed by
/// fixpoint; a nonterminal left without a finite cost can only recurse
/// forever and is a configuration error.
fn derivation_costs(grammar: &Grammar) -> Result<FxHashMap<Symbol, usize>, GrammarError> {
    let mut costs: FxHashMap<Symbol, usize> =
        grammar.terminals().map(|(symbol, _)| (symbol, 1)).collect();

    loop {
        let mut changed = false;
        for (nonterminal, alternatives) in grammar.rules() {
            let cheapest = alternatives
                .iter()
                .filter_map(|production| {
                    production
                        .iter()
                        .try_fold(1usize, |acc, s| Some(acc.saturating_add(*costs.get(s)?)))
                })
                .min();
            if let Some(cost) = cheapest {
                let known = costs.get(&nonterminal).copied();
                if known.map_or(true, |k| cost < k) {
                    costs.insert(nonterminal, cost);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    for (nonterminal, _) in grammar.rules() {
        if !costs.contains_key(&nonterminal) {
            return Err(GrammarError::ForcedRecursion(
                grammar.name(nonterminal).to_string(),
            ));
        }
    }
    Ok(costs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TokenMatcher;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two identifiers in a row: the junction must never fuse.
    fn adjacent_idents_grammar() -> Grammar {
        let mut g = Grammar::new();
        let ident = g.define_token("IDENTIFIER", TokenMatcher::identifier(8)).unwrap();
        g.define_token("WHITESPACE", TokenMatcher::whitespace()).unwrap();
        g.mark_trivia("WHITESPACE").unwrap();
        g.add_rule("pair", &[ident, ident]).unwrap();
        g.set_start("pair").unwrap();
        g.symbol("UNKNOWN");
        g
    }

    #[test]
    fn test_adjacent_identifiers_get_separated() {
        let g = adjacent_idents_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        for seed in 0..200 {
            let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(seed)).unwrap();
            let out = generator.generate().unwrap();
            let significant: Vec<_> = lexer
                .tokenize(&out.text)
                .into_iter()
                .filter(|t| !t.is_trivia)
                .collect();
            assert_eq!(significant.len(), 2, "output {:?} fused", out.text);
        }
    }

    #[test]
    fn test_identifier_never_emits_keyword_shape() {
        let mut g = Grammar::new();
        // A one-char identifier pool collides with the shadowing keywords
        // often; the generator must always dodge the keyword kinds.
        let ident = g.define_token("IDENTIFIER", TokenMatcher::identifier(1)).unwrap();
        g.define_token("KW_A", TokenMatcher::fixed("a")).unwrap();
        g.define_token("KW_B", TokenMatcher::fixed("b")).unwrap();
        g.define_token("WHITESPACE", TokenMatcher::whitespace()).unwrap();
        g.mark_trivia("WHITESPACE").unwrap();
        g.add_rule("one", &[ident]).unwrap();
        g.set_start("one").unwrap();
        g.symbol("UNKNOWN");
        let mut lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        lexer.define_precedence("KW_A", 1).unwrap();
        lexer.define_precedence("KW_B", 1).unwrap();

        for seed in 0..100 {
            let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(seed)).unwrap();
            let out = generator.generate().unwrap();
            let token = out.significant().next().unwrap();
            assert_ne!(token.text, "a");
            assert_ne!(token.text, "b");
        }
    }

    #[test]
    fn test_determinism() {
        let g = adjacent_idents_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let mut first = Generator::new(&g, &lexer, StdRng::seed_from_u64(42)).unwrap();
        let mut second = Generator::new(&g, &lexer, StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first.generate().unwrap(), second.generate().unwrap());
    }

    #[test]
    fn test_forced_recursion_rejected() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        let a = g.symbol("a");
        let b = g.symbol("b");
        // a -> a b; b -> a x: no alternative anywhere reaches a terminal.
        g.add_rule("a", &[a, b]).unwrap();
        g.add_rule("b", &[a, x]).unwrap();
        g.set_start("a").unwrap();
        g.symbol("UNKNOWN");
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let result = Generator::new(&g, &lexer, StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(GrammarError::ForcedRecursion(_))));
    }

    #[test]
    fn test_boundary_without_trivia_is_a_config_error() {
        let mut g = Grammar::new();
        let int = g.define_token("INT_LITERAL", TokenMatcher::integer()).unwrap();
        g.add_rule("pair", &[int, int]).unwrap();
        g.set_start("pair").unwrap();
        g.symbol("UNKNOWN");
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(0)).unwrap();
        assert!(matches!(
            generator.generate(),
            Err(GrammarError::UnresolvableBoundary { .. })
        ));
    }

    #[test]
    fn test_budget_forces_minimal_alternatives() {
        let mut g = Grammar::new();
        let x = g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        g.define_token("WHITESPACE", TokenMatcher::whitespace()).unwrap();
        g.mark_trivia("WHITESPACE").unwrap();
        let star = g.star(x, 0);
        g.add_rule("list", &[star]).unwrap();
        g.set_start("list").unwrap();
        g.symbol("UNKNOWN");
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let limits = GenerationLimits {
            max_depth: 8,
            max_output_bytes: 16,
        };
        for seed in 0..50 {
            let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(seed))
                .unwrap()
                .with_limits(limits);
            let out = generator.generate().unwrap();
            // The star can overshoot the byte budget only by the in-flight
            // minimal expansions, never unboundedly.
            assert!(out.text.len() <= 64, "runaway output: {}", out.text.len());
        }
    }

    #[test]
    fn test_generate_without_start_fails() {
        let mut g = Grammar::new();
        g.define_token("X", TokenMatcher::fixed("x")).unwrap();
        g.symbol("UNKNOWN");
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(generator.generate(), Err(GrammarError::StartUnset));
        assert_eq!(
            generator.generate_from("X"),
            Err(GrammarError::StartNotNonterminal("X".to_string()))
        );
    }

    #[test]
    fn test_text_is_token_concatenation() {
        let g = adjacent_idents_grammar();
        let lexer = Lexer::new(&g, "UNKNOWN").unwrap();
        let mut generator = Generator::new(&g, &lexer, StdRng::seed_from_u64(7)).unwrap();
        let out = generator.generate().unwrap();
        let concatenated: String = out.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(out.text, concatenated);
    }
}
