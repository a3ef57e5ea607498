//! # minic-fuzz
//!
//! A grammar-driven random source-code generator for Mini-C, built to
//! stress-test compiler and parser front-ends.
//!
//! The engine is language-agnostic: a context-free [`Grammar`] with
//! EBNF-style combinators desugaring into plain productions, a maximal-munch
//! [`Lexer`] over pluggable per-token matchers, and a budgeted stochastic
//! [`Generator`] whose output is guaranteed to re-lex to exactly the token
//! sequence chosen during derivation. The [`minic`] module wires up the
//! concrete Mini-C token table and production rules.
//!
//! ## Pipeline
//!
//! ```text
//! Grammar (tokens + rules) -> Lexer (precedence) -> Generator (rng, budget) -> text
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use minic_fuzz::{minic, Generator};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let grammar = minic::grammar().expect("Mini-C grammar is well-formed");
//! let lexer = minic::lexer(&grammar).expect("Mini-C lexer is well-formed");
//! let mut generator = Generator::new(&grammar, &lexer, StdRng::seed_from_u64(7))
//!     .expect("Mini-C grammar validates");
//!
//! let program = generator.generate().expect("derivation terminates");
//! // The rendered text is exactly the concatenation of the emitted tokens.
//! let joined: String = program.tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(program.text, joined);
//! ```
//!
//! Generation is a pure function of (grammar, seed): the same seed always
//! reproduces the same program.

pub mod cursor;
pub mod generator;
pub mod grammar;
pub mod lexer;
pub mod matcher;
pub mod minic;

// Re-export commonly used types
pub use cursor::Cursor;
pub use generator::{GeneratedSource, GeneratedToken, GenerationLimits, Generator};
pub use grammar::{Grammar, GrammarError, Production, Symbol};
pub use lexer::{Lexer, Token};
pub use matcher::TokenMatcher;
