//! Mini-C grammar and lexer wiring.
//!
//! Static data entry for the concrete target language: the token table, the
//! trivia set, the production rules, the start symbol, and the keyword
//! precedence table. Everything interesting lives in the engine modules;
//! this is the declarative description of Mini-C.

use crate::grammar::{Grammar, GrammarError};
use crate::lexer::Lexer;
use crate::matcher::TokenMatcher;

/// Terminal name used for automatically inserted separators.
pub const WHITESPACE: &str = "WHITESPACE";

/// Fallback terminal name for input no matcher accepts.
pub const UNKNOWN: &str = "UNKNOWN";

/// Characters that may follow a backslash in string and char literals.
pub const ESCAPABLE: &[char] = &['\\', '\'', '"', 'n', 'r', 't', 'f', 'b'];

/// Build the Mini-C grammar: tokens, trivia, productions and start symbol.
pub fn grammar() -> Result<Grammar, GrammarError> {
    let mut g = Grammar::new();

    // ============================================================
    // Tokens
    // ============================================================

    let identifier = g.define_token("IDENTIFIER", TokenMatcher::identifier(30))?;

    let assign = g.define_token("ASSIGN", TokenMatcher::fixed("="))?;

    // Delimiters
    let lbra = g.define_token("LBRA", TokenMatcher::fixed("{"))?;
    let rbra = g.define_token("RBRA", TokenMatcher::fixed("}"))?;
    let lpar = g.define_token("LPAR", TokenMatcher::fixed("("))?;
    let rpar = g.define_token("RPAR", TokenMatcher::fixed(")"))?;
    let lsbr = g.define_token("LSBR", TokenMatcher::fixed("["))?;
    let rsbr = g.define_token("RSBR", TokenMatcher::fixed("]"))?;
    let sc = g.define_token("SC", TokenMatcher::fixed(";"))?;
    let comma = g.define_token("COMMA", TokenMatcher::fixed(","))?;

    // Types
    let int_kw = g.define_token("INT", TokenMatcher::fixed("int"))?;
    let void_kw = g.define_token("VOID", TokenMatcher::fixed("void"))?;
    let char_kw = g.define_token("CHAR", TokenMatcher::fixed("char"))?;

    // Keywords
    let if_kw = g.define_token("IF", TokenMatcher::fixed("if"))?;
    let else_kw = g.define_token("ELSE", TokenMatcher::fixed("else"))?;
    let while_kw = g.define_token("WHILE", TokenMatcher::fixed("while"))?;
    let return_kw = g.define_token("RETURN", TokenMatcher::fixed("return"))?;
    let struct_kw = g.define_token("STRUCT", TokenMatcher::fixed("struct"))?;
    let sizeof_kw = g.define_token("SIZEOF", TokenMatcher::fixed("sizeof"))?;

    let include_kw = g.define_token("INCLUDE", TokenMatcher::fixed("#include"))?;

    // Literals
    let string_literal =
        g.define_token("STRING_LITERAL", TokenMatcher::string_literal('"', ESCAPABLE, 0, 50))?;
    let char_literal =
        g.define_token("CHAR_LITERAL", TokenMatcher::string_literal('\'', ESCAPABLE, 1, 1))?;
    let int_literal = g.define_token("INT_LITERAL", TokenMatcher::integer())?;

    // Logical operators
    let and = g.define_token("AND", TokenMatcher::fixed("&&"))?;
    let or = g.define_token("OR", TokenMatcher::fixed("||"))?;

    // Comparisons
    let eq = g.define_token("EQ", TokenMatcher::fixed("=="))?;
    let ne = g.define_token("NE", TokenMatcher::fixed("!="))?;
    let lt = g.define_token("LT", TokenMatcher::fixed("<"))?;
    let gt = g.define_token("GT", TokenMatcher::fixed(">"))?;
    let le = g.define_token("LE", TokenMatcher::fixed("<="))?;
    let ge = g.define_token("GE", TokenMatcher::fixed(">="))?;

    // Arithmetic operators; ASTERISK doubles as the pointer sigil.
    let plus = g.define_token("PLUS", TokenMatcher::fixed("+"))?;
    let minus = g.define_token("MINUS", TokenMatcher::fixed("-"))?;
    let asterisk = g.define_token("ASTERISK", TokenMatcher::fixed("*"))?;
    let div = g.define_token("DIV", TokenMatcher::fixed("/"))?;
    let rem = g.define_token("REM", TokenMatcher::fixed("%"))?;

    // Struct member access
    let dot = g.define_token("DOT", TokenMatcher::fixed("."))?;

    // Trivia
    g.define_token(WHITESPACE, TokenMatcher::whitespace())?;
    g.mark_trivia(WHITESPACE)?;
    g.define_token("SL_COMMENT", TokenMatcher::line_comment("//", &['\n', '\r'], 50))?;
    g.mark_trivia("SL_COMMENT")?;
    g.define_token("ML_COMMENT", TokenMatcher::block_comment("/*", "*/", 50))?;
    g.mark_trivia("ML_COMMENT")?;

    // ============================================================
    // Productions
    // ============================================================

    let include = g.symbol("include");
    let structdecl = g.symbol("structdecl");
    let vardecl = g.symbol("vardecl");
    let fundecl = g.symbol("fundecl");
    let structtype = g.symbol("structtype");
    let ty = g.symbol("type");
    let params = g.symbol("params");
    let stmt = g.symbol("stmt");
    let block = g.symbol("block");
    let exp = g.symbol("exp");
    let funcall = g.symbol("funcall");
    let arrayaccess = g.symbol("arrayaccess");
    let fieldaccess = g.symbol("fieldaccess");
    let valueat = g.symbol("valueat");
    let sizeof = g.symbol("sizeof");
    let typecast = g.symbol("typecast");

    // program ::= (include)* (structdecl)* (vardecl)* (fundecl)*
    let includes = g.star(include, 0);
    let structdecls = g.star(structdecl, 0);
    let vardecls = g.star(vardecl, 0);
    let fundecls = g.star(fundecl, 0);
    g.add_rule("program", &[includes, structdecls, vardecls, fundecls])?;

    // include ::= "#include" STRING_LITERAL
    g.add_rule("include", &[include_kw, string_literal])?;

    // structdecl ::= structtype "{" (vardecl)+ "}" ";"
    let member_decls = g.star(vardecl, 1);
    g.add_rule("structdecl", &[structtype, lbra, member_decls, rbra, sc])?;

    // vardecl ::= type IDENT ";"
    //           | type IDENT "[" INT_LITERAL "]" ";"
    g.add_rule("vardecl", &[ty, identifier, sc])?;
    g.add_rule("vardecl", &[ty, identifier, lsbr, int_literal, rsbr, sc])?;

    // fundecl ::= type IDENT "(" params ")" block
    g.add_rule("fundecl", &[ty, identifier, lpar, params, rpar, block])?;

    // type ::= ("int" | "char" | "void" | structtype) ["*"]
    let base_type = g.alt(&[int_kw, char_kw, void_kw, structtype])?;
    let pointer = g.optional(asterisk);
    g.add_rule("type", &[base_type, pointer])?;

    // structtype ::= "struct" IDENT
    g.add_rule("structtype", &[struct_kw, identifier])?;

    // params ::= [ type IDENT ("," type IDENT)* ]
    let param_tail = g.concat(&[comma, ty, identifier])?;
    let param_tails = g.star(param_tail, 0);
    let param_list = g.concat(&[ty, identifier, param_tails])?;
    let params_opt = g.optional(param_list);
    g.add_rule("params", &[params_opt])?;

    // stmt ::= block
    //        | "while" "(" exp ")" stmt
    //        | "if" "(" exp ")" stmt ["else" stmt]
    //        | "return" [exp] ";"
    //        | exp "=" exp ";"
    //        | exp ";"
    g.add_rule("stmt", &[block])?;
    g.add_rule("stmt", &[while_kw, lpar, exp, rpar, stmt])?;
    let else_arm = g.concat(&[else_kw, stmt])?;
    let else_opt = g.optional(else_arm);
    g.add_rule("stmt", &[if_kw, lpar, exp, rpar, stmt, else_opt])?;
    let return_value = g.optional(exp);
    g.add_rule("stmt", &[return_kw, return_value, sc])?;
    g.add_rule("stmt", &[exp, assign, exp, sc])?;
    g.add_rule("stmt", &[exp, sc])?;

    // block ::= "{" (vardecl)* (stmt)* "}"
    let local_decls = g.star(vardecl, 0);
    let stmts = g.star(stmt, 0);
    g.add_rule("block", &[lbra, local_decls, stmts, rbra])?;

    // exp ::= "(" exp ")"
    //       | ["-"] (IDENT | INT_LITERAL)
    //       | CHAR_LITERAL
    //       | STRING_LITERAL
    //       | exp <binop> exp
    //       | arrayaccess | fieldaccess | valueat | IDENT | funcall
    //       | sizeof | typecast
    g.add_rule("exp", &[lpar, exp, rpar])?;
    let sign = g.optional(minus);
    let atom = g.alt(&[identifier, int_literal])?;
    g.add_rule("exp", &[sign, atom])?;
    g.add_rule("exp", &[char_literal])?;
    g.add_rule("exp", &[string_literal])?;
    let binop = g.alt(&[gt, lt, ge, le, ne, eq, plus, minus, div, asterisk, rem, or, and])?;
    g.add_rule("exp", &[exp, binop, exp])?;
    let postfix =
        g.alt(&[arrayaccess, fieldaccess, valueat, identifier, funcall, sizeof, typecast])?;
    g.add_rule("exp", &[postfix])?;

    // funcall ::= IDENT "(" [ exp ("," exp)* ] ")"
    let arg_tail = g.concat(&[comma, exp])?;
    let arg_tails = g.star(arg_tail, 0);
    let arg_list = g.concat(&[exp, arg_tails])?;
    let args_opt = g.optional(arg_list);
    g.add_rule("funcall", &[identifier, lpar, args_opt, rpar])?;

    // arrayaccess ::= exp "[" exp "]"
    g.add_rule("arrayaccess", &[exp, lsbr, exp, rsbr])?;

    // fieldaccess ::= exp "." IDENT
    g.add_rule("fieldaccess", &[exp, dot, identifier])?;

    // valueat ::= "*" exp
    g.add_rule("valueat", &[asterisk, exp])?;

    // sizeof ::= "sizeof" "(" type ")"
    g.add_rule("sizeof", &[sizeof_kw, lpar, ty, rpar])?;

    // typecast ::= "(" type ")" exp
    g.add_rule("typecast", &[lpar, ty, rpar, exp])?;

    g.set_start("program")?;

    // Interned so the lexer can emit it at dead positions.
    g.symbol(UNKNOWN);

    Ok(g)
}

/// Build the Mini-C lexer: unknown-token fallback plus keyword precedence,
/// so keyword spellings beat IDENTIFIER on length ties.
pub fn lexer(grammar: &Grammar) -> Result<Lexer<'_>, GrammarError> {
    let mut lexer = Lexer::new(grammar, UNKNOWN)?;
    for keyword in [
        "INT", "VOID", "CHAR", "IF", "ELSE", "WHILE", "RETURN", "STRUCT", "SIZEOF",
    ] {
        lexer.define_precedence(keyword, 1)?;
    }
    Ok(lexer)
}
