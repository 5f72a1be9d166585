//! Rule DSL parser
//!
//! Parses action-rule strings into [`Expr`] syntax trees.
//!
//! ## Supported Syntax
//!
//! ### Assignments
//! ```text
//! buffer2 = buffer1
//! buffer1 = C, buffer2 = C        % simultaneous effects, one invocation
//! ```
//!
//! ### Expressions
//! ```text
//! buffer2 = buffer1 * B + 0.5 * C
//! buffer3 = ~buffer1
//! outAB   = inA * inB
//! motor   = translate(vision, populate=True)
//! ```
//!
//! Identifiers are classified by their first character: uppercase →
//! vocabulary symbol, otherwise module reference. `*` binds tighter than
//! `+`; prefix `~` inverts; parentheses group.
//!
//! The parser performs no name resolution. Malformed input — mismatched
//! parentheses, empty factors, unknown operators — fails with
//! [`ActionError::Syntax`] carrying the offending substring and its byte
//! position.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize, value},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use super::{ActionRule, Expr};
use crate::{ActionError, Result};

// =============================================================================
// TOKEN PARSERS
// =============================================================================

/// Parse optional whitespace
fn ws0(input: &str) -> IResult<&str, ()> {
    value((), multispace0)(input)
}

/// Parse an identifier (letter or underscore, then alphanumerics)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse a boolean flag value (Python-style capitalization accepted)
fn boolean(input: &str) -> IResult<&str, bool> {
    alt((
        value(true, tag("True")),
        value(true, tag("true")),
        value(false, tag("False")),
        value(false, tag("false")),
    ))(input)
}

/// Classify an identifier by case convention: uppercase first character is
/// a vocabulary symbol, anything else a module reference.
fn classify(name: &str) -> Expr {
    if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        Expr::Symbol(name.to_string())
    } else {
        Expr::Module(name.to_string())
    }
}

// =============================================================================
// EXPRESSION PARSERS
// =============================================================================

/// Parse a translate call: `translate(expr [, populate=<bool>])`
fn translate_call(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("translate")(input)?;
    let (input, _) = ws0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, inner) = expression(input)?;
    let (input, populate) = opt(preceded(
        tuple((ws0, char(','), ws0, tag("populate"), ws0, char('='), ws0)),
        boolean,
    ))(input)?;
    let (input, _) = ws0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        Expr::Translate {
            expr: Box::new(inner),
            populate: populate.unwrap_or(false),
        },
    ))
}

/// Parse a factor: inversion, parenthesized expression, translate call,
/// identifier, or numeric literal
fn factor(input: &str) -> IResult<&str, Expr> {
    preceded(
        ws0,
        alt((
            map(preceded(pair(char('~'), ws0), factor), |inner| {
                Expr::Invert(Box::new(inner))
            }),
            delimited(char('('), expression, pair(ws0, char(')'))),
            translate_call,
            // Identifiers before numbers: nom's float parser would claim
            // the "inf"/"nan" prefixes of ordinary names.
            map(identifier, classify),
            map(double, Expr::Scalar),
        )),
    )(input)
}

/// Parse a product chain: `factor ('*' factor)*`, left-associated binds
fn chain(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(preceded(pair(ws0, char('*')), factor))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, f| Expr::Bind(Box::new(acc), Box::new(f)));
    Ok((input, expr))
}

/// Parse a sum: `chain ('+' chain)*`, left-associated superpositions
fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, first) = chain(input)?;
    let (input, rest) = many0(preceded(pair(ws0, char('+')), chain))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, c| Expr::Sum(Box::new(acc), Box::new(c)));
    Ok((input, expr))
}

// =============================================================================
// RULE PARSER
// =============================================================================

/// Parse one assignment: `target = expression`
fn assignment(input: &str) -> IResult<&str, ActionRule> {
    let (input, _) = ws0(input)?;
    let (input, target) = identifier(input)?;
    let (input, _) = tuple((ws0, char('=')))(input)?;
    let (input, effect) = expression(input)?;
    Ok((
        input,
        ActionRule {
            target: target.to_string(),
            effect,
        },
    ))
}

/// Parse a comma-separated list of assignments
fn assignments(input: &str) -> IResult<&str, Vec<ActionRule>> {
    separated_list1(pair(ws0, char(',')), assignment)(input)
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Parse a rule string into one [`ActionRule`] per assignment.
pub fn parse_rules(source: &str) -> Result<Vec<ActionRule>> {
    match assignments(source) {
        Ok((remaining, rules)) => {
            if remaining.trim().is_empty() {
                Ok(rules)
            } else {
                Err(syntax_error(source, remaining.trim_start()))
            }
        }
        Err(err) => Err(from_nom(source, err)),
    }
}

/// Parse a bare expression (no assignment), as used by
/// [`crate::vocabulary::Vocabulary::parse`].
pub fn parse_expression(source: &str) -> Result<Expr> {
    match expression(source) {
        Ok((remaining, expr)) => {
            if remaining.trim().is_empty() {
                Ok(expr)
            } else {
                Err(syntax_error(source, remaining.trim_start()))
            }
        }
        Err(err) => Err(from_nom(source, err)),
    }
}

fn from_nom(source: &str, err: nom::Err<nom::error::Error<&str>>) -> ActionError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => syntax_error(source, e.input),
        nom::Err::Incomplete(_) => syntax_error(source, ""),
    }
}

fn syntax_error(source: &str, remaining: &str) -> ActionError {
    ActionError::Syntax {
        fragment: remaining.chars().take(24).collect(),
        position: source.len() - remaining.len(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.into())
    }

    fn module(name: &str) -> Expr {
        Expr::Module(name.into())
    }

    #[test]
    fn test_parse_direct_route() {
        let rules = parse_rules("buffer2=buffer1").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, "buffer2");
        assert_eq!(rules[0].effect, module("buffer1"));
    }

    #[test]
    fn test_parse_classification() {
        let rules = parse_rules("b = a * X").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Bind(Box::new(module("a")), Box::new(symbol("X")))
        );
    }

    #[test]
    fn test_parse_invert() {
        let rules = parse_rules("buffer3=~buffer1").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Invert(Box::new(module("buffer1")))
        );
    }

    #[test]
    fn test_parse_precedence() {
        // A + B*C parses as A + (B*C)
        let rules = parse_rules("b = A + B*C").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Sum(
                Box::new(symbol("A")),
                Box::new(Expr::Bind(Box::new(symbol("B")), Box::new(symbol("C")))),
            )
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let rules = parse_rules("b = (A + B) * C").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Bind(
                Box::new(Expr::Sum(Box::new(symbol("A")), Box::new(symbol("B")))),
                Box::new(symbol("C")),
            )
        );
    }

    #[test]
    fn test_parse_scalar_weight() {
        let rules = parse_rules("b = 0.5 * A").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Bind(Box::new(Expr::Scalar(0.5)), Box::new(symbol("A")))
        );
    }

    #[test]
    fn test_parse_simultaneous_assignments() {
        let rules = parse_rules("buffer1=C, buffer2=C").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].target, "buffer1");
        assert_eq!(rules[1].target, "buffer2");
        assert_eq!(rules[0].effect, symbol("C"));
    }

    #[test]
    fn test_parse_translate_defaults_to_no_populate() {
        let rules = parse_rules("buffer2=translate(buffer1)").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Translate {
                expr: Box::new(module("buffer1")),
                populate: false,
            }
        );
    }

    #[test]
    fn test_parse_translate_populate() {
        let rules = parse_rules("buffer2=translate(buffer1, populate=True)").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Translate {
                expr: Box::new(module("buffer1")),
                populate: true,
            }
        );

        let rules = parse_rules("buffer2=translate(buffer1, populate=false)").unwrap();
        assert!(matches!(
            rules[0].effect,
            Expr::Translate { populate: false, .. }
        ));
    }

    #[test]
    fn test_parse_module_named_like_translate() {
        // Without a following '(', "translate" is an ordinary identifier.
        let rules = parse_rules("b = translate").unwrap();
        assert_eq!(rules[0].effect, module("translate"));
    }

    #[test]
    fn test_parse_two_module_binding() {
        let rules = parse_rules("outAB = inA * inB").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Bind(Box::new(module("inA")), Box::new(module("inB")))
        );
    }

    #[test]
    fn test_parse_inverted_operands() {
        let rules = parse_rules("outAinvBinv = ~inA * ~inB").unwrap();
        assert_eq!(
            rules[0].effect,
            Expr::Bind(
                Box::new(Expr::Invert(Box::new(module("inA")))),
                Box::new(Expr::Invert(Box::new(module("inB")))),
            )
        );
    }

    #[test]
    fn test_parse_module_with_inf_prefix() {
        // "inferior" must not be claimed by the float parser.
        let rules = parse_rules("b = inferior").unwrap();
        assert_eq!(rules[0].effect, module("inferior"));
    }

    // =========================================================================
    // Syntax errors
    // =========================================================================

    #[test]
    fn test_error_carries_fragment_and_position() {
        let err = parse_rules("b = a & c").unwrap_err();
        match err {
            ActionError::Syntax { fragment, position } => {
                assert!(fragment.starts_with('&'), "fragment: {}", fragment);
                assert_eq!(position, 6);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_on_empty_factor() {
        let err = parse_rules("b = a *").unwrap_err();
        assert!(matches!(err, ActionError::Syntax { .. }));
    }

    #[test]
    fn test_error_on_mismatched_parens() {
        assert!(parse_rules("b = (a").is_err());
        assert!(parse_rules("b = a)").is_err());
    }

    #[test]
    fn test_error_on_missing_rhs() {
        assert!(parse_rules("b =").is_err());
        assert!(parse_rules("= a").is_err());
    }

    #[test]
    fn test_parse_expression_rejects_assignment() {
        assert!(parse_expression("b = a").is_err());
        assert!(parse_expression("A * B").is_ok());
    }
}
