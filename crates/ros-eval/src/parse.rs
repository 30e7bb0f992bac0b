//! Shunting-yard parser building the expression AST.
//!
//! The AST is deliberately small: a leaf is the raw token text (resolution
//! happens in the dispatcher), a unary node is `[op, a]`, a binary node is
//! `[a, op, b]`. Precedence and associativity live here; operator meaning
//! does not.

use crate::scan::{is_bracketed, is_number, is_quoted, is_word, is_word_operator};
use crate::EvalError;

/// An expression tree over raw tokens.
#[derive(Clone, PartialEq, Debug)]
pub enum Node<'a> {
    Leaf(&'a str),
    Unary {
        op: &'a str,
        operand: Box<Node<'a>>,
    },
    Binary {
        left: Box<Node<'a>>,
        op: &'a str,
        right: Box<Node<'a>>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Binary operator precedence: higher binds tighter.
fn precedence(op: &str) -> Option<(u8, Assoc)> {
    let entry = match op {
        "**" | "^" => (9, Assoc::Right),
        "*" | "/" | "//" | "%" => (8, Assoc::Left),
        "+" | "-" => (7, Assoc::Left),
        "|" | "&" => (6, Assoc::Left),
        "==" | "!=" | ">=" | "<=" | ">" | "<" | "in" | "index" | "pop" => (5, Assoc::Left),
        "and" => (3, Assoc::Left),
        "or" => (2, Assoc::Left),
        _ => return None,
    };
    Some(entry)
}

/// Operators accepted in operand position.
fn is_unary(op: &str) -> bool {
    matches!(
        op,
        "-" | "not" | "~" | "sqrt" | "cbrt" | "sin" | "cos" | "tan" | "len"
    )
}

enum StackOp<'a> {
    Unary(&'a str),
    Binary(&'a str),
    Paren,
}

/// Insert implicit multiplication between adjacent operand-like tokens.
///
/// The rule: the previous token is a bare word (identifier or integer
/// shape, not a word operator) or `)`, and the current token is `(` or a
/// number/bare word that is not a word operator. This is what makes `3(4)`
/// mean `3 * 4`.
fn insert_implicit_mul<'a>(tokens: Vec<&'a str>) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::with_capacity(tokens.len());
    for (i, &token) in tokens.iter().enumerate() {
        if i > 0 {
            let prev = tokens[i - 1];
            let prev_joins = (is_word(prev) && !is_word_operator(prev)) || prev == ")";
            let curr_joins = token == "("
                || ((is_number(token) || is_word(token)) && !is_word_operator(token));
            if prev_joins && curr_joins {
                out.push("*");
            }
        }
        out.push(token);
    }
    out
}

/// Parse a token list into an AST.
pub fn parse<'a>(tokens: Vec<&'a str>) -> Result<Node<'a>, EvalError> {
    if tokens.is_empty() {
        return Err(EvalError::Syntax("empty expression".to_string()));
    }

    // A lone token normalizes to `token * 1` so every expression flows
    // through the same dispatch path.
    let mut tokens = tokens;
    if tokens.len() == 1 {
        tokens.push("*");
        tokens.push("1");
    }

    let tokens = insert_implicit_mul(tokens);

    let mut output: Vec<Node<'a>> = Vec::new();
    let mut stack: Vec<StackOp<'a>> = Vec::new();

    fn pop_op<'a>(stack: &mut Vec<StackOp<'a>>, output: &mut Vec<Node<'a>>) -> Result<(), EvalError> {
        let malformed = || EvalError::Syntax("malformed expression".to_string());
        match stack.pop().ok_or_else(malformed)? {
            StackOp::Unary(op) => {
                let operand = output.pop().ok_or_else(malformed)?;
                output.push(Node::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
            StackOp::Binary(op) => {
                let right = output.pop().ok_or_else(malformed)?;
                let left = output.pop().ok_or_else(malformed)?;
                output.push(Node::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                });
            }
            StackOp::Paren => return Err(malformed()),
        }
        Ok(())
    }

    let mut expect_operand = true;
    for token in tokens {
        if is_unary(token) && expect_operand {
            stack.push(StackOp::Unary(token));
            expect_operand = true;
        } else if let Some((prec, assoc)) = precedence(token) {
            // Unaries bind tighter than any binary operator: they complete
            // the moment their operand is followed by one.
            while matches!(stack.last(), Some(StackOp::Unary(_))) {
                pop_op(&mut stack, &mut output)?;
            }
            while let Some(StackOp::Binary(top)) = stack.last() {
                let (top_prec, _) = precedence(top).unwrap_or((0, Assoc::Left));
                let pops = match assoc {
                    Assoc::Left => prec <= top_prec,
                    Assoc::Right => prec < top_prec,
                };
                if pops {
                    pop_op(&mut stack, &mut output)?;
                } else {
                    break;
                }
            }
            stack.push(StackOp::Binary(token));
            expect_operand = true;
        } else if is_number(token) || is_quoted(token) || is_word(token) || is_bracketed(token) {
            output.push(Node::Leaf(token));
            expect_operand = false;
        } else if token == "(" {
            stack.push(StackOp::Paren);
            expect_operand = true;
        } else if token == ")" {
            loop {
                match stack.last() {
                    Some(StackOp::Paren) => {
                        stack.pop();
                        break;
                    }
                    Some(_) => pop_op(&mut stack, &mut output)?,
                    None => {
                        return Err(EvalError::Syntax("unmatched ')'".to_string()));
                    }
                }
            }
            // One pending unary applies to the whole group: sqrt(4).
            if matches!(stack.last(), Some(StackOp::Unary(_))) {
                pop_op(&mut stack, &mut output)?;
            }
            expect_operand = false;
        } else {
            return Err(EvalError::Syntax(format!("unexpected token '{}'", token)));
        }
    }

    while let Some(top) = stack.last() {
        if matches!(top, StackOp::Paren) {
            return Err(EvalError::Syntax("unmatched '('".to_string()));
        }
        pop_op(&mut stack, &mut output)?;
    }

    match output.len() {
        1 => Ok(output.pop().expect("len checked")),
        _ => Err(EvalError::Syntax("malformed expression".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    fn parse_str(expr: &str) -> Node<'_> {
        parse(scan(expr).unwrap()).unwrap()
    }

    fn leaf(t: &str) -> Box<Node<'_>> {
        Box::new(Node::Leaf(t))
    }

    #[test]
    fn single_token_normalizes_to_times_one() {
        let ast = parse_str("5");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("5"),
                op: "*",
                right: leaf("1"),
            }
        );
    }

    #[test]
    fn precedence_mul_over_add() {
        // 3 + 4 * 2  =>  [3, +, [4, *, 2]]
        let ast = parse_str("3 + 4 * 2");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("3"),
                op: "+",
                right: Box::new(Node::Binary {
                    left: leaf("4"),
                    op: "*",
                    right: leaf("2"),
                }),
            }
        );
    }

    #[test]
    fn parens_override_precedence() {
        // (3 + 4) * 2  =>  [[3, +, 4], *, 2]
        let ast = parse_str("(3 + 4) * 2");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Binary {
                    left: leaf("3"),
                    op: "+",
                    right: leaf("4"),
                }),
                op: "*",
                right: leaf("2"),
            }
        );
    }

    #[test]
    fn left_associative_chains() {
        // 10 - 4 - 3  =>  [[10, -, 4], -, 3]
        let ast = parse_str("10 - 4 - 3");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Binary {
                    left: leaf("10"),
                    op: "-",
                    right: leaf("4"),
                }),
                op: "-",
                right: leaf("3"),
            }
        );
    }

    #[test]
    fn power_is_right_associative() {
        // 2 ** 3 ** 2  =>  [2, **, [3, **, 2]]
        let ast = parse_str("2 ** 3 ** 2");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("2"),
                op: "**",
                right: Box::new(Node::Binary {
                    left: leaf("3"),
                    op: "**",
                    right: leaf("2"),
                }),
            }
        );
    }

    #[test]
    fn unary_minus_in_operand_position() {
        // -3 + 4  =>  [[-, 3], +, 4]
        let ast = parse_str("-3 + 4");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Unary {
                    op: "-",
                    operand: leaf("3"),
                }),
                op: "+",
                right: leaf("4"),
            }
        );
    }

    #[test]
    fn unary_completes_before_a_binary_operator() {
        // len 'ab' + 1  =>  [[len, 'ab'], +, 1]
        let ast = parse_str("len 'ab' + 1");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Unary {
                    op: "len",
                    operand: leaf("'ab'"),
                }),
                op: "+",
                right: leaf("1"),
            }
        );
    }

    #[test]
    fn unary_nests_inside_binary_operand() {
        let ast = parse_str("2 * -3");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("2"),
                op: "*",
                right: Box::new(Node::Unary {
                    op: "-",
                    operand: leaf("3"),
                }),
            }
        );
    }

    #[test]
    fn minus_after_operand_is_binary() {
        let ast = parse_str("3 - 4");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("3"),
                op: "-",
                right: leaf("4"),
            }
        );
    }

    #[test]
    fn unary_applies_to_paren_group() {
        // sqrt(9) * 2: the unary binds the group, not the product.
        let ast = parse_str("sqrt(9) * 2");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Unary {
                    op: "sqrt",
                    operand: leaf("9"),
                }),
                op: "*",
                right: leaf("2"),
            }
        );
    }

    #[test]
    fn implicit_multiplication_number_paren() {
        // 3(4) => 3 * (4 * 1)... the group holds a single token which does
        // not renormalize; it parses as 3 * 4.
        let ast = parse_str("3(4)");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("3"),
                op: "*",
                right: leaf("4"),
            }
        );
    }

    #[test]
    fn implicit_multiplication_adjacent_words() {
        let ast = parse_str("2 x");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("2"),
                op: "*",
                right: leaf("x"),
            }
        );
    }

    #[test]
    fn implicit_multiplication_after_close_paren() {
        // (2)(3) => 2 * 3 with both groups collapsed.
        let ast = parse_str("(2)(3)");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("2"),
                op: "*",
                right: leaf("3"),
            }
        );
    }

    #[test]
    fn no_implicit_multiplication_before_word_operator() {
        // `x and y` must stay a conjunction.
        let ast = parse_str("x and y");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("x"),
                op: "and",
                right: leaf("y"),
            }
        );
    }

    #[test]
    fn word_binary_operators() {
        let ast = parse_str("'el' in 'hello'");
        assert_eq!(
            ast,
            Node::Binary {
                left: leaf("'el'"),
                op: "in",
                right: leaf("'hello'"),
            }
        );
    }

    #[test]
    fn comparison_binds_looser_than_arithmetic() {
        // 1 + 2 == 3  =>  [[1,+,2], ==, 3]
        let ast = parse_str("1 + 2 == 3");
        assert_eq!(
            ast,
            Node::Binary {
                left: Box::new(Node::Binary {
                    left: leaf("1"),
                    op: "+",
                    right: leaf("2"),
                }),
                op: "==",
                right: leaf("3"),
            }
        );
    }

    #[test]
    fn and_binds_looser_than_comparison() {
        let ast = parse_str("1 < 2 and 3 < 4");
        match ast {
            Node::Binary { op, .. } => assert_eq!(op, "and"),
            other => panic!("expected binary and, got {:?}", other),
        }
    }

    #[test]
    fn unmatched_open_paren_fails() {
        assert!(parse(scan("(1 + 2").unwrap()).is_err());
    }

    #[test]
    fn unmatched_close_paren_fails() {
        assert!(parse(scan("1 + 2)").unwrap()).is_err());
    }

    #[test]
    fn empty_expression_fails() {
        assert!(parse(Vec::new()).is_err());
    }

    #[test]
    fn dangling_operator_fails() {
        assert!(parse(scan("1 +").unwrap()).is_err());
    }

    #[test]
    fn adjacent_operands_without_join_rule_fail() {
        // 3.5 is not integer-shaped, so no implicit multiply applies and the
        // two operands cannot form one tree.
        assert!(parse(scan("3.5 x").unwrap()).is_err());
    }
}
