//! Tests for statement parsing

use crate::Error;
use crate::app::services::algebra::ast::{BinaryOp, Expr, SpatialOffset, TemporalFunction};
use crate::app::services::algebra::{parse_expression, parse_statement};

#[test]
fn test_temporal_neighbours() {
    let statement = parse_statement("D = A[-1] + A[1]").unwrap();
    assert_eq!(statement.output, "D");

    let refs = statement.expression.dataset_refs();
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].name, "A");
    assert_eq!(refs[0].offset.time, -1);
    assert_eq!(refs[1].offset.time, 1);
    assert!(refs[0].offset.spatial.is_none());
    assert_eq!(refs[1].position, 12);

    assert_eq!(statement.to_string(), "D = A[-1] + A[1]");
}

#[test]
fn test_precedence_and_grouping() {
    let expr = parse_expression("A + B * 2").unwrap();
    match expr {
        Expr::Binary { op: BinaryOp::Add, right, .. } => {
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("unexpected tree {other:?}"),
    }

    let expr = parse_expression("(A + B) * 2").unwrap();
    assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
    assert_eq!(expr.to_string(), "(A + B) * 2");

    // Subtraction is left associative
    let expr = parse_expression("A - B - C").unwrap();
    match expr {
        Expr::Binary { op: BinaryOp::Sub, left, .. } => {
            assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        }
        other => panic!("unexpected tree {other:?}"),
    }
}

#[test]
fn test_unary_minus() {
    let expr = parse_expression("-A * -2").unwrap();
    assert_eq!(expr.to_string(), "-A * -2");
    assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_spatial_offsets() {
    let refs_of = |text: &str| parse_expression(text).unwrap().dataset_refs()[0].offset;

    let offset = refs_of("A[1,-1]");
    assert_eq!(offset.time, 0);
    assert_eq!(
        offset.spatial,
        Some(SpatialOffset {
            row: 1,
            col: -1,
            depth: None
        })
    );

    let offset = refs_of("A[0,1,2]");
    assert_eq!(offset.spatial.unwrap().depth, Some(2));

    let offset = refs_of("A[0,1,0,-2]");
    assert_eq!(offset.time, -2);
    assert_eq!(offset.spatial.unwrap().col, 1);

    assert_eq!(parse_expression("A[0,1,0,-2]").unwrap().to_string(), "A[0,1,0,-2]");
    assert_eq!(parse_expression("A[+1]").unwrap().to_string(), "A[1]");
}

#[test]
fn test_functions() {
    let expr = parse_expression("A / td(A) + start_month(B[-1])").unwrap();
    let leaves = expr.leaves();
    assert_eq!(leaves.len(), 3);
    assert!(matches!(
        leaves[1],
        Expr::Function {
            function: TemporalFunction::Td,
            ..
        }
    ));
    match leaves[2] {
        Expr::Function { function, argument } => {
            assert_eq!(*function, TemporalFunction::StartMonth);
            assert_eq!(argument.name, "B");
            assert_eq!(argument.offset.time, -1);
        }
        other => panic!("unexpected leaf {other:?}"),
    }
    let names: Vec<&str> = expr.dataset_refs().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "A", "B"]);
}

#[test]
fn test_qualified_names() {
    let statement = parse_statement("out = temp@climate * 0.1").unwrap();
    assert_eq!(statement.expression.dataset_refs()[0].name, "temp@climate");
}

#[test]
fn test_syntax_errors_carry_token_and_position() {
    let cases = [
        ("D = A +", "end of input", 7),
        ("D = A[1,2,3,4,5]", "[", 5),
        ("D = (A + B", "end of input", 10),
        ("D A + B", "A", 2),
        ("= A", "=", 0),
        ("D = A B", "B", 6),
        ("D = unknown(A)", "unknown", 4),
        ("D = A[1.5]", "1.5", 6),
        ("D = td(3)", "3", 7),
    ];
    for (input, token, position) in cases {
        match parse_statement(input) {
            Err(Error::Syntax {
                token: found,
                position: at,
                ..
            }) => {
                assert_eq!(found, token, "token for '{}'", input);
                assert_eq!(at, position, "position for '{}'", input);
            }
            other => panic!("expected a syntax error for '{}', got {:?}", input, other),
        }
    }
}

#[test]
fn test_parsing_is_reentrant() {
    let first = parse_statement("D = A[-1] + A[1]").unwrap();
    let _ = parse_statement("broken = (");
    let second = parse_statement("D = A[-1] + A[1]").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    let nested = |depth: usize| format!("D = {}A{}", "(".repeat(depth), ")".repeat(depth));
    assert!(parse_statement(&nested(100)).is_ok());

    match parse_statement(&nested(200_000)) {
        Err(Error::Syntax {
            token,
            position,
            message,
        }) => {
            assert_eq!(token, "(");
            assert_eq!(position, 260);
            assert!(message.contains("nested too deeply"));
        }
        other => panic!("expected a syntax error, got {:?}", other.map(|_| ())),
    }

    let negations = format!("D = {}A", "-".repeat(100_000));
    assert!(matches!(
        parse_statement(&negations),
        Err(Error::Syntax { .. })
    ));
}
