//! Parser for Compare/Operate expressions using pest.
//!
//! Converts the pest parse tree into [`ast`](crate::ast) nodes.

use crate::ast::{Assignment, BinaryOp, CmpOp, Condition, Expr, Function, UnaryOp, VarRef};
use anyhow::{anyhow, bail, Context, Result};
use ladder_common::vars::VarAddr;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct ArithParser;

/// Helper trait for extracting the next element from a pest iterator with context.
trait PairsExt<'i> {
    /// Get the next pair, returning an error with context if missing.
    fn expect_next(&mut self, context: &str) -> Result<Pair<'i, Rule>>;
}

impl<'i> PairsExt<'i> for Pairs<'i, Rule> {
    fn expect_next(&mut self, context: &str) -> Result<Pair<'i, Rule>> {
        self.next()
            .ok_or_else(|| anyhow!("expected {context} but found end of input"))
    }
}

/// Parse the condition of a Compare block, e.g. `%W0 > 10 AND %B3 = 1`.
pub fn parse_compare(source: &str) -> Result<Condition> {
    let top = ArithParser::parse(Rule::compare_expr, source)
        .map_err(|e| anyhow!("{e}"))?
        .next()
        .ok_or_else(|| anyhow!("empty compare expression"))?;
    let logic = top.into_inner().expect_next("condition")?;
    parse_logic_or(logic)
}

/// Parse the statement of an Operate block, e.g. `%W1 := %W0 * 2 + 1`.
pub fn parse_operate(source: &str) -> Result<Assignment> {
    let top = ArithParser::parse(Rule::operate_expr, source)
        .map_err(|e| anyhow!("{e}"))?
        .next()
        .ok_or_else(|| anyhow!("empty operate expression"))?;
    let mut inner = top.into_inner().expect_next("assignment")?.into_inner();
    let target = parse_variable(inner.expect_next("assignment target")?)?;
    let value = parse_expression(inner.expect_next("assignment value")?)?;
    Ok(Assignment { target, value })
}

fn parse_logic_or(pair: Pair<Rule>) -> Result<Condition> {
    let mut inner = pair.into_inner();
    let mut left = parse_logic_and(inner.expect_next("OR operand")?)?;
    for right in inner {
        left = Condition::Or(Box::new(left), Box::new(parse_logic_and(right)?));
    }
    Ok(left)
}

fn parse_logic_and(pair: Pair<Rule>) -> Result<Condition> {
    let mut inner = pair.into_inner();
    let mut left = parse_condition(inner.expect_next("AND operand")?)?;
    for right in inner {
        left = Condition::And(Box::new(left), Box::new(parse_condition(right)?));
    }
    Ok(left)
}

fn parse_condition(pair: Pair<Rule>) -> Result<Condition> {
    let inner = pair.into_inner().expect_next("condition")?;
    match inner.as_rule() {
        Rule::logic_or => parse_logic_or(inner),
        Rule::comparison => {
            let mut parts = inner.into_inner();
            let left = parse_expression(parts.expect_next("left side of comparison")?)?;
            let op = match parts.expect_next("comparison operator")?.as_str() {
                "=" => CmpOp::Eq,
                "<>" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                other => bail!("unknown comparison operator {other}"),
            };
            let right = parse_expression(parts.expect_next("right side of comparison")?)?;
            Ok(Condition::Compare { left, op, right })
        }
        other => Err(anyhow!("unexpected condition: {other:?}")),
    }
}

fn parse_expression(pair: Pair<Rule>) -> Result<Expr> {
    fold_binary(pair, BinaryOp::Or, parse_bit_xor)
}

fn parse_bit_xor(pair: Pair<Rule>) -> Result<Expr> {
    fold_binary(pair, BinaryOp::Xor, parse_bit_and)
}

fn parse_bit_and(pair: Pair<Rule>) -> Result<Expr> {
    fold_binary(pair, BinaryOp::And, parse_additive)
}

/// Left-fold a rule whose operator is implicit (silent literal) and fixed.
fn fold_binary(
    pair: Pair<Rule>,
    op: BinaryOp,
    operand: fn(Pair<Rule>) -> Result<Expr>,
) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut left = operand(inner.expect_next("operand")?)?;
    for right in inner {
        left = binary(left, op, operand(right)?);
    }
    Ok(left)
}

fn parse_additive(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut left = parse_term(inner.expect_next("additive operand")?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            other => bail!("unknown additive operator {other}"),
        };
        let right = parse_term(inner.expect_next("operand after +/-")?)?;
        left = binary(left, op, right);
    }
    Ok(left)
}

fn parse_term(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut left = parse_unary(inner.expect_next("multiplicative operand")?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str().to_ascii_uppercase().as_str() {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "MOD" => BinaryOp::Mod,
            other => bail!("unknown multiplicative operator {other}"),
        };
        let right = parse_unary(inner.expect_next("operand after */MOD")?)?;
        left = binary(left, op, right);
    }
    Ok(left)
}

fn parse_unary(pair: Pair<Rule>) -> Result<Expr> {
    let mut ops = Vec::new();
    let mut primary = None;
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::unary_op => ops.push(if item.as_str() == "-" {
                UnaryOp::Neg
            } else {
                UnaryOp::Not
            }),
            Rule::primary => primary = Some(parse_primary(item)?),
            other => bail!("unexpected unary content: {other:?}"),
        }
    }
    let mut expr = primary.ok_or_else(|| anyhow!("missing operand after unary operator"))?;
    // Innermost operator applies first.
    for op in ops.into_iter().rev() {
        expr = match (op, expr) {
            (UnaryOp::Neg, Expr::Literal(n)) => Expr::Literal(n.wrapping_neg()),
            (op, operand) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        };
    }
    Ok(expr)
}

fn parse_primary(pair: Pair<Rule>) -> Result<Expr> {
    let inner = pair.into_inner().expect_next("operand")?;
    match inner.as_rule() {
        Rule::int_literal => {
            let text = inner.as_str();
            let value = text
                .parse::<i32>()
                .with_context(|| format!("integer literal {text} out of range"))?;
            Ok(Expr::Literal(value))
        }
        Rule::hex_literal => {
            let text = inner.as_str();
            let value = u32::from_str_radix(&text[1..], 16)
                .with_context(|| format!("hexadecimal literal {text} out of range"))?;
            Ok(Expr::Literal(i32::from_ne_bytes(value.to_ne_bytes())))
        }
        Rule::variable => Ok(Expr::Var(parse_variable(inner)?)),
        Rule::function_call => parse_function_call(inner),
        Rule::expression => parse_expression(inner),
        other => Err(anyhow!("unexpected operand: {other:?}")),
    }
}

fn parse_function_call(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let name = inner.expect_next("function name")?.as_str().to_ascii_uppercase();
    let func = match name.as_str() {
        "ABS" => Function::Abs,
        "MINI" => Function::Mini,
        "MAXI" => Function::Maxi,
        "MOY" => Function::Moy,
        other => bail!("unknown function {other}"),
    };
    let args = inner.map(parse_expression).collect::<Result<Vec<_>>>()?;
    if func == Function::Abs && args.len() != 1 {
        bail!("ABS takes exactly one argument, got {}", args.len());
    }
    Ok(Expr::Call { func, args })
}

fn parse_variable(pair: Pair<Rule>) -> Result<VarRef> {
    let mut inner = pair.into_inner();
    let addr = parse_var_ref(inner.expect_next("variable")?)?;
    let index = inner.next().map(parse_var_ref).transpose()?;
    Ok(VarRef { addr, index })
}

fn parse_var_ref(pair: Pair<Rule>) -> Result<VarAddr> {
    pair.as_str()
        .parse::<VarAddr>()
        .map_err(|e| anyhow!("{e}"))
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}
