//! Textual infix syntax for trees
//!
//! `x * 2 + 2 / x - 16 / sin(x)` parses into the same tree the operator
//! builders produce. `a ^ b` is the binary `pow` operation; calls with one
//! argument become unary operations and calls with two become binary ones.
//! Integer literals stay integers, anything with a fraction or exponent is
//! a real.

use crate::mst::{ops, Number};
use crate::{CompileOptions, MastError, MastResult, Mst, Span};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::sync::Arc;
use tracing::trace;

#[derive(Parser)]
#[grammar = "src/parser/mast.pest"]
pub struct MastParser;

/// Parse an expression with the default source name
pub fn parse(source: &str, options: &CompileOptions) -> MastResult<Mst> {
    parse_named(source, "<input>", options)
}

/// Parse an expression, naming the source in error reports
pub fn parse_named(source: &str, source_id: &str, options: &CompileOptions) -> MastResult<Mst> {
    if source.len() > options.max_source_bytes {
        return Err(MastError::ResourceLimitExceeded {
            limit_name: "max_source_bytes".to_string(),
            limit_value: format!("{} bytes", options.max_source_bytes),
            actual_value: format!("{} bytes", source.len()),
            suggestion: "Split the expression into smaller pieces".to_string(),
        });
    }

    // The grammar is recursive, so bound nesting before handing input to it.
    let nesting = nesting_depth(source);
    if nesting > options.max_expression_depth {
        return Err(options.depth_exceeded(nesting));
    }

    let builder = TreeBuilder {
        options,
        source_id,
        source: Arc::from(source),
    };

    let mut pairs = MastParser::parse(Rule::expression, source).map_err(|e| {
        let span = Span::from_pest_error(&e);
        MastError::parse(
            e.variant.to_string(),
            span,
            source_id,
            Arc::clone(&builder.source),
        )
    })?;

    let expression = pairs
        .next()
        .ok_or_else(|| builder.error("Empty input", Span::default()))?;
    let sum = expression
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::sum)
        .ok_or_else(|| builder.error("Empty input", Span::default()))?;

    let built = builder.sum(sum)?;
    trace!(depth = built.depth, "Parsed expression");
    Ok(built.tree)
}

/// Upper bound on how deeply the grammar recurses for `source`
fn nesting_depth(source: &str) -> usize {
    let mut depth: usize = 0;
    let mut deepest: usize = 0;
    let mut carets: usize = 0;
    for c in source.chars() {
        match c {
            '(' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            '^' => carets += 1,
            _ => {}
        }
    }
    deepest + carets
}

struct Built {
    tree: Mst,
    depth: usize,
}

struct TreeBuilder<'a> {
    options: &'a CompileOptions,
    source_id: &'a str,
    source: Arc<str>,
}

impl TreeBuilder<'_> {
    fn error(&self, message: impl Into<String>, span: Span) -> MastError {
        MastError::parse(message, span, self.source_id, Arc::clone(&self.source))
    }

    fn leaf(&self, tree: Mst) -> Built {
        Built { tree, depth: 1 }
    }

    fn unary(&self, operation: &str, operand: Built) -> MastResult<Built> {
        self.checked(Mst::unary(operation, operand.tree), operand.depth + 1)
    }

    fn binary(&self, operation: &str, left: Built, right: Built) -> MastResult<Built> {
        let depth = left.depth.max(right.depth) + 1;
        self.checked(Mst::binary(operation, left.tree, right.tree), depth)
    }

    fn checked(&self, tree: Mst, depth: usize) -> MastResult<Built> {
        if depth > self.options.max_expression_depth {
            return Err(self.options.depth_exceeded(depth));
        }
        Ok(Built { tree, depth })
    }

    fn next<'i>(
        &self,
        pairs: &mut pest::iterators::Pairs<'i, Rule>,
        parent: &Pair<'i, Rule>,
    ) -> MastResult<Pair<'i, Rule>> {
        pairs.next().ok_or_else(|| {
            self.error(
                format!("Incomplete {:?}", parent.as_rule()),
                Span::from_pest_span(parent.as_span()),
            )
        })
    }

    fn sum(&self, pair: Pair<Rule>) -> MastResult<Built> {
        let mut inner = pair.clone().into_inner();
        let mut acc = self.product(self.next(&mut inner, &pair)?)?;
        while let Some(operator) = inner.next() {
            let operation = match operator.as_rule() {
                Rule::plus => ops::PLUS,
                Rule::minus => ops::MINUS,
                other => return Err(self.unexpected(other, &operator)),
            };
            let right = self.product(self.next(&mut inner, &pair)?)?;
            acc = self.binary(operation, acc, right)?;
        }
        Ok(acc)
    }

    fn product(&self, pair: Pair<Rule>) -> MastResult<Built> {
        let mut inner = pair.clone().into_inner();
        let mut acc = self.signed(self.next(&mut inner, &pair)?)?;
        while let Some(operator) = inner.next() {
            let operation = match operator.as_rule() {
                Rule::times => ops::TIMES,
                Rule::divide => ops::DIV,
                other => return Err(self.unexpected(other, &operator)),
            };
            let right = self.signed(self.next(&mut inner, &pair)?)?;
            acc = self.binary(operation, acc, right)?;
        }
        Ok(acc)
    }

    fn signed(&self, pair: Pair<Rule>) -> MastResult<Built> {
        let mut signs = Vec::new();
        let mut power = None;
        for inner in pair.clone().into_inner() {
            match inner.as_rule() {
                Rule::sign => signs.push(if inner.as_str() == "-" {
                    ops::MINUS
                } else {
                    ops::PLUS
                }),
                Rule::power => power = Some(inner),
                other => return Err(self.unexpected(other, &inner)),
            }
        }
        let power = power.ok_or_else(|| {
            self.error("Expected an operand", Span::from_pest_span(pair.as_span()))
        })?;

        let mut acc = self.power(power)?;
        for sign in signs.into_iter().rev() {
            acc = self.unary(sign, acc)?;
        }
        Ok(acc)
    }

    fn power(&self, pair: Pair<Rule>) -> MastResult<Built> {
        let mut inner = pair.clone().into_inner();
        let base = self.atom(self.next(&mut inner, &pair)?)?;
        match inner.next() {
            Some(exponent) => {
                let exponent = self.signed(exponent)?;
                self.binary(ops::POW, base, exponent)
            }
            None => Ok(base),
        }
    }

    fn atom(&self, pair: Pair<Rule>) -> MastResult<Built> {
        match pair.as_rule() {
            Rule::number => self.number(&pair),
            Rule::identifier => Ok(self.leaf(Mst::symbol(pair.as_str()))),
            Rule::call => self.call(pair),
            Rule::sum => self.sum(pair),
            other => Err(self.unexpected(other, &pair)),
        }
    }

    fn number(&self, pair: &Pair<Rule>) -> MastResult<Built> {
        let text = pair.as_str();
        let is_real = text.contains(['.', 'e', 'E']);
        let number = match text.parse::<i64>() {
            Ok(integer) if !is_real => Number::Integer(integer),
            _ => Number::Real(text.parse::<f64>().map_err(|_| {
                self.error(
                    format!("Invalid number '{}'", text),
                    Span::from_pest_span(pair.as_span()),
                )
            })?),
        };
        Ok(self.leaf(Mst::Numeric(number)))
    }

    fn call(&self, pair: Pair<Rule>) -> MastResult<Built> {
        let span = Span::from_pest_span(pair.as_span());
        let mut inner = pair.clone().into_inner();
        let name = self.next(&mut inner, &pair)?.as_str().to_string();
        let arguments = self.next(&mut inner, &pair)?;

        let mut operands = arguments
            .into_inner()
            .map(|argument| self.sum(argument))
            .collect::<MastResult<Vec<Built>>>()?;

        match operands.len() {
            1 => {
                let operand = operands.remove(0);
                self.unary(&name, operand)
            }
            2 => {
                let right = operands.remove(1);
                let left = operands.remove(0);
                self.binary(&name, left, right)
            }
            count => Err(MastError::parse_with_suggestion(
                format!("'{}' is called with {} arguments", name, count),
                span,
                self.source_id,
                Arc::clone(&self.source),
                "Operations take one or two arguments",
            )),
        }
    }

    fn unexpected(&self, rule: Rule, pair: &Pair<Rule>) -> MastError {
        self.error(
            format!("Unexpected {:?}", rule),
            Span::from_pest_span(pair.as_span()),
        )
    }
}
