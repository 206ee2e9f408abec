//! Command language front end.
//!
//! One grammar serves two purposes: parsing a command for execution and
//! classifying operator input as an expression, a statement, or an incomplete
//! fragment. Classification is a syntax-only parse, nothing is executed.
//! A fragment is incomplete when the parse fails at the end of input (an open
//! bracket, a trailing operator, a dangling `=`), so the caller knows to
//! accumulate further lines and retry.

use crate::interp::error::{EvalError, EvalResult};
use chumsky::error::Rich;
use chumsky::prelude::{choice, end, just, none_of, recursive};
use chumsky::{extra, text, IterParser, Parser};

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ident(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    MethodCall(Box<Expr>, String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(String, Expr),
    IndexAssign(String, Expr, Expr),
    Delete(String),
}

/// Source text classified by the syntax front end.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Expression(Expr),
    Statement(Stmt),
    Incomplete,
}

pub fn expression<'a>() -> impl Parser<'a, &'a str, Expr, Err<'a>> + Clone {
    recursive(|expr| {
        let op = |c| just(c).padded();

        let number = text::int(10)
            .then(just('.').then(text::digits(10).at_least(1)).or_not())
            .to_slice()
            .map(|s: &str| {
                if s.contains('.') {
                    Expr::Float(s.parse().unwrap())
                } else {
                    Expr::Int(s.parse().unwrap())
                }
            })
            .padded()
            .labelled("number");

        let escape = just('\\').ignore_then(choice((
            just('n').to('\n'),
            just('t').to('\t'),
            just('\\').to('\\'),
            just('\'').to('\''),
            just('"').to('"'),
        )));
        // Literals are single-line; embedded line breaks are written `\n`.
        let sq_string = none_of("\\'\n")
            .or(escape.clone())
            .repeated()
            .collect::<String>()
            .delimited_by(just('\''), just('\''));
        let dq_string = none_of("\\\"\n")
            .or(escape)
            .repeated()
            .collect::<String>()
            .delimited_by(just('"'), just('"'));
        let string = sq_string
            .or(dq_string)
            .map(Expr::Str)
            .padded()
            .labelled("string literal");

        let boolean = text::ascii::keyword("true")
            .to(Expr::Bool(true))
            .or(text::ascii::keyword("false").to(Expr::Bool(false)))
            .padded();

        let ident = text::ascii::ident()
            .map(|name: &str| Expr::Ident(name.to_string()))
            .padded()
            .labelled("identifier");

        let list = expr
            .clone()
            .separated_by(op(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(op('['), op(']'))
            .map(Expr::List)
            .labelled("list literal");

        let map = expr
            .clone()
            .then_ignore(op(':'))
            .then(expr.clone())
            .separated_by(op(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(op('{'), op('}'))
            .map(Expr::Map)
            .labelled("map literal");

        let atom = choice((
            number,
            string,
            boolean,
            list,
            map,
            ident,
            expr.clone().delimited_by(op('('), op(')')),
        ))
        .padded();

        enum Postfix {
            Call(Vec<Expr>),
            Index(Expr),
            Method(String, Vec<Expr>),
        }

        let args = expr
            .clone()
            .separated_by(op(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(op('('), op(')'));

        let method = op('.')
            .ignore_then(text::ascii::ident())
            .then(args.clone())
            .map(|(name, args): (&str, _)| Postfix::Method(name.to_string(), args))
            .labelled("method call");
        let call = args.map(Postfix::Call);
        let index = expr
            .clone()
            .delimited_by(op('['), op(']'))
            .map(Postfix::Index)
            .labelled("index");

        let postfixed = atom.foldl(
            choice((method, call, index)).repeated(),
            |target, postfix| match postfix {
                Postfix::Call(args) => Expr::Call(Box::new(target), args),
                Postfix::Index(idx) => Expr::Index(Box::new(target), Box::new(idx)),
                Postfix::Method(name, args) => Expr::MethodCall(Box::new(target), name, args),
            },
        );

        let unary = choice((op('-').to(UnaryOp::Neg), op('!').to(UnaryOp::Not)))
            .repeated()
            .foldr(postfixed, |op, rhs| Expr::Unary(op, Box::new(rhs)));

        let product = unary.clone().foldl(
            choice((
                op('*').to(BinOp::Mul),
                op('/').to(BinOp::Div),
                op('%').to(BinOp::Rem),
            ))
            .then(unary)
            .repeated(),
            |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        );

        let sum = product.clone().foldl(
            choice((op('+').to(BinOp::Add), op('-').to(BinOp::Sub)))
                .then(product)
                .repeated(),
            |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        );

        let cmp_op = choice((
            just("==").to(BinOp::Eq),
            just("!=").to(BinOp::Ne),
            just("<=").to(BinOp::Le),
            just(">=").to(BinOp::Ge),
            just('<').to(BinOp::Lt),
            just('>').to(BinOp::Gt),
        ))
        .padded();

        sum.clone()
            .then(cmp_op.then(sum).or_not())
            .map(|(lhs, cmp)| match cmp {
                Some((op, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                None => lhs,
            })
    })
}

pub fn statement<'a>() -> impl Parser<'a, &'a str, Stmt, Err<'a>> {
    let op = |c| just(c).padded();
    let ident = text::ascii::ident()
        .map(|name: &str| name.to_string())
        .padded();

    let delete = text::ascii::keyword("del")
        .padded()
        .ignore_then(ident.clone())
        .map(Stmt::Delete)
        .labelled("del statement");

    let index_assign = ident
        .clone()
        .then(expression().delimited_by(op('['), op(']')))
        .then_ignore(op('='))
        .then(expression())
        .map(|((target, index), value)| Stmt::IndexAssign(target, index, value))
        .labelled("index assignment");

    let assign = ident
        .then_ignore(op('='))
        .then(expression())
        .map(|(name, value)| Stmt::Assign(name, value))
        .labelled("assignment");

    choice((delete, index_assign, assign))
}

/// Classify (and parse) one command. Expression is tried before statement,
/// like the original console did with an eval-mode compile probe.
pub fn classify(source: &str) -> EvalResult<Classified> {
    let expr_errors = match expression().then_ignore(end()).parse(source).into_result() {
        Ok(expr) => return Ok(Classified::Expression(expr)),
        Err(errors) => errors,
    };
    let stmt_errors = match statement().then_ignore(end()).parse(source).into_result() {
        Ok(stmt) => return Ok(Classified::Statement(stmt)),
        Err(errors) => errors,
    };

    // A failure at end of input means the fragment can still be completed by
    // further lines; anywhere else it is a plain syntax error. An open string
    // literal also fails at end of input, but string literals are
    // single-line, so no further line can ever close it.
    let significant = source.trim_end().len();
    let at_end = |errors: &[Rich<char>]| errors.iter().any(|e| e.span().start >= significant);
    if !unterminated_string(source) && (at_end(&expr_errors) || at_end(&stmt_errors)) {
        return Ok(Classified::Incomplete);
    }

    Err(EvalError::Syntax(format!("{}", expr_errors[0])))
}

/// Whether the source ends inside a string literal.
fn unterminated_string(source: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in source.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None => {}
        }
    }
    quote.is_some()
}
