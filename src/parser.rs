//! Parser: turns the lexer's token stream into an AST of `Node`s, using
//! `chumsky` the same way the teacher's own `ir.rs` builds its grammar —
//! `recursive`/`select!`/`just`/`delimited_by` combinators — except here the
//! combinators run over the token stream rather than raw characters, since
//! this crate keeps lexing and parsing as separate stages.

use chumsky::prelude::*;
use chumsky::Stream;

use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub type Span = std::ops::Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomValue {
    Int(i64),
    Double(f64),
    Str(String),
    True,
    False,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Atom(AtomValue, usize),
    Ident(String, usize),
    Array(Vec<Node>, usize),
    Bin(BinOp, Vec<Node>, usize),
    Builtin(String, Vec<Node>, usize),
    Call(String, Vec<Node>, usize),
}

impl Node {
    pub fn pos(&self) -> usize {
        match self {
            Node::Atom(_, p)
            | Node::Ident(_, p)
            | Node::Array(_, p)
            | Node::Bin(_, _, p)
            | Node::Builtin(_, _, p)
            | Node::Call(_, _, p) => *p,
        }
    }
}

fn node_parser() -> impl Parser<TokenKind, Node, Error = Simple<TokenKind, Span>> + Clone {
    recursive(|node: Recursive<TokenKind, Node, Simple<TokenKind, Span>>| {
        let atom = select! {
            TokenKind::Int(n) => AtomValue::Int(n),
            TokenKind::Double(d) => AtomValue::Double(d),
            TokenKind::Str(s) => AtomValue::Str(s),
            TokenKind::True => AtomValue::True,
            TokenKind::False => AtomValue::False,
        }
        .map_with_span(|v, span: Span| Node::Atom(v, span.start));

        let ident = select! { TokenKind::Ident(s) => s }
            .map_with_span(|s, span: Span| Node::Ident(s, span.start));

        let array = node
            .clone()
            .repeated()
            .delimited_by(just(TokenKind::LBracket), just(TokenKind::RBracket))
            .map_with_span(|items, span: Span| Node::Array(items, span.start));

        let bin_op = select! {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::EqSign => BinOp::Eq,
        };

        let bin = just(TokenKind::LParen)
            .ignore_then(bin_op)
            .then(node.clone().repeated())
            .then_ignore(just(TokenKind::RParen))
            .map_with_span(|(op, args), span: Span| Node::Bin(op, args, span.start));

        let builtin = just(TokenKind::LParen)
            .ignore_then(select! { TokenKind::AtIdent(name) => name })
            .then(node.clone().repeated())
            .then_ignore(just(TokenKind::RParen))
            .map_with_span(|(name, args), span: Span| Node::Builtin(name, args, span.start));

        let call = just(TokenKind::LParen)
            .ignore_then(select! { TokenKind::Ident(name) => name })
            .then(node.clone().repeated())
            .then_ignore(just(TokenKind::RParen))
            .map_with_span(|(name, args), span: Span| Node::Call(name, args, span.start));

        choice((bin, builtin, call, array, atom, ident))
    })
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Node>, ParseError> {
    let len = tokens.iter().map(|t| t.pos).max().unwrap_or(0) + 1;
    let stream = Stream::from_iter(
        len..len + 1,
        tokens.into_iter().map(|t| {
            let span = t.pos..t.pos + 1;
            (t.kind, span)
        }),
    );

    let parser = node_parser().repeated().then_ignore(end());
    parser.parse(stream).map_err(|errs| {
        let first = errs.into_iter().next();
        match first {
            Some(e) => ParseError::UnexpectedToken(format!("{:?}", e.found()), e.span().start),
            None => ParseError::UnexpectedToken("<unknown>".to_string(), 0),
        }
    })
}
