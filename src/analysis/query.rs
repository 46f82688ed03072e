use std::fmt;

use thiserror::Error;

use super::profile::{AnalysisProfile, FieldAnalysis};

/// Reasons a free-text query cannot be parsed under a collection's profile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("query is empty")]
    Empty,

    #[error("unterminated quote starting at offset {0}")]
    UnterminatedQuote(usize),

    #[error("unbalanced parenthesis at offset {0}")]
    UnbalancedParen(usize),

    #[error("operator {0} is missing an operand")]
    DanglingOperator(&'static str),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' has no value")]
    EmptyFieldValue(String),

    #[error("empty search term in field '{0}'")]
    EmptyTerm(String),

    #[error("wildcards are not supported on exact field '{0}'")]
    WildcardOnExact(String),

    #[error("NOT needs a positive term in the same group")]
    UnboundNegation,
}

/// A parsed free-text query, with every term bound to a field of the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Term {
        field: String,
        analysis: FieldAnalysis,
        text: String,
        prefix: bool,
    },
    Phrase {
        field: String,
        analysis: FieldAnalysis,
        text: String,
    },
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

impl QueryNode {
    fn is_compound(&self) -> bool {
        matches!(self, QueryNode::And(_) | QueryNode::Or(_))
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term {
                field, text, prefix, ..
            } => write!(f, "{field}:{text}{}", if *prefix { "*" } else { "" }),
            QueryNode::Phrase { field, text, .. } => write!(f, "{field}:\"{text}\""),
            QueryNode::And(items) => write_joined(f, items, " AND ", |item| {
                matches!(item, QueryNode::Or(_))
            }),
            QueryNode::Or(items) => write_joined(f, items, " OR ", |_| false),
            QueryNode::Not(inner) if inner.is_compound() => write!(f, "NOT ({inner})"),
            QueryNode::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    items: &[QueryNode],
    separator: &str,
    needs_parens: impl Fn(&QueryNode) -> bool,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        if needs_parens(item) {
            write!(f, "({item})")?;
        } else {
            write!(f, "{item}")?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen(usize),
    RParen(usize),
    And,
    Or,
    Not,
    Field(String),
    Word(String),
    Phrase(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen(pos));
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen(pos));
            }
            '&' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Or);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(QueryParseError::UnterminatedQuote(pos));
                }
                tokens.push(Token::Phrase(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '&' | '|' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let phrase_follows = matches!(chars.peek(), Some((_, '"')));
                push_word(&mut tokens, word, phrase_follows)?;
            }
        }
    }

    Ok(tokens)
}

fn push_word(
    tokens: &mut Vec<Token>,
    word: String,
    phrase_follows: bool,
) -> Result<(), QueryParseError> {
    match word.as_str() {
        "AND" => tokens.push(Token::And),
        "OR" => tokens.push(Token::Or),
        "NOT" => tokens.push(Token::Not),
        _ => match word.split_once(':') {
            Some((field, value)) if !field.is_empty() => {
                tokens.push(Token::Field(field.to_string()));
                if !value.is_empty() {
                    tokens.push(Token::Word(value.to_string()));
                } else if !phrase_follows {
                    return Err(QueryParseError::EmptyFieldValue(field.to_string()));
                }
            }
            _ => tokens.push(Token::Word(word)),
        },
    }
    Ok(())
}

struct Parser<'p> {
    tokens: Vec<Token>,
    pos: usize,
    profile: &'p AnalysisProfile,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<QueryNode, QueryParseError> {
        let mut items = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            self.expect_operand("OR")?;
            items.push(self.parse_and()?);
        }
        Ok(combine(items, false))
    }

    fn parse_and(&mut self) -> Result<QueryNode, QueryParseError> {
        let mut items = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    self.expect_operand("AND")?;
                    items.push(self.parse_unary()?);
                }
                Some(
                    Token::Not
                    | Token::LParen(_)
                    | Token::Field(_)
                    | Token::Word(_)
                    | Token::Phrase(_),
                ) => items.push(self.parse_unary()?),
                _ => break,
            }
        }
        Ok(combine(items, true))
    }

    fn parse_unary(&mut self) -> Result<QueryNode, QueryParseError> {
        match self.advance() {
            Some(Token::Not) => {
                self.expect_operand("NOT")?;
                Ok(QueryNode::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen(pos)) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen(_)) => Ok(inner),
                    _ => Err(QueryParseError::UnbalancedParen(pos)),
                }
            }
            Some(Token::RParen(pos)) => Err(QueryParseError::UnbalancedParen(pos)),
            Some(Token::And) => Err(QueryParseError::DanglingOperator("AND")),
            Some(Token::Or) => Err(QueryParseError::DanglingOperator("OR")),
            Some(Token::Field(name)) => match self.advance() {
                Some(Token::Word(text)) => self.term(&name, &text),
                Some(Token::Phrase(text)) => self.phrase(&name, &text),
                _ => Err(QueryParseError::EmptyFieldValue(name)),
            },
            Some(Token::Word(text)) => self.term(self.profile.default_field(), &text),
            Some(Token::Phrase(text)) => self.phrase(self.profile.default_field(), &text),
            None => Err(QueryParseError::Empty),
        }
    }

    /// Fails if the operator just consumed has nothing to its right.
    fn expect_operand(&self, operator: &'static str) -> Result<(), QueryParseError> {
        match self.peek() {
            None | Some(Token::RParen(_) | Token::And | Token::Or) => {
                Err(QueryParseError::DanglingOperator(operator))
            }
            _ => Ok(()),
        }
    }

    fn field(&self, name: &str) -> Result<(String, FieldAnalysis), QueryParseError> {
        self.profile
            .field(name)
            .map(|analysis| (name.to_lowercase(), analysis))
            .ok_or_else(|| QueryParseError::UnknownField(name.to_string()))
    }

    fn term(&self, field: &str, text: &str) -> Result<QueryNode, QueryParseError> {
        let (field, analysis) = self.field(field)?;
        let (text, prefix) = match text.strip_suffix('*') {
            Some(stem) => (stem, true),
            None => (text, false),
        };
        if prefix && analysis == FieldAnalysis::Exact {
            return Err(QueryParseError::WildcardOnExact(field));
        }
        if text.is_empty() {
            return Err(QueryParseError::EmptyTerm(field));
        }
        Ok(QueryNode::Term {
            field,
            analysis,
            text: text.to_string(),
            prefix,
        })
    }

    fn phrase(&self, field: &str, text: &str) -> Result<QueryNode, QueryParseError> {
        let (field, analysis) = self.field(field)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryParseError::EmptyTerm(field));
        }
        Ok(QueryNode::Phrase {
            field,
            analysis,
            text: text.to_string(),
        })
    }
}

/// Builds an `And`/`Or` node, flattening nested nodes of the same kind.
fn combine(items: Vec<QueryNode>, conjunction: bool) -> QueryNode {
    if items.len() == 1 {
        return items.into_iter().next().unwrap_or(QueryNode::And(Vec::new()));
    }
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match item {
            QueryNode::And(inner) if conjunction => flat.extend(inner),
            QueryNode::Or(inner) if !conjunction => flat.extend(inner),
            other => flat.push(other),
        }
    }
    if conjunction {
        QueryNode::And(flat)
    } else {
        QueryNode::Or(flat)
    }
}

/// Negations are evaluated as set differences, so each one must sit in a
/// conjunction that also has a positive member.
fn check_negation(node: &QueryNode, bound: bool) -> Result<(), QueryParseError> {
    match node {
        QueryNode::Not(inner) => {
            if !bound {
                return Err(QueryParseError::UnboundNegation);
            }
            check_negation(inner, false)
        }
        QueryNode::And(items) => {
            let has_positive = items.iter().any(|i| !matches!(i, QueryNode::Not(_)));
            items.iter().try_for_each(|i| check_negation(i, has_positive))
        }
        QueryNode::Or(items) => items.iter().try_for_each(|i| check_negation(i, false)),
        QueryNode::Term { .. } | QueryNode::Phrase { .. } => Ok(()),
    }
}

/// Parses a free-text query under the given collection profile.
pub fn parse_query(input: &str, profile: &AnalysisProfile) -> Result<QueryNode, QueryParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(QueryParseError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        profile,
    };
    let root = parser.parse_or()?;

    if let Some(token) = parser.advance() {
        return Err(match token {
            Token::RParen(pos) => QueryParseError::UnbalancedParen(pos),
            Token::And => QueryParseError::DanglingOperator("AND"),
            Token::Or => QueryParseError::DanglingOperator("OR"),
            _ => QueryParseError::UnbalancedParen(input.len()),
        });
    }

    check_negation(&root, false)?;
    Ok(root)
}
