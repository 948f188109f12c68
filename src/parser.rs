use std::{cell::RefCell, fmt::Display, rc::Rc};

use crate::{
    ast::{
        Alternate, ClassDecl, Expression, ForInStatement, ForStatement, FunctionDecl,
        IfStatement, InfixOperator, Literal, Param, Program, Statement, TypeName,
        UnaryOperator, VarDecl, VarKind,
    },
    stack::ensure_sufficient_stack,
    tokenizer::{Token, TokenKind},
};

/// Deepest parse-context stack accepted before giving up on a nested
/// statement or expression.
pub const MAX_NESTING: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// The offending token; `None` when input ended early.
    pub found: Option<Token>,
    pub context: Vec<&'static str>,
}

impl std::error::Error for SyntaxError {}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "While parsing {}", self.context.join(" > "))?;
        write!(f, "{}", self.kind)?;
        match &self.found {
            Some(token) => write!(
                f,
                " at {} but found {} \"{}\"",
                token.position(),
                token.kind,
                token
            ),
            None => write!(f, " but reached end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("Expected {0}")]
    Expected(Expected),
    #[error("Expected one of {0:?}")]
    ExpectedOneOf(Vec<&'static str>),
    #[error("Unexpected token")]
    UnexpectedToken,
    #[error("Unknown type \"{0}\"")]
    UnknownType(String),
    #[error("Invalid number literal \"{0}\"")]
    InvalidNumber(String),
    #[error("Nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Token(TokenKind, &'static str),
    Identifier,
    TypeName,
    Expression,
}

impl Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Token(kind, text) => write!(f, "{kind} \"{text}\""),
            Expected::Identifier => write!(f, "identifier"),
            Expected::TypeName => write!(f, "type name"),
            Expected::Expression => write!(f, "expression"),
        }
    }
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    /// Like `push`, but fails once the context stack is `MAX_NESTING` deep.
    fn nest(&self, name: &'static str, tokens: &[Token]) -> Result<ParseContextGuard, SyntaxError> {
        if self.stack.borrow().len() >= MAX_NESTING {
            return Err(self.error(SyntaxErrorKind::NestingTooDeep(MAX_NESTING), tokens));
        }
        Ok(self.push(name))
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, kind: SyntaxErrorKind, tokens: &[Token]) -> SyntaxError {
        SyntaxError {
            kind,
            found: tokens.first().cloned(),
            context: self.stack.borrow().clone(),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

type ParseResult<'a, T> = Result<(T, &'a [Token]), SyntaxError>;

/// Parses a whole token stream. Comment tokens are ignored.
pub fn program(tokens: &[Token]) -> Result<Program, SyntaxError> {
    let tokens: Vec<Token> = tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Comment)
        .cloned()
        .collect();

    let context = ParseContext::new();
    let _guard = context.push("program");

    let mut statements = Vec::new();
    let mut tokens = tokens.as_slice();
    loop {
        tokens = skip_semicolons(tokens);
        if tokens.is_empty() {
            break;
        }
        let (stmt, rest) = statement(&context, tokens)?;
        statements.push(stmt);
        tokens = rest;
    }

    tracing::debug!(statements = statements.len(), "parsed program");
    Ok(Program(statements))
}

fn skip_semicolons(mut tokens: &[Token]) -> &[Token] {
    while peek_is(tokens, TokenKind::Punctuation, ";") {
        tokens = &tokens[1..];
    }
    tokens
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.nest("statement", tokens)?;
    ensure_sufficient_stack(|| statement_kind(context, tokens))
}

fn statement_kind<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let keyword = match tokens.first() {
        Some(token) if token.kind == TokenKind::Keyword => token.text.as_str(),
        _ => "",
    };

    match keyword {
        "fn" => {
            let (decl, rest) = function(context, &tokens[1..])?;
            Ok((Statement::FunctionDeclaration(Rc::new(decl)), rest))
        }
        "local" => var_declaration(context, VarKind::Local, &tokens[1..]),
        "const" => var_declaration(context, VarKind::Const, &tokens[1..]),
        "class" => class_declaration(context, &tokens[1..]),
        "if" => {
            let (if_statement, rest) = if_statement(context, &tokens[1..])?;
            Ok((Statement::If(if_statement), rest))
        }
        "for" => for_statement(context, &tokens[1..]),
        "while" => while_statement(context, &tokens[1..]),
        "return" => return_statement(context, &tokens[1..]),
        "print" => print_statement(context, &tokens[1..]),
        _ => expression_statement(context, tokens),
    }
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut tokens = consume(context, tokens, TokenKind::Punctuation, "{")?;
    let mut statements = Vec::new();

    loop {
        tokens = skip_semicolons(tokens);
        match tokens.first() {
            Some(token) if token.is(TokenKind::Punctuation, "}") => {
                return Ok((statements, &tokens[1..]));
            }
            Some(_) => {
                let (stmt, rest) = statement(context, tokens)?;
                statements.push(stmt);
                tokens = rest;
            }
            None => {
                return Err(context.error(
                    SyntaxErrorKind::Expected(Expected::Token(TokenKind::Punctuation, "}")),
                    tokens,
                ))
            }
        }
    }
}

fn function<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, FunctionDecl> {
    let _guard = context.push("function");
    let (name, tokens) = match_identifier(context, tokens)?;
    let mut tokens = consume(context, tokens, TokenKind::Punctuation, "(")?;
    let mut params = vec![];

    if peek_is(tokens, TokenKind::Punctuation, ")") {
        tokens = &tokens[1..];
    } else {
        loop {
            let (param_name, rest) = match_identifier(context, tokens)?;
            let (declared_type, rest) = if peek_is(rest, TokenKind::Punctuation, ":") {
                let (declared_type, rest) = type_name(context, &rest[1..])?;
                (Some(declared_type), rest)
            } else {
                (None, rest)
            };
            params.push(Param {
                name: param_name,
                declared_type,
            });
            tokens = rest;

            match tokens.first() {
                Some(token) if token.is(TokenKind::Punctuation, ",") => tokens = &tokens[1..],
                Some(token) if token.is(TokenKind::Punctuation, ")") => {
                    tokens = &tokens[1..];
                    break;
                }
                _ => {
                    return Err(
                        context.error(SyntaxErrorKind::ExpectedOneOf(vec![",", ")"]), tokens)
                    )
                }
            }
        }
    }

    let (return_type, tokens) = if peek_is(tokens, TokenKind::Punctuation, ":") {
        let (return_type, rest) = type_name(context, &tokens[1..])?;
        (Some(return_type), rest)
    } else {
        (None, tokens)
    };

    let (body, tokens) = block(context, tokens)?;
    Ok((
        FunctionDecl {
            name,
            params,
            return_type,
            body,
        },
        tokens,
    ))
}

fn var_declaration<'a>(
    context: &ParseContext,
    kind: VarKind,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("var_declaration");
    let (declared_type, tokens) = type_name(context, tokens)?;
    let tokens = consume(context, tokens, TokenKind::Punctuation, ":")?;
    let (name, tokens) = match_identifier(context, tokens)?;
    let (init, tokens) = if peek_is(tokens, TokenKind::Operator, "=") {
        let (init, rest) = expression(context, &tokens[1..])?;
        (Some(init), rest)
    } else {
        (None, tokens)
    };

    Ok((
        Statement::VarDeclaration(VarDecl {
            kind,
            declared_type,
            name,
            init,
        }),
        tokens,
    ))
}

fn class_declaration<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("class_declaration");
    let (name, tokens) = match_identifier(context, tokens)?;
    let mut tokens = consume(context, tokens, TokenKind::Punctuation, "{")?;
    let mut body = Vec::new();

    loop {
        tokens = skip_semicolons(tokens);
        match tokens.first() {
            Some(token) if token.is(TokenKind::Punctuation, "}") => {
                tokens = &tokens[1..];
                break;
            }
            Some(token) if token.is(TokenKind::Keyword, "fn") => {
                let (method, rest) = function(context, &tokens[1..])?;
                body.push(Rc::new(method));
                tokens = rest;
            }
            Some(_) => {
                return Err(context.error(
                    SyntaxErrorKind::Expected(Expected::Token(TokenKind::Keyword, "fn")),
                    tokens,
                ))
            }
            None => {
                return Err(context.error(
                    SyntaxErrorKind::Expected(Expected::Token(TokenKind::Punctuation, "}")),
                    tokens,
                ))
            }
        }
    }

    Ok((Statement::ClassDeclaration(ClassDecl { name, body }), tokens))
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, IfStatement> {
    let _guard = context.push("if_statement");
    let (test, tokens) = expression(context, tokens)?;
    let (consequent, tokens) = block(context, tokens)?;

    let (alternate, tokens) = match tokens.first() {
        Some(token) if token.is(TokenKind::Keyword, "elseif") => {
            let (next, rest) = if_statement(context, &tokens[1..])?;
            (Some(Alternate::ElseIf(Box::new(next))), rest)
        }
        Some(token) if token.is(TokenKind::Keyword, "else") => {
            let (else_block, rest) = block(context, &tokens[1..])?;
            (Some(Alternate::Else(else_block)), rest)
        }
        _ => (None, tokens),
    };

    Ok((
        IfStatement {
            test,
            consequent,
            alternate,
        },
        tokens,
    ))
}

fn for_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("for_statement");
    let (var, tokens) = match_identifier(context, tokens)?;

    if peek_is(tokens, TokenKind::Keyword, "in") {
        let (iterator, tokens) = expression(context, &tokens[1..])?;
        let (body, tokens) = block(context, tokens)?;
        return Ok((
            Statement::ForIn(ForInStatement {
                var,
                iterator,
                body,
            }),
            tokens,
        ));
    }

    let tokens = consume(context, tokens, TokenKind::Operator, "=")?;
    let (start, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenKind::Punctuation, ",")?;
    let (end, tokens) = expression(context, tokens)?;
    let (step, tokens) = if peek_is(tokens, TokenKind::Punctuation, ",") {
        let (step, rest) = expression(context, &tokens[1..])?;
        (Some(step), rest)
    } else {
        (None, tokens)
    };
    let (body, tokens) = block(context, tokens)?;

    Ok((
        Statement::For(ForStatement {
            var,
            start,
            end,
            step,
            body,
        }),
        tokens,
    ))
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("while_statement");
    let (condition, tokens) = expression(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((Statement::While(condition, body), tokens))
}

fn return_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("return_statement");
    match tokens.first() {
        None => Ok((Statement::Return(None), tokens)),
        Some(token)
            if token.is(TokenKind::Punctuation, "}") || token.is(TokenKind::Punctuation, ";") =>
        {
            Ok((Statement::Return(None), tokens))
        }
        Some(_) => {
            let (expr, rest) = expression(context, tokens)?;
            Ok((Statement::Return(Some(expr)), rest))
        }
    }
}

fn print_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let _guard = context.push("print_statement");
    let (expr, rest) = expression(context, tokens)?;
    Ok((Statement::Print(expr), rest))
}

fn expression_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> ParseResult<'a, Statement> {
    let _guard = context.push("expression_statement");
    let (expr, rest) = expression(context, tokens)?;
    Ok((Statement::Expression(expr), rest))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.push("expression");
    binary(context, tokens, 0)
}

/// Precedence climbing: folds operators binding tighter than `min_precedence`
/// into a left-deepening tree.
fn binary<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    min_precedence: u8,
) -> ParseResult<'a, Expression> {
    let (mut expr, mut tokens) = primary(context, tokens)?;

    while let Some(op) = tokens.first().and_then(infix_operator) {
        if op.precedence() <= min_precedence {
            break;
        }
        let (right, rest) = binary(context, &tokens[1..], op.precedence())?;
        expr = Expression::Binary(Box::new(expr), op, Box::new(right));
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn infix_operator(token: &Token) -> Option<InfixOperator> {
    match token.kind {
        TokenKind::Operator | TokenKind::Keyword => InfixOperator::from_symbol(&token.text),
        _ => None,
    }
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let _guard = context.nest("primary", tokens)?;
    ensure_sufficient_stack(|| primary_kind(context, tokens))
}

fn primary_kind<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let Some(token) = tokens.first() else {
        return Err(context.error(SyntaxErrorKind::Expected(Expected::Expression), tokens));
    };
    let rest = &tokens[1..];

    match token.kind {
        TokenKind::Number => match token.text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok((Expression::Literal(Literal::Number(n)), rest)),
            _ => Err(context.error(
                SyntaxErrorKind::InvalidNumber(token.text.clone()),
                tokens,
            )),
        },
        TokenKind::String => Ok((
            Expression::Literal(Literal::String(token.text.clone())),
            rest,
        )),
        TokenKind::Keyword => match token.text.as_str() {
            "true" => Ok((Expression::Literal(Literal::Boolean(true)), rest)),
            "false" => Ok((Expression::Literal(Literal::Boolean(false)), rest)),
            "nil" => Ok((Expression::Literal(Literal::Nil), rest)),
            "not" => {
                let (argument, rest) = primary(context, rest)?;
                Ok((
                    Expression::Unary(UnaryOperator::Not, Box::new(argument)),
                    rest,
                ))
            }
            _ => Err(context.error(SyntaxErrorKind::UnexpectedToken, tokens)),
        },
        TokenKind::Operator if token.text == "-" => {
            let (argument, rest) = primary(context, rest)?;
            Ok((
                Expression::Unary(UnaryOperator::Negate, Box::new(argument)),
                rest,
            ))
        }
        TokenKind::Punctuation if token.text == "(" => {
            let (expr, rest) = expression(context, rest)?;
            let rest = consume(context, rest, TokenKind::Punctuation, ")")?;
            Ok((expr, rest))
        }
        // Type names double as ordinary names in expressions, e.g. `array(1, 2)`.
        TokenKind::Identifier | TokenKind::TypeName => {
            postfix(context, Expression::Identifier(token.text.clone()), rest)
        }
        _ => Err(context.error(SyntaxErrorKind::UnexpectedToken, tokens)),
    }
}

/// Absorbs `.name` and `(args)` suffixes left to right.
fn postfix<'a>(
    context: &ParseContext,
    mut expr: Expression,
    mut tokens: &'a [Token],
) -> ParseResult<'a, Expression> {
    let _guard = context.push("postfix");
    loop {
        match tokens.first() {
            Some(token) if token.is(TokenKind::Punctuation, ".") => {
                let (name, rest) = match_identifier(context, &tokens[1..])?;
                expr = Expression::Member(Box::new(expr), name);
                tokens = rest;
            }
            Some(token) if token.is(TokenKind::Punctuation, "(") => {
                let (args, rest) = arguments(context, &tokens[1..])?;
                expr = Expression::Call(Box::new(expr), args);
                tokens = rest;
            }
            _ => return Ok((expr, tokens)),
        }
    }
}

fn arguments<'a>(
    context: &ParseContext,
    mut tokens: &'a [Token],
) -> ParseResult<'a, Vec<Expression>> {
    let _guard = context.push("arguments");
    let mut args = Vec::new();

    if peek_is(tokens, TokenKind::Punctuation, ")") {
        return Ok((args, &tokens[1..]));
    }

    loop {
        let (arg, rest) = expression(context, tokens)?;
        args.push(arg);
        tokens = rest;
        match tokens.first() {
            Some(token) if token.is(TokenKind::Punctuation, ",") => tokens = &tokens[1..],
            Some(token) if token.is(TokenKind::Punctuation, ")") => {
                return Ok((args, &tokens[1..]));
            }
            _ => {
                return Err(context.error(SyntaxErrorKind::ExpectedOneOf(vec![",", ")"]), tokens))
            }
        }
    }
}

fn peek_is(tokens: &[Token], kind: TokenKind, text: &str) -> bool {
    tokens.first().is_some_and(|token| token.is(kind, text))
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    kind: TokenKind,
    text: &'static str,
) -> Result<&'a [Token], SyntaxError> {
    if peek_is(tokens, kind, text) {
        Ok(&tokens[1..])
    } else {
        Err(context.error(
            SyntaxErrorKind::Expected(Expected::Token(kind, text)),
            tokens,
        ))
    }
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, String> {
    match tokens.first() {
        Some(token) if token.kind == TokenKind::Identifier => {
            Ok((token.text.clone(), &tokens[1..]))
        }
        _ => Err(context.error(SyntaxErrorKind::Expected(Expected::Identifier), tokens)),
    }
}

fn type_name<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, TypeName> {
    let _guard = context.push("type_name");
    match tokens.first() {
        Some(token)
            if token.kind == TokenKind::TypeName || token.is(TokenKind::Keyword, "nil") =>
        {
            match TypeName::from_name(&token.text) {
                Some(type_name) => Ok((type_name, &tokens[1..])),
                None => Err(context.error(
                    SyntaxErrorKind::UnknownType(token.text.clone()),
                    tokens,
                )),
            }
        }
        Some(token) if token.kind == TokenKind::Identifier => Err(context.error(
            SyntaxErrorKind::UnknownType(token.text.clone()),
            tokens,
        )),
        _ => Err(context.error(SyntaxErrorKind::Expected(Expected::TypeName), tokens)),
    }
}
