use std::{fmt::Display, rc::Rc};

#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    VarDeclaration(VarDecl),
    FunctionDeclaration(Rc<FunctionDecl>),
    ClassDeclaration(ClassDecl),
    Print(Expression),
    If(IfStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    While(Expression, Vec<Statement>),
    Return(Option<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Number,
    String,
    Bool,
    Nil,
    Array,
    Class,
    Function,
    Table,
}

impl TypeName {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "number" => Some(TypeName::Number),
            "string" => Some(TypeName::String),
            "bool" => Some(TypeName::Bool),
            "nil" => Some(TypeName::Nil),
            "array" => Some(TypeName::Array),
            "Class" => Some(TypeName::Class),
            "function" => Some(TypeName::Function),
            "table" => Some(TypeName::Table),
            _ => None,
        }
    }

    /// Whether arguments declared with this type are checked at call time.
    pub fn is_checked(&self) -> bool {
        matches!(
            self,
            TypeName::Number | TypeName::String | TypeName::Bool | TypeName::Nil
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub declared_type: Option<TypeName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeName>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Local,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declared_type: TypeName,
    pub name: String,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub body: Vec<Rc<FunctionDecl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Vec<Statement>,
    pub alternate: Option<Alternate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alternate {
    ElseIf(Box<IfStatement>),
    Else(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub var: String,
    pub start: Expression,
    pub end: Expression,
    pub step: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForInStatement {
    pub var: String,
    pub iterator: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    Literal(Literal),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    Call(Box<Expression>, Vec<Expression>),
    Member(Box<Expression>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Concat,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl InfixOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "or" => Some(InfixOperator::Or),
            "and" => Some(InfixOperator::And),
            "==" => Some(InfixOperator::Equal),
            "!=" => Some(InfixOperator::NotEqual),
            "<" => Some(InfixOperator::LessThan),
            "<=" => Some(InfixOperator::LessThanOrEqual),
            ">" => Some(InfixOperator::GreaterThan),
            ">=" => Some(InfixOperator::GreaterThanOrEqual),
            ".." => Some(InfixOperator::Concat),
            "+" => Some(InfixOperator::Plus),
            "-" => Some(InfixOperator::Minus),
            "*" => Some(InfixOperator::Multiply),
            "/" => Some(InfixOperator::Divide),
            "%" => Some(InfixOperator::Modulo),
            "^" => Some(InfixOperator::Power),
            _ => None,
        }
    }

    /// Binding power; higher binds tighter. All operators are left-associative.
    pub fn precedence(&self) -> u8 {
        match self {
            InfixOperator::Or => 1,
            InfixOperator::And => 2,
            InfixOperator::Equal
            | InfixOperator::NotEqual
            | InfixOperator::LessThan
            | InfixOperator::LessThanOrEqual
            | InfixOperator::GreaterThan
            | InfixOperator::GreaterThanOrEqual => 3,
            InfixOperator::Concat | InfixOperator::Plus | InfixOperator::Minus => 4,
            InfixOperator::Multiply | InfixOperator::Divide | InfixOperator::Modulo => 5,
            InfixOperator::Power => 6,
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

fn write_block(f: &mut std::fmt::Formatter<'_>, statements: &[Statement]) -> std::fmt::Result {
    writeln!(f, "{{")?;
    for statement in statements {
        writeln!(f, "{}", statement)?;
    }
    write!(f, "}}")
}

fn write_separated<T: Display>(
    f: &mut std::fmt::Formatter<'_>,
    items: &[T],
) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        write!(f, "{item}")?;
        if i != items.len() - 1 {
            write!(f, ", ")?;
        }
    }
    Ok(())
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "{};", expr),
            Statement::Print(expr) => write!(f, "print {};", expr),
            Statement::VarDeclaration(decl) => write!(f, "{}", decl),
            Statement::FunctionDeclaration(decl) => write!(f, "{}", decl),
            Statement::ClassDeclaration(decl) => {
                writeln!(f, "class {} {{", decl.name)?;
                for method in &decl.body {
                    writeln!(f, "{}", method)?;
                }
                write!(f, "}}")
            }
            Statement::If(if_statement) => write!(f, "{}", if_statement),
            Statement::For(for_statement) => {
                write!(
                    f,
                    "for {} = {}, {}",
                    for_statement.var, for_statement.start, for_statement.end
                )?;
                if let Some(step) = &for_statement.step {
                    write!(f, ", {}", step)?;
                }
                write!(f, " ")?;
                write_block(f, &for_statement.body)
            }
            Statement::ForIn(for_in) => {
                write!(f, "for {} in {} ", for_in.var, for_in.iterator)?;
                write_block(f, &for_in.body)
            }
            Statement::While(condition, body) => {
                write!(f, "while {} ", condition)?;
                write_block(f, body)
            }
            Statement::Return(expr) => {
                if let Some(expr) = expr {
                    write!(f, "return {};", expr)
                } else {
                    write!(f, "return;")
                }
            }
        }
    }
}

impl Display for VarDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            VarKind::Local => "local",
            VarKind::Const => "const",
        };
        write!(f, "{kind} {}: {}", self.declared_type, self.name)?;
        if let Some(init) = &self.init {
            write!(f, " = {init}")?;
        }
        write!(f, ";")
    }
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn {}(", self.name)?;
        write_separated(f, &self.params)?;
        write!(f, ")")?;
        if let Some(return_type) = &self.return_type {
            write!(f, ": {return_type}")?;
        }
        write!(f, " ")?;
        write_block(f, &self.body)
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.declared_type {
            Some(declared_type) => write!(f, "{}: {}", self.name, declared_type),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Display for IfStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if {} ", self.test)?;
        write_block(f, &self.consequent)?;
        match &self.alternate {
            Some(Alternate::ElseIf(next)) => write!(f, " else{}", next),
            Some(Alternate::Else(block)) => {
                write!(f, " else ")?;
                write_block(f, block)
            }
            None => Ok(()),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Binary(left, op, right) => write!(f, "({} {} {})", left, op, right),
            Expression::Unary(op, right) => write!(f, "({}{})", op, right),
            Expression::Call(callee, args) => {
                write!(f, "{}(", callee)?;
                write_separated(f, args)?;
                write!(f, ")")
            }
            Expression::Member(object, name) => write!(f, "{}.{}", object, name),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Number => write!(f, "number"),
            TypeName::String => write!(f, "string"),
            TypeName::Bool => write!(f, "bool"),
            TypeName::Nil => write!(f, "nil"),
            TypeName::Array => write!(f, "array"),
            TypeName::Class => write!(f, "Class"),
            TypeName::Function => write!(f, "function"),
            TypeName::Table => write!(f, "table"),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Or => write!(f, "or"),
            InfixOperator::And => write!(f, "and"),
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Concat => write!(f, ".."),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Modulo => write!(f, "%"),
            InfixOperator::Power => write!(f, "^"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "not "),
        }
    }
}
