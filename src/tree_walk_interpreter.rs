mod builtins;
mod callable;
mod class;
mod operator;
mod scope;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    io::Write,
    rc::Rc,
};

use crate::ast::{
    Alternate, Expression, ForInStatement, ForStatement, IfStatement, InfixOperator, Literal,
    Program, Statement, TypeName, UnaryOperator, VarKind,
};

pub use self::{
    callable::{Builtin, BuiltinFn, Callable},
    class::Class,
};
use self::scope::{Declarable, Scope};

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Array(Rc<Vec<Value>>),
    Callable(Callable),
    Class(Rc<Class>),
    Nil,
}

impl Value {
    /// Everything except `nil` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Number(_) => TypeName::Number,
            Value::String(_) => TypeName::String,
            Value::Boolean(_) => TypeName::Bool,
            Value::Array(_) => TypeName::Array,
            Value::Callable(_) => TypeName::Function,
            Value::Class(_) => TypeName::Class,
            Value::Nil => TypeName::Nil,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Callable(a), Value::Callable(b)) => a.same_as(b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Callable(c) => write!(f, "{}", c),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Nil => write!(f, "nil"),
        }
    }
}

/// Outcome of executing a statement. Only `return` produces `Return`, which
/// unwinds to the nearest function body (or ends the program at top level).
#[derive(Debug)]
enum Flow {
    Normal(Value),
    Return(Value),
}

/// Deepest chain of nested function calls before `StackOverflow` is raised.
pub const MAX_CALL_DEPTH: usize = 3_000;

pub struct Interpreter {
    scope: Rc<RefCell<Scope>>,
    stdout: Rc<RefCell<dyn Write>>,
    depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("depth", &self.depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Error executing statement: {statement}\n{kind}")]
pub struct ExecutionError {
    #[source]
    pub kind: RuntimeError,
    pub statement: Statement,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Attempt to call non-function value of type {0}")]
    NotCallable(TypeName),
    #[error("Function {function} expects {expected} arguments but got {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("Bad argument #{index} to {function}: expected {expected}, got {found}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: TypeName,
        found: TypeName,
    },
    #[error("Function {function} must return {expected}, got {found}")]
    ReturnType {
        function: String,
        expected: TypeName,
        found: TypeName,
    },
    #[error("Invalid operands for {operator}: {left} and {right}")]
    InvalidOperands {
        operator: InfixOperator,
        left: TypeName,
        right: TypeName,
    },
    #[error("Invalid operand for {operator}: {operand}")]
    InvalidOperand {
        operator: UnaryOperator,
        operand: TypeName,
    },
    #[error("No field {field} on {object}")]
    NoSuchField { object: String, field: String },
    #[error("Attempt to index a {0} value")]
    NotIndexable(TypeName),
    #[error("Attempt to iterate over a {0} value")]
    NotIterable(TypeName),
    #[error("For loop bounds and step must be numbers, got {0}")]
    InvalidForBound(TypeName),
    #[error("Cannot rebind constant {0}")]
    ConstRebinding(String),
    #[error("Stack overflow: more than {depth} nested calls")]
    StackOverflow { depth: usize },
}

impl Interpreter {
    /// Creates an interpreter with a fresh global scope holding the standard
    /// built-ins. `print` output goes to `stdout`.
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let mut interpreter = Self {
            scope: Scope::boxed(None),
            stdout,
            depth: 0,
        };

        for builtin in builtins::STANDARD {
            interpreter.register_builtin(builtin.name, builtin.function);
        }

        interpreter
    }

    /// Binds a host function into the global scope, replacing any previous
    /// binding of the same name.
    pub fn register_builtin(&mut self, name: &'static str, function: BuiltinFn) {
        let mut global = self.scope.borrow_mut();
        let builtin = Value::Callable(Callable::Builtin(Builtin { name, function }));
        if global
            .declare(name.to_string(), Declarable::Variable(builtin))
            .is_err()
        {
            tracing::warn!(name, "builtin shadowed by a constant, not registered");
        }
    }

    /// Runs every top-level statement and yields the value of the last one.
    /// A top-level `return` stops the program early with its value.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.0.len()))]
    pub fn interpret(&mut self, program: &Program) -> Result<Value, ExecutionError> {
        let mut last = Value::Nil;
        for stmt in program.0.iter() {
            match self.execute(stmt) {
                Ok(Flow::Normal(value)) => last = value,
                Ok(Flow::Return(value)) => return Ok(value),
                Err(kind) => {
                    return Err(ExecutionError {
                        kind,
                        statement: stmt.clone(),
                    })
                }
            }
        }

        Ok(last)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        let result = match stmt {
            Statement::Expression(expression) => Flow::Normal(self.evaluate(expression)?),
            Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.stdout.borrow_mut(), "{}", value)?;
                Flow::Normal(Value::Nil)
            }
            Statement::VarDeclaration(decl) => {
                let value = match &decl.init {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                let declarable = match decl.kind {
                    VarKind::Local => Declarable::Variable(value),
                    VarKind::Const => Declarable::Constant(value),
                };
                self.declare(&decl.name, declarable)?;
                Flow::Normal(Value::Nil)
            }
            Statement::FunctionDeclaration(decl) => {
                self.declare(
                    &decl.name,
                    Declarable::Variable(Value::Callable(Callable::Function(decl.clone()))),
                )?;
                Flow::Normal(Value::Nil)
            }
            Statement::ClassDeclaration(decl) => {
                let class = Class::from_declaration(decl);
                self.declare(&decl.name, Declarable::Variable(Value::Class(Rc::new(class))))?;
                Flow::Normal(Value::Nil)
            }
            Statement::If(if_statement) => self.execute_if(if_statement)?,
            Statement::For(for_statement) => self.execute_for(for_statement)?,
            Statement::ForIn(for_in) => self.execute_for_in(for_in)?,
            Statement::While(condition, body) => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Flow::Normal(Value::Nil)
            }
            Statement::Return(expression) => match expression {
                Some(expression) => Flow::Return(self.evaluate(expression)?),
                None => Flow::Return(Value::Nil),
            },
        };

        Ok(result)
    }

    /// Blocks share the current scope; only calls open a new one.
    fn execute_block(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        let mut last = Value::Nil;
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal(value) => last = value,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn execute_if(&mut self, if_statement: &IfStatement) -> Result<Flow, RuntimeError> {
        if self.evaluate(&if_statement.test)?.is_truthy() {
            self.execute_block(&if_statement.consequent)
        } else {
            match &if_statement.alternate {
                Some(Alternate::ElseIf(next)) => self.execute_if(next),
                Some(Alternate::Else(block)) => self.execute_block(block),
                None => Ok(Flow::Normal(Value::Nil)),
            }
        }
    }

    fn execute_for(&mut self, for_statement: &ForStatement) -> Result<Flow, RuntimeError> {
        let start = self.evaluate(&for_statement.start)?;
        let end = self.evaluate(&for_statement.end)?;
        let (Value::Number(_), Value::Number(end)) = (&start, &end) else {
            let offender = if matches!(start, Value::Number(_)) {
                &end
            } else {
                &start
            };
            return Err(RuntimeError::InvalidForBound(offender.type_name()));
        };
        let end = *end;

        // The loop variable lives in the enclosing scope and is re-read every
        // iteration, so the body may rebind it.
        self.declare(&for_statement.var, Declarable::Variable(start))?;
        while self.loop_counter(&for_statement.var)? <= end {
            if let Flow::Return(value) = self.execute_block(&for_statement.body)? {
                return Ok(Flow::Return(value));
            }

            let step = match &for_statement.step {
                Some(step) => self.evaluate(step)?,
                None => Value::Number(1.0),
            };
            let Value::Number(step) = step else {
                return Err(RuntimeError::InvalidForBound(step.type_name()));
            };
            let next = self.loop_counter(&for_statement.var)? + step;
            self.declare(&for_statement.var, Declarable::Variable(Value::Number(next)))?;
        }

        Ok(Flow::Normal(Value::Nil))
    }

    fn loop_counter(&self, name: &str) -> Result<f64, RuntimeError> {
        match self.lookup(name)? {
            Value::Number(n) => Ok(n),
            other => Err(RuntimeError::InvalidForBound(other.type_name())),
        }
    }

    fn execute_for_in(&mut self, for_in: &ForInStatement) -> Result<Flow, RuntimeError> {
        let items = match self.evaluate(&for_in.iterator)? {
            Value::Array(items) => items,
            other => return Err(RuntimeError::NotIterable(other.type_name())),
        };

        for item in items.iter() {
            self.declare(&for_in.var, Declarable::Variable(item.clone()))?;
            if let Flow::Return(value) = self.execute_block(&for_in.body)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal(Value::Nil))
    }

    /// Swaps in `scope` for the duration of `f`. The previous scope is put
    /// back whether `f` succeeds or fails.
    fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<Scope>>,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        result
    }

    fn declare(&mut self, name: &str, declarable: Declarable) -> Result<(), RuntimeError> {
        self.scope
            .borrow_mut()
            .declare(name.to_string(), declarable)
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        self.scope
            .borrow()
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        match expression {
            Expression::Identifier(name) => self.lookup(name),
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Nil => Value::Nil,
            }),
            Expression::Binary(a, op, b) => {
                let a = self.evaluate(a)?;
                let b = self.evaluate(b)?;
                operator::binary(*op, a, b)
            }
            Expression::Unary(op, x) => {
                let x = self.evaluate(x)?;
                operator::unary(*op, x)
            }
            Expression::Member(object, name) => {
                let object = self.evaluate(object)?;
                self.member(object, name)
            }
            Expression::Call(callee, args) => {
                let callee = self.evaluate(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                match callee {
                    Value::Callable(callable) => callable.call(self, args),
                    other => Err(RuntimeError::NotCallable(other.type_name())),
                }
            }
        }
    }

    fn member(&self, object: Value, name: &str) -> Result<Value, RuntimeError> {
        match &object {
            Value::Class(class) => class
                .find_method(name)
                .map(|method| Value::Callable(Callable::Function(method.clone())))
                .ok_or_else(|| RuntimeError::NoSuchField {
                    object: format!("class {}", class.name),
                    field: name.to_string(),
                }),
            Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
            Value::Array(_) => Err(RuntimeError::NoSuchField {
                object: "array".to_string(),
                field: name.to_string(),
            }),
            other => Err(RuntimeError::NotIndexable(other.type_name())),
        }
    }
}
