use std::{fmt::Display, rc::Rc};

use crate::{ast::FunctionDecl, stack::ensure_sufficient_stack};

use super::{
    scope::{Declarable, Scope},
    Flow, Interpreter, RuntimeError, Value, MAX_CALL_DEPTH,
};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A host-supplied function. Receives the evaluated arguments as-is; any
/// arity or type checking is its own business.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub function: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<FunctionDecl>),
    Builtin(Builtin),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Function(decl) => &decl.name,
            Callable::Builtin(builtin) => builtin.name,
        }
    }

    pub fn same_as(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Builtin(a), Callable::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(decl) => call_function(decl, interpreter, args),
            Callable::Builtin(builtin) => {
                tracing::trace!(builtin = builtin.name, args = args.len(), "call");
                (builtin.function)(&args)
            }
        }
    }
}

fn check_arguments(decl: &FunctionDecl, args: &[Value]) -> Result<(), RuntimeError> {
    if args.len() != decl.params.len() {
        return Err(RuntimeError::ArityMismatch {
            function: decl.name.clone(),
            expected: decl.params.len(),
            found: args.len(),
        });
    }

    for (index, (param, arg)) in decl.params.iter().zip(args).enumerate() {
        let Some(expected) = param.declared_type else {
            continue;
        };
        if expected.is_checked() && arg.type_name() != expected {
            return Err(RuntimeError::ArgumentType {
                function: decl.name.clone(),
                index: index + 1,
                expected,
                found: arg.type_name(),
            });
        }
    }

    Ok(())
}

fn call_function(
    decl: &FunctionDecl,
    interpreter: &mut Interpreter,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arguments(decl, &args)?;
    if interpreter.depth >= MAX_CALL_DEPTH {
        return Err(RuntimeError::StackOverflow {
            depth: MAX_CALL_DEPTH,
        });
    }
    tracing::trace!(function = %decl.name, args = args.len(), depth = interpreter.depth, "call");

    // Free variables resolve through the caller's scope, not the declaring one.
    let scope = Scope::boxed(Some(interpreter.scope.clone()));
    for (param, arg) in decl.params.iter().zip(args) {
        scope
            .borrow_mut()
            .declare(param.name.clone(), Declarable::Variable(arg))?;
    }

    interpreter.depth += 1;
    let flow = ensure_sufficient_stack(|| {
        interpreter.execute_in_scope(scope, |interpreter| interpreter.execute_block(&decl.body))
    });
    interpreter.depth -= 1;
    let flow = flow?;
    let result = match flow {
        Flow::Return(value) => value,
        Flow::Normal(_) => Value::Nil,
    };

    if let Some(expected) = decl.return_type {
        if expected.is_checked() && result.type_name() != expected {
            return Err(RuntimeError::ReturnType {
                function: decl.name.clone(),
                expected,
                found: result.type_name(),
            });
        }
    }

    tracing::trace!(function = %decl.name, result = %result, "return");
    Ok(result)
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Function(_) => write!(f, "<fn {}>", self.name()),
            Callable::Builtin(_) => write!(f, "<builtin {}>", self.name()),
        }
    }
}
