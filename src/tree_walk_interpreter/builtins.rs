use std::rc::Rc;

use crate::ast::TypeName;

use super::{callable::Builtin, RuntimeError, Value};

/// Registered into every fresh global scope.
pub const STANDARD: &[Builtin] = &[
    Builtin {
        name: "array",
        function: array,
    },
    Builtin {
        name: "len",
        function: len,
    },
    Builtin {
        name: "type",
        function: type_of,
    },
    Builtin {
        name: "tostring",
        function: tostring,
    },
];

fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::ArityMismatch {
            function: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn array(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Array(Rc::new(args.to_vec())))
}

fn len(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("len", args, 1)?;
    match &args[0] {
        Value::Array(items) => Ok(Value::Number(items.len() as f64)),
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(RuntimeError::ArgumentType {
            function: "len".to_string(),
            index: 1,
            expected: TypeName::Array,
            found: other.type_name(),
        }),
    }
}

fn type_of(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("type", args, 1)?;
    Ok(Value::String(args[0].type_name().to_string()))
}

fn tostring(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity("tostring", args, 1)?;
    Ok(Value::String(args[0].to_string()))
}
