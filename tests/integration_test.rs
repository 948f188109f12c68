use std::{cell::RefCell, rc::Rc};

use lumen::{
    ast::{InfixOperator, Program, TypeName},
    tree_walk_interpreter::{ExecutionError, Interpreter, RuntimeError, Value, MAX_CALL_DEPTH},
};
use pretty_assertions::assert_eq;

fn parse(source: &str) -> Program {
    let tokens = lumen::tokenizer::tokens(source).expect("Tokenize should work on valid program");
    lumen::parser::program(&tokens).expect("Parse should work on valid program")
}

fn run(program: &Program) -> (Result<Value, ExecutionError>, String) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    let result = interpreter.interpret(program);
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (result, output) = run(&parse(source));
    result.expect("Interpret should work on valid program");
    assert_eq!(output, expected_output);
}

fn evaluate(source: &str) -> Value {
    let (result, _) = run(&parse(source));
    result.expect("Interpret should work on valid program")
}

fn runtime_error(source: &str) -> RuntimeError {
    let (result, _) = run(&parse(source));
    result.expect_err("Interpret should fail").kind
}

#[test]
fn test_precedence() {
    assert_eq!(evaluate("1 + 2 * 3"), Value::Number(7.0));
    assert_eq!(evaluate("(1 + 2) * 3"), Value::Number(9.0));
    assert_eq!(evaluate("2 ^ 3 ^ 2"), Value::Number(64.0));
}

#[test]
fn test_subtraction_is_left_associative() {
    assert_eq!(evaluate("10 - 3 - 2"), Value::Number(5.0));
}

#[test]
fn test_plus_on_numbers_and_strings() {
    assert_eq!(evaluate("1 + 2"), Value::Number(3.0));
    assert_eq!(evaluate("\"a\" + \"b\""), Value::String("ab".to_string()));
    assert!(matches!(
        runtime_error("1 + \"a\""),
        RuntimeError::InvalidOperands {
            operator: InfixOperator::Plus,
            left: TypeName::Number,
            right: TypeName::String,
        }
    ));
}

#[test]
fn test_concat_coerces_any_operand() {
    assert_eq!(evaluate("1 .. \"x\""), Value::String("1x".to_string()));
    assert_eq!(
        evaluate("nil .. true .. 2.5"),
        Value::String("niltrue2.5".to_string())
    );
}

#[test]
fn test_arithmetic_requires_numbers() {
    assert_eq!(evaluate("7 % 4 + 9 / 2"), Value::Number(7.5));
    assert!(matches!(
        runtime_error("\"a\" * 2"),
        RuntimeError::InvalidOperands {
            operator: InfixOperator::Multiply,
            ..
        }
    ));
    assert!(matches!(
        runtime_error("-\"a\""),
        RuntimeError::InvalidOperand {
            operand: TypeName::String,
            ..
        }
    ));
}

#[test]
fn test_comparisons() {
    assert_eq!(evaluate("\"apple\" < \"banana\""), Value::Boolean(true));
    assert_eq!(evaluate("3 >= 3"), Value::Boolean(true));
    assert_eq!(evaluate("1 == \"1\""), Value::Boolean(false));
    assert_eq!(evaluate("nil != false"), Value::Boolean(true));
    assert!(matches!(
        runtime_error("1 < \"2\""),
        RuntimeError::InvalidOperands {
            operator: InfixOperator::LessThan,
            ..
        }
    ));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(evaluate("nil or \"default\""), Value::String("default".to_string()));
    assert_eq!(evaluate("1 and 2"), Value::Number(2.0));
    assert_eq!(evaluate("false and 2"), Value::Boolean(false));
    assert_eq!(evaluate("not 0"), Value::Boolean(false));
}

#[test]
fn test_logical_operators_evaluate_both_sides() {
    let source = r#"
    fn noisy(x) {
        print "evaluated"
        return x
    }
    print true or noisy(1)
    "#;
    test_valid_program(source, "evaluated\ntrue\n");
}

#[test]
fn test_fib() {
    let source = r#"
    fn fib(n: number): number {
        if n <= 1 { return n }
        return fib(n - 1) + fib(n - 2)
    }

    for i = 0, 9 {
        print fib(i)
    }
    "#;
    let expected_output = "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_numeric_for_is_inclusive() {
    test_valid_program("for i = 1, 3 { print(i) }", "1\n2\n3\n");
    test_valid_program("for i = 1, 3, 2 { print(i) }", "1\n3\n");
    test_valid_program("for i = 3, 1 { print(i) }", "");
}

#[test]
fn test_for_step_is_reevaluated_each_iteration() {
    let source = r#"
    local number: step = 1
    for i = 1, 20, step {
        print i
        local number: step = step * 2
    }
    "#;
    test_valid_program(source, "1\n3\n7\n15\n");
}

#[test]
fn test_for_variable_lives_in_enclosing_scope() {
    test_valid_program("for i = 1, 3 { } print i", "4\n");
}

#[test]
fn test_for_rejects_non_numeric_bounds() {
    assert!(matches!(
        runtime_error("for i = 1, \"ten\" { }"),
        RuntimeError::InvalidForBound(TypeName::String)
    ));
}

#[test]
fn test_for_in_over_array() {
    let source = r#"
    local array: xs = array(10, "b", nil)
    for x in xs { print x }
    print xs.length
    print len(xs)
    "#;
    test_valid_program(source, "10\nb\nnil\n3\n3\n");
}

#[test]
fn test_for_in_requires_array() {
    assert!(matches!(
        runtime_error("for x in \"abc\" { }"),
        RuntimeError::NotIterable(TypeName::String)
    ));
}

#[test]
fn test_while_reevaluates_condition() {
    let source = r#"
    local number: n = 0
    while n < 3 {
        local number: n = n + 1
    }
    print n
    "#;
    test_valid_program(source, "3\n");
}

#[test]
fn test_if_elseif_else() {
    let source = r#"
    fn classify(n: number): string {
        if n < 0 { return "negative" }
        elseif n == 0 { return "zero" }
        elseif n < 10 { return "small" }
        else { return "large" }
    }
    print classify(-5)
    print classify(0)
    print classify(3)
    print classify(42)
    "#;
    test_valid_program(source, "negative\nzero\nsmall\nlarge\n");
}

#[test]
fn test_truthiness() {
    let source = r#"
    if 0 { print "0 is truthy" }
    if "" { print "empty string is truthy" }
    if nil { print "unreachable" } else { print "nil is falsy" }
    if false { print "unreachable" }
    "#;
    test_valid_program(
        source,
        "0 is truthy\nempty string is truthy\nnil is falsy\n",
    );
}

#[test]
fn test_argument_type_mismatch() {
    let source = r#"
    fn f(x: number) { return x }
    f("s")
    "#;
    match runtime_error(source) {
        RuntimeError::ArgumentType {
            function,
            index,
            expected,
            found,
        } => {
            assert_eq!(function, "f");
            assert_eq!(index, 1);
            assert_eq!(expected, TypeName::Number);
            assert_eq!(found, TypeName::String);
        }
        other => panic!("expected argument type error, got {other:?}"),
    }
}

#[test]
fn test_arity_mismatch() {
    let source = r#"
    fn f(x: number) { return x }
    f(1, 2)
    "#;
    match runtime_error(source) {
        RuntimeError::ArityMismatch {
            function,
            expected,
            found,
        } => {
            assert_eq!(function, "f");
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        }
        other => panic!("expected arity error, got {other:?}"),
    }
}

#[test]
fn test_nil_parameter_and_unchecked_types() {
    let source = r#"
    fn g(a: nil, b: table, c) { return "ok" }
    print g(nil, 1, "anything")
    "#;
    test_valid_program(source, "ok\n");
    assert!(matches!(
        runtime_error("fn g(a: nil) { } g(false)"),
        RuntimeError::ArgumentType {
            expected: TypeName::Nil,
            found: TypeName::Bool,
            ..
        }
    ));
}

#[test]
fn test_return_type_is_checked() {
    assert!(matches!(
        runtime_error("fn f(): number { return \"no\" } f()"),
        RuntimeError::ReturnType {
            expected: TypeName::Number,
            found: TypeName::String,
            ..
        }
    ));
}

#[test]
fn test_calling_non_function() {
    assert!(matches!(
        runtime_error("local number: x = 1 x()"),
        RuntimeError::NotCallable(TypeName::Number)
    ));
}

#[test]
fn test_arguments_are_evaluated_before_call_checks() {
    let prelude = r#"
    fn noisy(x) {
        print x
        return x
    }
    fn f(x: number) { }
    fn g(x: number, y: number) { }
    local number: n = 5
    "#;

    let (result, output) = run(&parse(&format!("{prelude} f(noisy(1), noisy(2))")));
    assert_eq!(output, "1\n2\n");
    assert!(matches!(
        result.expect_err("Interpret should fail").kind,
        RuntimeError::ArityMismatch { expected: 1, found: 2, .. }
    ));

    let (result, output) = run(&parse(&format!("{prelude} n(noisy(1), noisy(2))")));
    assert_eq!(output, "1\n2\n");
    assert!(matches!(
        result.expect_err("Interpret should fail").kind,
        RuntimeError::NotCallable(TypeName::Number)
    ));

    let (result, output) = run(&parse(&format!("{prelude} g(noisy(\"a\"), noisy(2))")));
    assert_eq!(output, "a\n2\n");
    assert!(matches!(
        result.expect_err("Interpret should fail").kind,
        RuntimeError::ArgumentType { index: 1, .. }
    ));
}

#[test]
fn test_deep_recursion_is_a_runtime_error() {
    let countdown = r#"
    fn down(n: number): number {
        if n == 0 { return 0 }
        return down(n - 1)
    }
    "#;

    test_valid_program(&format!("{countdown} print down(2000)"), "0\n");

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter
        .interpret(&parse(countdown))
        .expect("Declaring the function should work");

    let err = interpreter
        .interpret(&parse(&format!("down({})", MAX_CALL_DEPTH + 500)))
        .expect_err("Recursion past the limit should fail");
    assert!(matches!(
        err.kind,
        RuntimeError::StackOverflow {
            depth: MAX_CALL_DEPTH
        }
    ));

    // The failed chain unwinds completely, so the next call starts from depth zero.
    assert_eq!(
        interpreter
            .interpret(&parse(&format!("down({})", MAX_CALL_DEPTH - 1)))
            .expect("Recursion under the limit should work"),
        Value::Number(0.0)
    );
}

#[test]
fn test_undefined_variable() {
    assert!(matches!(
        runtime_error("print missing"),
        RuntimeError::UndefinedVariable(name) if name == "missing"
    ));
}

#[test]
fn test_call_scope_is_discarded_after_return() {
    let source = r#"
    fn f(x) {
        local number: inner = 1
        return x
    }
    f(1)
    print inner
    "#;
    assert!(matches!(
        runtime_error(source),
        RuntimeError::UndefinedVariable(name) if name == "inner"
    ));
}

#[test]
fn test_call_scope_is_discarded_after_failure() {
    let source = r#"
    fn fails(x) {
        local number: inner = 1
        return x + "oops"
    }
    fails(1)
    "#;
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output);
    let program = parse(source);
    assert!(interpreter.interpret(&program).is_err());

    let err = interpreter
        .interpret(&parse("print inner"))
        .expect_err("inner should not leak into the caller");
    assert!(matches!(err.kind, RuntimeError::UndefinedVariable(name) if name == "inner"));
}

#[test]
fn test_free_variables_resolve_at_call_site() {
    let source = r#"
    fn show() { print who }
    fn caller() {
        local string: who = "caller"
        show()
    }
    local string: who = "global"
    show()
    caller()
    "#;
    test_valid_program(source, "global\ncaller\n");
}

#[test]
fn test_only_return_ends_a_function_body() {
    let source = r#"
    fn f() {
        1 + 1
        print "still running"
    }
    print f()
    "#;
    test_valid_program(source, "still running\nnil\n");
}

#[test]
fn test_return_from_inside_loops() {
    let source = r#"
    fn first_over(xs, limit: number) {
        for x in xs {
            local number: i = 0
            while true {
                if x > limit { return x }
                return nil
            }
        }
        return nil
    }
    print first_over(array(1, 5, 9), 4)
    "#;
    test_valid_program(source, "nil\n");

    let source = r#"
    fn find(xs, limit: number) {
        for x in xs {
            if x > limit { return x }
        }
    }
    print find(array(1, 5, 9), 4)
    "#;
    test_valid_program(source, "5\n");
}

#[test]
fn test_top_level_return_ends_program() {
    let (result, output) = run(&parse("print 1 return 42 print 2"));
    assert_eq!(result.unwrap(), Value::Number(42.0));
    assert_eq!(output, "1\n");
}

#[test]
fn test_classes_expose_methods() {
    let source = r#"
    class Vec2 {
        fn length(x: number, y: number): number {
            return (x * x + y * y) ^ 0.5
        }
        fn describe(x, y) {
            return "(" .. x .. ", " .. y .. ")"
        }
    }
    print Vec2.length(3, 4)
    print Vec2.describe(1, 2)
    print Vec2
    "#;
    test_valid_program(source, "5\n(1, 2)\n<class Vec2>\n");
}

#[test]
fn test_missing_method() {
    assert!(matches!(
        runtime_error("class A { } A.nope()"),
        RuntimeError::NoSuchField { field, .. } if field == "nope"
    ));
    assert!(matches!(
        runtime_error("local number: x = 1 print x.y"),
        RuntimeError::NotIndexable(TypeName::Number)
    ));
}

#[test]
fn test_const_cannot_be_rebound() {
    assert!(matches!(
        runtime_error("const number: x = 1 local number: x = 2"),
        RuntimeError::ConstRebinding(name) if name == "x"
    ));
    // A call scope may shadow a global constant.
    test_valid_program(
        "const number: x = 1 fn f(x) { print x } f(2)",
        "2\n",
    );
}

#[test]
fn test_builtins() {
    let source = r#"
    fn print_it() { }
    print type(1) .. " " .. type("s") .. " " .. type(nil) .. " " .. type(print_it)
    print type(array()) .. " " .. type(true)
    print tostring(array(1, array(2, 3)))
    print len("héllo")
    print print_it .. " " .. len
    "#;
    test_valid_program(
        source,
        "number string nil function\narray bool\n[1, [2, 3]]\n5\n<fn print_it> <builtin len>\n",
    );

    assert!(matches!(
        runtime_error("len(1)"),
        RuntimeError::ArgumentType { function, index: 1, .. } if function == "len"
    ));
    assert!(matches!(
        runtime_error("len()"),
        RuntimeError::ArityMismatch { function, .. } if function == "len"
    ));
}

#[test]
fn test_host_registered_builtin() {
    fn double(args: &[Value]) -> Result<Value, RuntimeError> {
        match args {
            [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
            _ => Ok(Value::Nil),
        }
    }

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter.register_builtin("double", double);
    interpreter
        .interpret(&parse("print double(21) print double(\"x\")"))
        .unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "42\nnil\n");
}

#[test]
fn test_array_equality() {
    assert_eq!(evaluate("array(1, \"a\") == array(1, \"a\")"), Value::Boolean(true));
    assert_eq!(evaluate("array(1) == array(2)"), Value::Boolean(false));
}

#[test]
fn test_execution_error_names_failing_statement() {
    let (result, _) = run(&parse("print 1\nprint undefined_thing"));
    let err = result.unwrap_err();
    assert_eq!(err.statement.to_string(), "print undefined_thing;");
    assert!(err.to_string().contains("Undefined variable: undefined_thing"));
}

#[test]
fn test_same_program_twice_gives_same_output() {
    let program = parse(
        r#"
        fn greet(name: string) { print "hello " .. name }
        for i = 1, 3 { greet(tostring(i)) }
        "#,
    );
    let (first_result, first) = run(&program);
    let (second_result, second) = run(&program);
    assert!(first_result.is_ok() && second_result.is_ok());
    assert_eq!(first, "hello 1\nhello 2\nhello 3\n");
    assert_eq!(first, second);
}

#[test]
fn test_fresh_interpreters_do_not_share_globals() {
    let (result, _) = run(&parse("local number: shared = 1"));
    result.unwrap();
    let (result, _) = run(&parse("print shared"));
    assert!(matches!(
        result.unwrap_err().kind,
        RuntimeError::UndefinedVariable(_)
    ));
}
