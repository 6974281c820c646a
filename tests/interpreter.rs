use aryanblock::core::interpreter::{Interpreter, RuntimeError};
use aryanblock::core::lexer::Lexer;
use aryanblock::core::parser::Parser;
use aryanblock::core::value::Value;

/// Run a program and return the final value of its `start` block.
fn eval(source: &str) -> Value {
    let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
    let program = Parser::new(tokens).parse().expect("parsing should succeed");
    Interpreter::new()
        .interpret(&program)
        .expect("evaluation should succeed")
        .expect("program should produce a value")
}

fn eval_err(source: &str) -> RuntimeError {
    let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
    let program = Parser::new(tokens).parse().expect("parsing should succeed");
    match Interpreter::new().interpret(&program) {
        Ok(value) => panic!("expected error, received {:?}", value),
        Err(err) => err,
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        other => panic!("expected int, found {}", other.type_name()),
    }
}

fn expect_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, found {}", other.type_name()),
    }
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(expect_int(&eval("start { 1 + 2 * 3 }")), 7);
}

#[test]
fn power_is_right_associative() {
    assert_eq!(expect_int(&eval("start { 2 ** 3 ** 2 }")), 512);
}

#[test]
fn integer_arithmetic_stays_integral() {
    assert!(matches!(eval("start { 2 + 3 }"), Value::Int(5)));
    assert!(matches!(eval("start { 7 % 3 }"), Value::Int(1)));
}

#[test]
fn division_always_yields_float() {
    match eval("start { 6 / 2 }") {
        Value::Float(f) => assert_eq!(f, 3.0),
        other => panic!("expected float, found {}", other.type_name()),
    }
}

#[test]
fn mixed_numeric_promotes_to_float() {
    assert!(matches!(eval("start { 1 + 2.5 }"), Value::Float(_)));
}

#[test]
fn division_by_zero_raises() {
    let err = eval_err("start { 1 / 0 }");
    assert_eq!(err.kind_name(), "ZeroDivisionError");
}

#[test]
fn string_concatenation_coerces_either_side() {
    assert_eq!(expect_str(&eval("start { \"a\" + 1 }")), "a1");
    assert_eq!(expect_str(&eval("start { 1 + \"a\" }")), "1a");
    assert_eq!(expect_str(&eval("start { \"x\" + true }")), "xtrue");
}

#[test]
fn string_interpolation() {
    let source = r#"
    start {
        let name = "Alice"
        "Hi, ${name}!"
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "Hi, Alice!");
}

#[test]
fn interpolation_evaluates_expressions() {
    assert_eq!(expect_str(&eval(r#"start { "sum=${1 + 2}" }"#)), "sum=3");
}

#[test]
fn and_or_return_operand_values() {
    assert_eq!(expect_int(&eval("start { 0 or 5 }")), 5);
    assert_eq!(expect_int(&eval("start { 3 and 7 }")), 7);
    assert!(matches!(eval("start { null and 7 }"), Value::Null));
}

#[test]
fn truthiness_table() {
    let source = r#"
    start {
        [bool(0), bool(""), bool([]), bool({}), bool(null), bool(false), bool(1), bool("x")]
    }
    "#;
    assert_eq!(
        eval(source).to_string(),
        "[false, false, false, false, false, false, true, true]"
    );
}

#[test]
fn for_over_range_is_exclusive() {
    let source = r#"
    start {
        mut visited = []
        for i in 0..3 {
            push(visited, i)
        }
        visited
    }
    "#;
    assert_eq!(eval(source).to_string(), "[0, 1, 2]");
}

#[test]
fn while_loop_with_compound_assignment() {
    let source = r#"
    start {
        mut i = 0
        mut total = 0
        while i < 4 {
            total += i
            i += 1
        }
        total
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 6);
}

#[test]
fn loop_runs_exactly_n_times() {
    let source = r#"
    start {
        mut count = 0
        loop 5 {
            count += 1
        }
        count
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 5);
}

#[test]
fn break_and_continue() {
    let source = r#"
    start {
        mut total = 0
        for i in 0..10 {
            if i == 3 {
                continue
            }
            if i == 5 {
                break
            }
            total += i
        }
        total
    }
    "#;
    // 0 + 1 + 2 + 4
    assert_eq!(expect_int(&eval(source)), 7);
}

#[test]
fn recursive_factorial() {
    let source = r#"
    func factorial(n: int) -> int {
        if n <= 1 {
            return 1
        }
        return n * factorial(n - 1)
    }
    start {
        factorial(5)
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 120);
}

#[test]
fn closures_capture_by_reference() {
    let source = r#"
    func make_counter() {
        mut count = 0
        func increment() {
            count += 1
            return count
        }
        return increment
    }
    start {
        let counter = make_counter()
        counter()
        counter()
        counter()
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 3);
}

#[test]
fn lambdas_close_over_definition_scope() {
    let source = r#"
    start {
        let base = 10
        let add = (x) => x + base
        add(5)
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 15);
}

#[test]
fn lambda_with_multiple_params() {
    let source = r#"
    start {
        let mul = (a, b) => a * b
        mul(6, 7)
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 42);
}

#[test]
fn default_parameter_values() {
    let source = r#"
    func greet(name = "world") {
        return "hi " + name
    }
    start {
        greet()
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "hi world");
}

#[test]
fn missing_argument_without_default_is_null() {
    let source = r#"
    func id(x) {
        return x
    }
    start {
        id()
    }
    "#;
    assert!(matches!(eval(source), Value::Null));
}

#[test]
fn counter_class() {
    let source = r#"
    class Counter {
        mut value: int
        init(start: int) {
            self.value = start
        }
        func increment() {
            self.value += 1
        }
        func get() -> int {
            return self.value
        }
    }
    start {
        let c = Counter(0)
        c.increment()
        c.increment()
        c.get()
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 2);
}

#[test]
fn subclass_overrides_dispatch() {
    let source = r#"
    class Animal {
        let name: string
        init(name: string) {
            self.name = name
        }
        func speak() -> string {
            return "..."
        }
        func describe() -> string {
            return self.name + " says " + self.speak()
        }
    }
    class Dog extends Animal {
        init(name: string) {
            super.init(name)
        }
        func speak() -> string {
            return "Woof!"
        }
    }
    start {
        let dog = Dog("Rex")
        dog.describe()
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "Rex says Woof!");
}

#[test]
fn super_calls_parent_despite_override() {
    let source = r#"
    class Base {
        func greet() -> string {
            return "base"
        }
    }
    class Child extends Base {
        func greet() -> string {
            return "child: " + super.greet()
        }
    }
    start {
        let c = Child()
        c.greet()
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "child: base");
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
    class Box {
        let label = "field"
        func label() -> string {
            return "method"
        }
    }
    start {
        let b = Box()
        b.label
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "field");
}

#[test]
fn block_namespace_access() {
    let source = r#"
    block Numbers {
        let origin = 0
        func square(x: int) -> int {
            return x * x
        }
    }
    start {
        Numbers.square(5) + Numbers.origin
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 25);
}

#[test]
fn match_selects_first_equal_case() {
    let source = r#"
    start {
        mut result = ""
        match 2 {
            1 => result = "one",
            2 => result = "two",
            _ => result = "other"
        }
        result
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "two");
}

#[test]
fn match_falls_through_to_wildcard() {
    let source = r#"
    start {
        mut result = ""
        match 9 {
            1 => result = "one",
            _ => result = "other"
        }
        result
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "other");
}

#[test]
fn match_without_wildcard_runs_nothing() {
    let source = r#"
    start {
        mut result = "untouched"
        match 9 {
            1 => result = "one"
        }
        result
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "untouched");
}

#[test]
fn match_case_with_block_body() {
    let source = r#"
    start {
        mut result = 0
        match 1 {
            1 => {
                let doubled = 2
                result = doubled
            }
            _ => result = 9
        }
        result
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 2);
}

#[test]
fn try_catch_binds_error_descriptor() {
    let source = r#"
    start {
        mut kind = ""
        mut message = ""
        try {
            1 / 0
        } catch e {
            kind = e.type
            message = e.message
        }
        kind + "/" + message
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "ZeroDivisionError/division by zero");
}

#[test]
fn finally_runs_after_caught_error() {
    let source = r#"
    start {
        mut log = []
        try {
            push(log, "try")
            1 / 0
        } catch e {
            push(log, "catch")
        } finally {
            push(log, "finally")
        }
        log
    }
    "#;
    assert_eq!(eval(source).to_string(), r#"["try", "catch", "finally"]"#);
}

#[test]
fn finally_runs_when_error_propagates() {
    let source = r#"
    func risky(log) {
        try {
            1 / 0
        } finally {
            push(log, "inner-finally")
        }
    }
    start {
        let log = []
        try {
            risky(log)
        } catch e {
            push(log, "caught")
        }
        log
    }
    "#;
    assert_eq!(eval(source).to_string(), r#"["inner-finally", "caught"]"#);
}

#[test]
fn finally_runs_on_success_path() {
    let source = r#"
    start {
        mut log = []
        try {
            push(log, "try")
        } finally {
            push(log, "finally")
        }
        log
    }
    "#;
    assert_eq!(eval(source).to_string(), r#"["try", "finally"]"#);
}

#[test]
fn finally_runs_before_return_value_is_produced() {
    let source = r#"
    func f(log) {
        try {
            push(log, "try")
            return "returned"
        } finally {
            push(log, "finally")
        }
    }
    start {
        let log = []
        let r = f(log)
        push(log, r)
        log
    }
    "#;
    assert_eq!(eval(source).to_string(), r#"["try", "finally", "returned"]"#);
}

#[test]
fn uncaught_error_reports_kind() {
    let err = eval_err("start { missing_name }");
    assert_eq!(err.kind_name(), "NameError");
    assert!(err.message.contains("missing_name"));
}

#[test]
fn calling_a_non_callable_is_a_type_error() {
    let err = eval_err("start { let x = 5 x() }");
    assert_eq!(err.kind_name(), "TypeError");
}

#[test]
fn constant_reassignment_fails_at_runtime() {
    let err = eval_err("const LIMIT = 1 start { LIMIT = 2 }");
    assert_eq!(err.kind_name(), "TypeError");
    assert!(err.message.contains("constant"));
}

#[test]
fn immutable_let_reassignment_fails_at_runtime() {
    let err = eval_err("start { let x = 1 x = 2 }");
    assert!(err.message.contains("immutable"));
}

#[test]
fn mut_bindings_are_reassignable() {
    assert_eq!(expect_int(&eval("start { mut x = 1 x = 5 x }")), 5);
}

#[test]
fn arrays_share_storage_across_aliases() {
    let source = r#"
    start {
        let a = [1]
        let b = a
        push(a, 2)
        len(b)
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 2);
}

#[test]
fn array_negative_indexing() {
    assert_eq!(expect_int(&eval("start { let a = [1, 2, 3] a[-1] }")), 3);
}

#[test]
fn array_index_out_of_range() {
    let err = eval_err("start { let a = [1] a[5] }");
    assert_eq!(err.kind_name(), "IndexError");
}

#[test]
fn index_assignment_mutates_arrays_and_maps() {
    let source = r#"
    start {
        let a = [1, 2]
        a[0] = 9
        let m = {"k": 1}
        m["k"] = 2
        m["new"] = 3
        a[0] + m["k"] + m["new"]
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 14);
}

#[test]
fn map_member_access_missing_key_is_null() {
    assert!(matches!(eval("start { let m = {\"a\": 1} m.b }"), Value::Null));
}

#[test]
fn map_index_missing_key_is_an_error() {
    let err = eval_err("start { let m = {\"a\": 1} m[\"b\"] }");
    assert_eq!(err.kind_name(), "KeyError");
}

#[test]
fn maps_preserve_insertion_order() {
    let source = r#"
    start {
        let m = {"b": 1, "a": 2}
        m["c"] = 3
        join(keys(m), ",")
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "b,a,c");
}

#[test]
fn null_coalesce_and_null_safe_member() {
    assert_eq!(
        expect_str(&eval("start { let m = {\"a\": 1} m.b ?? \"default\" }")),
        "default"
    );
    assert!(matches!(eval("start { let x = null x?.anything }"), Value::Null));
}

#[test]
fn pipe_prepends_value_to_call_arguments() {
    let source = r#"
    func add(a, b) {
        return a + b
    }
    start {
        5 |> add(3)
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 8);
}

#[test]
fn pipe_into_bare_callable() {
    let source = r#"
    func double(x) {
        return x * 2
    }
    start {
        5 |> double
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 10);
}

#[test]
fn pipe_chains_left_to_right() {
    let source = r#"
    func inc(x) {
        return x + 1
    }
    func double(x) {
        return x * 2
    }
    start {
        3 |> inc |> double
    }
    "#;
    assert_eq!(expect_int(&eval(source)), 8);
}

#[test]
fn tuples_index_and_display() {
    assert_eq!(expect_str(&eval("start { let t = (1, \"a\") t[1] }")), "a");
    assert_eq!(eval("start { (1, 2.5, \"x\") }").to_string(), "(1, 2.5, \"x\")");
}

#[test]
fn strings_index_and_iterate() {
    assert_eq!(expect_str(&eval("start { \"abc\"[1] }")), "b");
    let source = r#"
    start {
        mut parts = []
        for ch in "ab" {
            push(parts, ch)
        }
        join(parts, "-")
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "a-b");
}

#[test]
fn map_iteration_yields_keys_in_order() {
    let source = r#"
    start {
        mut seen = []
        for key in {"x": 1, "y": 2} {
            push(seen, key)
        }
        join(seen, ",")
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "x,y");
}

#[test]
fn await_evaluates_its_operand() {
    assert_eq!(expect_int(&eval("start { await 42 }")), 42);
}

#[test]
fn length_member_on_arrays_and_strings() {
    assert_eq!(expect_int(&eval("start { [1, 2, 3].length }")), 3);
    assert_eq!(expect_int(&eval("start { \"hello\".length }")), 5);
}

#[test]
fn elif_chains() {
    let source = r#"
    start {
        let x = 10
        mut result = ""
        if x < 5 {
            result = "small"
        } elif x < 20 {
            result = "medium"
        } else {
            result = "large"
        }
        result
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "medium");
}

#[test]
fn functions_are_visible_before_start_runs() {
    let source = r#"
    start {
        late()
    }
    func late() {
        return "defined after start"
    }
    "#;
    assert_eq!(expect_str(&eval(source)), "defined after start");
}

#[test]
fn object_display_formatting() {
    let source = r#"
    class Point {
        init(x, y) {
            self.x = x
            self.y = y
        }
    }
    start {
        Point(1, 2)
    }
    "#;
    assert_eq!(eval(source).to_string(), "<Point instance>");
}

#[test]
fn function_display_formatting() {
    let source = r#"
    func named() {
        return 1
    }
    start {
        named
    }
    "#;
    assert_eq!(eval(source).to_string(), "<function named>");
}

#[test]
fn return_outside_function_is_an_error() {
    let err = eval_err("start { return 1 }");
    assert!(err.message.contains("'return' outside function"));
}
