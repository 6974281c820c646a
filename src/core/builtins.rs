// src/core/builtins.rs
//! Built-in native functions and constants. Constructed once as an explicit
//! registry and injected into the interpreter's root environment; name
//! resolution falls through scope lookup to these before raising an
//! undefined-name error.

use std::io::{self, BufRead, Write};

use rand::Rng;

use crate::core::interpreter::RuntimeError;
use crate::core::value::{NativeFunction, Value};

pub fn registry() -> Vec<(&'static str, NativeFunction)> {
    fn native(
        name: &'static str,
        func: fn(&[Value]) -> Result<Value, RuntimeError>,
    ) -> (&'static str, NativeFunction) {
        (name, NativeFunction { name, func })
    }

    vec![
        native("print", builtin_print),
        native("input", builtin_input),
        native("len", builtin_len),
        native("type", builtin_type),
        native("str", builtin_str),
        native("int", builtin_int),
        native("float", builtin_float),
        native("bool", builtin_bool),
        native("range", builtin_range),
        native("abs", builtin_abs),
        native("min", builtin_min),
        native("max", builtin_max),
        native("sum", builtin_sum),
        native("sqrt", builtin_sqrt),
        native("pow", builtin_pow),
        native("floor", builtin_floor),
        native("ceil", builtin_ceil),
        native("round", builtin_round),
        native("random", builtin_random),
        native("random_int", builtin_random_int),
        native("time", builtin_time),
        native("sleep", builtin_sleep),
        native("push", builtin_push),
        native("pop", builtin_pop),
        native("slice", builtin_slice),
        native("reverse", builtin_reverse),
        native("sort", builtin_sort),
        native("join", builtin_join),
        native("split", builtin_split),
        native("contains", builtin_contains),
        native("keys", builtin_keys),
        native("values", builtin_values),
        native("upper", builtin_upper),
        native("lower", builtin_lower),
        native("trim", builtin_trim),
        native("replace", builtin_replace),
        native("assert", builtin_assert),
    ]
}

pub fn constants() -> Vec<(&'static str, Value)> {
    vec![
        ("PI", Value::Float(std::f64::consts::PI)),
        ("E", Value::Float(std::f64::consts::E)),
        ("TAU", Value::Float(std::f64::consts::TAU)),
    ]
}

/* ── Argument helpers ────────────────────────────────────── */

fn ensure_min(args: &[Value], min: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() < min {
        return Err(RuntimeError::type_error(format!(
            "{}() expected at least {} argument(s), got {}",
            name,
            min,
            args.len()
        )));
    }
    Ok(())
}

fn expect_str(value: &Value, name: &str) -> Result<String, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected string, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn expect_int(value: &Value, name: &str) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected int, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn expect_number(value: &Value, name: &str) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected number, got {}",
            name,
            other.type_name()
        ))),
    }
}

/* ── I/O ─────────────────────────────────────────────────── */

fn builtin_print(args: &[Value]) -> Result<Value, RuntimeError> {
    let parts: Vec<String> = args.iter().map(|v| v.stringify()).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Null)
}

fn builtin_input(args: &[Value]) -> Result<Value, RuntimeError> {
    if let Some(prompt) = args.first() {
        print!("{}", prompt.stringify());
        io::stdout().flush().ok();
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RuntimeError::general(format!("input failed: {}", e)))?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::Str(line))
}

/* ── Introspection / conversion ──────────────────────────── */

fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "len")?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Array(a) => a.borrow().len(),
        Value::Map(m) => m.borrow().len(),
        Value::Tuple(t) => t.len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "len() not supported for {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_type(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "type")?;
    Ok(Value::Str(args[0].type_name().to_string()))
}

fn builtin_str(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "str")?;
    Ok(Value::Str(args[0].stringify()))
}

fn builtin_int(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "int")?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(*n as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::type_error(format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(RuntimeError::type_error(format!(
            "int() not supported for {}",
            other.type_name()
        ))),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "float")?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::type_error(format!("invalid literal for float(): '{}'", s))
        }),
        other => Err(RuntimeError::type_error(format!(
            "float() not supported for {}",
            other.type_name()
        ))),
    }
}

fn builtin_bool(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "bool")?;
    Ok(Value::Bool(args[0].is_truthy()))
}

fn builtin_range(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "range")?;
    let (start, end, step) = match args.len() {
        1 => (0, expect_int(&args[0], "range")?, 1),
        2 => (expect_int(&args[0], "range")?, expect_int(&args[1], "range")?, 1),
        _ => (
            expect_int(&args[0], "range")?,
            expect_int(&args[1], "range")?,
            expect_int(&args[2], "range")?,
        ),
    };
    if step == 0 {
        return Err(RuntimeError::type_error("range() step must not be zero"));
    }
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        values.push(Value::Int(current));
        current += step;
    }
    Ok(Value::array(values))
}

/* ── Math ────────────────────────────────────────────────── */

fn builtin_abs(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "abs")?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(RuntimeError::type_error(format!(
            "abs() expected number, got {}",
            other.type_name()
        ))),
    }
}

fn extremum(args: &[Value], name: &str, keep_left: fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, name)?;
    let pool: Vec<Value> = if args.len() == 1 {
        match &args[0] {
            Value::Array(a) => a.borrow().clone(),
            Value::Tuple(t) => t.as_ref().clone(),
            single => vec![single.clone()],
        }
    } else {
        args.to_vec()
    };
    let mut best: Option<Value> = None;
    for value in pool {
        let candidate = expect_number(&value, name)?;
        let replace = match &best {
            Some(current) => {
                let current = expect_number(current, name)?;
                !keep_left(current, candidate)
            }
            None => true,
        };
        if replace {
            best = Some(value);
        }
    }
    best.ok_or_else(|| RuntimeError::type_error(format!("{}() of empty sequence", name)))
}

fn builtin_min(args: &[Value]) -> Result<Value, RuntimeError> {
    extremum(args, "min", |left, right| left <= right)
}

fn builtin_max(args: &[Value]) -> Result<Value, RuntimeError> {
    extremum(args, "max", |left, right| left >= right)
}

fn builtin_sum(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "sum")?;
    let items = match &args[0] {
        Value::Array(a) => a.borrow().clone(),
        Value::Tuple(t) => t.as_ref().clone(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "sum() expected array, got {}",
                other.type_name()
            )))
        }
    };
    let mut int_total = 0i64;
    let mut float_total = 0.0f64;
    let mut all_int = true;
    for item in &items {
        match item {
            Value::Int(n) => {
                int_total += n;
                float_total += *n as f64;
            }
            Value::Float(n) => {
                all_int = false;
                float_total += n;
            }
            other => {
                return Err(RuntimeError::type_error(format!(
                    "sum() expected numbers, got {}",
                    other.type_name()
                )))
            }
        }
    }
    if all_int {
        Ok(Value::Int(int_total))
    } else {
        Ok(Value::Float(float_total))
    }
}

fn builtin_sqrt(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "sqrt")?;
    let n = expect_number(&args[0], "sqrt")?;
    if n < 0.0 {
        return Err(RuntimeError::general("math domain error"));
    }
    Ok(Value::Float(n.sqrt()))
}

fn builtin_pow(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 2, "pow")?;
    if let (Value::Int(base), Value::Int(exp)) = (&args[0], &args[1]) {
        if *exp >= 0 {
            if let Some(result) = base.checked_pow(*exp as u32) {
                return Ok(Value::Int(result));
            }
        }
    }
    let base = expect_number(&args[0], "pow")?;
    let exp = expect_number(&args[1], "pow")?;
    Ok(Value::Float(base.powf(exp)))
}

fn builtin_floor(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "floor")?;
    let n = expect_number(&args[0], "floor")?;
    Ok(Value::Int(n.floor() as i64))
}

fn builtin_ceil(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "ceil")?;
    let n = expect_number(&args[0], "ceil")?;
    Ok(Value::Int(n.ceil() as i64))
}

fn builtin_round(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "round")?;
    let n = expect_number(&args[0], "round")?;
    // Ties round to even, so round(2.5) == 2 and round(3.5) == 4.
    Ok(Value::Int(n.round_ties_even() as i64))
}

fn builtin_random(_args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Float(rand::thread_rng().gen::<f64>()))
}

fn builtin_random_int(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 2, "random_int")?;
    let low = expect_int(&args[0], "random_int")?;
    let high = expect_int(&args[1], "random_int")?;
    if low > high {
        return Err(RuntimeError::type_error("random_int() empty range"));
    }
    Ok(Value::Int(rand::thread_rng().gen_range(low..=high)))
}

fn builtin_time(_args: &[Value]) -> Result<Value, RuntimeError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| RuntimeError::general("system clock went backwards"))?;
    Ok(Value::Float(now.as_secs_f64()))
}

fn builtin_sleep(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "sleep")?;
    let secs = expect_number(&args[0], "sleep")?;
    if secs < 0.0 {
        return Err(RuntimeError::type_error("sleep() duration must be non-negative"));
    }
    std::thread::sleep(std::time::Duration::from_secs_f64(secs));
    Ok(Value::Null)
}

/* ── Arrays ──────────────────────────────────────────────── */

fn expect_array_ref<'a>(value: &'a Value, name: &str) -> Result<&'a Value, RuntimeError> {
    match value {
        Value::Array(_) => Ok(value),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected array, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn builtin_push(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 2, "push")?;
    let array = expect_array_ref(&args[0], "push")?;
    if let Value::Array(cell) = array {
        cell.borrow_mut().push(args[1].clone());
    }
    Ok(array.clone())
}

fn builtin_pop(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "pop")?;
    let array = expect_array_ref(&args[0], "pop")?;
    if let Value::Array(cell) = array {
        return cell
            .borrow_mut()
            .pop()
            .ok_or_else(|| RuntimeError::index("pop from empty array"));
    }
    unreachable!()
}

fn builtin_slice(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 2, "slice")?;
    let items = match &args[0] {
        Value::Array(a) => a.borrow().clone(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "slice() expected array, got {}",
                other.type_name()
            )))
        }
    };
    let len = items.len() as i64;
    let clamp = |raw: i64| -> usize {
        let adjusted = if raw < 0 { raw + len } else { raw };
        adjusted.clamp(0, len) as usize
    };
    // slice(arr, stop) or slice(arr, start, stop), with negative indices
    // counting from the end; out-of-range bounds clamp instead of erroring.
    let (start, stop) = if args.len() == 2 {
        (0, clamp(expect_int(&args[1], "slice")?))
    } else {
        (
            clamp(expect_int(&args[1], "slice")?),
            clamp(expect_int(&args[2], "slice")?),
        )
    };
    if start >= stop {
        return Ok(Value::array(Vec::new()));
    }
    Ok(Value::array(items[start..stop].to_vec()))
}

fn builtin_reverse(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "reverse")?;
    let array = expect_array_ref(&args[0], "reverse")?;
    if let Value::Array(cell) = array {
        cell.borrow_mut().reverse();
    }
    Ok(array.clone())
}

fn builtin_sort(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "sort")?;
    let array = expect_array_ref(&args[0], "sort")?;
    if let Value::Array(cell) = array {
        let mut items = cell.borrow_mut();
        let all_numeric = items
            .iter()
            .all(|v| matches!(v, Value::Int(_) | Value::Float(_)));
        let all_strings = items.iter().all(|v| matches!(v, Value::Str(_)));
        if all_numeric {
            items.sort_by(|a, b| {
                let x = match a {
                    Value::Int(n) => *n as f64,
                    Value::Float(n) => *n,
                    _ => 0.0,
                };
                let y = match b {
                    Value::Int(n) => *n as f64,
                    Value::Float(n) => *n,
                    _ => 0.0,
                };
                x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
            });
        } else if all_strings {
            items.sort_by(|a, b| match (a, b) {
                (Value::Str(x), Value::Str(y)) => x.cmp(y),
                _ => std::cmp::Ordering::Equal,
            });
        } else {
            return Err(RuntimeError::type_error(
                "sort() expected all numbers or all strings",
            ));
        }
    }
    Ok(array.clone())
}

fn builtin_join(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "join")?;
    let items = match &args[0] {
        Value::Array(a) => a.borrow().clone(),
        Value::Tuple(t) => t.as_ref().clone(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "join() expected array, got {}",
                other.type_name()
            )))
        }
    };
    let separator = match args.get(1) {
        Some(sep) => expect_str(sep, "join")?,
        None => String::new(),
    };
    let parts: Vec<String> = items.iter().map(|v| v.stringify()).collect();
    Ok(Value::Str(parts.join(&separator)))
}

fn builtin_split(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "split")?;
    let text = expect_str(&args[0], "split")?;
    let separator = match args.get(1) {
        Some(sep) => expect_str(sep, "split")?,
        None => " ".to_string(),
    };
    if separator.is_empty() {
        return Err(RuntimeError::type_error("split() separator must not be empty"));
    }
    let parts: Vec<Value> = text
        .split(&separator)
        .map(|part| Value::Str(part.to_string()))
        .collect();
    Ok(Value::array(parts))
}

fn builtin_contains(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 2, "contains")?;
    let found = match &args[0] {
        Value::Array(a) => a.borrow().iter().any(|v| v.equals(&args[1])),
        Value::Tuple(t) => t.iter().any(|v| v.equals(&args[1])),
        Value::Str(s) => {
            let needle = expect_str(&args[1], "contains")?;
            s.contains(&needle)
        }
        Value::Map(m) => {
            let key = expect_str(&args[1], "contains")?;
            m.borrow().contains_key(&key)
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "contains() not supported for {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

fn builtin_keys(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "keys")?;
    match &args[0] {
        Value::Map(m) => Ok(Value::array(
            m.borrow().keys().cloned().map(Value::Str).collect(),
        )),
        other => Err(RuntimeError::type_error(format!(
            "keys() expected map, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_values(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "values")?;
    match &args[0] {
        Value::Map(m) => Ok(Value::array(m.borrow().values().cloned().collect())),
        other => Err(RuntimeError::type_error(format!(
            "values() expected map, got {}",
            other.type_name()
        ))),
    }
}

/* ── Strings ─────────────────────────────────────────────── */

fn builtin_upper(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "upper")?;
    Ok(Value::Str(expect_str(&args[0], "upper")?.to_uppercase()))
}

fn builtin_lower(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "lower")?;
    Ok(Value::Str(expect_str(&args[0], "lower")?.to_lowercase()))
}

fn builtin_trim(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "trim")?;
    Ok(Value::Str(expect_str(&args[0], "trim")?.trim().to_string()))
}

fn builtin_replace(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 3, "replace")?;
    let text = expect_str(&args[0], "replace")?;
    let from = expect_str(&args[1], "replace")?;
    let to = expect_str(&args[2], "replace")?;
    Ok(Value::Str(text.replace(&from, &to)))
}

fn builtin_assert(args: &[Value]) -> Result<Value, RuntimeError> {
    ensure_min(args, 1, "assert")?;
    if args[0].is_truthy() {
        return Ok(Value::Null);
    }
    let message = match args.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => other.stringify(),
        None => "Assertion failed".to_string(),
    };
    Err(RuntimeError::assertion(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_chars_and_elements() {
        assert!(matches!(
            builtin_len(&[Value::Str("hello".into())]),
            Ok(Value::Int(5))
        ));
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(builtin_len(&[arr]), Ok(Value::Int(2))));
    }

    #[test]
    fn push_mutates_in_place() {
        let arr = Value::array(vec![Value::Int(1)]);
        builtin_push(&[arr.clone(), Value::Int(2)]).expect("pushes");
        assert!(matches!(builtin_len(&[arr]), Ok(Value::Int(2))));
    }

    #[test]
    fn slice_takes_stop_or_start_stop() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let front = builtin_slice(&[arr.clone(), Value::Int(2)]).expect("slices");
        assert_eq!(front.to_string(), "[1, 2]");
        let mid = builtin_slice(&[arr, Value::Int(1), Value::Int(3)]).expect("slices");
        assert_eq!(mid.to_string(), "[2, 3]");
    }

    #[test]
    fn min_accepts_single_array_argument() {
        let arr = Value::array(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert!(matches!(builtin_min(&[arr]), Ok(Value::Int(1))));
        assert!(matches!(
            builtin_min(&[Value::Int(5), Value::Int(2)]),
            Ok(Value::Int(2))
        ));
    }

    #[test]
    fn sum_keeps_ints_integral() {
        let ints = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(builtin_sum(&[ints]), Ok(Value::Int(3))));
        let mixed = Value::array(vec![Value::Int(1), Value::Float(0.5)]);
        assert!(matches!(builtin_sum(&[mixed]), Ok(Value::Float(_))));
    }

    #[test]
    fn assert_raises_on_falsy() {
        let err = builtin_assert(&[Value::Bool(false)]).unwrap_err();
        assert_eq!(err.kind_name(), "AssertionError");
        assert_eq!(err.message, "Assertion failed");
        assert!(builtin_assert(&[Value::Int(1)]).is_ok());
    }

    #[test]
    fn type_reports_language_names() {
        assert_eq!(
            builtin_type(&[Value::Int(42)]).unwrap().to_string(),
            "\"int\""
        );
        assert_eq!(
            builtin_type(&[Value::array(vec![])]).unwrap().to_string(),
            "\"array\""
        );
    }
}
