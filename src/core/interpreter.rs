// src/core/interpreter.rs
//! Tree-walking evaluator over dynamically-typed values.
//!
//! Non-local control flow (`return`/`break`/`continue`) is modeled as a
//! tagged `Flow` result from every statement: loops absorb Break/Continue,
//! call boundaries absorb Return, and everything else passes the signal
//! upward. Runtime errors travel separately as `Err(RuntimeError)` so that
//! `try`/`catch` interacts only with errors, never with flow signals.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::ast::{
    CaseBody, Expr, FunctionDecl, InitMethod, Parameter, Program, Stmt, StringPart,
};
use crate::core::builtins;
use crate::core::environment::{EnvRef, Environment};
use crate::core::value::{
    BlockNamespace, BoundMethod, ClassDef, Function, Lambda, Object, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Name,
    Type,
    Attribute,
    Index,
    Key,
    ZeroDivision,
    Assertion,
    General,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Name, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Type, message)
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Attribute, message)
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Index, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Key, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::ZeroDivision, message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Assertion, message)
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::General, message)
    }

    /// Error-kind name exposed to scripts through the catch-variable
    /// descriptor and to the driver on uncaught errors.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RuntimeErrorKind::Name => "NameError",
            RuntimeErrorKind::Type => "TypeError",
            RuntimeErrorKind::Attribute => "AttributeError",
            RuntimeErrorKind::Index => "IndexError",
            RuntimeErrorKind::Key => "KeyError",
            RuntimeErrorKind::ZeroDivision => "ZeroDivisionError",
            RuntimeErrorKind::Assertion => "AssertionError",
            RuntimeErrorKind::General => "RuntimeError",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Statement outcome: normal completion (optionally carrying the value of
/// an expression statement) or a non-local exit in flight.
pub enum Flow {
    Normal(Option<Value>),
    Return(Option<Value>),
    Break,
    Continue,
}

pub struct Interpreter {
    globals: EnvRef,
    /// Stack of classes whose method/init bodies are currently executing;
    /// `super` resolves against the top entry's statically known parent.
    class_stack: Vec<Rc<ClassDef>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Build an interpreter with the built-in registry installed into the
    /// root environment. The registry is constructed once and injected
    /// here, not reached through any ambient singleton.
    pub fn new() -> Self {
        let globals = Environment::new();
        {
            let mut root = globals.borrow_mut();
            for (name, native) in builtins::registry() {
                root.define_function(name, Value::Native(native));
            }
            for (name, value) in builtins::constants() {
                root.define(name, value, false, true);
            }
        }
        Self { globals, class_stack: Vec::new() }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Run a whole program: top-level statements first, then the optional
    /// `start` block in a fresh child scope. Returns the start block's
    /// final value, which the REPL prints.
    pub fn interpret(&mut self, program: &Program) -> Result<Option<Value>, RuntimeError> {
        for stmt in &program.statements {
            let env = Rc::clone(&self.globals);
            let flow = self.exec_stmt(stmt, &env)?;
            self.escape_toplevel(flow)?;
        }
        if let Some(start) = &program.start_block {
            let env = Environment::child(&self.globals);
            match self.exec_block(start, &env)? {
                Flow::Normal(value) => return Ok(value),
                flow => self.escape_toplevel(flow)?,
            }
        }
        Ok(None)
    }

    /// Run a single statement at module scope (REPL entry point).
    pub fn run_statement(&mut self, stmt: &Stmt) -> Result<Option<Value>, RuntimeError> {
        let env = Rc::clone(&self.globals);
        match self.exec_stmt(stmt, &env)? {
            Flow::Normal(value) => Ok(value),
            flow => {
                self.escape_toplevel(flow)?;
                Ok(None)
            }
        }
    }

    /// Evaluate a lone expression at module scope (REPL auto-print).
    pub fn eval_expression(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let env = Rc::clone(&self.globals);
        self.eval_expr(expr, &env)
    }

    fn escape_toplevel(&self, flow: Flow) -> Result<(), RuntimeError> {
        match flow {
            Flow::Normal(_) => Ok(()),
            Flow::Return(_) => Err(RuntimeError::general("'return' outside function")),
            Flow::Break => Err(RuntimeError::general("'break' outside loop")),
            Flow::Continue => Err(RuntimeError::general("'continue' outside loop")),
        }
    }

    /// Execute statements in the given environment. The caller decides the
    /// scoping: compound constructs pass a fresh child of the environment
    /// active where the construct is textually defined.
    fn exec_block(&mut self, stmts: &[Stmt], env: &EnvRef) -> Result<Flow, RuntimeError> {
        let mut last = None;
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal(value) => last = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &EnvRef) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::VarDecl { name, initializer, is_mutable, is_constant, .. } => {
                let value = match initializer {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                env.borrow_mut().define(name, value, *is_mutable, *is_constant);
                Ok(Flow::Normal(None))
            }
            Stmt::Function(decl) => {
                let func = self.make_function(decl, env);
                env.borrow_mut().define_function(&decl.name, Value::Function(func));
                Ok(Flow::Normal(None))
            }
            Stmt::Class { name, parent, members, init_method, .. } => {
                let class = self.make_class(name, parent.as_deref(), members, init_method, env)?;
                env.borrow_mut().define_class(name, Value::Class(class));
                Ok(Flow::Normal(None))
            }
            Stmt::Block { name, members, .. } => {
                let mut table = IndexMap::new();
                for member in members {
                    match member {
                        Stmt::Function(decl) => {
                            let func = self.make_function(decl, env);
                            table.insert(decl.name.clone(), Value::Function(func));
                        }
                        Stmt::VarDecl { name, initializer, .. } => {
                            let value = match initializer {
                                Some(expr) => self.eval_expr(expr, env)?,
                                None => Value::Null,
                            };
                            table.insert(name.clone(), value);
                        }
                        _ => {}
                    }
                }
                let namespace = BlockNamespace { name: name.clone(), members: table };
                env.borrow_mut().define_block(name, Value::Block(Rc::new(namespace)));
                Ok(Flow::Normal(None))
            }
            // Trait method contracts are never verified against implementing
            // classes; declaring one is a no-op at runtime.
            Stmt::Trait { .. } => Ok(Flow::Normal(None)),
            Stmt::If { condition, then_branch, elif_branches, else_branch } => {
                if self.eval_expr(condition, env)?.is_truthy() {
                    return self.exec_block(then_branch, &Environment::child(env));
                }
                for (cond, body) in elif_branches {
                    if self.eval_expr(cond, env)?.is_truthy() {
                        return self.exec_block(body, &Environment::child(env));
                    }
                }
                if let Some(body) = else_branch {
                    return self.exec_block(body, &Environment::child(env));
                }
                Ok(Flow::Normal(None))
            }
            Stmt::Match { value, cases } => {
                let scrutinee = self.eval_expr(value, env)?;
                for case in cases {
                    let selected = case.is_default || {
                        let pattern = self.eval_expr(&case.pattern, env)?;
                        scrutinee.equals(&pattern)
                    };
                    if selected {
                        return match &case.body {
                            CaseBody::Block(stmts) => {
                                self.exec_block(stmts, &Environment::child(env))
                            }
                            CaseBody::Expr(expr) => {
                                let value = self.eval_expr(expr, env)?;
                                Ok(Flow::Normal(Some(value)))
                            }
                        };
                    }
                }
                Ok(Flow::Normal(None))
            }
            Stmt::For { variable, iterable, body } => {
                let source = self.eval_expr(iterable, env)?;
                for item in self.iterate(&source)? {
                    let child = Environment::child(env);
                    child.borrow_mut().define(variable, item, false, false);
                    match self.exec_block(body, &child)? {
                        Flow::Normal(_) => {}
                        Flow::Break => break,
                        Flow::Continue => continue,
                        ret => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(None))
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition, env)?.is_truthy() {
                    match self.exec_block(body, &Environment::child(env))? {
                        Flow::Normal(_) => {}
                        Flow::Break => break,
                        Flow::Continue => continue,
                        ret => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(None))
            }
            Stmt::Loop { count, body } => {
                let times = match self.eval_expr(count, env)? {
                    Value::Int(n) => n,
                    Value::Float(n) => n as i64,
                    Value::Bool(b) => b as i64,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "Loop count must be a number, got {}",
                            other.type_name()
                        )))
                    }
                };
                for _ in 0..times.max(0) {
                    match self.exec_block(body, &Environment::child(env))? {
                        Flow::Normal(_) => {}
                        Flow::Break => break,
                        Flow::Continue => continue,
                        ret => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(None))
            }
            Stmt::Try { try_body, catch_var, catch_body, finally_body } => {
                let outcome = match self.exec_block(try_body, &Environment::child(env)) {
                    Ok(flow) => Ok(flow),
                    Err(err) => match catch_body {
                        Some(handler) => {
                            let child = Environment::child(env);
                            if let Some(var) = catch_var {
                                child.borrow_mut().define(
                                    var,
                                    error_descriptor(&err),
                                    true,
                                    false,
                                );
                            }
                            self.exec_block(handler, &child)
                        }
                        None => Err(err),
                    },
                };
                // The finally body always runs exactly once, whether the try
                // succeeded, was caught, or an error is still propagating.
                if let Some(cleanup) = finally_body {
                    match self.exec_block(cleanup, &Environment::child(env))? {
                        Flow::Normal(_) => {}
                        flow => return Ok(flow),
                    }
                }
                match outcome? {
                    Flow::Normal(_) => Ok(Flow::Normal(None)),
                    flow => Ok(flow),
                }
            }
            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => Some(self.eval_expr(expr, env)?),
                    None => None,
                };
                Ok(Flow::Return(result))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Expression(expr) => {
                let value = self.eval_expr(expr, env)?;
                Ok(Flow::Normal(Some(value)))
            }
        }
    }

    fn make_function(&self, decl: &FunctionDecl, env: &EnvRef) -> Rc<Function> {
        Rc::new(Function {
            name: decl.name.clone(),
            params: decl.params.clone(),
            body: decl.body.clone(),
            closure: Rc::clone(env),
        })
    }

    fn make_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
        members: &[Stmt],
        init_method: &Option<InitMethod>,
        env: &EnvRef,
    ) -> Result<Rc<ClassDef>, RuntimeError> {
        let parent_class = parent.and_then(|p| match Environment::get_class(env, p) {
            Some(Value::Class(class)) => Some(class),
            _ => None,
        });
        let mut methods = IndexMap::new();
        let mut fields = IndexMap::new();
        for member in members {
            match member {
                Stmt::Function(decl) => {
                    methods.insert(decl.name.clone(), self.make_function(decl, env));
                }
                Stmt::VarDecl { name, initializer, .. } => {
                    let value = match initializer {
                        Some(expr) => self.eval_expr(expr, env)?,
                        None => Value::Null,
                    };
                    fields.insert(name.clone(), value);
                }
                _ => {}
            }
        }
        let init = init_method.as_ref().map(|init| {
            Rc::new(Function {
                name: "init".to_string(),
                params: init.params.clone(),
                body: init.body.clone(),
                closure: Rc::clone(env),
            })
        });
        Ok(Rc::new(ClassDef {
            name: name.to_string(),
            parent: parent_class,
            methods,
            fields,
            init_method: init,
        }))
    }

    fn eval_expr(&mut self, expr: &Expr, env: &EnvRef) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Integer(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::NullLiteral => Ok(Value::Null),
            Expr::Interpolated(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        StringPart::Text(text) => result.push_str(text),
                        StringPart::Expr(expr) => {
                            result.push_str(&self.eval_expr(expr, env)?.stringify());
                        }
                    }
                }
                Ok(Value::Str(result))
            }
            Expr::Identifier { name, .. } => self.lookup(name, env),
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element, env)?);
                }
                Ok(Value::array(values))
            }
            Expr::Map(entries) => {
                let mut map = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key = match self.eval_expr(key_expr, env)? {
                        Value::Str(s) => s,
                        other => other.stringify(),
                    };
                    let value = self.eval_expr(value_expr, env)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Tuple(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element, env)?);
                }
                Ok(Value::Tuple(Rc::new(values)))
            }
            Expr::Binary { left, operator, right } => {
                // `and`/`or` short-circuit and yield the actual operand
                // value, not a coerced boolean.
                if operator == "and" {
                    let l = self.eval_expr(left, env)?;
                    return if l.is_truthy() { self.eval_expr(right, env) } else { Ok(l) };
                }
                if operator == "or" {
                    let l = self.eval_expr(left, env)?;
                    return if l.is_truthy() { Ok(l) } else { self.eval_expr(right, env) };
                }
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                self.binary_op(operator, l, r)
            }
            Expr::Unary { operator, operand } => {
                let value = self.eval_expr(operand, env)?;
                match operator.as_str() {
                    "-" => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(RuntimeError::type_error(format!(
                            "Unary '-' on non-number: {}",
                            other.type_name()
                        ))),
                    },
                    "not" => Ok(Value::Bool(!value.is_truthy())),
                    other => Err(RuntimeError::general(format!("Unknown unary operator: {}", other))),
                }
            }
            Expr::Call { callee, arguments } => {
                let callee_value = self.eval_expr(callee, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.eval_expr(arg, env)?);
                }
                self.call_value(callee_value, args)
            }
            Expr::Member { object, member, null_safe } => {
                let target = self.eval_expr(object, env)?;
                if *null_safe && matches!(target, Value::Null) {
                    return Ok(Value::Null);
                }
                self.member_access(&target, member)
            }
            Expr::Index { object, index } => {
                let target = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                self.index_access(&target, &idx)
            }
            Expr::Assignment { target, value, operator, .. } => {
                let mut new_value = self.eval_expr(value, env)?;
                if operator != "=" {
                    let old = self.eval_expr(target, env)?;
                    new_value = self.compound_op(operator, old, new_value)?;
                }
                self.assign(target, new_value.clone(), env)?;
                Ok(new_value)
            }
            Expr::Lambda { params, body } => Ok(Value::Lambda(Rc::new(Lambda {
                params: params.clone(),
                body: (**body).clone(),
                closure: Rc::clone(env),
            }))),
            Expr::Pipe { value, function } => {
                let piped = self.eval_expr(value, env)?;
                // A call on the right side receives the piped value as its
                // first argument; anything else is applied to it directly.
                if let Expr::Call { callee, arguments } = &**function {
                    let callee_value = self.eval_expr(callee, env)?;
                    let mut args = vec![piped];
                    for arg in arguments {
                        args.push(self.eval_expr(arg, env)?);
                    }
                    return self.call_value(callee_value, args);
                }
                let callee_value = self.eval_expr(function, env)?;
                self.call_value(callee_value, vec![piped])
            }
            Expr::NullCoalesce { value, default } => {
                let v = self.eval_expr(value, env)?;
                if matches!(v, Value::Null) {
                    self.eval_expr(default, env)
                } else {
                    Ok(v)
                }
            }
            Expr::Range { start, end } => {
                let start_value = self.eval_expr(start, env)?;
                let end_value = self.eval_expr(end, env)?;
                let start = self.expect_int(start_value, "Range start")?;
                let end = self.expect_int(end_value, "Range end")?;
                let values: Vec<Value> = (start..end).map(Value::Int).collect();
                Ok(Value::array(values))
            }
            // `await` has no scheduling semantics: it evaluates its operand.
            Expr::Await(inner) => self.eval_expr(inner, env),
            Expr::SelfExpr { .. } => Environment::get(env, "self"),
            Expr::SuperExpr { member, .. } => self.eval_super(member.as_deref(), env),
        }
    }

    fn lookup(&self, name: &str, env: &EnvRef) -> Result<Value, RuntimeError> {
        // The match wildcard evaluates to null when referenced directly.
        if name == "_" {
            return Ok(Value::Null);
        }
        if let Ok(value) = Environment::get(env, name) {
            return Ok(value);
        }
        if let Some(func) = Environment::get_function(env, name) {
            return Ok(func);
        }
        if let Some(class) = Environment::get_class(env, name) {
            return Ok(class);
        }
        if let Some(block) = Environment::get_block(env, name) {
            return Ok(block);
        }
        Err(RuntimeError::name(format!("Undefined: {}", name)))
    }

    /* ── Calls ───────────────────────────────────────────── */

    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Native(native) => (native.func)(&args),
            Value::Function(func) => self.call_function(&func, args, None),
            Value::Lambda(lambda) => self.call_lambda(&lambda, args),
            Value::Bound(bound) => self.call_bound(&bound, args),
            Value::Class(class) => self.instantiate(&class, args),
            other => Err(RuntimeError::type_error(format!(
                "Not callable: {}",
                other.type_name()
            ))),
        }
    }

    /// Bind arguments positionally into a fresh child of the callee's
    /// closure environment; missing trailing arguments fall back to the
    /// parameter's default expression (evaluated in that same scope) or
    /// null. `self_binding` is set for method and init calls.
    fn bind_params(
        &mut self,
        params: &[Parameter],
        args: Vec<Value>,
        closure: &EnvRef,
        self_binding: Option<Value>,
    ) -> Result<EnvRef, RuntimeError> {
        let env = Environment::child(closure);
        if let Some(receiver) = self_binding {
            env.borrow_mut().define("self", receiver, true, false);
        }
        let mut args = args.into_iter();
        for param in params {
            let value = match args.next() {
                Some(value) => value,
                None => match &param.default_value {
                    Some(default) => self.eval_expr(default, &env)?,
                    None => Value::Null,
                },
            };
            env.borrow_mut().define(&param.name, value, true, false);
        }
        Ok(env)
    }

    fn call_function(
        &mut self,
        func: &Rc<Function>,
        args: Vec<Value>,
        defining_class: Option<Rc<ClassDef>>,
    ) -> Result<Value, RuntimeError> {
        let env = self.bind_params(&func.params, args, &func.closure, None)?;
        self.run_call_body(&func.body, &env, defining_class)
    }

    fn call_lambda(&mut self, lambda: &Rc<Lambda>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = self.bind_params(&lambda.params, args, &lambda.closure, None)?;
        self.eval_expr(&lambda.body, &env)
    }

    fn call_bound(&mut self, bound: &Rc<BoundMethod>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let receiver = Value::Object(Rc::clone(&bound.receiver));
        let env = self.bind_params(&bound.method.params, args, &bound.method.closure, Some(receiver))?;
        self.run_call_body(&bound.method.body, &env, Some(Rc::clone(&bound.defining_class)))
    }

    fn run_call_body(
        &mut self,
        body: &[Stmt],
        env: &EnvRef,
        defining_class: Option<Rc<ClassDef>>,
    ) -> Result<Value, RuntimeError> {
        let pushed = defining_class.is_some();
        if let Some(class) = defining_class {
            self.class_stack.push(class);
        }
        let result = self.exec_block(body, env);
        if pushed {
            self.class_stack.pop();
        }
        match result? {
            Flow::Return(value) => Ok(value.unwrap_or(Value::Null)),
            Flow::Normal(value) => Ok(value.unwrap_or(Value::Null)),
            Flow::Break => Err(RuntimeError::general("'break' outside loop")),
            Flow::Continue => Err(RuntimeError::general("'continue' outside loop")),
        }
    }

    /// Instantiation copies the inherited field defaults (root class first,
    /// so subclasses override) into a new object, then runs `init` with
    /// `self` bound in a child of the class's closure. Any `init` return
    /// value is discarded.
    fn instantiate(&mut self, class: &Rc<ClassDef>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut fields = IndexMap::new();
        collect_fields(class, &mut fields);
        let object = Rc::new(Object { class_def: Rc::clone(class), fields: RefCell::new(fields) });
        if let Some(init) = &class.init_method {
            let receiver = Value::Object(Rc::clone(&object));
            let env = self.bind_params(&init.params, args, &init.closure, Some(receiver))?;
            self.class_stack.push(Rc::clone(class));
            let result = self.exec_block(&init.body, &env);
            self.class_stack.pop();
            match result? {
                Flow::Break => return Err(RuntimeError::general("'break' outside loop")),
                Flow::Continue => return Err(RuntimeError::general("'continue' outside loop")),
                _ => {}
            }
        }
        Ok(Value::Object(object))
    }

    fn eval_super(&mut self, member: Option<&str>, env: &EnvRef) -> Result<Value, RuntimeError> {
        let current = self
            .class_stack
            .last()
            .cloned()
            .ok_or_else(|| RuntimeError::general("'super' outside of class"))?;
        let parent = current
            .parent
            .as_ref()
            .cloned()
            .ok_or_else(|| {
                RuntimeError::attribute(format!("Class {} has no parent", current.name))
            })?;
        let receiver = match Environment::get(env, "self")? {
            Value::Object(obj) => obj,
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'super' receiver is not an object: {}",
                    other.type_name()
                )))
            }
        };
        if let Some(name) = member {
            if let Some((method, defining_class)) = find_method(&parent, name) {
                return Ok(Value::Bound(Rc::new(BoundMethod {
                    receiver,
                    method,
                    defining_class,
                })));
            }
            // `super.init(...)` reaches the parent's constructor.
            if name == "init" {
                if let Some((init, defining_class)) = find_init(&parent) {
                    return Ok(Value::Bound(Rc::new(BoundMethod {
                        receiver,
                        method: init,
                        defining_class,
                    })));
                }
            }
            return Err(RuntimeError::attribute(format!("No attribute: {}", name)));
        }
        Ok(Value::Class(parent))
    }

    /* ── Member / index access ───────────────────────────── */

    fn member_access(&mut self, target: &Value, member: &str) -> Result<Value, RuntimeError> {
        match target {
            Value::Object(obj) => {
                // Fields take precedence over methods of the same name.
                if obj.has_field(member) {
                    return Ok(obj.get_field(member).unwrap_or(Value::Null));
                }
                if let Some((method, defining_class)) = find_method(&obj.class_def, member) {
                    return Ok(Value::Bound(Rc::new(BoundMethod {
                        receiver: Rc::clone(obj),
                        method,
                        defining_class,
                    })));
                }
                Err(RuntimeError::attribute(format!("No attribute: {}", member)))
            }
            Value::Block(block) => Ok(block.members.get(member).cloned().unwrap_or(Value::Null)),
            Value::Map(map) => Ok(map.borrow().get(member).cloned().unwrap_or(Value::Null)),
            Value::Array(arr) if member == "length" => Ok(Value::Int(arr.borrow().len() as i64)),
            Value::Str(s) if member == "length" => Ok(Value::Int(s.chars().count() as i64)),
            _ => Err(RuntimeError::attribute(format!("No attribute: {}", member))),
        }
    }

    fn index_access(&mut self, target: &Value, index: &Value) -> Result<Value, RuntimeError> {
        match target {
            Value::Array(arr) => {
                let arr = arr.borrow();
                let idx = self.resolve_index(index, arr.len())?;
                arr.get(idx)
                    .cloned()
                    .ok_or_else(|| RuntimeError::index("Array index out of range"))
            }
            Value::Tuple(items) => {
                let idx = self.resolve_index(index, items.len())?;
                items
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| RuntimeError::index("Tuple index out of range"))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = self.resolve_index(index, chars.len())?;
                chars
                    .get(idx)
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(|| RuntimeError::index("String index out of range"))
            }
            Value::Map(map) => {
                let key = match index {
                    Value::Str(s) => s.clone(),
                    other => other.stringify(),
                };
                map.borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| RuntimeError::key(format!("Key not found: {}", key)))
            }
            other => Err(RuntimeError::type_error(format!(
                "Cannot index into {}",
                other.type_name()
            ))),
        }
    }

    /// Negative indices count from the end; anything still out of range
    /// maps to a position the caller's bounds check rejects.
    fn resolve_index(&self, index: &Value, len: usize) -> Result<usize, RuntimeError> {
        match index {
            Value::Int(n) => {
                if *n < 0 {
                    let adjusted = len as i64 + n;
                    if adjusted < 0 {
                        return Ok(usize::MAX);
                    }
                    Ok(adjusted as usize)
                } else {
                    Ok(*n as usize)
                }
            }
            other => Err(RuntimeError::type_error(format!(
                "Index must be an integer, got {}",
                other.type_name()
            ))),
        }
    }

    /* ── Assignment ──────────────────────────────────────── */

    fn assign(&mut self, target: &Expr, value: Value, env: &EnvRef) -> Result<(), RuntimeError> {
        match target {
            Expr::Identifier { name, .. } => Environment::set(env, name, value),
            Expr::Member { object, member, .. } => {
                let owner = self.eval_expr(object, env)?;
                match owner {
                    Value::Object(obj) => {
                        obj.set_field(member, value);
                        Ok(())
                    }
                    Value::Map(map) => {
                        map.borrow_mut().insert(member.clone(), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "Cannot assign member on {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Index { object, index } => {
                let owner = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                match owner {
                    Value::Array(arr) => {
                        let len = arr.borrow().len();
                        let pos = self.resolve_index(&idx, len)?;
                        if pos >= len {
                            return Err(RuntimeError::index("Array index out of range"));
                        }
                        arr.borrow_mut()[pos] = value;
                        Ok(())
                    }
                    Value::Map(map) => {
                        let key = match idx {
                            Value::Str(s) => s,
                            other => other.stringify(),
                        };
                        map.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "Cannot index-assign into {}",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(RuntimeError::type_error("Invalid assignment target")),
        }
    }

    /// Compound assignment applies the strict form of the operator: numeric
    /// promotion, string+string, and array+array only — no cross-type
    /// coercion.
    fn compound_op(&self, operator: &str, old: Value, new: Value) -> Result<Value, RuntimeError> {
        match operator {
            "+=" => match (old, new) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                (Value::Array(a), Value::Array(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Value::array(items))
                }
                (a, b) => numeric_promote(&a, &b)
                    .map(|(x, y)| Value::Float(x + y))
                    .ok_or_else(|| compound_type_error("+=", &a, &b)),
            },
            "-=" => numeric_compound(old, new, "-=", |a, b| a - b, |a, b| a - b),
            "*=" => numeric_compound(old, new, "*=", |a, b| a * b, |a, b| a * b),
            "/=" => {
                let (a, b) = match numeric_promote(&old, &new) {
                    Some(pair) => pair,
                    None => return Err(compound_type_error("/=", &old, &new)),
                };
                if b == 0.0 {
                    return Err(RuntimeError::zero_division("division by zero"));
                }
                Ok(Value::Float(a / b))
            }
            other => Err(RuntimeError::general(format!(
                "Unknown compound operator: {}",
                other
            ))),
        }
    }

    /* ── Binary operators ────────────────────────────────── */

    fn binary_op(&self, operator: &str, l: Value, r: Value) -> Result<Value, RuntimeError> {
        match operator {
            "+" => {
                // String concatenation wins whenever either side is a string.
                if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                    return Ok(Value::Str(format!("{}{}", l.stringify(), r.stringify())));
                }
                if let (Value::Array(a), Value::Array(b)) = (&l, &r) {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    return Ok(Value::array(items));
                }
                match (&l, &r) {
                    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                    _ => numeric_promote(&l, &r)
                        .map(|(a, b)| Value::Float(a + b))
                        .ok_or_else(|| binary_type_error("+", &l, &r)),
                }
            }
            "-" => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                _ => numeric_promote(&l, &r)
                    .map(|(a, b)| Value::Float(a - b))
                    .ok_or_else(|| binary_type_error("-", &l, &r)),
            },
            "*" => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                _ => numeric_promote(&l, &r)
                    .map(|(a, b)| Value::Float(a * b))
                    .ok_or_else(|| binary_type_error("*", &l, &r)),
            },
            // True division: the result is always a float.
            "/" => {
                let (a, b) = numeric_promote(&l, &r).ok_or_else(|| binary_type_error("/", &l, &r))?;
                if b == 0.0 {
                    return Err(RuntimeError::zero_division("division by zero"));
                }
                Ok(Value::Float(a / b))
            }
            "%" => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    if *b == 0 {
                        return Err(RuntimeError::zero_division("modulo by zero"));
                    }
                    // Result takes the sign of the divisor.
                    Ok(Value::Int(((a % b) + b) % b))
                }
                _ => {
                    let (a, b) =
                        numeric_promote(&l, &r).ok_or_else(|| binary_type_error("%", &l, &r))?;
                    if b == 0.0 {
                        return Err(RuntimeError::zero_division("modulo by zero"));
                    }
                    Ok(Value::Float(a - b * (a / b).floor()))
                }
            },
            "**" => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) if *b >= 0 => match a.checked_pow(*b as u32) {
                    Some(result) => Ok(Value::Int(result)),
                    None => Ok(Value::Float((*a as f64).powf(*b as f64))),
                },
                _ => numeric_promote(&l, &r)
                    .map(|(a, b)| Value::Float(a.powf(b)))
                    .ok_or_else(|| binary_type_error("**", &l, &r)),
            },
            "==" => Ok(Value::Bool(l.equals(&r))),
            "!=" => Ok(Value::Bool(!l.equals(&r))),
            "<" | ">" | "<=" | ">=" => self.compare(operator, &l, &r),
            other => Err(RuntimeError::general(format!("Unknown operator: {}", other))),
        }
    }

    fn compare(&self, operator: &str, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
        let ordering = match (l, r) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => {
                let (a, b) =
                    numeric_promote(l, r).ok_or_else(|| binary_type_error(operator, l, r))?;
                match a.partial_cmp(&b) {
                    Some(ord) => ord,
                    None => return Ok(Value::Bool(false)),
                }
            }
        };
        let result = match operator {
            "<" => ordering.is_lt(),
            ">" => ordering.is_gt(),
            "<=" => ordering.is_le(),
            ">=" => ordering.is_ge(),
            _ => unreachable!(),
        };
        Ok(Value::Bool(result))
    }

    /* ── Iteration ───────────────────────────────────────── */

    fn iterate(&self, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::Array(arr) => Ok(arr.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            // Maps iterate over their keys in insertion order.
            Value::Map(map) => Ok(map.borrow().keys().cloned().map(Value::Str).collect()),
            other => Err(RuntimeError::type_error(format!(
                "Not iterable: {}",
                other.type_name()
            ))),
        }
    }

    fn expect_int(&self, value: Value, what: &str) -> Result<i64, RuntimeError> {
        match value {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::type_error(format!(
                "{} must be an integer, got {}",
                what,
                other.type_name()
            ))),
        }
    }
}

/// Walk the inheritance chain root-first so subclass defaults override.
fn collect_fields(class: &Rc<ClassDef>, fields: &mut IndexMap<String, Value>) {
    if let Some(parent) = &class.parent {
        collect_fields(parent, fields);
    }
    for (name, value) in &class.fields {
        fields.insert(name.clone(), value.clone());
    }
}

/// Method lookup that also reports the class that defines the method, which
/// anchors `super` resolution inside its body.
fn find_method(class: &Rc<ClassDef>, name: &str) -> Option<(Rc<Function>, Rc<ClassDef>)> {
    if let Some(method) = class.methods.get(name) {
        return Some((Rc::clone(method), Rc::clone(class)));
    }
    class.parent.as_ref().and_then(|p| find_method(p, name))
}

fn find_init(class: &Rc<ClassDef>) -> Option<(Rc<Function>, Rc<ClassDef>)> {
    if let Some(init) = &class.init_method {
        return Some((Rc::clone(init), Rc::clone(class)));
    }
    class.parent.as_ref().and_then(find_init)
}

fn error_descriptor(err: &RuntimeError) -> Value {
    let mut entries = IndexMap::new();
    entries.insert("message".to_string(), Value::Str(err.message.clone()));
    entries.insert("type".to_string(), Value::Str(err.kind_name().to_string()));
    Value::map(entries)
}

fn numeric_promote(l: &Value, r: &Value) -> Option<(f64, f64)> {
    let a = match l {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => return None,
    };
    let b = match r {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => return None,
    };
    Some((a, b))
}

fn numeric_compound(
    old: Value,
    new: Value,
    operator: &str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (&old, &new) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        _ => numeric_promote(&old, &new)
            .map(|(a, b)| Value::Float(float_op(a, b)))
            .ok_or_else(|| compound_type_error(operator, &old, &new)),
    }
}

fn binary_type_error(operator: &str, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "Unsupported operands for '{}': {} and {}",
        operator,
        l.type_name(),
        r.type_name()
    ))
}

fn compound_type_error(operator: &str, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "Unsupported operands for '{}': {} and {}",
        operator,
        l.type_name(),
        r.type_name()
    ))
}
