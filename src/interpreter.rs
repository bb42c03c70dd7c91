use std::{
    cell::RefCell,
    collections::BTreeMap,
    io::{self, Write},
    rc::Rc,
};

use log::{debug, error, trace};

use crate::{
    ast::{ArithmeticOperator, Expr, FunctionDeclaration, IfStmt, Program, Property, Stmt},
    config::{Config, ErrorMode},
    environment::Environment,
    error::{EvalResult, LangResult, RuntimeError},
    lexer::tokenize,
    natives,
    parser::Parser,
    value::{format_number, FunctionValue, Value},
};

/// Tree-walking evaluator. The global frame persists across calls to
/// [`Interpreter::run`], so successive sources see each other's bindings.
pub struct Interpreter {
    config: Config,
    global: Rc<Environment>,
    out: RefCell<Box<dyn Write>>,
    diagnostics: RefCell<Vec<String>>,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self::with_output(config, Box::new(io::stdout()))
    }

    /// Native functions such as `print` write to `out` instead of stdout.
    pub fn with_output(config: Config, out: Box<dyn Write>) -> Self {
        Self {
            config,
            global: Environment::global(natives::registry()),
            out: RefCell::new(out),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn global(&self) -> &Rc<Environment> {
        &self.global
    }

    /// Messages reported without aborting: parser warnings, and runtime
    /// errors recovered in legacy mode.
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.borrow().clone()
    }

    pub fn run(&self, source: &str) -> LangResult<Value> {
        let tokens = tokenize(source)?;
        trace!("lexed {} token(s)", tokens.len());

        let mut parser = Parser::new(tokens).with_elif_policy(self.config.elif_policy);
        let program = parser.parse_program()?;
        self.diagnostics
            .borrow_mut()
            .extend(parser.diagnostics().iter().cloned());

        let value = self.eval_program(&program)?;
        self.out.borrow_mut().flush()?;
        Ok(value)
    }

    /// Evaluates every top-level statement in the global frame and yields the
    /// value of the last one.
    pub fn eval_program(&self, program: &Program) -> EvalResult<Value> {
        self.eval_body(&program.body, &self.global)
    }

    pub fn evaluate(&self, stmt: &Stmt, env: &Rc<Environment>) -> EvalResult<Value> {
        let result = self.eval_statement(stmt, env);
        self.recover(result)
    }

    pub fn eval_expr(&self, expr: &Expr, env: &Rc<Environment>) -> EvalResult<Value> {
        let result = self.eval_expression(expr, env);
        self.recover(result)
    }

    // In legacy mode the node that raised the error reports it and yields null.
    fn recover(&self, result: EvalResult<Value>) -> EvalResult<Value> {
        match result {
            Err(err) if self.config.error_mode == ErrorMode::Legacy => {
                error!("{}", err);
                self.diagnostics.borrow_mut().push(err.to_string());
                Ok(Value::Null)
            }
            result => result,
        }
    }

    fn eval_body(&self, body: &[Stmt], env: &Rc<Environment>) -> EvalResult<Value> {
        let mut last = Value::Null;
        for stmt in body {
            last = self.evaluate(stmt, env)?;
        }
        Ok(last)
    }

    fn eval_scoped(&self, body: &[Stmt], env: &Rc<Environment>) -> EvalResult<Value> {
        let scope = Environment::new(Some(Rc::clone(env)));
        self.eval_body(body, &scope)
    }

    fn eval_statement(&self, stmt: &Stmt, env: &Rc<Environment>) -> EvalResult<Value> {
        match stmt {
            Stmt::VarDeclaration {
                identifier,
                value,
                is_constant,
            } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                debug!("declaring '{}' = {:?}", identifier, value);
                env.declare(identifier, value, *is_constant)
            }
            Stmt::FunctionDeclaration(declaration) => self.declare_function(declaration, env),
            Stmt::Return(expr) => self.eval_expr(expr, env),
            Stmt::If(if_stmt) => self.eval_if(if_stmt, env),
            Stmt::Import { module } => {
                debug!("ignoring import of '{}'", module);
                Ok(Value::Null)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    fn declare_function(
        &self,
        declaration: &FunctionDeclaration,
        env: &Rc<Environment>,
    ) -> EvalResult<Value> {
        let function = FunctionValue {
            name: declaration.name.clone(),
            parameters: declaration.parameters.clone(),
            body: Rc::clone(&declaration.body),
            declaration_env: Rc::clone(env),
        };
        env.declare(&declaration.name, Value::Function(Rc::new(function)), true)
    }

    fn eval_if(&self, if_stmt: &IfStmt, env: &Rc<Environment>) -> EvalResult<Value> {
        if self.eval_expr(&if_stmt.condition, env)?.is_truthy() {
            debug!("if: taking then branch");
            return self.eval_scoped(&if_stmt.then_branch, env);
        }

        for (index, arm) in if_stmt.elif_branches.iter().enumerate() {
            if self.eval_expr(&arm.condition, env)?.is_truthy() {
                debug!("if: taking elif arm {}", index);
                return self.eval_scoped(&arm.body, env);
            }
        }

        match &if_stmt.else_branch {
            Some(body) => {
                debug!("if: taking else branch");
                self.eval_scoped(body, env)
            }
            None => Ok(Value::Null),
        }
    }

    fn eval_expression(&self, expr: &Expr, env: &Rc<Environment>) -> EvalResult<Value> {
        match expr {
            Expr::Identifier(name) => env.lookup(name),
            Expr::NumericLiteral(n) => Ok(Value::Number(*n)),
            Expr::StringLiteral(s) => Ok(Value::String(s.clone())),
            Expr::Object(properties) => self.eval_object(properties, env),
            Expr::Binary {
                left,
                right,
                operator,
            } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                Ok(arithmetic(*operator, &left, &right))
            }
            Expr::Relational {
                left,
                right,
                operator,
            } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                Ok(match (left, right) {
                    (Value::Number(l), Value::Number(r)) => Value::Boolean(operator.compare(l, r)),
                    _ => Value::Null,
                })
            }
            Expr::Logical {
                left,
                right,
                operator,
            } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                Ok(match (left, right) {
                    (Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(operator.apply(l, r)),
                    _ => Value::Null,
                })
            }
            Expr::Assignment { assignee, value } => {
                let name = assignment_target(assignee)?;
                let value = self.eval_expr(value, env)?;
                env.assign(name, value)
            }
            Expr::CompoundAssignment {
                assignee,
                operator,
                value,
            } => {
                let name = assignment_target(assignee)?;
                let current = env.lookup(name)?;
                let value = self.eval_expr(value, env)?;
                env.assign(name, arithmetic(*operator, &current, &value))
            }
            Expr::Call { caller, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                let callee = self.eval_expr(caller, env)?;
                self.call(callee, args, env)
            }
            Expr::Member {
                object,
                property,
                computed,
            } => {
                let object = self.eval_expr(object, env)?;
                let key = if *computed {
                    let key = self.eval_expr(property, env)?;
                    computed_key(key)?
                } else {
                    match &**property {
                        Expr::Identifier(name) => name.clone(),
                        other => {
                            return Err(RuntimeError::InvalidComputedKey {
                                found: other.kind_name().to_string(),
                            })
                        }
                    }
                };
                member(object, key)
            }
            Expr::Null => Ok(Value::Null),
        }
    }

    fn eval_object(&self, properties: &[Property], env: &Rc<Environment>) -> EvalResult<Value> {
        let mut fields = BTreeMap::new();
        for property in properties {
            let value = match &property.value {
                Some(expr) => self.eval_expr(expr, env)?,
                None => env.lookup(&property.key)?,
            };
            fields.insert(property.key.clone(), value);
        }
        Ok(Value::Object(fields))
    }

    fn call(&self, callee: Value, args: Vec<Value>, env: &Rc<Environment>) -> EvalResult<Value> {
        match callee {
            Value::NativeFunction(native) => {
                debug!("calling native '{}' with {} argument(s)", native.name, args.len());
                let mut out = self.out.borrow_mut();
                native.call(&args, env, &mut **out)
            }
            Value::Function(function) => self.call_function(&function, args),
            other => Err(RuntimeError::InvalidCallTarget {
                found: other.type_name().to_string(),
            }),
        }
    }

    // Missing arguments bind null; extra arguments are dropped.
    fn call_function(&self, function: &Rc<FunctionValue>, args: Vec<Value>) -> EvalResult<Value> {
        debug!(
            "calling '{}' with {} argument(s)",
            function.name,
            args.len()
        );
        let scope = Environment::new(Some(Rc::clone(&function.declaration_env)));
        let mut args = args.into_iter();
        for parameter in &function.parameters {
            scope.declare(parameter, args.next().unwrap_or(Value::Null), false)?;
        }
        self.eval_body(&function.body, &scope)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn arithmetic(operator: ArithmeticOperator, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Value::Number(operator.apply(*l, *r)),
        _ => Value::Null,
    }
}

fn assignment_target(assignee: &Expr) -> EvalResult<&str> {
    match assignee {
        Expr::Identifier(name) => Ok(name),
        other => Err(RuntimeError::InvalidAssignmentTarget {
            target: other.kind_name().to_string(),
        }),
    }
}

fn computed_key(key: Value) -> EvalResult<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(format_number(n)),
        other => Err(RuntimeError::InvalidComputedKey {
            found: other.type_name().to_string(),
        }),
    }
}

fn member(object: Value, key: String) -> EvalResult<Value> {
    match object {
        Value::Object(fields) => fields
            .get(&key)
            .cloned()
            .ok_or(RuntimeError::UnresolvedMember { property: key }),
        other => Err(RuntimeError::NotAnObject {
            property: key,
            found: other.type_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::{rc::Weak, sync::Arc};

    use super::*;
    use crate::{
        config::ElifPolicy,
        error::LangError,
        natives::NativeFunction,
    };

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("output should be utf-8")
        }
    }

    fn interpreter(config: Config) -> (Interpreter, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let interpreter = Interpreter::with_output(config, Box::new(buffer.clone()));
        (interpreter, buffer)
    }

    fn run_source(source: &str) -> LangResult<Interpreter> {
        let (interpreter, _) = interpreter(Config::default());
        interpreter.run(source)?;
        Ok(interpreter)
    }

    fn eval(source: &str) -> LangResult<Value> {
        let (interpreter, _) = interpreter(Config::default());
        interpreter.run(source)
    }

    #[test]
    fn declared_variable_can_be_read_back() -> LangResult<()> {
        let interpreter = run_source("have x := 5;")?;
        assert_eq!(interpreter.global.lookup("x")?, Value::Number(5.0));
        assert_eq!(eval("have x := 5;\nx")?, Value::Number(5.0));
        Ok(())
    }

    #[test]
    fn declaration_without_value_binds_null() -> LangResult<()> {
        let interpreter = run_source("have pending;\nhave typed : number")?;
        assert_eq!(interpreter.global.lookup("pending")?, Value::Null);
        assert_eq!(interpreter.global.lookup("typed")?, Value::Null);
        Ok(())
    }

    #[test]
    fn constant_reassignment_aborts_in_strict_mode() {
        let err = eval("const y := 10;\ny := 20").expect_err("constant reassignment should fail");
        match err {
            LangError::Runtime(RuntimeError::ConstantReassignment { name }) => assert_eq!(name, "y"),
            other => panic!("expected constant violation, got {:?}", other),
        }
    }

    #[test]
    fn legacy_mode_reports_and_keeps_going() -> LangResult<()> {
        let (interpreter, _) = interpreter(Config::legacy());
        let value = interpreter.run("const y := 10\ny := 20\nhave z := y\nz")?;

        assert_eq!(value, Value::Number(10.0));
        assert_eq!(
            interpreter.diagnostics(),
            vec!["Cannot reassign to variable 'y' as it was declared constant".to_string()]
        );
        Ok(())
    }

    #[test]
    fn legacy_mode_nulls_the_failing_node_only() -> LangResult<()> {
        let (interpreter, _) = interpreter(Config::legacy());
        let value = interpreter.run("have a := missing + 1\na")?;
        assert_eq!(value, Value::Null);
        assert_eq!(interpreter.diagnostics().len(), 1);
        Ok(())
    }

    #[test]
    fn const_without_value_is_a_diagnostic() -> LangResult<()> {
        let interpreter = run_source("const later;\nlater := 3")?;
        assert_eq!(interpreter.global.lookup("later")?, Value::Number(3.0));
        assert_eq!(interpreter.diagnostics().len(), 1);
        assert!(interpreter.diagnostics()[0].contains("without a value"));
        Ok(())
    }

    #[test]
    fn functions_add_their_arguments() -> LangResult<()> {
        assert_eq!(
            eval("func add(a, b) { a + b }\nadd(2, 3)")?,
            Value::Number(5.0)
        );
        Ok(())
    }

    #[test]
    fn function_declaration_is_a_constant_binding() -> LangResult<()> {
        let interpreter = run_source("func id(v) { v }")?;
        assert!(interpreter.global.is_constant("id"));
        assert!(matches!(interpreter.global.lookup("id")?, Value::Function(_)));
        Ok(())
    }

    #[test]
    fn missing_arguments_are_null_and_extras_are_dropped() -> LangResult<()> {
        assert_eq!(eval("func second(a, b) { b }\nsecond(1)")?, Value::Null);
        assert_eq!(
            eval("func first(a) { a }\nfirst(1, 2, 3)")?,
            Value::Number(1.0)
        );
        Ok(())
    }

    #[test]
    fn return_does_not_short_circuit() -> LangResult<()> {
        assert_eq!(
            eval("func f() { return 1\n2 }\nf()")?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn zero_is_falsy_in_conditions() -> LangResult<()> {
        assert_eq!(eval("if 0 { 1 } else { 2 }")?, Value::Number(2.0));
        assert_eq!(eval("if 3 { 1 } else { 2 }")?, Value::Number(1.0));
        assert_eq!(eval("if false { 1 }")?, Value::Null);
        assert_eq!(eval("if true { }")?, Value::Null);
        Ok(())
    }

    #[test]
    fn branch_bodies_run_in_their_own_scope() -> LangResult<()> {
        let interpreter = run_source("have x := 1\nif true { have x := 2\nx := 3 }")?;
        assert_eq!(interpreter.global.lookup("x")?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn elif_arms_are_tried_in_order() -> LangResult<()> {
        let source = r#"
            have x := 2
            if x == 0 { "zero" } elif x == 1 { "one" } elif x == 2 { "two" } else { "other" }
        "#;
        assert_eq!(eval(source)?, Value::String("two".to_string()));

        let (last_wins, _) =
            interpreter(Config::default().with_elif_policy(ElifPolicy::LastWins));
        let source = r#"
            have x := 1
            if x == 0 { "zero" } elif x == 1 { "one" } elif x == 2 { "two" } else { "other" }
        "#;
        assert_eq!(last_wins.run(source)?, Value::String("other".to_string()));
        Ok(())
    }

    #[test]
    fn object_members_resolve_or_fail() -> LangResult<()> {
        assert_eq!(
            eval("have obj := { a: 1, b: 2 }\nobj.b")?,
            Value::Number(2.0)
        );

        let err = eval("have obj := { a: 1, b: 2 }\nobj.c").expect_err("c does not exist");
        assert_eq!(err.to_string(), "Cannot resolve property 'c' as it does not exist");
        Ok(())
    }

    #[test]
    fn shorthand_properties_look_up_variables() -> LangResult<()> {
        let value = eval("have a := 1\nhave b := \"two\"\nhave obj := { a, b }\nobj")?;
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Number(1.0));
        expected.insert("b".to_string(), Value::String("two".to_string()));
        assert_eq!(value, Value::Object(expected));
        Ok(())
    }

    #[test]
    fn computed_member_access_uses_string_and_integer_keys() -> LangResult<()> {
        let source = r#"
            have key := "name"
            have obj := { name: "quill" }
            obj[key]
        "#;
        assert_eq!(eval(source)?, Value::String("quill".to_string()));

        let err = eval("have obj := { a: 1 }\nobj[true]").expect_err("boolean key");
        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::InvalidComputedKey { .. })
        ));
        Ok(())
    }

    #[test]
    fn member_access_on_non_object_fails() {
        let err = eval("have n := 3\nn.field").expect_err("numbers have no members");
        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::NotAnObject { .. })
        ));
    }

    #[test]
    fn closures_see_their_defining_scope() -> LangResult<()> {
        let source = r#"
            have base := 10
            func makeAdder(n) {
                func inner(x) { x + n + base }
                inner
            }
            have add5 := makeAdder(5)
            have n := 100
            add5(1)
        "#;
        assert_eq!(eval(source)?, Value::Number(16.0));
        Ok(())
    }

    #[test]
    fn closures_share_mutable_outer_state() -> LangResult<()> {
        let source = r#"
            have count := 0
            func bump() { count += 1 }
            bump()
            bump()
            count
        "#;
        assert_eq!(eval(source)?, Value::Number(2.0));
        Ok(())
    }

    #[test]
    fn type_mismatches_degrade_to_null() -> LangResult<()> {
        assert_eq!(eval("1 + \"a\"")?, Value::Null);
        assert_eq!(eval("\"a\" > 1")?, Value::Null);
        assert_eq!(eval("1 && true")?, Value::Null);
        assert_eq!(eval("null * 2")?, Value::Null);
        Ok(())
    }

    #[test]
    fn comparison_and_logic_produce_booleans() -> LangResult<()> {
        assert_eq!(eval("3 > 2")?, Value::Boolean(true));
        assert_eq!(eval("3 <= 2")?, Value::Boolean(false));
        assert_eq!(eval("(1 == 1) && (2 != 2)")?, Value::Boolean(false));
        assert_eq!(eval("false || true")?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn division_by_zero_is_infinite() -> LangResult<()> {
        assert_eq!(eval("1 / 0")?, Value::Number(f64::INFINITY));
        Ok(())
    }

    #[test]
    fn assignment_requires_existing_identifier() {
        let err = eval("ghost := 1").expect_err("undeclared assignment");
        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::UndefinedVariable { .. })
        ));

        let err = eval("have o := { a: 1 }\no.a := 2").expect_err("member assignment");
        assert_eq!(
            err.to_string(),
            "Invalid assignment target MemberExpr"
        );
    }

    #[test]
    fn calling_a_non_function_fails() {
        let err = eval("have x := 1\nx()").expect_err("numbers are not callable");
        assert_eq!(err.to_string(), "Invalid function call: number is not callable");
    }

    #[test]
    fn postfix_question_mark_yields_null() -> LangResult<()> {
        assert_eq!(eval("have x := 4?\nx")?, Value::Null);
        Ok(())
    }

    #[test]
    fn imports_are_accepted_and_ignored() -> LangResult<()> {
        assert_eq!(eval("pull std.io\n1")?, Value::Number(1.0));
        assert_eq!(eval("pull std.io")?, Value::Null);
        Ok(())
    }

    #[test]
    fn print_writes_to_the_configured_sink() -> LangResult<()> {
        let (interpreter, buffer) = interpreter(Config::default());
        interpreter.run("have name := \"quill\"\nprint(\"hello\", name, 1 + 1)")?;
        assert_eq!(buffer.contents(), "hello quill 2\n");
        Ok(())
    }

    #[test]
    fn large_integer_literals_print_unchanged() -> LangResult<()> {
        let (interpreter, buffer) = interpreter(Config::default());
        interpreter.run("print(100000000000000000000)\nprint(str(10000000000000000000))")?;
        assert_eq!(
            buffer.contents(),
            "100000000000000000000\n10000000000000000000\n"
        );
        Ok(())
    }

    #[test]
    fn natives_receive_the_calling_environment() -> LangResult<()> {
        let (interpreter, _) = interpreter(Config::default());
        let lookup = NativeFunction::new("lookup", |args, env, _out| match args.first() {
            Some(Value::String(name)) => env.lookup(name),
            _ => Ok(Value::Null),
        });
        interpreter.global().declare(
            "lookup",
            Value::NativeFunction(Arc::new(lookup)),
            true,
        )?;

        let value = interpreter.run("func f(secret) { lookup(\"secret\") }\nf(42)")?;
        assert_eq!(value, Value::Number(42.0));
        Ok(())
    }

    #[test]
    fn call_frames_live_only_as_long_as_their_functions() -> LangResult<()> {
        thread_local! {
            static FRAME: RefCell<Option<Weak<Environment>>> = const { RefCell::new(None) };
        }
        let (interpreter, _) = interpreter(Config::default());
        let capture = NativeFunction::new("capture", |_args, env, _out| {
            FRAME.with(|frame| *frame.borrow_mut() = Some(Rc::downgrade(env)));
            Ok(Value::Null)
        });
        interpreter.global().declare(
            "capture",
            Value::NativeFunction(Arc::new(capture)),
            true,
        )?;
        let frame_alive = || {
            FRAME.with(|frame| {
                frame
                    .borrow()
                    .as_ref()
                    .is_some_and(|weak| weak.upgrade().is_some())
            })
        };

        interpreter.run("func plain(a) { capture() }\nplain(1)")?;
        assert!(!frame_alive(), "a frame without inner functions is released");

        // Inner functions hold their declaring frame, which holds them back.
        interpreter.run("func outer() {\nfunc inner() { 1 }\ncapture()\n}\nouter()")?;
        assert!(frame_alive());
        Ok(())
    }

    #[test]
    fn globals_persist_between_runs() -> LangResult<()> {
        let (interpreter, _) = interpreter(Config::default());
        interpreter.run("have total := 1")?;
        interpreter.run("total += 41")?;
        assert_eq!(interpreter.run("total")?, Value::Number(42.0));
        Ok(())
    }

    #[test]
    fn builtin_literals_are_constant() {
        let err = eval("true := false").expect_err("true is constant");
        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::ConstantReassignment { .. })
        ));
    }
}
