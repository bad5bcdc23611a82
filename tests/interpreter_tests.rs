// ABOUTME: End-to-end tests running complete programs and checking output

use quill::error::Diagnostics;
use quill::interpreter::Interpreter;
use quill::lexer::Lexer;
use quill::parser::Parser;
use quill::resolver::Resolver;
use std::cell::RefCell;
use std::rc::Rc;

/// Run a source string through the full pipeline, capturing program output.
fn run(source: &str) -> (String, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_writer(buffer.clone());

    let tokens = Lexer::new(source, &mut diagnostics).scan_tokens();
    let statements = Parser::new(tokens, &mut diagnostics).parse();
    if !diagnostics.had_error {
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        if !diagnostics.had_error {
            interpreter.resolve(locals);
            interpreter.interpret(&statements, &mut diagnostics);
        }
    }

    let output = String::from_utf8(buffer.borrow().clone()).expect("program output is UTF-8");
    (output, diagnostics)
}

/// Run and assert the program completed without any errors.
fn run_ok(source: &str) -> String {
    let (output, diagnostics) = run(source);
    assert!(!diagnostics.had_error, "syntax error: {:?}", diagnostics.messages());
    assert!(
        !diagnostics.had_runtime_error,
        "runtime error: {:?}",
        diagnostics.messages()
    );
    output
}

// ============================================================================
// Expressions and operators
// ============================================================================

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn test_grouping_overrides_precedence() {
    assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
}

#[test]
fn test_mixed_string_number_concatenation() {
    assert_eq!(run_ok("print \"a\" + 1;"), "a1\n");
    assert_eq!(run_ok("print 2 + \"b\";"), "2b\n");
    assert_eq!(run_ok("print \"pi is \" + 3.5;"), "pi is 3.5\n");
}

#[test]
fn test_integral_numbers_print_without_decimal() {
    assert_eq!(run_ok("print 4 / 2;"), "2\n");
    assert_eq!(run_ok("print 5 / 2;"), "2.5\n");
}

#[test]
fn test_equality_rules() {
    assert_eq!(
        run_ok("print nil == nil; print 1 == 1; print 1 == \"1\"; print \"a\" != \"b\";"),
        "true\ntrue\nfalse\ntrue\n"
    );
}

#[test]
fn test_logical_short_circuit_skips_evaluation() {
    // The undefined call on the right is never evaluated.
    assert_eq!(run_ok("print true or missing();"), "true\n");
    assert_eq!(run_ok("print false and missing();"), "false\n");
}

#[test]
fn test_truthiness_in_conditions() {
    assert_eq!(
        run_ok("if (0) print \"zero\"; if (\"\") print \"empty\"; if (nil) print \"nil\";"),
        "zero\nempty\n"
    );
}

// ============================================================================
// Statements and scope
// ============================================================================

#[test]
fn test_var_without_initializer_is_nil() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
}

#[test]
fn test_block_shadowing() {
    let source = r#"
    var a = "outer";
    {
        var a = "inner";
        print a;
    }
    print a;
    "#;
    assert_eq!(run_ok(source), "inner\nouter\n");
}

#[test]
fn test_while_loop_counts() {
    assert_eq!(
        run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn test_for_loop_desugars_and_runs() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn test_if_else_chains() {
    let source = r#"
    var n = 2;
    if (n == 1) print "one";
    else if (n == 2) print "two";
    else print "many";
    "#;
    assert_eq!(run_ok(source), "two\n");
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(run_ok("var a = 1; print a = 2;"), "2\n");
}

// ============================================================================
// Functions and closures
// ============================================================================

#[test]
fn test_function_declaration_and_call() {
    let source = r#"
    fun add(a, b) {
        return a + b;
    }
    print add(1, 2);
    print add;
    "#;
    assert_eq!(run_ok(source), "3\n<fn add>\n");
}

#[test]
fn test_function_without_return_yields_nil() {
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
}

#[test]
fn test_recursion() {
    let source = r#"
    fun fib(n) {
        if (n < 2) return n;
        return fib(n - 1) + fib(n - 2);
    }
    print fib(10);
    "#;
    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn test_closure_counter() {
    let source = r#"
    fun makeCounter() {
        var i = 0;
        fun count() {
            i = i + 1;
            print i;
        }
        return count;
    }
    var c = makeCounter();
    c();
    c();
    c();
    "#;
    assert_eq!(run_ok(source), "1\n2\n3\n");
}

#[test]
fn test_closures_capture_bindings_not_later_shadowings() {
    let source = r#"
    var a = "global";
    {
        fun show() {
            print a;
        }
        show();
        var a = "block";
        show();
    }
    "#;
    assert_eq!(run_ok(source), "global\nglobal\n");
}

#[test]
fn test_independent_counters() {
    let source = r#"
    fun makeCounter() {
        var i = 0;
        fun count() {
            i = i + 1;
            return i;
        }
        return count;
    }
    var a = makeCounter();
    var b = makeCounter();
    a();
    a();
    print a();
    print b();
    "#;
    assert_eq!(run_ok(source), "3\n1\n");
}

#[test]
fn test_return_unwinds_through_loops_and_blocks() {
    let source = r#"
    fun firstOverTen() {
        var i = 0;
        while (true) {
            {
                if (i > 10) return i;
            }
            i = i + 3;
        }
    }
    print firstOverTen();
    "#;
    assert_eq!(run_ok(source), "12\n");
}

// ============================================================================
// Classes, instances, inheritance
// ============================================================================

#[test]
fn test_class_prints_name_and_instance() {
    let source = r#"
    class Bagel {}
    print Bagel;
    print Bagel();
    "#;
    assert_eq!(run_ok(source), "Bagel\nBagel instance\n");
}

#[test]
fn test_fields_and_methods() {
    let source = r#"
    class Counter {
        init() {
            this.count = 0;
        }
        bump() {
            this.count = this.count + 1;
            return this.count;
        }
    }
    var c = Counter();
    c.bump();
    c.bump();
    print c.bump();
    print c.count;
    "#;
    assert_eq!(run_ok(source), "3\n3\n");
}

#[test]
fn test_initializer_arity_and_arguments() {
    let source = r#"
    class Point {
        init(x, y) {
            this.x = x;
            this.y = y;
        }
    }
    var p = Point(3, 4);
    print p.x + p.y;
    "#;
    assert_eq!(run_ok(source), "7\n");
}

#[test]
fn test_initializer_early_return_yields_instance() {
    let source = r#"
    class C {
        init() {
            return;
        }
    }
    print C();
    "#;
    assert_eq!(run_ok(source), "C instance\n");
}

#[test]
fn test_calling_init_again_returns_instance() {
    let source = r#"
    class C {
        init() {
            this.tag = "set";
        }
    }
    var c = C();
    print c.init();
    "#;
    assert_eq!(run_ok(source), "C instance\n");
}

#[test]
fn test_methods_bind_this() {
    let source = r#"
    class Person {
        init(name) {
            this.name = name;
        }
        greet() {
            print "hi " + this.name;
        }
    }
    var method = Person("ada").greet;
    method();
    "#;
    assert_eq!(run_ok(source), "hi ada\n");
}

#[test]
fn test_methods_stored_in_fields_shadow_class_methods() {
    let source = r#"
    class Box {}
    fun shout() {
        print "field wins";
    }
    var box = Box();
    box.speak = shout;
    box.speak();
    "#;
    assert_eq!(run_ok(source), "field wins\n");
}

#[test]
fn test_inheritance_with_super() {
    let source = r#"
    class A {
        greet() {
            print "A";
        }
    }
    class B < A {
        greet() {
            super.greet();
            print "B";
        }
    }
    B().greet();
    "#;
    assert_eq!(run_ok(source), "A\nB\n");
}

#[test]
fn test_inherited_methods_found_through_chain() {
    let source = r#"
    class A {
        hello() {
            print "from A";
        }
    }
    class B < A {}
    class C < B {}
    C().hello();
    "#;
    assert_eq!(run_ok(source), "from A\n");
}

#[test]
fn test_super_resolves_past_receiver_class() {
    // The classic dispatch test: super in A.method must find A's parent's
    // method even when called on a C instance.
    let source = r#"
    class A {
        method() {
            print "A method";
        }
    }
    class B < A {
        method() {
            print "B method";
        }
        test() {
            super.method();
        }
    }
    class C < B {}
    C().test();
    "#;
    assert_eq!(run_ok(source), "A method\n");
}

#[test]
fn test_class_can_reference_itself_in_method() {
    let source = r#"
    class Maker {
        another() {
            return Maker();
        }
    }
    print Maker().another();
    "#;
    assert_eq!(run_ok(source), "Maker instance\n");
}

// ============================================================================
// Builtins
// ============================================================================

#[test]
fn test_clock_yields_numbers() {
    assert_eq!(run_ok("var t = clock(); print t > 0;"), "true\n");
}

#[test]
fn test_clock_is_callable_and_printable() {
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
}

// ============================================================================
// REPL-style reuse: the interpreter persists across runs
// ============================================================================

#[test]
fn test_state_carries_across_batches() {
    let mut diagnostics = Diagnostics::new();
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_writer(buffer.clone());

    for source in ["var a = 1;", "fun bump() { a = a + 1; }", "bump();", "print a;"] {
        diagnostics.had_error = false;
        let tokens = Lexer::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        assert!(!diagnostics.had_error);
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error);
        interpreter.resolve(locals);
        interpreter.interpret(&statements, &mut diagnostics);
        assert!(!diagnostics.had_runtime_error);
    }

    let output = String::from_utf8(buffer.borrow().clone()).expect("utf-8");
    assert_eq!(output, "2\n");
}

#[test]
fn test_closures_survive_their_defining_batch() {
    let mut diagnostics = Diagnostics::new();
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_writer(buffer.clone());

    let batches = [
        "fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; }",
        "var c = makeCounter();",
        "c();",
        "c();",
    ];
    for source in batches {
        let tokens = Lexer::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error);
        interpreter.resolve(locals);
        interpreter.interpret(&statements, &mut diagnostics);
        assert!(!diagnostics.had_runtime_error);
    }

    let output = String::from_utf8(buffer.borrow().clone()).expect("utf-8");
    assert_eq!(output, "1\n2\n");
}
