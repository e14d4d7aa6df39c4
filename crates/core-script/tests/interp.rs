//! Interpreter behavior through a minimal host: operator precedence,
//! short-circuit evaluation, parallel assignment, control flow, and user
//! routine definition.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use core_script::{
    eval_expr, exec_lines, CalleeInfo, Host, Interp, RoutineDef,
};
use core_status::{EdError, Result};
use core_value::Datum;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct MockHost {
    routines: HashMap<String, RoutineDef>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl MockHost {
    fn new() -> Self {
        Self::default()
    }
}

impl Host for MockHost {
    fn lookup(&self, name: &str) -> Option<CalleeInfo> {
        match name {
            "abs" => Some(CalleeInfo {
                min_args: 0,
                max_args: 1,
            }),
            "boom" => Some(CalleeInfo {
                min_args: 0,
                max_args: 0,
            }),
            "record" => Some(CalleeInfo {
                min_args: 1,
                max_args: 1,
            }),
            _ => self.routines.get(name).map(|r| CalleeInfo {
                min_args: r.min_args,
                max_args: r.max_args,
            }),
        }
    }

    fn call(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Result<Datum> {
        self.calls.borrow_mut().push(name.to_string());
        match name {
            "abs" => {
                let v = match args.first() {
                    Some(v) => v.as_int()?,
                    None => n.unwrap_or(0),
                };
                Ok(Datum::Int(v.abs()))
            }
            "boom" => Err(EdError::failure("boom invoked")),
            "record" => Ok(args.into_iter().next().unwrap()),
            _ => {
                let body = self
                    .routines
                    .get(name)
                    .ok_or_else(|| EdError::failure(format!("Unknown '{name}'")))?
                    .body
                    .clone();
                exec_lines(interp, self, name, &body, args, n)
            }
        }
    }

    fn get_special(&mut self, _interp: &mut Interp, _name: &str) -> Result<Option<Datum>> {
        Ok(None)
    }

    fn set_special(&mut self, _interp: &mut Interp, _name: &str, _value: &Datum) -> Result<bool> {
        Ok(false)
    }

    fn match_pattern(&mut self, subject: &[u8], pattern: &[u8]) -> Result<bool> {
        Ok(subject.windows(pattern.len().max(1)).any(|w| w == pattern))
    }

    fn define_routine(&mut self, def: RoutineDef) -> Result<()> {
        self.routines.insert(def.name.clone(), def);
        Ok(())
    }
}

fn eval(src: &str) -> Datum {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_expr(&mut interp, &mut host, src).unwrap()
}

fn eval_in(interp: &mut Interp, host: &mut MockHost, src: &str) -> Datum {
    eval_expr(interp, host, src).unwrap()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Datum::Int(7));
    assert_eq!(eval("1 + 2 * 3 == 7"), Datum::Bool(true));
    assert_eq!(eval("(1 + 2) * 3"), Datum::Int(9));
    assert_eq!(eval("10 - 2 - 3"), Datum::Int(5));
    assert_eq!(eval("7 % 3 + 1"), Datum::Int(2));
}

#[test]
fn low_precedence_logicals() {
    assert_eq!(
        eval("1 + 2 * 3 == 7 and true or false == true"),
        Datum::Bool(true)
    );
    assert_eq!(eval("not false"), Datum::Bool(true));
    assert_eq!(eval("not true and true"), Datum::Bool(false));
}

#[test]
fn string_concat_chain() {
    assert_eq!(eval(r#""a" & "b" & "c""#), Datum::str("abc"));
    assert_eq!(eval(r#""a" & "b" & "c" == "abc""#), Datum::Bool(true));
    // Right scalar operand stringifies.
    assert_eq!(eval(r#""n=" & 5"#), Datum::str("n=5"));
}

#[test]
fn array_concat_union_intersection() {
    assert_eq!(eval("[1,2] & [3,4] == [1,2,3,4]"), Datum::Bool(true));
    assert_eq!(eval("[1,2,2,3] | [2,3,4] == [1,2,3,4]"), Datum::Bool(true));
    assert_eq!(eval("[1,2,3] * [2,3,4] == [2,3]"), Datum::Bool(true));
    assert_eq!(eval("[1,2,3] - [2] == [1,3]"), Datum::Bool(true));
}

#[test]
fn format_operator() {
    assert_eq!(eval(r#""x=%d" % 5"#), Datum::str("x=5"));
    assert_eq!(eval(r#""x=%d" % 5 == "x=5""#), Datum::Bool(true));
    assert_eq!(eval(r#""%s-%d" % ["a", 3]"#), Datum::str("a-3"));
    assert_eq!(eval(r#""%04d" % 7"#), Datum::str("0007"));
    assert_eq!(eval(r#""%-3d|" % 7"#), Datum::str("7  |"));
}

#[test]
fn numeric_prefix_operator() {
    assert_eq!(eval("5 => abs()"), Datum::Int(5));
    assert_eq!(eval("5 => abs() == 5"), Datum::Bool(true));
}

#[test]
fn bitwise_and_shift() {
    assert_eq!(eval("6 & 3"), Datum::Int(2));
    assert_eq!(eval("6 | 3"), Datum::Int(7));
    assert_eq!(eval("6 ^ 3"), Datum::Int(5));
    assert_eq!(eval("1 << 4"), Datum::Int(16));
    assert_eq!(eval("~0"), Datum::Int(-1));
}

#[test]
fn short_circuit_does_not_invoke_skipped_call() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    let calls = host.calls.clone();

    assert_eq!(
        eval_in(&mut interp, &mut host, "false && boom()"),
        Datum::Bool(false)
    );
    assert_eq!(
        eval_in(&mut interp, &mut host, "true || boom()"),
        Datum::Bool(true)
    );
    assert_eq!(
        eval_in(&mut interp, &mut host, r#"true ? "safe" : boom()"#),
        Datum::str("safe")
    );
    assert_eq!(
        eval_in(&mut interp, &mut host, "false and boom()"),
        Datum::Bool(false)
    );
    assert_eq!(
        eval_in(&mut interp, &mut host, "true or boom()"),
        Datum::Bool(true)
    );
    assert!(calls.borrow().iter().all(|c| c != "boom"));

    // And the skipped branch still consumes its tokens.
    assert_eq!(
        eval_in(&mut interp, &mut host, "false && abs(boom())"),
        Datum::Bool(false)
    );
}

#[test]
fn taken_branch_does_invoke() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    assert!(eval_expr(&mut interp, &mut host, "true && boom()").is_err());
}

#[test]
fn parallel_assignment_pads_with_nil() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_in(&mut interp, &mut host, "a, b, c = [10, 20]");
    assert_eq!(eval_in(&mut interp, &mut host, "a"), Datum::Int(10));
    assert_eq!(eval_in(&mut interp, &mut host, "b"), Datum::Int(20));
    assert_eq!(eval_in(&mut interp, &mut host, "c"), Datum::Nil);
}

#[test]
fn global_variables_use_sigil() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_in(&mut interp, &mut host, "$g = 41");
    assert_eq!(eval_in(&mut interp, &mut host, "$g + 1"), Datum::Int(42));
    assert!(eval_expr(&mut interp, &mut host, "$missing + 1").is_err());
}

#[test]
fn compound_assignment_and_incdec() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_in(&mut interp, &mut host, "x = 10");
    eval_in(&mut interp, &mut host, "x += 5");
    assert_eq!(eval_in(&mut interp, &mut host, "x"), Datum::Int(15));
    assert_eq!(eval_in(&mut interp, &mut host, "x++"), Datum::Int(15));
    assert_eq!(eval_in(&mut interp, &mut host, "x"), Datum::Int(16));
    assert_eq!(eval_in(&mut interp, &mut host, "--x"), Datum::Int(15));
    eval_in(&mut interp, &mut host, "x <<= 2");
    assert_eq!(eval_in(&mut interp, &mut host, "x"), Datum::Int(60));
}

#[test]
fn array_subscript_and_slice() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_in(&mut interp, &mut host, "a = [1, 2, 3, 4]");
    assert_eq!(eval_in(&mut interp, &mut host, "a[0]"), Datum::Int(1));
    assert_eq!(eval_in(&mut interp, &mut host, "a[-1]"), Datum::Int(4));
    eval_in(&mut interp, &mut host, "a[1] = 20");
    assert_eq!(eval_in(&mut interp, &mut host, "a[1]"), Datum::Int(20));
    assert_eq!(
        eval_in(&mut interp, &mut host, "a[1, 2] == [20, 3]"),
        Datum::Bool(true)
    );
    assert!(eval_expr(&mut interp, &mut host, "a[9]").is_err());
}

#[test]
fn interpolation_evaluates_nested_expression() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    eval_in(&mut interp, &mut host, "n = 6");
    assert_eq!(
        eval_in(&mut interp, &mut host, r#""n is #{n * 7}!""#),
        Datum::str("n is 42!")
    );
}

#[test]
fn regexp_match_operator() {
    assert_eq!(eval(r#""haystack" =~ "stack""#), Datum::Bool(true));
    assert_eq!(eval(r#""haystack" !~ "needle""#), Datum::Bool(true));
}

#[test]
fn wrong_operand_types_fail() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    assert!(eval_expr(&mut interp, &mut host, r#"1 + "x""#).is_err());
    assert!(eval_expr(&mut interp, &mut host, "[1] + [2]").is_err());
    assert!(eval_expr(&mut interp, &mut host, r#"true < false"#).is_err());
}

fn run(lines: &[&str]) -> (Interp, MockHost, Datum) {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    let body: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    let value = exec_lines(&mut interp, &mut host, "test", &body, Vec::new(), None).unwrap();
    (interp, host, value)
}

#[test]
fn if_elsif_else_chain() {
    let (_, _, value) = run(&[
        "$x = 2",
        "if $x == 1",
        "  $r = 'one'",
        "elsif $x == 2",
        "  $r = 'two'",
        "else",
        "  $r = 'many'",
        "endif",
        "$r",
    ]);
    assert_eq!(value, Datum::str("two"));
}

#[test]
fn while_loop_accumulates() {
    let (_, _, value) = run(&[
        "$sum = 0",
        "$i = 0",
        "while $i < 5",
        "  $sum += $i",
        "  $i++",
        "endloop",
        "$sum",
    ]);
    assert_eq!(value, Datum::Int(10));
}

#[test]
fn until_loop_runs_until_true() {
    let (_, _, value) = run(&[
        "$n = 0",
        "until $n >= 3",
        "  $n++",
        "endloop",
        "$n",
    ]);
    assert_eq!(value, Datum::Int(3));
}

#[test]
fn for_loop_iterates_array() {
    let (_, _, value) = run(&[
        "$sum = 0",
        "for x in [1, 2, 3, 4]",
        "  $sum += x",
        "endloop",
        "$sum",
    ]);
    assert_eq!(value, Datum::Int(10));
}

#[test]
fn break_and_next() {
    let (_, _, value) = run(&[
        "$sum = 0",
        "$i = 0",
        "loop",
        "  $i++",
        "  if $i > 10",
        "    break",
        "  endif",
        "  if $i % 2 == 0",
        "    next",
        "  endif",
        "  $sum += $i",
        "endloop",
        "$sum",
    ]);
    // 1 + 3 + 5 + 7 + 9
    assert_eq!(value, Datum::Int(25));
}

#[test]
fn break_two_levels() {
    let (_, _, value) = run(&[
        "$hits = 0",
        "$i = 0",
        "while $i < 3",
        "  $i++",
        "  loop",
        "    $hits++",
        "    break 2",
        "  endloop",
        "endloop",
        "$hits",
    ]);
    assert_eq!(value, Datum::Int(1));
}

#[test]
fn max_loop_guard_trips() {
    let mut interp = Interp::new();
    interp.max_loop = 10;
    let mut host = MockHost::new();
    let body: Vec<String> = ["loop", "  $x = 1", "endloop"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let err = exec_lines(&mut interp, &mut host, "t", &body, Vec::new(), None).unwrap_err();
    assert!(err.message.contains("loop iterations"));
}

#[test]
fn continuation_lines_join() {
    let (_, _, value) = run(&["$x = 1 + \\", "  2 + \\", "  3", "$x"]);
    assert_eq!(value, Datum::Int(6));
}

#[test]
fn comments_and_blanks_skip() {
    let (_, _, value) = run(&[
        "# leading comment",
        "",
        "/# block",
        "comment #/",
        "$v = 9  # trailing",
        "$v",
    ]);
    assert_eq!(value, Datum::Int(9));
}

#[test]
fn return_stops_execution() {
    let (_, _, value) = run(&["return 77", "$never = 1"]);
    assert_eq!(value, Datum::Int(77));
}

#[test]
fn force_demotes_failure() {
    let (_, _, value) = run(&["force 1 / 0", "$after = 5", "$after"]);
    assert_eq!(value, Datum::Int(5));
}

#[test]
fn unforced_failure_carries_line_context() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    let body: Vec<String> = ["$ok = 1", "1 / 0"].iter().map(|s| s.to_string()).collect();
    let err = exec_lines(&mut interp, &mut host, "startup", &body, Vec::new(), None).unwrap_err();
    let ctx = err.context.expect("script context");
    assert_eq!(ctx.buffer, "startup");
    assert_eq!(ctx.line, 2);
}

#[test]
fn user_command_defined_and_called() {
    let (mut interp, mut host, _) = run(&[
        "command double(1)",
        "  return $1 * 2",
        "endroutine",
    ]);
    assert!(host.routines.contains_key("double"));
    assert_eq!(
        eval_in(&mut interp, &mut host, "double(21)"),
        Datum::Int(42)
    );
    // Arity is enforced.
    assert!(eval_expr(&mut interp, &mut host, "double(1, 2)").is_err());
}

#[test]
fn routine_body_is_salted_verbatim() {
    let (_, host, _) = run(&[
        "command salted",
        "",
        "  # body comment stays",
        "  return 1",
        "endroutine",
    ]);
    let body = &host.routines["salted"].body;
    assert_eq!(body.len(), 3);
    assert_eq!(body[1], "  # body comment stays");
}

#[test]
fn numeric_prefix_reaches_routine() {
    let (mut interp, mut host, _) = run(&[
        "function prefixed",
        "  return $0",
        "endroutine",
    ]);
    // $0 reports the argument count; the prefix is threaded to the frame.
    assert_eq!(
        eval_in(&mut interp, &mut host, "3 => prefixed()"),
        Datum::Int(0)
    );
}

#[test]
fn undefined_bare_variable_errors_on_read() {
    let mut interp = Interp::new();
    let mut host = MockHost::new();
    assert!(eval_expr(&mut interp, &mut host, "nobody + 1").is_err());
}
