mod common;

use common::*;
use pyrite_compiler::{
    assigned_locals, BinaryOperator, DiagnosticLevel, Parameter, Statement, TypeKind,
};

fn returns_int(function_name: &str, parameters: Vec<Parameter>, body: Vec<Statement>) -> Statement {
    function(function_name, parameters, Some(ty("int")), body)
}

#[test]
fn is_none_guards_narrow_optionals() {
    let module = module(vec![returns_int(
        "first_or_zero",
        vec![param("x", Some(optional(ty("int"))))],
        vec![
            if_(
                binary(BinaryOperator::Is, name("x"), none()),
                vec![ret(int(0))],
                vec![],
            ),
            ret(binary(BinaryOperator::Add, name("x"), int(1))),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn isinstance_guards_split_unions() {
    let union = generic("Union", vec![ty("int"), ty("str")]);
    let module = module(vec![returns_int(
        "width",
        vec![param("v", Some(union))],
        vec![
            if_(
                call_named("isinstance", vec![name("v"), name("str")]),
                vec![ret(call_named("len", vec![name("v")]))],
                vec![],
            ),
            ret(name("v")),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn and_guards_narrow_both_operands() {
    let not_none = |binding: &str| binary(BinaryOperator::IsNot, name(binding), none());
    let module = module(vec![returns_int(
        "sum_both",
        vec![
            param("a", Some(optional(ty("int")))),
            param("b", Some(optional(ty("int")))),
        ],
        vec![
            if_(
                binary(BinaryOperator::And, not_none("a"), not_none("b")),
                vec![ret(binary(BinaryOperator::Add, name("a"), name("b")))],
                vec![],
            ),
            ret(int(0)),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn guards_narrow_module_globals() {
    let limit_is = |operator| binary(operator, name("limit"), none());
    let module = module(vec![
        ann_assign("limit", optional(ty("int")), Some(none())),
        returns_int(
            "next_limit",
            vec![],
            vec![
                if_(
                    limit_is(BinaryOperator::IsNot),
                    vec![ret(binary(BinaryOperator::Add, name("limit"), int(1)))],
                    vec![],
                ),
                ret(int(0)),
            ],
        ),
        returns_int(
            "checked_twice",
            vec![],
            vec![
                if_(limit_is(BinaryOperator::Is), vec![pass()], vec![pass()]),
                if_(limit_is(BinaryOperator::Is), vec![ret(int(0))], vec![]),
                ret(name("limit")),
            ],
        ),
    ]);
    analyze_clean(&module);
}

#[test]
fn unguarded_optionals_do_not_support_arithmetic() {
    let module = module(vec![returns_int(
        "bump",
        vec![param("x", Some(optional(ty("int"))))],
        vec![ret(binary(BinaryOperator::Add, name("x"), int(1)))],
    )]);
    let errors = analyze_errors(&module);
    assert_eq!(errors.len(), 1);
}

#[test]
fn disjoint_branch_bindings_are_contradictory() {
    let module = module(vec![returns_int(
        "pick",
        vec![typed_param("flag", "bool")],
        vec![
            if_(
                name("flag"),
                vec![assign_name("y", int(1))],
                vec![assign_name("y", string("a"))],
            ),
            ret(name("y")),
        ],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["contradictory types for 'y': branches bind it to disjoint types"]
    );
}

#[test]
fn agreeing_branch_bindings_survive_the_join() {
    let module = module(vec![returns_int(
        "pick",
        vec![typed_param("flag", "bool")],
        vec![
            if_(
                name("flag"),
                vec![assign_name("y", int(1))],
                vec![assign_name("y", int(2))],
            ),
            ret(name("y")),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn reading_a_local_before_assignment_is_reported() {
    let module = module(vec![
        assign_name("count", int(0)),
        returns_int(
            "bump",
            vec![],
            vec![
                assign_name("count", binary(BinaryOperator::Add, name("count"), int(1))),
                ret(name("count")),
            ],
        ),
    ]);
    assert_eq!(
        analyze_errors(&module),
        vec!["local variable 'count' referenced before assignment"]
    );
}

#[test]
fn module_globals_are_visible_in_functions() {
    let module = module(vec![
        assign_name("limit", int(10)),
        returns_int(
            "cap",
            vec![typed_param("x", "int")],
            vec![
                if_(
                    binary(BinaryOperator::Greater, name("x"), name("limit")),
                    vec![ret(name("limit"))],
                    vec![],
                ),
                ret(name("x")),
            ],
        ),
    ]);
    analyze_clean(&module);
}

#[test]
fn for_loops_bind_list_elements() {
    let module = module(vec![returns_int(
        "total",
        vec![param("xs", Some(generic("list", vec![ty("int")])))],
        vec![
            assign_name("acc", int(0)),
            for_(
                name("x"),
                name("xs"),
                vec![aug_assign(name("acc"), BinaryOperator::Add, name("x"))],
            ),
            ret(name("acc")),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn loop_bodies_join_with_the_state_before_the_loop() {
    let module = module(vec![returns_int(
        "drift",
        vec![param("xs", Some(generic("list", vec![ty("int")])))],
        vec![
            assign_name("acc", int(0)),
            for_(name("x"), name("xs"), vec![assign_name("acc", string("s"))]),
            ret(name("acc")),
        ],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["contradictory types for 'acc': branches bind it to disjoint types"]
    );
}

#[test]
fn dict_items_destructure_into_keys_and_values() {
    let module = module(vec![returns_int(
        "sum_values",
        vec![param("d", Some(generic("dict", vec![ty("str"), ty("int")])))],
        vec![
            assign_name("total", int(0)),
            for_(
                tuple(vec![name("k"), name("v")]),
                method(name("d"), "items", vec![]),
                vec![aug_assign(name("total"), BinaryOperator::Add, name("v"))],
            ),
            ret(name("total")),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn iterating_a_scalar_is_reported() {
    let module = module(vec![function(
        "spin",
        vec![typed_param("n", "int")],
        None,
        vec![for_(name("i"), name("n"), vec![pass()])],
    )]);
    assert_eq!(analyze_errors(&module), vec!["int is not iterable"]);
}

#[test]
fn conditions_must_be_bool() {
    let module = module(vec![function(
        "spin",
        vec![typed_param("n", "int")],
        None,
        vec![
            while_(int(1), vec![pass()]),
            while_(name("n"), vec![pass()]),
        ],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["condition must be bool, found int"]
    );
}

#[test]
fn annotated_assignments_check_the_value() {
    let module = module(vec![function(
        "store",
        vec![],
        Some(ty("None")),
        vec![ann_assign("count", ty("int"), Some(string("a")))],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["cannot assign str to 'count' declared as int"]
    );
}

#[test]
fn annotated_assignments_keep_the_declaration() {
    let module = module(vec![returns_int(
        "store",
        vec![],
        vec![
            ann_assign("names", generic("list", vec![ty("str")]), Some(list(vec![]))),
            ret(call_named("len", vec![name("names")])),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn returns_are_checked_against_the_declaration() {
    let module = module(vec![returns_int("label", vec![], vec![ret(string("s"))])]);
    assert_eq!(analyze_errors(&module), vec!["'label' must return int, found str"]);
}

#[test]
fn failed_values_are_reported_once() {
    let module = module(vec![returns_int(
        "f",
        vec![],
        vec![assign_name("y", name("missing")), ret(name("y"))],
    )]);
    assert_eq!(analyze_errors(&module), vec!["undefined name 'missing'"]);
}

#[test]
fn default_values_must_match_the_parameter() {
    let module = module(vec![function(
        "f",
        vec![with_default(typed_param("x", "int"), string("a"))],
        Some(ty("None")),
        vec![pass()],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["default value of parameter 'x' expects int, found str"]
    );
}

#[test]
fn tuple_assignments_destructure_per_index() {
    let clean = module(vec![returns_int(
        "split",
        vec![],
        vec![
            assign(
                tuple(vec![name("a"), name("b")]),
                tuple(vec![int(1), string("x")]),
            ),
            ret(name("a")),
        ],
    )]);
    analyze_clean(&clean);

    let mismatched = module(vec![function(
        "split",
        vec![],
        None,
        vec![assign(
            tuple(vec![name("a"), name("b"), name("c")]),
            tuple(vec![int(1), int(2)]),
        )],
    )]);
    assert_eq!(
        analyze_errors(&mismatched),
        vec!["cannot unpack 2 values into 3 targets"]
    );
}

#[test]
fn list_item_stores_follow_the_element_kind() {
    let module = module(vec![function(
        "store",
        vec![param("xs", Some(generic("list", vec![ty("int")])))],
        Some(ty("None")),
        vec![assign(subscript(name("xs"), int(0)), string("a"))],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["cannot store str in list of int"]
    );
}

fn counter_class() -> Statement {
    class(
        "Counter",
        &[],
        vec![
            method_def(
                "__init__",
                vec![typed_param("start", "int")],
                Some(ty("None")),
                vec![assign(attr(name("self"), "value"), name("start"))],
            ),
            method_def(
                "bump",
                vec![typed_param("step", "int")],
                Some(ty("int")),
                vec![ret(name("step"))],
            ),
        ],
    )
}

#[test]
fn instances_flow_through_method_calls() {
    let module = module(vec![
        counter_class(),
        returns_int(
            "use",
            vec![],
            vec![
                assign_name("c", call_named("Counter", vec![int(1)])),
                ret(method(name("c"), "bump", vec![int(2)])),
            ],
        ),
    ]);
    analyze_clean(&module);
}

#[test]
fn method_arguments_are_checked() {
    let module = module(vec![
        counter_class(),
        returns_int(
            "use",
            vec![],
            vec![
                assign_name("c", call_named("Counter", vec![int(1)])),
                ret(method(name("c"), "bump", vec![string("x")])),
            ],
        ),
    ]);
    assert_eq!(
        analyze_errors(&module),
        vec!["argument 'step' of Counter.bump() expects int, found str"]
    );
}

#[test]
fn instances_do_not_satisfy_builtin_returns() {
    let module = module(vec![
        counter_class(),
        returns_int(
            "make",
            vec![],
            vec![ret(call_named("Counter", vec![int(1)]))],
        ),
    ]);
    assert_eq!(
        analyze_errors(&module),
        vec!["'make' must return int, found 'Counter' object"]
    );
}

#[test]
fn class_bodies_hold_only_methods() {
    let module = module(vec![class(
        "Config",
        &[],
        vec![assign_name("debug", boolean(false))],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["class 'Config' body may only contain method definitions"]
    );
}

#[test]
fn class_docstrings_are_accepted() {
    let module = module(vec![class(
        "Sized",
        &[],
        vec![
            expr_stmt(string("Something with a size.")),
            method_def("size", vec![], Some(ty("int")), vec![ret(int(3))]),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn inherited_pass_through_methods_keep_their_argument_type() {
    let call_ident = |receiver: &str| {
        returns_int(
            &format!("via_{receiver}"),
            vec![],
            vec![
                assign_name(receiver, call_named(&receiver.to_uppercase(), vec![])),
                ret(binary(
                    BinaryOperator::Add,
                    method(name(receiver), "ident", vec![int(1)]),
                    int(1),
                )),
            ],
        )
    };
    let module = module(vec![
        class(
            "A",
            &[],
            vec![method_def(
                "ident",
                vec![param("x", None)],
                None,
                vec![ret(name("x"))],
            )],
        ),
        class("B", &["A"], vec![pass()]),
        call_ident("a"),
        call_ident("b"),
    ]);
    analyze_clean(&module);
}

#[test]
fn classes_must_be_top_level() {
    let module = module(vec![function(
        "factory",
        vec![],
        None,
        vec![class("Inner", &[], vec![pass()])],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["class 'Inner' must be defined at module level"]
    );
}

#[test]
fn nested_functions_see_enclosing_bindings() {
    let module = module(vec![returns_int(
        "outer",
        vec![],
        vec![
            assign_name("base", int(1)),
            returns_int(
                "inner",
                vec![typed_param("x", "int")],
                vec![ret(binary(BinaryOperator::Add, name("x"), name("base")))],
            ),
            ret(call_named("inner", vec![int(2)])),
        ],
    )]);
    analyze_clean(&module);
}

#[test]
fn function_variables_call_every_possible_target() {
    let module = module(vec![
        returns_int("double", vec![typed_param("x", "int")], vec![ret(name("x"))]),
        returns_int(
            "square",
            vec![typed_param("x", "int")],
            vec![ret(binary(BinaryOperator::Multiply, name("x"), name("x")))],
        ),
        returns_int(
            "apply",
            vec![typed_param("flag", "bool")],
            vec![
                assign_name(
                    "op",
                    conditional(name("flag"), name("double"), name("square")),
                ),
                ret(call_named("op", vec![int(3)])),
            ],
        ),
    ]);
    let analysis = analyze_clean(&module);
    let targets = analysis.poly.var_targets("op").expect("op has targets");
    assert_eq!(
        targets.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["double", "square"]
    );
}

#[test]
fn module_level_statements_are_checked() {
    let module = module(vec![assign_name(
        "z",
        binary(BinaryOperator::Add, int(1), float(1.0)),
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["ambiguous numeric types for '+': int and float"]
    );
}

#[test]
fn returned_expressions_are_recorded() {
    let value = int(7);
    let id = value.id;
    let module = module(vec![returns_int("seven", vec![], vec![ret(value)])]);
    let analysis = analyze_clean(&module);
    assert_eq!(analysis.types.kind_of(id), Some(TypeKind::Int));
    assert_eq!(analysis.types.key_of(id), Some("i:7"));
}

#[test]
fn assigned_locals_skip_nested_definitions() {
    let body = vec![
        assign_name("a", int(1)),
        assign(tuple(vec![name("b"), name("c")]), tuple(vec![int(1), int(2)])),
        ann_assign("declared", ty("int"), None),
        ann_assign("given", ty("int"), Some(int(1))),
        if_(
            boolean(true),
            vec![aug_assign(name("d"), BinaryOperator::Add, int(1))],
            vec![],
        ),
        for_(name("e"), list(vec![]), vec![assign_name("f", int(0))]),
        function("g", vec![], None, vec![assign_name("hidden", int(0))]),
    ];
    let mut locals: Vec<String> = assigned_locals(&body).into_iter().collect();
    locals.sort();
    assert_eq!(locals, vec!["a", "b", "c", "d", "e", "f", "g", "given"]);
}

#[test]
fn statements_after_an_exit_are_flagged() {
    let module = module(vec![returns_int(
        "early",
        vec![],
        vec![ret(int(1)), expr_stmt(call_named("print", vec![int(2)]))],
    )]);
    let (result, diagnostics) = analyze(&module);
    assert!(result.is_ok(), "warnings must not fail the analysis");
    assert_eq!(diagnostics.messages(), vec!["unreachable code"]);
    assert_eq!(diagnostics.entries()[0].level, DiagnosticLevel::Warning);
}
