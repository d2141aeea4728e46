mod common;

use common::*;
use pyrite_compiler::{compute_return_param_idxs, infer_return_param, BinaryOperator, Parameter};

fn two_params() -> Vec<Parameter> {
    vec![param("a", None), param("b", None)]
}

#[test]
fn consistent_returns_name_the_parameter() {
    let function = function_def("pick", two_params(), None, vec![ret(name("b"))]);
    assert_eq!(infer_return_param(&function), Some(1));

    let branched = function_def(
        "pick",
        two_params(),
        None,
        vec![
            if_(boolean(true), vec![ret(name("a"))], vec![]),
            ret(name("a")),
        ],
    );
    assert_eq!(infer_return_param(&branched), Some(0));
}

#[test]
fn mixed_returns_are_not_pass_through() {
    let function = function_def(
        "pick",
        two_params(),
        None,
        vec![
            if_(boolean(true), vec![ret(name("b"))], vec![]),
            ret(name("a")),
        ],
    );
    assert_eq!(infer_return_param(&function), None);
}

#[test]
fn computed_or_missing_returns_are_not_pass_through() {
    let none = function_def("f", two_params(), None, vec![pass()]);
    assert_eq!(infer_return_param(&none), None);

    let bare = function_def("f", two_params(), None, vec![ret_none()]);
    assert_eq!(infer_return_param(&bare), None);

    let computed = function_def(
        "f",
        two_params(),
        None,
        vec![ret(binary(BinaryOperator::Add, name("a"), int(1)))],
    );
    assert_eq!(infer_return_param(&computed), None);

    let global = function_def("f", two_params(), None, vec![ret(name("other"))]);
    assert_eq!(infer_return_param(&global), None);
}

#[test]
fn returns_inside_loops_are_not_inspected() {
    let function = function_def(
        "f",
        two_params(),
        None,
        vec![
            while_(boolean(true), vec![ret(name("b"))]),
            ret(name("a")),
        ],
    );
    assert_eq!(infer_return_param(&function), Some(0));
}

#[test]
fn module_indices_cover_methods() {
    let module = module(vec![
        function("ident", vec![param("x", None)], None, vec![ret(name("x"))]),
        function("unit", vec![], None, vec![pass()]),
        class(
            "Box",
            &[],
            vec![method_def(
                "get",
                vec![param("item", None)],
                None,
                vec![ret(name("item"))],
            )],
        ),
    ]);
    let indices = compute_return_param_idxs(&module);

    assert_eq!(indices.len(), 2);
    assert_eq!(indices["ident"], 0);
    assert_eq!(indices["Box.get"], 1);
}
