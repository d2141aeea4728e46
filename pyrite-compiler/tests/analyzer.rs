mod common;

use common::*;
use pyrite_compiler::{
    AnalysisOptions, Analyzer, AstError, BinaryOperator, DiagnosticLevel, Module, NodeId,
    TypeKind,
};

const SEVEN: &str = r#"{
  "body": [
    {
      "span": { "line": 1, "column": 1, "end_line": 2, "end_column": 13 },
      "kind": {
        "function_def": {
          "name": "seven",
          "name_span": { "line": 1, "column": 5, "end_line": 1, "end_column": 10 },
          "parameters": [],
          "returns": { "name": "int" },
          "body": [
            {
              "span": { "line": 2, "column": 5, "end_line": 2, "end_column": 13 },
              "kind": {
                "return": {
                  "id": 1,
                  "span": { "line": 2, "column": 12, "end_line": 2, "end_column": 13 },
                  "kind": { "int": 7 }
                }
              }
            }
          ]
        }
      }
    }
  ]
}"#;

fn sample() -> Module {
    module(vec![
        function(
            "ident",
            vec![typed_param("x", "int")],
            Some(ty("int")),
            vec![ret(name("x"))],
        ),
        class(
            "Point",
            &[],
            vec![method_def(
                "__init__",
                vec![typed_param("x", "int")],
                Some(ty("None")),
                vec![pass()],
            )],
        ),
        function(
            "main",
            vec![],
            None,
            vec![
                assign_name("f", name("ident")),
                expr_stmt(call_named("f", vec![int(1)])),
                expr_stmt(call_named("Point", vec![int(2)])),
            ],
        ),
    ])
}

#[test]
fn successful_analysis_exposes_its_tables() {
    let analysis = analyze_clean(&sample());

    assert!(analysis.sigs.contains_key("ident"));
    assert!(analysis.sigs.contains_key("Point.__init__"));
    assert!(analysis.classes.contains_key("Point"));
    assert_eq!(analysis.ret_param_idxs.get("ident"), Some(&0));
    assert!(analysis.poly.var_targets("f").is_some());
    assert!(!analysis.types.is_empty());
}

#[test]
fn failed_analysis_counts_its_errors() {
    let module = module(vec![
        expr_stmt(name("ghost")),
        function("label", vec![], Some(ty("int")), vec![ret(string("s"))]),
    ]);
    let (result, diagnostics) = analyze(&module);
    let err = match result {
        Ok(_) => panic!("analysis should fail"),
        Err(err) => err,
    };

    assert_eq!(
        err.to_string(),
        "type inference failed for test.py with 2 error(s)"
    );
    assert_eq!(diagnostics.error_count(), 2);
    assert!(diagnostics
        .entries()
        .iter()
        .all(|diagnostic| diagnostic.level == DiagnosticLevel::Error));
}

#[test]
fn diagnostics_render_with_their_position() {
    let module = module(vec![expr_stmt(name("ghost"))]);
    let (_, diagnostics) = analyze(&module);
    let rendered: Vec<String> = diagnostics.entries().iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["test.py:1:1: error: undefined name 'ghost'"]);
}

#[test]
fn diagnostics_survive_a_failed_analysis() {
    let module = module(vec![expr_stmt(binary(
        BinaryOperator::Add,
        int(1),
        string("a"),
    ))]);
    let mut analyzer = Analyzer::new(AnalysisOptions::default());
    assert!(analyzer.analyze(&module).is_err());
    assert_eq!(analyzer.diagnostics().len(), 1);
    assert_eq!(analyzer.diagnostics().entries()[0].file, "<input>");
}

#[test]
fn dunder_validation_is_optional() {
    let module = module(vec![class(
        "Sized",
        &[],
        vec![method_def(
            "__len__",
            vec![],
            Some(ty("str")),
            vec![ret(string("n"))],
        )],
    )]);
    assert_eq!(
        analyze_errors(&module),
        vec!["Sized.__len__ must return int, declared str"]
    );

    let mut analyzer = Analyzer::new(AnalysisOptions {
        file: FILE.to_string(),
        validate_dunders: false,
    });
    assert!(analyzer.analyze(&module).is_ok());
    assert!(analyzer.diagnostics().is_empty());
}

#[test]
fn syntax_trees_load_from_json() {
    let module = Module::from_json(SEVEN).expect("valid syntax tree");
    assert_eq!(module.functions().count(), 1);

    let analysis = analyze_clean(&module);
    let id = NodeId(1);
    assert_eq!(analysis.types.kind_of(id), Some(TypeKind::Int));
    assert_eq!(analysis.types.key_of(id), Some("i:7"));
}

#[test]
fn serialized_trees_load_back() {
    let text = serde_json::to_string(&sample()).expect("serializes");
    let module = Module::from_json(&text).expect("loads back");
    assert_eq!(module.body.len(), 3);
    analyze_clean(&module);
}

#[test]
fn malformed_trees_report_their_position() {
    let err = Module::from_json("{\n  \"body\": [\n    {\"span\": 3}\n  ]\n}")
        .expect_err("malformed tree");
    match err {
        AstError::Malformed { line, .. } => assert_eq!(line, 3),
    }

    let truncated = Module::from_json("{").expect_err("truncated tree");
    assert!(truncated.to_string().starts_with("malformed AST at line 1"));
}

#[test]
fn options_default_and_deserialize() {
    let defaults = AnalysisOptions::default();
    assert_eq!(defaults.file, "<input>");
    assert!(defaults.validate_dunders);

    let options: AnalysisOptions =
        serde_json::from_str(r#"{ "validate_dunders": false }"#).expect("options");
    assert_eq!(
        options,
        AnalysisOptions {
            file: "<input>".to_string(),
            validate_dunders: false,
        }
    );
}
