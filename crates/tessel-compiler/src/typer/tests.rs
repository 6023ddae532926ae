//! Tests for the typer.

use super::*;
use crate::ast::build::*;
use crate::ast::{Definition, Item, Operator, Statement};

fn check(mut files: Vec<SourceFile>) -> (Vec<SourceFile>, TypeRegistry, Diagnostics) {
    let mut registry = TypeRegistry::new();
    let mut diagnostics = Diagnostics::new();
    Typer::new(&mut registry, &mut diagnostics).check(&mut files).unwrap();
    (files, registry, diagnostics)
}

fn check_one(items: Vec<Item>) -> Diagnostics {
    check(vec![file("main.tsl", items)]).2
}

fn assert_error(diagnostics: &Diagnostics, needle: &str) {
    assert!(
        diagnostics.contains(needle),
        "expected an error containing {:?}, got:\n{}",
        needle,
        diagnostics
    );
}

fn declaration_type(item: &Item) -> Option<TypeId> {
    match item {
        Item::Statement(Statement::Declaration(declaration)) => declaration.ty,
        _ => None,
    }
}

fn box_component() -> Item {
    component(
        "Box",
        Some(vec![field("label", Some(ty("string")), None)]),
        vec![element("div", vec![], vec![stmt(expr(vec![ident("label")]))])],
    )
    .into()
}

// ============================================================================
// Declarations and expressions
// ============================================================================

#[test]
fn test_infers_declaration_types() {
    let (files, _, diagnostics) = check(vec![file(
        "main.tsl",
        vec![
            declare("n", expr(vec![int(1), int(2), add()])).into(),
            declare("s", expr(vec![text("a"), text("b"), add()])).into(),
            declare("f", expr(vec![float("1.5")])).into(),
            declare("b", expr(vec![int(1), int(2), op(Operator::Less)])).into(),
        ],
    )]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);

    let items = &files[0].items;
    assert_eq!(declaration_type(&items[0]), Some(TypeId::INT));
    assert_eq!(declaration_type(&items[1]), Some(TypeId::STRING));
    assert_eq!(declaration_type(&items[2]), Some(TypeId::FLOAT));
    assert_eq!(declaration_type(&items[3]), Some(TypeId::BOOL));
}

#[test]
fn test_redeclaration_in_same_scope() {
    let diagnostics = check_one(vec![
        declare("x", expr(vec![int(1)])).into(),
        declare("x", expr(vec![int(2)])).into(),
    ]);
    assert_error(&diagnostics, "\"x\" is already declared");
}

#[test]
fn test_shadowing_in_nested_scope_is_allowed() {
    let diagnostics = check_one(vec![
        declare("x", expr(vec![int(1)])).into(),
        Statement::Block(vec![declare("x", expr(vec![text("inner")]))]).into(),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
}

#[test]
fn test_declared_type_mismatch() {
    let diagnostics = check_one(vec![declare_typed("x", ty("int"), Some(expr(vec![text("a")]))).into()]);
    assert_error(&diagnostics, "mismatching types, expected int but got string");
}

#[test]
fn test_mixed_numeric_operands() {
    let diagnostics = check_one(vec![declare("x", expr(vec![int(1), float("2.5"), add()])).into()]);
    assert_error(&diagnostics, "mismatching types, expected int but got float");
}

#[test]
fn test_operator_not_supported_for_type() {
    let diagnostics = check_one(vec![declare("x", expr(vec![text("a"), text("b"), op(Operator::Multiply)])).into()]);
    assert_error(&diagnostics, "operator \"*\" cannot be applied to string");
}

#[test]
fn test_logical_operators_over_comparisons() {
    // a < b && c < d
    let accepted = check_one(vec![
        declare("a", expr(vec![int(1)])).into(),
        declare(
            "ok",
            expr(vec![
                ident("a"),
                int(2),
                op(Operator::Less),
                ident("a"),
                int(3),
                op(Operator::Less),
                op(Operator::And),
            ]),
        )
        .into(),
    ]);
    assert!(!accepted.has_errors(), "{}", accepted);

    // a < b && c, with c a bool
    let rejected = check_one(vec![
        declare("a", expr(vec![int(1)])).into(),
        declare("c", expr(vec![boolean(true)])).into(),
        declare(
            "bad",
            expr(vec![ident("a"), int(2), op(Operator::Less), ident("c"), op(Operator::And)]),
        )
        .into(),
    ]);
    assert_error(&rejected, "mismatching types, expected int but got bool");
}

#[test]
fn test_malformed_expression() {
    let diagnostics = check_one(vec![declare("x", expr(vec![int(1), int(2)])).into()]);
    assert_error(&diagnostics, "malformed expression");
}

#[test]
fn test_undeclared_variable() {
    let diagnostics = check_one(vec![declare("x", expr(vec![ident("y")])).into()]);
    assert_error(&diagnostics, "\"y\" is not declared");
}

#[test]
fn test_unused_expression_outside_html() {
    let diagnostics = check_one(vec![stmt(expr(vec![int(1), int(2), add()])).into()]);
    assert_error(&diagnostics, "expression result is unused");
}

// ============================================================================
// Structs
// ============================================================================

#[test]
fn test_struct_field_types_from_defaults() {
    let (files, registry, diagnostics) = check(vec![file(
        "main.tsl",
        vec![
            struct_def(
                "Config",
                vec![
                    field("count", None, Some(expr(vec![int(3)]))),
                    field("title", Some(ty("string")), None),
                ],
            )
            .into(),
            declare("c", expr(vec![struct_lit("Config", vec![("title", expr(vec![text("t")]))])])).into(),
            declare("n", expr(vec![ident("c.count")])).into(),
        ],
    )]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);

    let Item::Definition(Definition::Struct(config)) = &files[0].items[0] else {
        panic!("expected a struct definition");
    };
    let st = registry.struct_type(config.ty.unwrap()).unwrap();
    assert_eq!(st.fields[0].ty, TypeId::INT);
    assert_eq!(st.fields[1].ty, TypeId::STRING);
    assert_eq!(declaration_type(&files[0].items[2]), Some(TypeId::INT));
}

#[test]
fn test_struct_default_mismatch() {
    let diagnostics = check_one(vec![
        struct_def("Config", vec![field("count", Some(ty("int")), Some(expr(vec![text("three")])))]).into(),
    ]);
    assert_error(&diagnostics, "mismatching types, expected int but got string");
}

#[test]
fn test_struct_contains_itself() {
    let diagnostics = check_one(vec![
        struct_def("A", vec![field("b", Some(ty("B")), None)]).into(),
        struct_def("B", vec![field("a", Some(ty("A")), None)]).into(),
    ]);
    assert_error(&diagnostics, "contains itself");
}

#[test]
fn test_struct_may_hold_array_of_itself() {
    let diagnostics = check_one(vec![
        struct_def("Tree", vec![field("children", Some(array_ty("Tree", 1)), None)]).into(),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
}

#[test]
fn test_default_constructing_itself_through_array() {
    // Node :: struct { kids := []Node{ Node{} } }
    let diagnostics = check_one(vec![
        struct_def(
            "Node",
            vec![field(
                "kids",
                None,
                Some(expr(vec![array_lit(ty("Node"), vec![expr(vec![struct_lit("Node", vec![])])])])),
            )],
        )
        .into(),
        declare("n", expr(vec![struct_lit("Node", vec![])])).into(),
    ]);
    assert_error(&diagnostics, "default value of field \"kids\" constructs \"Node\" recursively");
}

#[test]
fn test_default_constructing_itself_through_another_struct() {
    let diagnostics = check_one(vec![
        struct_def("A", vec![field("b", Some(ty("B")), Some(expr(vec![struct_lit("B", vec![])])))]).into(),
        struct_def(
            "B",
            vec![field(
                "all",
                None,
                Some(expr(vec![array_lit(ty("A"), vec![expr(vec![struct_lit("A", vec![])])])])),
            )],
        )
        .into(),
    ]);
    assert_error(&diagnostics, "default value of field \"b\" constructs \"A\" recursively");
    assert_error(&diagnostics, "default value of field \"all\" constructs \"B\" recursively");
}

#[test]
fn test_default_supplying_the_recursive_field_is_allowed() {
    // Node :: struct { kids := []Node{ Node{kids = []Node{}} } }
    let inner = struct_lit("Node", vec![("kids", expr(vec![array_lit(ty("Node"), vec![])]))]);
    let diagnostics = check_one(vec![
        struct_def(
            "Node",
            vec![field("kids", None, Some(expr(vec![array_lit(ty("Node"), vec![expr(vec![inner])])])))],
        )
        .into(),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
}

#[test]
fn test_unknown_field_and_type() {
    let diagnostics = check_one(vec![
        struct_def("P", vec![field("x", Some(ty("int")), None), field("y", Some(ty("Nope")), None)]).into(),
        declare("p", expr(vec![struct_lit("P", vec![("z", expr(vec![int(1)]))])])).into(),
    ]);
    assert_error(&diagnostics, "unknown type \"Nope\"");
    assert_error(&diagnostics, "\"z\" is not a field on P");
}

// ============================================================================
// Procedures
// ============================================================================

#[test]
fn test_procedure_arity() {
    let diagnostics = check_one(vec![
        procedure("f", vec![("a", ty("int"))], None, vec![]).into(),
        stmt(expr(vec![call("f", vec![])])).into(),
    ]);
    assert_error(&diagnostics, "procedure \"f\" expects 1 argument(s) but got 0");
}

#[test]
fn test_procedure_missing_return() {
    let diagnostics = check_one(vec![
        procedure(
            "f",
            vec![("a", ty("int"))],
            Some(ty("int")),
            vec![if_else(
                expr(vec![ident("a"), int(0), op(Operator::Greater)]),
                vec![ret(Some(expr(vec![ident("a")])))],
                vec![],
            )],
        )
        .into(),
    ]);
    assert_error(&diagnostics, "procedure \"f\" does not return a value on every path");
}

#[test]
fn test_procedure_forward_reference_and_recursion() {
    let diagnostics = check_one(vec![
        declare("x", expr(vec![call("fact", vec![arg(expr(vec![int(5)]))])])).into(),
        procedure(
            "fact",
            vec![("n", ty("int"))],
            Some(ty("int")),
            vec![
                if_else(
                    expr(vec![ident("n"), int(1), op(Operator::LessEqual)]),
                    vec![ret(Some(expr(vec![int(1)])))],
                    vec![],
                ),
                ret(Some(expr(vec![
                    ident("n"),
                    call("fact", vec![arg(expr(vec![ident("n"), int(1), op(Operator::Subtract)]))]),
                    op(Operator::Multiply),
                ]))),
            ],
        )
        .into(),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
}

#[test]
fn test_procedure_used_as_value() {
    let diagnostics = check_one(vec![
        procedure("f", vec![], None, vec![]).into(),
        declare("x", expr(vec![ident("f")])).into(),
    ]);
    assert_error(&diagnostics, "procedure \"f\" cannot be used as a value");
}

#[test]
fn test_void_procedure_in_expression() {
    let diagnostics = check_one(vec![
        procedure("f", vec![], None, vec![]).into(),
        declare("x", expr(vec![call("f", vec![])])).into(),
    ]);
    assert_error(&diagnostics, "procedure \"f\" does not return a value");
}

#[test]
fn test_return_outside_procedure() {
    let diagnostics = check_one(vec![ret(None).into()]);
    assert_error(&diagnostics, "return outside of a procedure");
}

// ============================================================================
// Components and HTML
// ============================================================================

#[test]
fn test_component_property_errors() {
    let diagnostics = check(vec![
        file("box.tsl", vec![box_component()]),
        template(
            "page.tsl",
            vec![
                stmt(expr(vec![call("Box", vec![named("color", expr(vec![text("red")]))])])).into(),
                stmt(expr(vec![call("Box", vec![arg(expr(vec![text("x")]))])])).into(),
                stmt(expr(vec![call("Box", vec![named("label", expr(vec![int(1)]))])])).into(),
            ],
        ),
    ])
    .2;
    assert_error(&diagnostics, "\"color\" is not a property on Box");
    assert_error(&diagnostics, "arguments to component \"Box\" must be named");
    assert_error(&diagnostics, "mismatching types, expected string but got int");
    assert!(diagnostics.for_file("box.tsl").is_empty());
    assert!(!diagnostics.for_file("page.tsl").is_empty());
}

#[test]
fn test_component_usage_is_recorded() {
    let (files, _, diagnostics) = check(vec![
        file(
            "components.tsl",
            vec![
                box_component(),
                component(
                    "Panel",
                    None,
                    vec![stmt(expr(vec![call("Box", vec![named("label", expr(vec![text("p")]))])]))],
                )
                .into(),
                component("Unused", None, vec![]).into(),
            ],
        ),
        template(
            "page.tsl",
            vec![stmt(expr(vec![call("Panel", vec![])])).into()],
        ),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);

    let components: Vec<_> = files[0]
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Definition(Definition::Component(c)) => Some(c),
            _ => None,
        })
        .collect();
    assert!(components[0].typed.used);
    assert!(components[1].typed.used);
    assert!(!components[2].typed.used);
    assert!(components[1].typed.dependencies.contains_key("Box"));
}

#[test]
fn test_cyclic_components() {
    let diagnostics = check_one(vec![
        component("A", None, vec![stmt(expr(vec![call_at(3, "B", vec![])]))]).into(),
        component("B", None, vec![stmt(expr(vec![call_at(7, "A", vec![])]))]).into(),
    ]);
    assert_error(&diagnostics, "cyclic reference to component \"A\": A -> B -> A");

    let mut files = vec![file(
        "main.tsl",
        vec![
            component("A", None, vec![stmt(expr(vec![call_at(3, "B", vec![])]))]).into(),
            component("B", None, vec![stmt(expr(vec![call_at(7, "A", vec![])]))]).into(),
        ],
    )];
    let result = crate::Session::new(crate::Config::default()).compile(&mut files);
    assert!(matches!(result, Err(Error::Semantic(_))));
}

#[test]
fn test_invocation_in_property_default_is_a_dependency() {
    // Box :: html { :: struct { inner : html = Box() } div {} }
    let diagnostics = check(vec![
        file(
            "box.tsl",
            vec![
                component(
                    "Box",
                    Some(vec![field("inner", Some(ty("html")), Some(expr(vec![call_at(2, "Box", vec![])])))]),
                    vec![element("div", vec![], vec![])],
                )
                .into(),
            ],
        ),
        template("page.tsl", vec![stmt(expr(vec![call("Box", vec![])])).into()]),
    ])
    .2;
    assert_error(&diagnostics, "cyclic reference to component \"Box\": Box -> Box");
    assert_eq!(diagnostics.for_file("box.tsl")[0].line, 2);
}

#[test]
fn test_unknown_element() {
    let diagnostics = check(vec![template("page.tsl", vec![element("dvi", vec![], vec![]).into()])]).2;
    assert_error(&diagnostics, "invalid element name \"dvi\"");
}

#[test]
fn test_element_outside_html_context() {
    let diagnostics = check_one(vec![element("div", vec![], vec![]).into()]);
    assert_error(&diagnostics, "element \"div\" is only allowed in components and templates");
}

#[test]
fn test_attribute_must_be_primitive() {
    let diagnostics = check(vec![template(
        "page.tsl",
        vec![
            declare("xs", expr(vec![array_lit(ty("int"), vec![])])).into(),
            element("div", vec![("data-xs", expr(vec![ident("xs")]))], vec![]).into(),
            element("div", vec![("class", expr(vec![int(1)]))], vec![]).into(),
        ],
    )])
    .2;
    assert_error(&diagnostics, "attribute \"data-xs\" must be a primitive value, got []int");
    assert_error(&diagnostics, "mismatching types, expected string but got int");
}

// ============================================================================
// Styles
// ============================================================================

#[test]
fn test_css_without_component() {
    let diagnostics = check_one(vec![css(Some("Nope"), vec![rule(&[".a"], &[("color", "red")])]).into()]);
    assert_error(&diagnostics, "css definition \"Nope\" does not match any component");
}

#[test]
fn test_css_attached_twice() {
    let mut styled = component("Card", None, vec![]);
    styled.css = Some(css(None, vec![rule(&[".a"], &[("color", "red")])]));
    let diagnostics = check_one(vec![
        styled.into(),
        css(Some("Card"), vec![rule(&[".b"], &[("color", "blue")])]).into(),
    ]);
    assert_error(&diagnostics, "component \"Card\" has more than one css definition");
}

#[test]
fn test_top_level_css_attaches() {
    let (files, _, diagnostics) = check(vec![
        file("card.tsl", vec![component("Card", None, vec![]).into()]),
        file(
            "card.css.tsl",
            vec![
                css(Some("Card"), vec![rule(&[".title"], &[("font-weight", "bold")])]).into(),
                css_config(Some("Card"), &["title"]).into(),
            ],
        ),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
    let Item::Definition(Definition::Component(card)) = &files[0].items[0] else {
        panic!("expected a component");
    };
    assert!(card.typed.css.is_some());
    assert_eq!(
        card.typed.css_config.as_ref().map(|c| c.unscoped_classes.clone()),
        Some(vec!["title".to_string()])
    );
}

// ============================================================================
// Workspaces
// ============================================================================

#[test]
fn test_workspace_fields_are_variables() {
    let diagnostics = check_one(vec![
        workspace(
            "Site",
            vec![
                assign("template_input_directory", expr(vec![text("src")])),
                assign("prune_unused_css", expr(vec![boolean(true)])),
            ],
        )
        .into(),
    ]);
    assert!(!diagnostics.has_errors(), "{}", diagnostics);

    let diagnostics = check_one(vec![
        workspace("Site", vec![assign("css_output_file", expr(vec![int(1)]))]).into(),
    ]);
    assert_error(&diagnostics, "mismatching types, expected string but got int");
}
