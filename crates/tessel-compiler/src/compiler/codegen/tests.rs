//! Tests for the bytecode emitter.

use super::*;
use crate::Session;
use crate::ast::Operator;
use crate::ast::build::*;

fn compile_with(mut files: Vec<SourceFile>, config: Config) -> Program {
    Session::new(config)
        .compile(&mut files)
        .expect("Compilation should succeed")
}

fn compile_ok(files: Vec<SourceFile>) -> Program {
    compile_with(files, Config::default())
}

fn block<'p>(program: &'p Program, name: &str) -> &'p Block {
    let id = program
        .lookup(name)
        .or_else(|| program.file(name))
        .or_else(|| program.workspace(name))
        .unwrap_or_else(|| panic!("no block named {}", name));
    program.block(id).unwrap()
}

fn simple(opcode: OpCode) -> Instruction {
    Instruction::simple(opcode)
}

fn with(opcode: OpCode, operand: Operand) -> Instruction {
    Instruction::with_operand(opcode, operand)
}

fn config_struct() -> Item {
    struct_def("Config", vec![field("count", None, Some(expr(vec![int(3)])))]).into()
}

fn box_component() -> Item {
    component(
        "Box",
        Some(vec![
            field("label", Some(ty("string")), None),
            field("size", None, Some(expr(vec![int(2)]))),
        ]),
        vec![element("div", vec![], vec![stmt(expr(vec![ident("label")]))])],
    )
    .into()
}

#[test]
fn test_compile_string_concat() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![declare("s", expr(vec![text("a"), text("b"), add()])).into()],
    )]);
    assert_eq!(
        block(&program, "main.tsl").instructions,
        vec![
            with(OpCode::PushString, Operand::Text("a".into())),
            with(OpCode::PushString, Operand::Text("b".into())),
            simple(OpCode::ConcatString),
            with(OpCode::StoreLocal, Operand::Slot(0)),
            simple(OpCode::Return),
        ]
    );
}

#[test]
fn test_compile_operators_follow_operand_type() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            declare("f", expr(vec![float("1.5"), float("2.0"), op(Operator::Multiply)])).into(),
            declare("b", expr(vec![float("1.5"), float("2.0"), op(Operator::Less)])).into(),
            declare("e", expr(vec![text("x"), text("y"), op(Operator::Equal)])).into(),
        ],
    )]);
    let opcodes = block(&program, "main.tsl").opcodes();
    assert!(opcodes.contains(&OpCode::MulFloat));
    assert!(opcodes.contains(&OpCode::LtFloat));
    assert!(opcodes.contains(&OpCode::EqString));
}

#[test]
fn test_compile_struct_literal() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            config_struct(),
            declare("c", expr(vec![struct_lit("Config", vec![("count", expr(vec![int(3)]))])])).into(),
        ],
    )]);
    assert_eq!(
        block(&program, "main.tsl").instructions,
        vec![
            with(
                OpCode::NewStruct,
                Operand::Struct {
                    name: "Config".into(),
                    fields: vec!["count".into()],
                }
            ),
            with(OpCode::PushInt, Operand::Int(3)),
            with(OpCode::StoreField, Operand::Field(0)),
            with(OpCode::StoreLocal, Operand::Slot(0)),
            simple(OpCode::Return),
        ]
    );
}

#[test]
fn test_empty_struct_literal_uses_defaults() {
    let explicit = compile_ok(vec![file(
        "main.tsl",
        vec![
            config_struct(),
            declare("c", expr(vec![struct_lit("Config", vec![("count", expr(vec![int(3)]))])])).into(),
        ],
    )]);
    let defaulted = compile_ok(vec![file(
        "main.tsl",
        vec![config_struct(), declare("c", expr(vec![struct_lit("Config", vec![])])).into()],
    )]);
    assert_eq!(
        block(&explicit, "main.tsl").instructions,
        block(&defaulted, "main.tsl").instructions
    );
}

#[test]
fn test_compile_zero_values() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            struct_def("Pair", vec![field("a", Some(ty("int")), None), field("b", Some(ty("bool")), None)]).into(),
            declare_typed("p", ty("Pair"), None).into(),
            declare_typed("xs", array_ty("string", 1), None).into(),
        ],
    )]);
    assert_eq!(
        block(&program, "main.tsl").opcodes(),
        vec![
            OpCode::NewStruct,
            OpCode::PushInt,
            OpCode::StoreField,
            OpCode::PushBool,
            OpCode::StoreField,
            OpCode::StoreLocal,
            OpCode::NewArray,
            OpCode::StoreLocal,
            OpCode::Return,
        ]
    );
}

#[test]
fn test_field_assignment() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            config_struct(),
            declare("c", expr(vec![struct_lit("Config", vec![])])).into(),
            assign("c.count", expr(vec![int(9)])).into(),
        ],
    )]);
    let instructions = &block(&program, "main.tsl").instructions;
    let tail = &instructions[instructions.len() - 5..];
    assert_eq!(
        tail,
        &[
            with(OpCode::LoadLocal, Operand::Slot(0)),
            with(OpCode::PushInt, Operand::Int(9)),
            with(OpCode::StoreField, Operand::Field(0)),
            simple(OpCode::Pop),
            simple(OpCode::Return),
        ]
    );
}

#[test]
fn test_empty_if_emits_no_jump() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![if_else(expr(vec![boolean(true)]), vec![], vec![]).into()],
    )]);
    assert_eq!(
        block(&program, "main.tsl").opcodes(),
        vec![OpCode::PushBool, OpCode::Pop, OpCode::Return]
    );
}

#[test]
fn test_empty_then_branch_negates() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            declare("x", expr(vec![int(0)])).into(),
            if_else(expr(vec![boolean(true)]), vec![], vec![assign("x", expr(vec![int(1)]))]).into(),
        ],
    )]);
    let main = block(&program, "main.tsl");
    assert_eq!(
        main.opcodes(),
        vec![
            OpCode::PushInt,
            OpCode::StoreLocal,
            OpCode::PushBool,
            OpCode::Not,
            OpCode::JumpIfFalse,
            OpCode::PushInt,
            OpCode::StoreLocal,
            OpCode::Return,
        ]
    );
    assert_eq!(main.instructions[4].operand, Some(Operand::Jump(7)));
}

#[test]
fn test_if_else_jumps() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            declare("x", expr(vec![int(0)])).into(),
            if_else(
                expr(vec![ident("x"), int(0), op(Operator::Equal)]),
                vec![assign("x", expr(vec![int(1)]))],
                vec![assign("x", expr(vec![int(2)]))],
            )
            .into(),
        ],
    )]);
    let main = block(&program, "main.tsl");
    // 2: LoadLocal, 3: PushInt, 4: EqInt, 5: JumpIfFalse, 6-7: then, 8: Jump, 9-10: else
    assert_eq!(main.instructions[5].operand, Some(Operand::Jump(9)));
    assert_eq!(main.instructions[8].operand, Some(Operand::Jump(11)));
    assert_eq!(main.instructions[11].opcode, OpCode::Return);
}

#[test]
fn test_procedure_block() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            procedure(
                "sub",
                vec![("a", ty("int")), ("b", ty("int"))],
                Some(ty("int")),
                vec![ret(Some(expr(vec![ident("a"), ident("b"), op(Operator::Subtract)])))],
            )
            .into(),
        ],
    )]);
    let sub = block(&program, "sub");
    assert_eq!(sub.kind, BlockKind::Procedure);
    assert_eq!(sub.params, 2);
    assert!(sub.has_return);
    assert_eq!(sub.stack_size, 2);
    assert_eq!(
        sub.instructions,
        vec![
            with(OpCode::StoreLocal, Operand::Slot(1)),
            with(OpCode::StoreLocal, Operand::Slot(0)),
            with(OpCode::LoadLocal, Operand::Slot(0)),
            with(OpCode::LoadLocal, Operand::Slot(1)),
            simple(OpCode::SubInt),
            simple(OpCode::Return),
        ]
    );
}

#[test]
fn test_forward_call_resolves() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            procedure("first", vec![], None, vec![stmt(expr(vec![call("second", vec![])]))]).into(),
            procedure("second", vec![], None, vec![]).into(),
        ],
    )]);
    let second = program.lookup("second").unwrap();
    assert_eq!(
        block(&program, "first").instructions,
        vec![with(OpCode::Call, Operand::Block(second)), simple(OpCode::Return)]
    );
}

#[test]
fn test_void_call_in_plain_context_leaves_nothing() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            procedure("one", vec![], Some(ty("int")), vec![ret(Some(expr(vec![int(1)])))]).into(),
            stmt(expr(vec![call("one", vec![])])).into(),
        ],
    )]);
    assert_eq!(
        block(&program, "main.tsl").opcodes(),
        vec![OpCode::Call, OpCode::Pop, OpCode::Return]
    );
}

#[test]
fn test_for_loop_layout() {
    let program = compile_ok(vec![file(
        "main.tsl",
        vec![
            declare("total", expr(vec![int(0)])).into(),
            for_in(
                Some("i"),
                "x",
                expr(vec![array_lit(ty("int"), vec![expr(vec![int(4)])])]),
                vec![assign("total", expr(vec![ident("total"), ident("x"), ident("i"), add(), add()]))],
            )
            .into(),
        ],
    )]);
    let main = block(&program, "main.tsl");
    let opcodes = main.opcodes();
    assert!(opcodes.contains(&OpCode::ArrayLen));
    assert!(opcodes.contains(&OpCode::ArrayGet));
    // total, array, counter, x, i
    assert_eq!(main.stack_size, 5);

    let back = main
        .instructions
        .iter()
        .rev()
        .find(|i| i.opcode == OpCode::Jump)
        .unwrap();
    let Some(Operand::Jump(target)) = back.operand else {
        panic!("loop jump without a target");
    };
    assert_eq!(main.instructions[target].opcode, OpCode::LoadLocal);
    assert_eq!(main.instructions[target + 2].opcode, OpCode::ArrayLen);
}

#[test]
fn test_component_invocation_layout() {
    let program = compile_ok(vec![
        file("box.tsl", vec![box_component()]),
        template(
            "page.tsl",
            vec![stmt(expr(vec![call("Box", vec![named("label", expr(vec![text("hi")]))])])).into()],
        ),
    ]);
    let id = program.lookup("Box").unwrap();
    assert_eq!(
        block(&program, "page.tsl").instructions,
        vec![
            simple(OpCode::NewFragment),
            simple(OpCode::NewFragment),
            with(OpCode::PushString, Operand::Text("hi".into())),
            with(OpCode::PushInt, Operand::Int(2)),
            with(OpCode::Call, Operand::Block(id)),
            simple(OpCode::AppendChild),
            simple(OpCode::Return),
        ]
    );

    let component = block(&program, "Box");
    assert_eq!(component.params, 3);
    assert!(component.has_return);
    assert_eq!(
        component.instructions,
        vec![
            with(OpCode::StoreLocal, Operand::Slot(2)),
            with(OpCode::StoreLocal, Operand::Slot(1)),
            with(OpCode::StoreLocal, Operand::Slot(0)),
            simple(OpCode::NewFragment),
            with(OpCode::NewElement, Operand::Text("div".into())),
            with(OpCode::LoadLocal, Operand::Slot(1)),
            simple(OpCode::AppendText),
            simple(OpCode::AppendChild),
            simple(OpCode::Return),
        ]
    );
}

#[test]
fn test_workspace_block() {
    let program = compile_ok(vec![file(
        "site.tsl",
        vec![workspace("Site", vec![assign("css_output_file", expr(vec![text("out.css")]))]).into()],
    )]);
    let site = block(&program, "Site");
    assert_eq!(site.kind, BlockKind::Workspace);
    assert!(site.has_return);
    assert_eq!(site.stack_size, 4);
    assert!(site.instructions.iter().any(|i| matches!(
        &i.operand,
        Some(Operand::Struct { name, fields }) if name == "Workspace" && fields.len() == 4
    )));
}

// ============================================================================
// Styles
// ============================================================================

fn styled_card() -> Item {
    let mut card = component(
        "Card",
        None,
        vec![element("div", vec![("class", expr(vec![text("title wide")]))], vec![])],
    );
    card.css = Some(css(None, vec![rule(&[".title", ".wide:hover"], &[("color", "red")])]));
    card.css_config = Some(css_config(None, &["wide"]));
    card.into()
}

#[test]
fn test_scoped_styles_and_classes() {
    let program = compile_ok(vec![
        file("card.tsl", vec![styled_card()]),
        template("page.tsl", vec![stmt(expr(vec![call("Card", vec![])])).into()]),
    ]);

    assert_eq!(program.styles.len(), 1);
    assert_eq!(program.styles[0].component, "Card");
    assert_eq!(program.styles[0].rules[0].selectors, vec![".Card__title", ".wide:hover"]);

    let card = block(&program, "Card");
    let scope = card
        .instructions
        .iter()
        .find(|i| i.opcode == OpCode::ScopeClasses)
        .and_then(|i| i.operand.clone());
    assert_eq!(
        scope,
        Some(Operand::ClassScope(ClassScope::new("Card", vec!["wide".into()])))
    );
}

#[test]
fn test_unscoped_config() {
    let config = Config {
        scope_css: false,
        ..Config::default()
    };
    let program = compile_with(
        vec![
            file("card.tsl", vec![styled_card()]),
            template("page.tsl", vec![stmt(expr(vec![call("Card", vec![])])).into()]),
        ],
        config,
    );
    assert_eq!(program.styles[0].rules[0].selectors, vec![".title", ".wide:hover"]);
    assert!(!block(&program, "Card").opcodes().contains(&OpCode::ScopeClasses));
}

#[test]
fn test_unused_component_styles() {
    let files = || vec![file("card.tsl", vec![styled_card()])];
    assert!(compile_ok(files()).styles.is_empty());

    let config = Config {
        emit_unused_css: true,
        ..Config::default()
    };
    assert_eq!(compile_with(files(), config).styles.len(), 1);
}

#[test]
fn test_self_expanding_default_is_an_internal_error() {
    // Node :: struct { kids := []Node{ Node{} } }, emitted without the checker's gate.
    let mut files = vec![file(
        "main.tsl",
        vec![
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
        ],
    )];
    let mut registry = TypeRegistry::new();
    let mut diagnostics = crate::Diagnostics::new();
    crate::typer::Typer::new(&mut registry, &mut diagnostics)
        .check(&mut files)
        .unwrap();
    assert!(diagnostics.has_errors());

    let config = Config::default();
    match Emitter::new(&registry, &config, &files).emit() {
        Err(Error::Internal(message)) => assert!(message.contains("expands itself"), "{}", message),
        other => panic!("expected an internal error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_program_json_is_stable() {
    let source = || {
        vec![file(
            "main.tsl",
            ["zeta", "alpha", "mid", "beta", "omega"]
                .iter()
                .map(|name| Item::from(procedure(name, vec![], None, vec![])))
                .collect(),
        )]
    };
    let first = serde_json::to_string(&compile_ok(source())).unwrap();
    let second = serde_json::to_string(&compile_ok(source())).unwrap();
    assert_eq!(first, second);

    let program = compile_ok(source());
    let names: Vec<&str> = program.names.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["alpha", "beta", "mid", "omega", "zeta"]);
}
