//! Recipes compiled into plans and run over in-memory hierarchies.

use shape_query::{
    ElementShape, FieldShape, MemoryElement, MemoryModel, MethodShape, Modifier, Plan, Recipe,
    StatementBuilder, TestResult, TypeKind, TypeShape,
};
use std::collections::HashMap;
use tracing_test::traced_test;

fn class(name: &str) -> TypeShape {
    TypeShape::new(TypeKind::Class, name)
}

fn compile(statements: Vec<StatementBuilder>) -> Plan {
    let statements = statements
        .into_iter()
        .map(|statement| statement.build().unwrap())
        .collect();
    Plan::compile(&Recipe::new(statements).unwrap()).unwrap()
}

fn passed(verdicts: &HashMap<String, TestResult>) -> Vec<&str> {
    let mut ids: Vec<&str> = verdicts
        .iter()
        .filter(|(_, verdict)| verdict.is_passed())
        .map(|(id, _)| id.as_str())
        .collect();
    ids.sort_unstable();
    ids
}

fn superclass_recipe() -> Plan {
    compile(vec![
        StatementBuilder::any_type("B").returned().extends("%x"),
        StatementBuilder::class("*")
            .define("x")
            .directly_extends("java.lang.Object"),
    ])
}

#[test]
#[traced_test]
fn superclass_defined_later_is_deferred() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("B", ElementShape::Type(class("B").extends("A"))),
        MemoryElement::new("A", ElementShape::Type(class("A").extends("java.lang.Object"))),
    ])
    .unwrap();
    let plan = superclass_recipe();
    let b = "B".to_string();
    let a = "A".to_string();

    // B alone: the definer has nothing to look at yet
    let mut progress = plan.begin(&model);
    assert_eq!(progress.start(b.clone()).result, TestResult::Deferred);
    assert_eq!(progress.finish(&b), TestResult::Deferred);
    assert_eq!(progress.finish_walk()["B"], TestResult::NotPassed);

    // A supplied before the walk ends
    let mut progress = plan.begin(&model);
    assert_eq!(progress.start(b.clone()).result, TestResult::Deferred);
    let _ = progress.finish(&b);
    let _ = progress.start(a.clone());
    let _ = progress.finish(&a);
    let verdicts = progress.finish_walk();
    assert_eq!(verdicts["B"], TestResult::Passed);
    assert_eq!(verdicts["A"], TestResult::NotPassed);
    assert!(logs_contain("walk finished"));
}

#[test]
fn field_using_type_matches() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("pkg.C", ElementShape::Type(class("pkg.C")))
            .child(
                MemoryElement::new("pkg.C.a", ElementShape::Field(FieldShape::new("a", "pkg.AA")))
                    .uses("pkg.AA"),
            )
            .child(MemoryElement::new(
                "pkg.C.b",
                ElementShape::Field(FieldShape::new("b", "int")),
            )),
        MemoryElement::new("pkg.AA", ElementShape::Type(class("pkg.AA"))),
    ])
    .unwrap();
    let plan = compile(vec![
        StatementBuilder::class("*").child(StatementBuilder::field("*").returned().uses("*.AA")),
    ]);

    let verdicts = model.evaluate(&plan);
    assert_eq!(verdicts.len(), 4);
    assert_eq!(passed(&verdicts), vec!["pkg.C.a"]);
}

#[test]
fn nested_methods_select_their_class() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("app.Handler", ElementShape::Type(class("app.Handler")))
            .child(MemoryElement::new(
                "app.Handler.handle",
                ElementShape::Method(
                    MethodShape::new("handle")
                        .modifier(Modifier::Public)
                        .parameter("java.lang.String")
                        .parameter("int"),
                ),
            )),
        MemoryElement::new("app.Other", ElementShape::Type(class("app.Other"))).child(
            MemoryElement::new(
                "app.Other.handle",
                ElementShape::Method(MethodShape::new("handle").parameter("int")),
            ),
        ),
    ])
    .unwrap();
    let plan = compile(vec![
        StatementBuilder::class("app.*").returned().child(
            StatementBuilder::method("handle")
                .modifier("public")
                .parameters("java.lang.String, **"),
        ),
    ]);

    assert_eq!(passed(&model.evaluate(&plan)), vec!["app.Handler"]);
}

#[test]
fn negated_statement_keeps_its_kind() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("C", ElementShape::Type(class("C")))
            .child(MemoryElement::new("C.run", ElementShape::Method(MethodShape::new("run"))))
            .child(MemoryElement::new("C.stop", ElementShape::Method(MethodShape::new("stop"))))
            .child(MemoryElement::new(
                "C.state",
                ElementShape::Field(FieldShape::new("state", "int")),
            )),
    ])
    .unwrap();
    let plan = compile(vec![StatementBuilder::method("run").returned().negated()]);

    assert_eq!(passed(&model.evaluate(&plan)), vec!["C.stop"]);
}

#[test]
fn named_match_reports_the_definer() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("a.Base", ElementShape::Type(class("a.Base"))),
        MemoryElement::new("a.Impl", ElementShape::Type(class("a.Impl").extends("a.Base"))),
        MemoryElement::new("a.Lone", ElementShape::Type(class("a.Lone"))),
    ])
    .unwrap();
    let recipe = Recipe::new(vec![
        StatementBuilder::class("*").define("base").build().unwrap(),
        StatementBuilder::class("*")
            .returned()
            .directly_extends("%base")
            .build()
            .unwrap(),
    ])
    .unwrap();

    let plain = Plan::compile(&recipe).unwrap();
    assert_eq!(passed(&model.evaluate(&plain)), vec!["a.Impl"]);

    let named = Plan::compile_named(&recipe, &["base"]).unwrap();
    assert_eq!(
        passed(&model.evaluate(&named)),
        vec!["a.Base", "a.Impl", "a.Lone"]
    );
}

#[test]
fn interfaces_of_superclasses_count() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new(
            "x.Marker",
            ElementShape::Type(TypeShape::new(TypeKind::Interface, "x.Marker")),
        ),
        MemoryElement::new("x.Base", ElementShape::Type(class("x.Base").implements("x.Marker"))),
        MemoryElement::new("x.Leaf", ElementShape::Type(class("x.Leaf").extends("x.Base"))),
        MemoryElement::new("x.Plain", ElementShape::Type(class("x.Plain"))),
    ])
    .unwrap();

    let transitive = compile(vec![
        StatementBuilder::class("*").returned().implements("x.Marker"),
    ]);
    assert_eq!(passed(&model.evaluate(&transitive)), vec!["x.Base", "x.Leaf"]);

    let direct = compile(vec![
        StatementBuilder::class("*").returned().directly_implements("x.Marker"),
    ]);
    assert_eq!(passed(&model.evaluate(&direct)), vec!["x.Base"]);
}

#[test]
fn self_referencing_statement_unrolls_three_levels() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("R", ElementShape::Type(class("R").extends("java.lang.Object"))),
        MemoryElement::new("S", ElementShape::Type(class("S").extends("R"))),
        MemoryElement::new("T", ElementShape::Type(class("T").extends("S"))),
        MemoryElement::new("U", ElementShape::Type(class("U").extends("T"))),
    ])
    .unwrap();
    let plan = compile(vec![
        StatementBuilder::class("*")
            .define("x")
            .returned()
            .directly_extends("%x"),
    ]);

    assert_eq!(plan.unwind_report().self_loops, 1);
    assert_eq!(plan.node_count(), 3);
    // the chain needs two resolvable superclasses below the element
    assert_eq!(passed(&model.evaluate(&plan)), vec!["T", "U"]);
}

#[test]
fn statement_order_does_not_change_cyclic_verdicts() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("W", ElementShape::Type(class("W"))).uses("X"),
        MemoryElement::new("X", ElementShape::Type(class("X"))).uses("Y"),
        MemoryElement::new("Y", ElementShape::Type(class("Y"))).uses("Z"),
        MemoryElement::new("Z", ElementShape::Type(class("Z"))),
    ])
    .unwrap();
    let a = || {
        StatementBuilder::class("*")
            .define("a")
            .returned()
            .directly_uses("%b")
    };
    let b = || StatementBuilder::class("*").define("b").directly_uses("%a");

    let a_first = model.evaluate(&compile(vec![a(), b()]));
    let b_first = model.evaluate(&compile(vec![b(), a()]));

    assert_eq!(a_first, b_first);
    assert_eq!(passed(&a_first), vec!["W"]);
}

#[test]
#[traced_test]
fn unclassified_elements_never_match() {
    let model = MemoryModel::from_roots(vec![
        MemoryElement::new("C", ElementShape::Type(class("C")))
            .child(MemoryElement::new("C.stop", ElementShape::Method(MethodShape::new("stop"))))
            .child(MemoryElement::new("C.blob", ElementShape::Other)),
        MemoryElement::new("Blob", ElementShape::Other),
    ])
    .unwrap();

    let any_type = model.evaluate(&compile(vec![StatementBuilder::any_type("*").returned()]));
    assert_eq!(any_type.len(), 4);
    assert_eq!(passed(&any_type), vec!["C"]);
    assert_eq!(any_type["Blob"], TestResult::NotPassed);
    assert_eq!(any_type["C.blob"], TestResult::NotPassed);

    let not_run = model.evaluate(&compile(vec![
        StatementBuilder::method("run").returned().negated(),
    ]));
    assert_eq!(passed(&not_run), vec!["C.stop"]);
    assert_eq!(not_run["Blob"], TestResult::NotPassed);
    assert_eq!(not_run["C.blob"], TestResult::NotPassed);
    assert!(!logs_contain("ERROR"));
}
