mod common;

use std::collections::BTreeSet;

use common::{Fixture, empty_class, foo_calling_bar};
use kiln_api::{FileStore, SourceFile};
use kiln_classfile::assemble::ClassAssembler;
use kiln_core::deps::ClassFileTypeInfo;
use kiln_core::{ReferenceExtractor, SymbolReference};

const FOO: &str = "/app/src/com/acme/Foo.java";
const BAR: &str = "/app/src/com/acme/Bar.java";

/// Sources for Foo and Bar with Foo's artifact already on disk.
fn foo_and_bar() -> Fixture {
    let fx = Fixture::new();
    fx.write(FOO, "class Foo { void run() { new Bar().baz(); } }");
    fx.write(BAR, "class Bar { void baz() {} }");
    fx.write_bytes("/app/bin/com/acme/Foo.class", &foo_calling_bar());
    fx.write_bytes("/app/bin/com/acme/Bar.class", &empty_class("com/acme/Bar"));
    fx
}

#[test]
fn test_class_without_external_references() {
    let bytes = ClassAssembler::new("com/acme/Lone")
        .with_super(None)
        .with_method(0x0001, "run", "()V", None)
        .with_class_ref("com/acme/Lone$Inner")
        .build();
    let refs = ReferenceExtractor::new(&ClassFileTypeInfo).extract_bytes(&bytes);
    assert!(refs.is_empty(), "unexpected references: {refs:?}");
}

#[test]
fn test_undecodable_artifact_has_no_references() {
    let refs = ReferenceExtractor::new(&ClassFileTypeInfo).extract_bytes(b"not a class");
    assert!(refs.is_empty());
}

#[test]
fn test_method_reference_creates_edge() {
    let fx = foo_and_bar();
    let foo = SourceFile::new(FOO);
    let bar = SourceFile::new(BAR);

    assert!(fx.workspace.update_dependencies(&foo).unwrap());
    assert!(fx.workspace.dependencies(&foo).unwrap().contains(&bar));
    assert!(fx.workspace.dependents(&bar).unwrap().contains(&foo));

    let refs = fx.workspace.references(&foo).unwrap();
    assert!(refs.contains(&SymbolReference::Method {
        owner: "com.acme.Bar".into(),
        name: "baz".into(),
        parameters: vec![],
    }));
    // Platform classes are referenced but never become edges
    assert!(refs.contains(&SymbolReference::class("java.lang.Object")));
    assert_eq!(fx.workspace.dependencies(&foo).unwrap().len(), 1);
}

#[test]
fn test_second_update_is_unchanged() {
    let fx = foo_and_bar();
    let foo = SourceFile::new(FOO);

    assert!(fx.workspace.update_dependencies(&foo).unwrap());
    let before = fx.workspace.dependencies(&foo).unwrap();
    assert!(!fx.workspace.update_dependencies(&foo).unwrap());
    assert_eq!(fx.workspace.dependencies(&foo).unwrap(), before);
    assert!(
        fx.workspace
            .with_graph(|g| g.asymmetries().is_empty())
            .unwrap()
    );
}

#[test]
fn test_deleting_dependency_queues_dependent() {
    let fx = foo_and_bar();
    let foo = SourceFile::new(FOO);
    let bar = SourceFile::new(BAR);
    fx.workspace.update_dependencies(&foo).unwrap();
    fx.workspace.update_dependencies(&bar).unwrap();
    assert!(fx.pending().is_empty());

    fx.store.delete(&bar).unwrap();
    fx.workspace.remove_build_file(&bar).unwrap();

    assert_eq!(fx.pending(), vec!["Foo.java"]);
    assert!(!fx.store.exists(&SourceFile::new("/app/bin/com/acme/Bar.class")));
    // Foo keeps its stale reference until it is rebuilt
    assert!(
        fx.workspace
            .references(&foo)
            .unwrap()
            .iter()
            .any(|r| r.root_class_name() == "com.acme.Bar")
    );
    assert!(
        fx.workspace
            .with_graph(|g| g.asymmetries().is_empty())
            .unwrap()
    );
}

#[test]
fn test_generic_argument_creates_reference() {
    let fx = Fixture::new();
    let holder = fx.write("/app/src/com/acme/Holder.java", "class Holder {}");
    let baz = fx.write("/app/src/com/acme/Baz.java", "class Baz {}");
    let bytes = ClassAssembler::new("com/acme/Holder")
        .with_field(
            0x0002,
            "items",
            "Ljava/util/List;",
            Some("Ljava/util/List<Lcom/acme/Baz;>;"),
        )
        .build();
    fx.write_bytes("/app/bin/com/acme/Holder.class", &bytes);

    let refs = ReferenceExtractor::new(&ClassFileTypeInfo).extract_bytes(&bytes);
    assert!(refs.contains(&SymbolReference::class("com.acme.Baz")));

    fx.workspace.update_dependencies(&holder).unwrap();
    assert_eq!(
        fx.workspace.dependencies(&holder).unwrap(),
        BTreeSet::from([baz.clone()])
    );
    assert!(fx.workspace.dependents(&baz).unwrap().contains(&holder));
}

#[test]
fn test_nested_artifacts_contribute_references() {
    let fx = Fixture::new();
    let outer = fx.write("/app/src/Outer.java", "class Outer {}");
    let target = fx.write("/app/src/Target.java", "class Target {}");
    fx.write_bytes("/app/bin/Outer.class", &empty_class("Outer"));
    fx.write_bytes(
        "/app/bin/Outer$Inner.class",
        &ClassAssembler::new("Outer$Inner")
            .with_field_ref("Target", "count", "I")
            .build(),
    );

    assert!(fx.workspace.update_dependencies(&outer).unwrap());
    assert!(fx.workspace.dependencies(&outer).unwrap().contains(&target));
}
