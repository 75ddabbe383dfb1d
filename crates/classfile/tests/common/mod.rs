#![allow(dead_code)]

use kiln_classfile::assemble::ClassAssembler;

/// `com/acme/Foo` calling `Bar.baz()` and reading `Bar.count`.
pub fn foo_calling_bar() -> Vec<u8> {
    ClassAssembler::new("com/acme/Foo")
        .with_method_ref("com/acme/Bar", "baz", "()V")
        .with_field_ref("com/acme/Bar", "count", "I")
        .with_method_ref("java/lang/Object", "<init>", "()V")
        .with_method(0x0001, "<init>", "()V", None)
        .with_source_file("Foo.java")
        .build()
}

/// Replaces the byte at `offset` and returns the patched copy.
pub fn patch(mut bytes: Vec<u8>, offset: usize, value: u8) -> Vec<u8> {
    bytes[offset] = value;
    bytes
}
