//! Extension directive and condition registrar tests

use super::*;

#[test]
fn test_custom_directive_compiles() {
    let mut compiler = Compiler::new();
    compiler.directive("datetime", |expression| {
        format!("<% echo format_date({expression}) %>")
    });

    assert_eq!(
        compiler.compile("@datetime($now)"),
        "<% echo format_date($now) %>"
    );
}

#[test]
fn test_custom_directive_without_arguments() {
    let mut compiler = Compiler::new();
    compiler.directive("hr", |_| "<hr>".to_string());

    assert_eq!(compiler.compile("before @hr after"), "before <hr> after");
}

#[test]
fn test_later_registration_overwrites_earlier() {
    let mut compiler = Compiler::new();
    compiler.directive("tag", |_| "first".to_string());
    compiler.directive("tag", |_| "second".to_string());

    assert_eq!(compiler.compile("@tag"), "second");
}

#[test]
fn test_builtins_shadow_extensions() {
    let mut compiler = Compiler::new();
    compiler.directive("if", |_| "SHADOWED".to_string());

    let compiled = compiler.compile("@if($x)Y@endif");
    assert_eq!(compiled, "<% if($x) %>Y<% endif %>");
    assert!(!compiled.contains("SHADOWED"));
}

#[test]
fn test_namespaced_directive() {
    let mut compiler = Compiler::new();
    compiler.directive("forms::input", |expression| {
        format!("<input name={expression}>")
    });

    assert_eq!(compiler.compile("@forms::input('age')"), "<input name='age'>");
}

#[test]
fn test_unregistered_namespaced_directive_passes_through() {
    let source = "@forms::input('age')";
    assert_eq!(Compiler::new().compile(source), source);
}

#[test]
fn test_register_condition_creates_directive_trio() {
    let mut compiler = Compiler::new();
    compiler.register_condition("admin", |_| true);

    assert_eq!(
        compiler.compile("@admin('super')"),
        "<% if(condition('admin', 'super')) %>"
    );
    assert_eq!(compiler.compile("@admin"), "<% if(condition('admin')) %>");
    assert_eq!(
        compiler.compile("@elseadmin('basic')"),
        "<% elseif(condition('admin', 'basic')) %>"
    );
    assert_eq!(compiler.compile("@endadmin"), "<% endif %>");
}

#[test]
fn test_condition_predicate_is_retrievable() {
    let mut compiler = Compiler::new();
    compiler.register_condition("always", |_| true);

    let predicate = compiler.condition("always").expect("registered condition");
    assert!(predicate(&[]));
    assert!(compiler.condition("never").is_none());
}

#[test]
fn test_multiline_extension_arguments() {
    let mut compiler = Compiler::new();
    compiler.directive("wrap", |expression| format!("[{expression}]"));

    // The extension pattern lets argument text span lines.
    assert_eq!(compiler.compile("@wrap($a,\n$b)"), "[$a,\n$b]");
}
