//! Section capture and yield tests

use serde_json::{json, Map};

use super::helpers::{data, engine_with};
use crate::engine::RenderSession;
use crate::error::TrellisError;

#[test]
fn test_section_then_yield_reproduces_content() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('content')Hello!@endsection@yield('content')",
    )]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "Hello!");
}

#[test]
fn test_section_content_is_captured_not_emitted_in_place() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "A@section('x')hidden@endsection B",
    )]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "A B");
}

#[test]
fn test_section_captures_nested_directive_output() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('c')@if(f)X@endif{{ n }}@endsection@yield('c')",
    )]);
    let result = engine.render("t", data(json!({"f": true, "n": 7}))).unwrap();
    assert_eq!(result, "X7");
}

#[test]
fn test_inline_section_form() {
    let (_dir, engine) = engine_with(&[("t", "@section('title', 'Home')@yield('title')")]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "Home");
}

#[test]
fn test_yield_default_when_section_missing() {
    let (_dir, engine) = engine_with(&[("t", "@yield('missing', 'fallback')")]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "fallback");
}

#[test]
fn test_yield_does_not_consume_the_section() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('x', 'v')@yield('x')/@yield('x')",
    )]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "v/v");
}

#[test]
fn test_later_section_overwrites_earlier() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('x')first@endsection@section('x')second@endsection@yield('x')",
    )]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "second");
}

#[test]
fn test_show_closes_and_yields_in_place() {
    let (_dir, engine) = engine_with(&[("t", "[@section('sidebar')S@show]")]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "[S]");
}

#[test]
fn test_nested_sections_close_inner_first() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('outer')o@section('inner')i@endsection@endsection@yield('outer')/@yield('inner')",
    )]);
    // Closing the inner section captures "i"; the outer capture holds
    // what was written directly to it before and after.
    assert_eq!(engine.render("t", Map::new()).unwrap(), "o/i");
}

#[test]
fn test_unbalanced_endsection_is_an_error() {
    let (_dir, engine) = engine_with(&[("t", "@endsection")]);
    let err = engine.render("t", Map::new()).unwrap_err();
    assert!(matches!(err, TrellisError::UnbalancedSection(_)), "got {err:?}");
}

#[test]
fn test_session_exposes_captured_sections() {
    let (_dir, engine) = engine_with(&[("t", "@section('x', 'v')")]);

    let mut session = RenderSession::new();
    engine.render_in_session("t", Map::new(), &mut session).unwrap();

    assert!(session.has_section("x"));
    assert!(session.section_missing("y"));
    assert_eq!(session.yield_content("x", ""), "v");
}
