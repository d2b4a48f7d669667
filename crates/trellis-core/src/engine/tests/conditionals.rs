//! Conditional rendering tests

use serde_json::{json, Map};

use super::helpers::{data, engine_with};
use crate::engine::eval::Host;
use crate::engine::Engine;

struct GateHost;

impl Host for GateHost {
    fn auth_check(&self, guard: Option<&str>) -> bool {
        guard.is_none()
    }

    fn environment(&self, names: &[String]) -> bool {
        names.iter().any(|name| name == "local")
    }

    fn is_production(&self) -> bool {
        false
    }
}

fn gated(templates: &[(&str, &str)]) -> (tempfile::TempDir, Engine) {
    let (dir, engine) = engine_with(templates);
    (dir, engine.with_host(GateHost))
}

#[test]
fn test_if_renders_body_when_truthy() {
    let (_dir, engine) = engine_with(&[("t", "@if(flag)Y@endif")]);
    assert_eq!(engine.render("t", data(json!({"flag": true}))).unwrap(), "Y");
    assert_eq!(engine.render("t", data(json!({"flag": false}))).unwrap(), "");
}

#[test]
fn test_truthiness_of_values() {
    let (_dir, engine) = engine_with(&[("t", "@if(v)Y@else N@endif")]);

    for (value, expected) in [
        (json!(1), "Y"),
        (json!(0), " N"),
        (json!(""), " N"),
        (json!("0"), " N"),
        (json!("x"), "Y"),
        (json!([]), " N"),
        (json!(["a"]), "Y"),
        (json!(null), " N"),
    ] {
        let result = engine.render("t", data(json!({"v": value}))).unwrap();
        assert_eq!(result, expected);
    }
}

#[test]
fn test_elseif_and_else_chain() {
    let (_dir, engine) = engine_with(&[("t", "@if(a)A@elseif(b)B@else C@endif")]);

    let result = engine
        .render("t", data(json!({"a": false, "b": true})))
        .unwrap();
    assert_eq!(result, "B");

    let result = engine
        .render("t", data(json!({"a": false, "b": false})))
        .unwrap();
    assert_eq!(result, " C");
}

#[test]
fn test_unless_renders_on_falsy() {
    let (_dir, engine) = engine_with(&[("t", "@unless(flag)N@endunless")]);
    assert_eq!(engine.render("t", data(json!({"flag": false}))).unwrap(), "N");
    assert_eq!(engine.render("t", data(json!({"flag": true}))).unwrap(), "");
}

#[test]
fn test_isset_checks_presence() {
    let (_dir, engine) = engine_with(&[("t", "@isset(user)U@endisset")]);
    assert_eq!(
        engine.render("t", data(json!({"user": "ada"}))).unwrap(),
        "U"
    );
    // A missing key is simply "not set", not an error.
    assert_eq!(engine.render("t", Map::new()).unwrap(), "");
    // An explicit null is also not set.
    assert_eq!(engine.render("t", data(json!({"user": null}))).unwrap(), "");
}

#[test]
fn test_empty_checks_emptiness() {
    let (_dir, engine) = engine_with(&[("t", "@empty(items)E@endempty")]);
    assert_eq!(engine.render("t", data(json!({"items": []}))).unwrap(), "E");
    assert_eq!(
        engine.render("t", data(json!({"items": [1]}))).unwrap(),
        ""
    );
    assert_eq!(engine.render("t", Map::new()).unwrap(), "E");
}

#[test]
fn test_nested_if_blocks() {
    let (_dir, engine) = engine_with(&[("t", "@if(a)[@if(b)inner@endif]@endif")]);
    let result = engine
        .render("t", data(json!({"a": true, "b": false})))
        .unwrap();
    assert_eq!(result, "[]");
}

#[test]
fn test_registered_condition_drives_directive_trio() {
    let (_dir, mut engine) = engine_with(&[("t", "@admin('root')A@else B@endadmin")]);
    engine.register_condition("admin", |args| {
        args.first().and_then(|v| v.as_str()) == Some("root")
    });

    assert_eq!(engine.render("t", Map::new()).unwrap(), "A");

    let (_dir, mut engine) = engine_with(&[("t", "@admin('guest')A@else B@endadmin")]);
    engine.register_condition("admin", |args| {
        args.first().and_then(|v| v.as_str()) == Some("root")
    });

    assert_eq!(engine.render("t", Map::new()).unwrap(), " B");
}

#[test]
fn test_auth_and_guest_gating() {
    let (_dir, engine) = gated(&[("t", "@auth In@endauth@guest('web') Out@endguest")]);
    // GateHost: authenticated by default, not under a named guard.
    assert_eq!(engine.render("t", Map::new()).unwrap(), " In Out");
}

#[test]
fn test_env_gating() {
    let (_dir, engine) = gated(&[("t", "@env('local')L@endenv@env('staging')S@endenv")]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "L");
}

#[test]
fn test_production_gating() {
    let (_dir, engine) = gated(&[("t", "@production P@endproduction")]);
    assert_eq!(engine.render("t", Map::new()).unwrap(), "");
}

#[test]
fn test_default_host_answers_neutral() {
    let (_dir, engine) = engine_with(&[("t", "@auth A@endauth@guest G@endguest")]);
    // The default host reports logged-out, so only the guest branch shows.
    assert_eq!(engine.render("t", Map::new()).unwrap(), " G");
}
