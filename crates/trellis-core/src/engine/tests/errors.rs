//! Error propagation and edge case tests

use serde_json::{json, Map, Value};

use super::helpers::{data, engine_with};
use crate::engine::eval::{BasicEvaluator, EvalError, Evaluator};
use crate::error::TrellisError;

#[test]
fn test_missing_template_reports_not_found() {
    let (_dir, engine) = engine_with(&[("exists", "x")]);
    let err = engine.render("missing.page", Map::new()).unwrap_err();
    assert!(matches!(err, TrellisError::TemplateNotFound(name) if name == "missing.page"));
}

#[test]
fn test_exists_answers_without_erroring() {
    let (_dir, engine) = engine_with(&[("page", "x")]);
    assert!(engine.exists("page"));
    assert!(!engine.exists("missing"));
}

#[test]
fn test_dd_halts_rendering_and_discards_output() {
    let (_dir, engine) = engine_with(&[("t", "before@dd(x)after")]);
    let err = engine.render("t", data(json!({"x": 1}))).unwrap_err();
    assert!(matches!(err, TrellisError::Eval(EvalError::Halted)), "got {err:?}");
}

#[test]
fn test_stray_endif_is_an_unmatched_block_op() {
    let (_dir, engine) = engine_with(&[("t", "@endif")]);
    let err = engine.render("t", Map::new()).unwrap_err();
    assert!(matches!(err, TrellisError::UnmatchedBlockOp(op) if op == "endif"));
}

#[test]
fn test_unclosed_if_block_is_an_error() {
    let (_dir, engine) = engine_with(&[("t", "@if(flag)x")]);
    let err = engine.render("t", data(json!({"flag": true}))).unwrap_err();
    assert!(matches!(err, TrellisError::UnclosedBlock { .. }), "got {err:?}");
}

#[test]
fn test_code_block_is_unsupported_by_the_bundled_evaluator() {
    let (_dir, engine) = engine_with(&[("t", "@code anything @endcode")]);
    let err = engine.render("t", Map::new()).unwrap_err();
    assert!(
        matches!(err, TrellisError::Eval(EvalError::UnsupportedCode)),
        "got {err:?}"
    );
}

#[test]
fn test_custom_evaluator_executes_code_blocks() {
    // Raw-code content reaches Evaluator::exec untouched, and its scope
    // mutations are visible to the rest of the same template.
    struct ScriptedEvaluator;

    impl Evaluator for ScriptedEvaluator {
        fn eval(
            &self,
            expr: &str,
            scope: &serde_json::Map<String, Value>,
        ) -> Result<Value, EvalError> {
            BasicEvaluator.eval(expr, scope)
        }

        fn exec(
            &self,
            code: &str,
            scope: &mut serde_json::Map<String, Value>,
        ) -> Result<(), EvalError> {
            assert_eq!(code, "mark");
            scope.insert("done".to_string(), json!("yes"));
            Ok(())
        }
    }

    let (_dir, engine) = engine_with(&[("t", "@code mark @endcode{{ done }}")]);
    let engine = engine.with_evaluator(ScriptedEvaluator);

    assert_eq!(engine.render("t", Map::new()).unwrap(), "yes");
}

#[test]
fn test_echoing_a_structured_value_is_an_error() {
    let (_dir, engine) = engine_with(&[("t", "{{ user }}")]);
    let err = engine
        .render("t", data(json!({"user": {"a": 1}})))
        .unwrap_err();
    assert!(
        matches!(err, TrellisError::Eval(EvalError::UnprintableValue(_))),
        "got {err:?}"
    );
}

#[test]
fn test_self_including_template_reports_depth() {
    let (_dir, engine) = engine_with(&[("loop", "@include('loop')")]);
    let err = engine.render("loop", Map::new()).unwrap_err();
    assert!(
        matches!(err, TrellisError::RenderDepthExceeded { .. }),
        "got {err:?}"
    );
}

#[test]
fn test_registered_condition_renders() {
    let (_dir, mut engine) = engine_with(&[("t", "@vip x@endvip")]);
    engine.register_condition("vip", |_| true);
    assert_eq!(engine.render("t", Map::new()).unwrap(), " x");
}

#[test]
fn test_unknown_condition_reports_by_name() {
    // A directive can emit a condition lookup that was never registered.
    let (_dir, mut engine) = engine_with(&[("t", "@ghost x@endif")]);
    engine.directive("ghost", |_| "<% if(condition('ghost')) %>".to_string());

    let err = engine.render("t", Map::new()).unwrap_err();
    assert!(matches!(err, TrellisError::UnknownCondition(name) if name == "ghost"));
}

#[test]
fn test_failing_evaluation_keeps_completed_sections_inspectable() {
    let (_dir, engine) = engine_with(&[(
        "t",
        "@section('done', 'ok')@dd(x)",
    )]);

    let mut session = crate::engine::RenderSession::new();
    let err = engine
        .render_in_session("t", data(json!({"x": 1})), &mut session)
        .unwrap_err();
    assert!(matches!(err, TrellisError::Eval(EvalError::Halted)));

    // The failing evaluation's buffer is gone, but state completed before
    // the failure is still visible.
    assert!(session.has_section("done"));
}
