//! Shared test helpers for engine tests

use serde_json::{Map, Value};
use tempfile::TempDir;
use trellis_testkit::{temp_dir_in_workspace, write_templates};

use crate::engine::Engine;

/// Build an engine over a freshly written template tree.
///
/// Keep the returned `TempDir` alive for as long as the engine renders.
pub(super) fn engine_with(templates: &[(&str, &str)]) -> (TempDir, Engine) {
    let dir = temp_dir_in_workspace();
    write_templates(dir.path(), templates);
    let engine = Engine::new(vec![dir.path().to_path_buf()]);
    (dir, engine)
}

/// Turn a `json!` object literal into a render data context.
pub(super) fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture data must be an object, got {other:?}"),
    }
}
