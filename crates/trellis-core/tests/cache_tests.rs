//! Compiled-output cache integration tests

use std::fs;
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde_json::Map;
use trellis_core::Engine;
use trellis_testkit::{temp_dir_in_workspace, write_templates};

fn sole_artifact(cache_dir: &Path) -> PathBuf {
    let mut artifacts: Vec<PathBuf> = fs::read_dir(cache_dir)
        .expect("cache dir exists")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "compiled"))
        .collect();
    assert_eq!(artifacts.len(), 1, "expected exactly one artifact");
    artifacts.pop().unwrap()
}

#[test]
fn test_render_writes_a_compiled_artifact() -> Result<()> {
    let templates = temp_dir_in_workspace();
    let cache = temp_dir_in_workspace();
    write_templates(templates.path(), &[("page", "Hello {{ 'there' }}")]);

    let engine =
        Engine::new(vec![templates.path().to_path_buf()]).with_cache_path(cache.path());
    assert_eq!(engine.render("page", Map::new())?, "Hello there");

    let artifact = sole_artifact(cache.path());
    let compiled = fs::read_to_string(artifact)?;
    assert_eq!(compiled, "Hello <% echo escape('there') %>");
    Ok(())
}

#[test]
fn test_fresh_artifact_is_reused_without_recompiling() -> Result<()> {
    let templates = temp_dir_in_workspace();
    let cache = temp_dir_in_workspace();
    write_templates(templates.path(), &[("page", "original")]);

    let engine =
        Engine::new(vec![templates.path().to_path_buf()]).with_cache_path(cache.path());
    engine.render("page", Map::new())?;

    // Overwrite the artifact; a cache hit will surface the planted text.
    let artifact = sole_artifact(cache.path());
    fs::write(&artifact, "planted")?;
    let future = SystemTime::now() + Duration::from_secs(60);
    fs::File::options()
        .write(true)
        .open(&artifact)?
        .set_times(FileTimes::new().set_modified(future))?;

    assert_eq!(engine.render("page", Map::new())?, "planted");
    Ok(())
}

#[test]
fn test_stale_artifact_is_recompiled() -> Result<()> {
    let templates = temp_dir_in_workspace();
    let cache = temp_dir_in_workspace();
    write_templates(templates.path(), &[("page", "first")]);

    let engine =
        Engine::new(vec![templates.path().to_path_buf()]).with_cache_path(cache.path());
    assert_eq!(engine.render("page", Map::new())?, "first");

    // Rewrite the source and stamp it newer than the artifact.
    write_templates(templates.path(), &[("page", "second")]);
    let source = templates.path().join("page.trellis");
    let future = SystemTime::now() + Duration::from_secs(60);
    fs::File::options()
        .write(true)
        .open(&source)?
        .set_times(FileTimes::new().set_modified(future))?;

    assert_eq!(engine.render("page", Map::new())?, "second");
    let artifact = sole_artifact(cache.path());
    assert_eq!(fs::read_to_string(artifact)?, "second");
    Ok(())
}

#[test]
fn test_no_cache_means_compile_on_the_fly() -> Result<()> {
    let templates = temp_dir_in_workspace();
    write_templates(templates.path(), &[("page", "one")]);

    let engine = Engine::new(vec![templates.path().to_path_buf()]);
    assert_eq!(engine.render("page", Map::new())?, "one");

    write_templates(templates.path(), &[("page", "two")]);
    assert_eq!(engine.render("page", Map::new())?, "two");
    Ok(())
}
