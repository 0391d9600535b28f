//! Tests for the graph queries over a project.json dump.

use crate::e2e::*;

#[test]
fn unreachable_targets() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", PROJECT_JSON)?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "project.json",
        "--known",
        "//:default",
    ]))?;
    assert_eq!(
        stdout(&out),
        "//old:codegen
//old:tool
//old:tool_support
//scratch:loop_a
//scratch:loop_b
"
    );
    Ok(())
}

#[test]
fn only_source() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", PROJECT_JSON)?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "project.json",
        "--known",
        "//:default",
        "--only-source",
    ]))?;
    // The scratch loop has no target outside it pointing in, but each member
    // has an incoming edge from the other.
    assert_eq!(stdout(&out), "//old:tool\n");
    Ok(())
}

#[test]
fn several_known_roots() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", PROJECT_JSON)?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "project.json",
        "--known",
        "//app:app",
        "--known",
        "//old:tool_support",
        "--known",
        "//scratch:loop_b",
    ]))?;
    assert_eq!(
        stdout(&out),
        "//:default
//app:app_unittests
//old:tool
//testing:gtest
"
    );
    Ok(())
}

#[test]
fn no_known_roots() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", r#"{ "targets": { "//b:b": {}, "//a:a": { "deps": ["//b:b"] } } }"#)?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "project.json",
    ]))?;
    assert_eq!(stdout(&out), "//a:a\n//b:b\n");
    Ok(())
}

#[test]
fn reachable_includes_dangling() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", PROJECT_JSON)?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "reachable",
        "--json-file",
        "project.json",
        "--known",
        "//:default",
    ]))?;
    assert_eq!(
        stdout(&out),
        "//:default
//app:app
//app:app_unittests
//base:base
//testing:gtest
//third_party:zlib
"
    );
    Ok(())
}

#[test]
fn malformed_dump() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("project.json", r#"{ "targets": { "//a:a": { "deps": "//b:b" } } }"#)?;
    let out = space.run(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "project.json",
    ]))?;
    assert!(!out.status.success());
    assert_eq!(stdout(&out), "");
    let stderr = std::str::from_utf8(&out.stderr)?;
    assert!(stderr.contains("project.json"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn missing_dump() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut gnfresh_command(vec![
        "unreachable",
        "--json-file",
        "nope.json",
    ]))?;
    assert!(!out.status.success());
    Ok(())
}
