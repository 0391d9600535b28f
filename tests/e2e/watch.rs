//! Tests for the watcher invalidating a fresh marker.

use crate::e2e::*;

#[cfg(unix)]
#[test]
fn edit_marks_stale() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("src/BUILD.gn", "executable(\"app\") {}\n")?;
    space.write("src/main.cc", "int main() {}\n")?;
    space.run_expect(&mut gnfresh_command(vec![
        "regen",
        "--marker-dir",
        ".gnfresh",
        "--fingerprint",
        "fp",
        "--",
        "true",
    ]))?;

    let status = || {
        gnfresh_command(vec![
            "status",
            "--marker-dir",
            ".gnfresh",
            "--fingerprint",
            "fp",
        ])
    };

    let mut watcher = gnfresh_command(vec![
        "watch",
        "--marker-dir",
        ".gnfresh",
        "--root",
        "src",
        "--interval-ms",
        "50",
        "--polls",
        "40",
    ])
    .current_dir(space.path(""))
    .spawn()?;

    // Let the watcher take its baseline, then touch an irrelevant file.
    std::thread::sleep(std::time::Duration::from_millis(300));
    filetime::set_file_mtime(
        space.path("src/main.cc"),
        filetime::FileTime::from_unix_time(2_000_000_000, 0),
    )?;
    std::thread::sleep(std::time::Duration::from_millis(300));
    let out = space.run_expect(&mut status())?;
    assert_output_contains(&out, "fresh");
    assert_output_not_contains(&out, "stale");

    // Now a BUILD.gn edit.
    filetime::set_file_mtime(
        space.path("src/BUILD.gn"),
        filetime::FileTime::from_unix_time(2_000_000_000, 0),
    )?;
    assert!(watcher.wait()?.success());

    let out = space.run_expect(&mut status())?;
    assert_output_contains(&out, "stale: files affecting the build have been updated");
    Ok(())
}

#[test]
fn polls_then_exits() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("BUILD.gn", "")?;
    space.run_expect(&mut gnfresh_command(vec![
        "watch",
        "--marker-dir",
        ".gnfresh",
        "--interval-ms",
        "1",
        "--polls",
        "2",
    ]))?;
    // No change seen, so nothing was written.
    assert!(space.read(".gnfresh/modified").is_err());
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlink_loop_does_not_stop_watching() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("src/BUILD.gn", "")?;
    std::os::unix::fs::symlink(space.path("src"), space.path("src/self"))?;
    let out = space.run_expect(&mut gnfresh_command(vec![
        "watch",
        "--marker-dir",
        ".gnfresh",
        "--root",
        "src",
        "--interval-ms",
        "1",
        "--polls",
        "2",
    ]))?;
    // The link is not followed, so the walk never fails on it.
    let log = String::from_utf8_lossy(&out.stderr);
    assert!(!log.contains("skipping"), "{}", log);
    Ok(())
}
