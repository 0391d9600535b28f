//! Support code for e2e tests, which run gnfresh as a binary.

mod unreachable;
mod watch;

pub fn gnfresh_binary() -> std::path::PathBuf {
    std::env::current_exe()
        .expect("test binary path")
        .parent()
        .expect("test binary directory")
        .parent()
        .expect("binary directory")
        .join(format!("gnfresh{}", std::env::consts::EXE_SUFFIX))
}

pub fn gnfresh_command(args: Vec<&str>) -> std::process::Command {
    let mut cmd = std::process::Command::new(gnfresh_binary());
    cmd.args(args);
    cmd
}

fn print_output(out: &std::process::Output) {
    // Gross: use print! instead of writing to stdout so Rust test
    // framework can capture it.
    print!("{}", std::str::from_utf8(&out.stdout).unwrap());
    print!("{}", std::str::from_utf8(&out.stderr).unwrap());
}

pub fn stdout(out: &std::process::Output) -> &str {
    std::str::from_utf8(&out.stdout).unwrap()
}

pub fn assert_output_contains(out: &std::process::Output, text: &str) {
    let out = stdout(out);
    if !out.contains(text) {
        panic!(
            "assertion failed; expected output to contain {:?} but got:\n{}",
            text, out
        );
    }
}

pub fn assert_output_not_contains(out: &std::process::Output, text: &str) {
    let out = stdout(out);
    if out.contains(text) {
        panic!(
            "assertion failed; expected output to not contain {:?} but got:\n{}",
            text, out
        );
    }
}

/// Manages a temporary directory for invoking gnfresh.
pub struct TestSpace {
    dir: tempfile::TempDir,
}
impl TestSpace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        Ok(TestSpace { dir })
    }

    pub fn path(&self, path: &str) -> std::path::PathBuf {
        self.dir.path().join(path)
    }

    /// Write a file into the working space, creating parent directories.
    pub fn write(&self, path: &str, content: &str) -> std::io::Result<()> {
        let path = self.path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    /// Read a file from the working space.
    pub fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(path))
    }

    /// Invoke gnfresh, returning process output.
    pub fn run(&self, cmd: &mut std::process::Command) -> std::io::Result<std::process::Output> {
        cmd.current_dir(self.dir.path()).output()
    }

    /// Like run, but also print output and fail if the command failed.
    pub fn run_expect(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if !out.status.success() {
            print_output(&out);
            anyhow::bail!("gnfresh failed, status {}", out.status);
        }
        Ok(out)
    }

    /// Persist the temp dir locally and abort the test.  Debugging helper.
    #[allow(dead_code)]
    pub fn eject(self) -> ! {
        panic!("ejected at {:?}", self.dir.into_path());
    }
}

/// A project.json as written by `gn gen --ide=json`, trimmed to the fields
/// gnfresh reads plus a few it ignores.
pub const PROJECT_JSON: &str = r#"{
   "build_settings": {
      "build_dir": "//out/",
      "root_path": "/src"
   },
   "targets": {
      "//:default": {
         "deps": [ "//app:app", "//app:app_unittests" ],
         "testonly": false,
         "type": "group"
      },
      "//app:app": {
         "deps": [ "//base:base", "//third_party:zlib" ],
         "type": "executable"
      },
      "//app:app_unittests": {
         "deps": [ "//app:app", "//testing:gtest" ],
         "testonly": true,
         "type": "executable"
      },
      "//base:base": {
         "deps": [ ],
         "type": "static_library"
      },
      "//testing:gtest": {
         "deps": [ ],
         "type": "source_set"
      },
      "//old:tool": {
         "deps": [ "//old:tool_support", "//base:base" ],
         "type": "executable"
      },
      "//old:tool_support": {
         "deps": [ "//old:codegen" ],
         "type": "source_set"
      },
      "//old:codegen": {
         "deps": [ ],
         "type": "action"
      },
      "//scratch:loop_a": {
         "deps": [ "//scratch:loop_b" ],
         "type": "group"
      },
      "//scratch:loop_b": {
         "deps": [ "//scratch:loop_a" ],
         "type": "group"
      }
   },
   "toolchains": { }
}
"#;
