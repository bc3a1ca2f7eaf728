//! Fake yt-dlp
//!
//! Generates a `/bin/sh` script that behaves like yt-dlp as far as this
//! crate can tell: `--dump-single-json` prints a canned document, anything
//! else prints scripted progress lines, writes the file named by `-o` and
//! exits with a chosen code. Every invocation appends its arguments to a log
//! and records its pid.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[derive(Debug, Clone)]
pub struct FakeYtDlpBuilder {
    metadata: Option<String>,
    metadata_error: String,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    output_bytes: Option<usize>,
    partial_file: bool,
    hang: bool,
    exit_code: i32,
}

impl Default for FakeYtDlpBuilder {
    fn default() -> Self {
        Self {
            metadata: None,
            metadata_error: "ERROR: [generic] Unsupported URL".to_string(),
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
            output_bytes: None,
            partial_file: false,
            hang: false,
            exit_code: 0,
        }
    }
}

impl FakeYtDlpBuilder {
    /// Document printed for `--dump-single-json`
    pub fn metadata(mut self, json: impl Into<String>) -> Self {
        self.metadata = Some(json.into());
        self
    }

    /// Make `--dump-single-json` fail with this stderr
    pub fn metadata_error(mut self, stderr: impl Into<String>) -> Self {
        self.metadata = None;
        self.metadata_error = stderr.into();
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.stdout_lines.push(line.into());
        self
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stdout_lines.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn stderr_line(mut self, line: impl Into<String>) -> Self {
        self.stderr_lines.push(line.into());
        self
    }

    /// Write `bytes` zero bytes to the `-o` path
    pub fn writes_output(mut self, bytes: usize) -> Self {
        self.output_bytes = Some(bytes);
        self
    }

    /// Leave a `<output>.part` file behind
    pub fn writes_partial(mut self) -> Self {
        self.partial_file = true;
        self
    }

    /// Never exit on its own (`exec sleep 30` after the scripted output)
    pub fn hangs(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn build(self) -> FakeYtDlp {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("yt-dlp");
        let args_log = dir.path().join("args.log");
        let pid_file = dir.path().join("pid");

        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!("echo \"$*\" >> {}\n", sh_quote(&args_log.to_string_lossy())));
        script.push_str(
            r#"out=""
prev=""
dump=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  if [ "$arg" = "--dump-single-json" ]; then dump=1; fi
  prev="$arg"
done
"#,
        );

        script.push_str("if [ -n \"$dump\" ]; then\n");
        match &self.metadata {
            Some(json) => {
                script.push_str("cat <<'JSON_EOF'\n");
                script.push_str(json);
                script.push_str("\nJSON_EOF\nexit 0\n");
            }
            None => {
                script.push_str(&format!("printf '%s\\n' {} >&2\nexit 1\n", sh_quote(&self.metadata_error)));
            }
        }
        script.push_str("fi\n");

        script.push_str(&format!("echo $$ > {}\n", sh_quote(&pid_file.to_string_lossy())));
        script.push_str("case \"$out\" in *'%(ext)s') out=\"${out%'%(ext)s'}mp3\" ;; esac\n");

        for line in &self.stdout_lines {
            script.push_str(&format!("printf '%s\\n' {}\n", sh_quote(line)));
        }
        for line in &self.stderr_lines {
            script.push_str(&format!("printf '%s\\n' {} >&2\n", sh_quote(line)));
        }
        if self.partial_file {
            script.push_str(": > \"$out.part\"\n");
        }
        if let Some(bytes) = self.output_bytes {
            script.push_str(&format!("head -c {} /dev/zero > \"$out\"\n", bytes));
        }
        if self.hang {
            script.push_str("exec sleep 30\n");
        }
        script.push_str(&format!("exit {}\n", self.exit_code));

        fs::write(&bin, script).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

        FakeYtDlp {
            _dir: dir,
            bin,
            args_log,
            pid_file,
        }
    }
}

/// A generated fake; the script lives as long as this value
pub struct FakeYtDlp {
    _dir: TempDir,
    bin: PathBuf,
    args_log: PathBuf,
    pid_file: PathBuf,
}

impl FakeYtDlp {
    pub fn builder() -> FakeYtDlpBuilder {
        FakeYtDlpBuilder::default()
    }

    pub fn bin(&self) -> String {
        self.bin.to_string_lossy().into_owned()
    }

    /// Argument lines of every invocation so far
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.args_log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Pid of the last download invocation, once it has started
    pub fn pid(&self) -> Option<i32> {
        fs::read_to_string(&self.pid_file).ok()?.trim().parse().ok()
    }
}
