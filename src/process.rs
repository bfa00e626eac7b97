//! Scoped execution of external tools.
//!
//! Every tool this crate drives (git, cmake, makensis) goes through
//! [`ProcessRunner`]. A tool that cannot be started is not an `Err`: it is
//! reported as the return code [`TOOL_NOT_FOUND`] so callers handle it the
//! same way they handle any other failing command.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Return code reported when the executable cannot be started at all.
pub const TOOL_NOT_FOUND: i32 = 9009;

/// Return code reported when the child was terminated without an exit code.
pub const KILLED: i32 = -1;

/// Description of one command invocation.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: OsString,
    args: Vec<OsString>,
    through_shell: bool,
    capture: bool,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            through_shell: false,
            capture: false,
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run through `cmd.exe /c` on Windows, `sh -c` elsewhere.
    pub fn through_shell(mut self) -> Self {
        self.through_shell = true;
        self
    }

    /// Collect stdout and stderr as lines instead of inheriting them.
    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set a variable on top of the inherited environment.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Human-readable command line, for progress and error output.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| quote(&part.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start the command. Never fails; see [`TOOL_NOT_FOUND`].
    pub fn spawn(&self) -> RunningProcess {
        let mut command = self.command();
        if self.capture {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command.envs(self.envs.iter().map(|(k, v)| (k, v)));

        match command.spawn() {
            Ok(child) => RunningProcess {
                child: Some(child),
                rc: None,
                lines: Vec::new(),
                capture: self.capture,
            },
            Err(err) => RunningProcess {
                child: None,
                rc: Some(TOOL_NOT_FOUND),
                lines: vec![format!("{}: {err}", self.program.to_string_lossy())],
                capture: self.capture,
            },
        }
    }

    /// Start the command and wait for it to finish.
    pub fn run(&self) -> RunningProcess {
        let mut process = self.spawn();
        process.rc();
        process
    }

    fn command(&self) -> Command {
        if !self.through_shell {
            let mut command = Command::new(&self.program);
            command.args(&self.args);
            return command;
        }

        self.shell_command()
    }

    #[cfg(windows)]
    fn shell_command(&self) -> Command {
        use std::os::windows::process::CommandExt;

        let mut command = Command::new("cmd.exe");
        command.arg("/c").raw_arg(self.shell_line());
        command
    }

    #[cfg(not(windows))]
    fn shell_command(&self) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(self.shell_line());
        command
    }

    fn shell_line(&self) -> String {
        // The program slot may already hold a compound line (`. env && tool`),
        // so it is passed through untouched.
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| shell_quote(&a.to_string_lossy())))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(windows)]
fn shell_quote(word: &str) -> String {
    if !word.is_empty() && !word.contains([' ', '\t', '&', '|', '<', '>', '^']) {
        word.to_string()
    } else {
        format!("\"{}\"", word.replace('"', "\"\""))
    }
}

#[cfg(not(windows))]
fn shell_quote(word: &str) -> String {
    quote(word)
}

/// Quote one word for a POSIX shell if it needs it.
fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// A started command. The return code is awaited at most once.
#[derive(Debug)]
pub struct RunningProcess {
    child: Option<Child>,
    rc: Option<i32>,
    lines: Vec<String>,
    capture: bool,
}

impl RunningProcess {
    /// Block until the command finishes; later calls return the cached code.
    pub fn rc(&mut self) -> i32 {
        if let Some(rc) = self.rc {
            return rc;
        }
        let rc = match self.child.take() {
            Some(child) if self.capture => match child.wait_with_output() {
                Ok(output) => {
                    self.lines.extend(split_lines(&output.stdout));
                    self.lines.extend(split_lines(&output.stderr));
                    output.status.code().unwrap_or(KILLED)
                }
                Err(err) => {
                    self.lines.push(format!("waiting for child: {err}"));
                    KILLED
                }
            },
            Some(mut child) => match child.wait() {
                Ok(status) => status.code().unwrap_or(KILLED),
                Err(err) => {
                    self.lines.push(format!("waiting for child: {err}"));
                    KILLED
                }
            },
            None => KILLED,
        };
        self.rc = Some(rc);
        rc
    }

    /// Captured output: stdout lines followed by stderr lines.
    pub fn lines(&mut self) -> &[String] {
        self.rc();
        &self.lines
    }

    pub fn ok(&mut self) -> bool {
        self.rc() == 0
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
