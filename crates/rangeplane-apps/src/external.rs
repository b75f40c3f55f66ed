//! Apps implemented by external executables.
//!
//! An app named `foo` is looked up as `<prefix>foo` in the configured search
//! directories. It is run once per phase as `<exe> <action>` with the
//! experiment document as JSON on stdin. If it prints a document on stdout,
//! that document's spec and status replace the experiment's.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use rangeplane_types::{Document, Experiment};
use tracing::debug;

use crate::action::Action;
use crate::app::App;
use crate::config::AppsConfig;
use crate::error::{AppError, AppResult};

pub struct ExternalApp {
    name: String,
    exe: Option<PathBuf>,
}

impl ExternalApp {
    /// Resolve `name` against the search path. A missing executable is only
    /// reported when the app is applied.
    pub fn resolve(name: &str, config: &AppsConfig) -> Self {
        let file = config.executable_name(name);
        let exe = config
            .search_dirs()
            .into_iter()
            .map(|dir| dir.join(&file))
            .find(|path| is_executable(path));
        Self {
            name: name.to_string(),
            exe,
        }
    }

    pub fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    /// Names of every external app on the search path, sorted.
    pub fn discover(config: &AppsConfig) -> Vec<String> {
        let mut names = BTreeSet::new();
        for dir in config.search_dirs() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let file = entry.file_name();
                let Some(name) = file.to_str().and_then(|f| f.strip_prefix(config.prefix.as_str())) else {
                    continue;
                };
                if !name.is_empty() && is_executable(&entry.path()) {
                    names.insert(name.to_string());
                }
            }
        }
        names.into_iter().collect()
    }

    fn run(&self, action: Action, exp: &mut Experiment) -> AppResult<()> {
        let exe = self.exe.as_ref().ok_or_else(|| AppError::NotFound(self.name.clone()))?;

        let input = serde_json::to_vec(&exp.to_document()?)
            .map_err(|e| AppError::failed(&self.name, format!("encoding experiment: {e}")))?;

        debug!(app = %self.name, exe = %exe.display(), %action, "running external app");
        let mut child = Command::new(exe)
            .arg(action.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::io(exe, e))?;

        // Stdin is written while stdout and stderr drain.
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&input),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (written, output)
        });
        let output = output.map_err(|e| AppError::io(exe, e))?;
        // An app may exit without reading its input.
        match written {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(AppError::io(exe, e)),
            _ => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::failed(
                &self.name,
                format!("{action} exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let doc: Document = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::failed(&self.name, format!("decoding {action} output: {e}")))?;
        let updated = Experiment::from_document(&doc)?;
        exp.spec = updated.spec;
        exp.status = updated.status;
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl App for ExternalApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, exp: &mut Experiment) -> AppResult<()> {
        self.run(Action::Configure, exp)
    }

    fn pre_start(&self, exp: &mut Experiment) -> AppResult<()> {
        self.run(Action::PreStart, exp)
    }

    fn post_start(&self, exp: &mut Experiment) -> AppResult<()> {
        self.run(Action::PostStart, exp)
    }

    fn cleanup(&self, exp: &mut Experiment) -> AppResult<()> {
        self.run(Action::Cleanup, exp)
    }
}
