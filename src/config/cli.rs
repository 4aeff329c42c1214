use crate::domain::ports::{Printer, Storage};
use crate::utils::error::{PermitError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.locate(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.locate(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.locate(path))?;
        Ok(())
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

/// Environment variable holding the path of the file being printed.
pub const PRINT_FILE_VAR: &str = "PERMIT_DESK_FILE";

/// Hands a file to an external print command.
#[derive(Debug, Clone)]
pub struct CommandPrinter {
    command: String,
}

impl CommandPrinter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Program and arguments with `{path}` filled in. Splitting happens before
    /// substitution so paths with spaces stay one argument. The path is
    /// appended when the command names neither `{path}` nor `PERMIT_DESK_FILE`.
    pub fn command_line(&self, path: &Path) -> Result<Vec<String>> {
        let parts = shell_words::split(&self.command).map_err(|e| {
            PermitError::InvalidConfigValueError {
                field: "output.print_command".to_string(),
                value: self.command.clone(),
                reason: e.to_string(),
            }
        })?;
        if parts.is_empty() {
            return Err(PermitError::MissingConfigError {
                field: "output.print_command".to_string(),
            });
        }

        let path = path.display().to_string();
        let mut has_placeholder = false;
        let mut args: Vec<String> = parts
            .into_iter()
            .map(|part| {
                if part.contains("{path}") {
                    has_placeholder = true;
                }
                part.replace("{path}", &path)
            })
            .collect();
        if !has_placeholder && !self.command.contains(PRINT_FILE_VAR) {
            args.push(path);
        }
        Ok(args)
    }
}

impl Printer for CommandPrinter {
    fn print(&self, path: &Path) -> Result<()> {
        let mut args = self.command_line(path)?;
        let program = args.remove(0);
        tracing::debug!("Printing with {} {:?}", program, args);

        let status = Command::new(&program)
            .args(&args)
            .env(PRINT_FILE_VAR, path)
            .status()?;
        if !status.success() {
            return Err(PermitError::IoError(std::io::Error::other(format!(
                "{} exited with {}",
                program, status
            ))));
        }
        Ok(())
    }
}
