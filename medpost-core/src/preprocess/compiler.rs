//! The external reStructuredText-to-HTML compiler.
//!
//! Rendering goes through the [`DocumentCompiler`] trait so tests can
//! substitute a fake. [`DocutilsCompiler`] runs the docutils S5 front end,
//! whose slide-deck writer emits self-contained HTML suitable for a post body.

use std::path::Path;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Failure of the external document compiler.
#[derive(Debug, Error)]
pub enum ExternalToolError {
    /// The program could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and reported failure.
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Compiles a reStructuredText file into an HTML file.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    /// Render `input` into `output`, overwriting it.
    async fn render(&self, input: &Path, output: &Path) -> Result<(), ExternalToolError>;
}

/// Runs the docutils S5 writer (`rst2s5 <input> <output>`).
#[derive(Debug, Clone)]
pub struct DocutilsCompiler {
    program: String,
}

impl DocutilsCompiler {
    /// Use `program` as the docutils S5 front end.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program that will be invoked.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for DocutilsCompiler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMPILER)
    }
}

#[async_trait]
impl DocumentCompiler for DocutilsCompiler {
    async fn render(&self, input: &Path, output: &Path) -> Result<(), ExternalToolError> {
        tracing::debug!(
            "Running {} {} {}",
            self.program,
            input.display(),
            output.display()
        );

        let result = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .output()
            .await
            .map_err(|source| ExternalToolError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(ExternalToolError::Failed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let warnings = String::from_utf8_lossy(&result.stderr);
        if !warnings.trim().is_empty() {
            tracing::warn!("{}: {}", self.program, warnings.trim());
        }
        Ok(())
    }
}
