//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::error::{KapittelError, Result};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Processing a video needs ffmpeg and the API key.
    Process,
    /// Anything that calls a model (segmentation, embedding, answers).
    Model,
    /// Reading stored artifacts needs nothing external.
    Read,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Process => {
            check_api_key()?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Model => {
            check_api_key()?;
        }
        Operation::Read => {}
    }
    Ok(())
}

fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(KapittelError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(KapittelError::ToolFailed(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KapittelError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(KapittelError::ToolFailed(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_has_no_requirements() {
        assert!(check(Operation::Read).is_ok());
    }

    #[test]
    fn test_missing_tool_is_reported_by_name() {
        let err = check_tool("kapittel-no-such-tool").unwrap_err();
        assert!(matches!(err, KapittelError::ToolNotFound(name) if name == "kapittel-no-such-tool"));
    }
}
