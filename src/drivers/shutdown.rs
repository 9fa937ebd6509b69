// System power-off
//
// The command comes from config (default `sudo shutdown -h now`).
// DryRunShutdown stands in on desktops and in tests.

use std::cell::Cell;
use std::process::Command;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("shutdown command is empty")]
    EmptyCommand,
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

pub trait ShutdownInvoker {
    fn power_off(&mut self) -> Result<(), ShutdownError>;
}

pub struct SystemShutdown {
    argv: Vec<String>,
}

impl SystemShutdown {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl ShutdownInvoker for SystemShutdown {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        let (program, args) = self.argv.split_first().ok_or(ShutdownError::EmptyCommand)?;
        log::warn!("shutdown: running {}", self.argv.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| ShutdownError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ShutdownError::Failed {
                program: program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Logs instead of powering off; counts invocations.
#[derive(Clone, Default)]
pub struct DryRunShutdown {
    calls: Rc<Cell<u32>>,
}

impl DryRunShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl ShutdownInvoker for DryRunShutdown {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        log::warn!("shutdown: dry run, not powering off");
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        let mut s = SystemShutdown::new(Vec::new());
        assert!(matches!(s.power_off(), Err(ShutdownError::EmptyCommand)));
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_is_checked() {
        assert!(SystemShutdown::new(vec!["true".into()]).power_off().is_ok());
        assert!(matches!(
            SystemShutdown::new(vec!["false".into()]).power_off(),
            Err(ShutdownError::Failed { .. })
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let mut s = SystemShutdown::new(vec!["/nonexistent/pocket-cam-halt".into()]);
        assert!(matches!(s.power_off(), Err(ShutdownError::Spawn { .. })));
    }

    #[test]
    fn dry_run_counts() {
        let d = DryRunShutdown::new();
        let mut h = d.clone();
        h.power_off().unwrap();
        assert_eq!(d.calls(), 1);
    }
}
