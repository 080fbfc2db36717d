use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prunecheck::errors::{PrunecheckError, Result};
use prunecheck::exec::{CommandOutput, CommandSpec, ProcessRunner};

type Responder = Box<dyn Fn(&CommandSpec) -> io::Result<CommandOutput> + Send + Sync>;

/// A scripted process runner that:
/// - records every command it is asked to run
/// - answers with the first rule whose pattern occurs in the command line
/// - succeeds with empty output when no rule matches.
///
/// Rules may touch the filesystem (e.g. create the prune output dir) to
/// stand in for the real tool's side effects.
pub struct FakeRunner {
    rules: Vec<(String, Responder)>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep before answering each command, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
        self.respond_with(pattern, move |_| output.clone())
    }

    pub fn respond_with<F>(mut self, pattern: &str, f: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.rules
            .push((pattern.to_string(), Box::new(move |spec| Ok(f(spec)))));
        self
    }

    /// Matching commands fail as if the shell could not be started.
    pub fn spawn_error(mut self, pattern: &str) -> Self {
        self.rules.push((
            pattern.to_string(),
            Box::new(|_| Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))),
        ));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    fn answer(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let rule = self
            .rules
            .iter()
            .find(|(pattern, _)| spec.command.contains(pattern.as_str()));

        match rule {
            Some((_, respond)) => respond(spec).map_err(|source| PrunecheckError::Spawn {
                command: spec.command.clone(),
                source,
            }),
            None => Ok(CommandOutput::success("")),
        }
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(spec.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer(&spec)
        })
    }
}
