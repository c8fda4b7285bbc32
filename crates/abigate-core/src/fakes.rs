//! Scripted fake for the [`Invoker`] trait (testing only).
//!
//! `ScriptedInvoker` records every invocation it receives and answers
//! them from a small rule table, so the full compatibility matrix can
//! be driven without git, make, or a compiler on the machine.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::invoke::{Invocation, InvocationOutput, Invoker};

/// How a rule answers a matching invocation.
#[derive(Debug, Clone)]
pub enum Response {
    /// Exit with the given code, producing the given stdout.
    Exit(i32, String),
    /// Fail to spawn (simulates a missing executable).
    SpawnFailure,
}

#[derive(Debug)]
struct Rule {
    program: String,
    /// Substring that must appear in the joined argument list;
    /// empty matches any invocation of the program.
    arg_contains: String,
    /// Substring that must appear in the working directory path;
    /// empty matches any directory.
    cwd_contains: String,
    response: Response,
}

/// Rule-driven [`Invoker`] fake that records every call.
///
/// Rules are consulted in insertion order; the first match wins.
/// Unmatched invocations succeed with empty output, so tests only
/// script the interesting collaborators.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for invocations of `program` whose argument
    /// list contains `arg_contains`.
    pub fn on(&self, program: &str, arg_contains: &str, response: Response) {
        self.on_in(program, arg_contains, "", response);
    }

    /// Like [`on`](Self::on), additionally requiring the working
    /// directory path to contain `cwd_contains`.
    pub fn on_in(&self, program: &str, arg_contains: &str, cwd_contains: &str, response: Response) {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            arg_contains: arg_contains.to_string(),
            cwd_contains: cwd_contains.to_string(),
            response,
        });
    }

    /// Every invocation received so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations of a given program, in order.
    pub fn calls_of(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let joined = invocation.args.join(" ");
        let cwd = invocation.cwd.to_string_lossy();
        let rules = self.rules.lock().unwrap();
        let matched = rules.iter().find(|r| {
            r.program == invocation.program
                && joined.contains(&r.arg_contains)
                && cwd.contains(&r.cwd_contains)
        });

        let response = match matched {
            Some(rule) => rule.response.clone(),
            None => Response::Exit(0, String::new()),
        };

        match response {
            Response::Exit(code, stdout) => Ok(InvocationOutput {
                exit_code: code,
                stdout,
                stderr: String::new(),
                duration_ms: 0,
            }),
            Response::SpawnFailure => Err(HarnessError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
        }
    }
}
