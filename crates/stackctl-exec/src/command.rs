use std::collections::BTreeMap;
use std::fmt;

// ─── OutputMode ───────────────────────────────────────────────────────────

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Child inherits our stdout/stderr. Nothing is captured.
    #[default]
    Inherit,
    /// Lines are forwarded to our stdout/stderr as they arrive and also
    /// captured into the result.
    Tee,
    /// Captured only; nothing reaches the terminal.
    Capture,
}

#[derive(Debug, Clone)]
enum Arg {
    Plain(String),
    Secret(String),
}

impl Arg {
    fn value(&self) -> &str {
        match self {
            Arg::Plain(v) | Arg::Secret(v) => v,
        }
    }
}

// ─── ExternalCommand ──────────────────────────────────────────────────────

/// One invocation of an external binary within a batch.
///
/// Dependencies are indices into the batch the command is submitted with;
/// a command only starts once every dependency has succeeded and is
/// skipped otherwise.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    label: Option<String>,
    program: String,
    args: Vec<Arg>,
    env: BTreeMap<String, String>,
    stdin: Option<String>,
    output: OutputMode,
    depends_on: Vec<usize>,
    best_effort: bool,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            label: None,
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stdin: None,
            output: OutputMode::default(),
            depends_on: Vec::new(),
            best_effort: false,
        }
    }

    /// Short name used in reports (e.g. the stack name). Defaults to the
    /// rendered command line.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    /// An argument that is passed through to the child but rendered as
    /// `***` in logs and reports.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Secret(arg.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Text written to the child's stdin, which is then closed.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    /// Declare a hard dependency on the command at `index` in the same batch.
    pub fn after(mut self, index: usize) -> Self {
        if !self.depends_on.contains(&index) {
            self.depends_on.push(index);
        }
        self
    }

    /// Failure is reported but does not fail the batch.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    pub fn name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.to_string())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Real argument values, secrets included. Only for handing to the OS.
    pub(crate) fn raw_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(Arg::value)
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn stdin_input(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output
    }

    pub fn dependencies(&self) -> &[usize] {
        &self.depends_on
    }

    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(v) => write!(f, " {v}")?,
                Arg::Secret(_) => f.write_str(" ***")?,
            }
        }
        Ok(())
    }
}

/// Make every command depend on the one before it, so a failure stops the
/// rest of the chain.
pub fn chain(commands: Vec<ExternalCommand>) -> Vec<ExternalCommand> {
    commands
        .into_iter()
        .enumerate()
        .map(|(i, cmd)| if i == 0 { cmd } else { cmd.after(i - 1) })
        .collect()
}
