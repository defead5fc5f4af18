//! Argument vectors for the chart tool
//!
//! Every builder applies the same fixed rule order so a step always renders
//! to the same command line:
//!
//! 1. verb and positionals
//! 2. `--namespace`
//! 3. `--version`
//! 4. boolean flags, in [`BoolFlags`] order
//! 5. `--values`, in declared order
//! 6. `--atomic` and `--create-namespace` unless explicitly disabled
//! 7. `--repo --username --password` when all three are present
//! 8. `--timeout`
//! 9. `--set`, sorted by key

use std::collections::BTreeMap;

use crate::step::{ExecuteArguments, InstallArguments, UninstallArguments, UpgradeArguments};

/// Boolean flags a step may turn on
#[derive(Debug, Clone, Copy, Default)]
struct BoolFlags {
    replace: bool,
    wait: bool,
    devel: bool,
    reset_values: bool,
    reuse_values: bool,
    no_hooks: bool,
    skip_crds: bool,
    debug: bool,
}

impl BoolFlags {
    fn enabled(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.replace, "--replace"),
            (self.wait, "--wait"),
            (self.devel, "--devel"),
            (self.reset_values, "--reset-values"),
            (self.reuse_values, "--reuse-values"),
            (self.no_hooks, "--no-hooks"),
            (self.skip_crds, "--skip-crds"),
            (self.debug, "--debug"),
        ]
        .into_iter()
        .filter_map(|(on, flag)| on.then_some(flag))
    }
}

#[derive(Default)]
struct ArgsBuilder {
    args: Vec<String>,
}

impl ArgsBuilder {
    fn push(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn option(&mut self, flag: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.push(flag).push(value);
        }
        self
    }

    fn bools(&mut self, flags: BoolFlags) -> &mut Self {
        for flag in flags.enabled() {
            self.push(flag);
        }
        self
    }

    fn values(&mut self, files: &[String]) -> &mut Self {
        for file in files {
            self.push("--values").push(file);
        }
        self
    }

    fn tri_state(&mut self, flag: &str, value: Option<bool>) -> &mut Self {
        if value.unwrap_or(true) {
            self.push(flag);
        }
        self
    }

    fn repo_credentials(&mut self, repo: &str, username: &str, password: &str) -> &mut Self {
        if !repo.is_empty() && !username.is_empty() && !password.is_empty() {
            self.push("--repo")
                .push(repo)
                .push("--username")
                .push(username)
                .push("--password")
                .push(password);
        }
        self
    }

    fn set_values(&mut self, set: &BTreeMap<String, String>) -> &mut Self {
        for (key, value) in set {
            self.push("--set")
                .push(format!("{}={}", escape_set_key(key), value));
        }
        self
    }

    fn build(&mut self) -> Vec<String> {
        std::mem::take(&mut self.args)
    }
}

/// Arguments for an install step
///
/// `upsert` switches the verb to `upgrade --install`.
pub fn install_args(step: &InstallArguments) -> Vec<String> {
    let mut builder = ArgsBuilder::default();
    if step.upsert {
        builder.push("upgrade").push("--install");
    } else {
        builder.push("install");
    }

    builder
        .push(&step.name)
        .push(&step.chart)
        .option("--namespace", &step.namespace)
        .option("--version", &step.version)
        .bools(BoolFlags {
            replace: step.replace,
            wait: step.wait,
            devel: step.devel,
            no_hooks: step.no_hooks,
            skip_crds: step.skip_crds,
            debug: step.debug,
            ..Default::default()
        })
        .values(&step.values)
        .tri_state("--atomic", step.atomic)
        .tri_state("--create-namespace", step.create_namespace)
        .repo_credentials(&step.repo, &step.username, &step.password)
        .option("--timeout", &step.timeout)
        .set_values(&step.set)
        .build()
}

/// Arguments for an upgrade step, always `upgrade --install`
pub fn upgrade_args(step: &UpgradeArguments) -> Vec<String> {
    ArgsBuilder::default()
        .push("upgrade")
        .push("--install")
        .push(&step.name)
        .push(&step.chart)
        .option("--namespace", &step.namespace)
        .option("--version", &step.version)
        .bools(BoolFlags {
            wait: step.wait,
            reset_values: step.reset_values,
            reuse_values: step.reuse_values,
            no_hooks: step.no_hooks,
            skip_crds: step.skip_crds,
            debug: step.debug,
            ..Default::default()
        })
        .values(&step.values)
        .tri_state("--atomic", step.atomic)
        .tri_state("--create-namespace", step.create_namespace)
        .repo_credentials(&step.repo, &step.username, &step.password)
        .option("--timeout", &step.timeout)
        .set_values(&step.set)
        .build()
}

/// Arguments to uninstall one release of an uninstall step
pub fn uninstall_args(step: &UninstallArguments, release: &str) -> Vec<String> {
    ArgsBuilder::default()
        .push("uninstall")
        .push(release)
        .option("--namespace", &step.namespace)
        .bools(BoolFlags {
            wait: step.wait,
            no_hooks: step.no_hooks,
            debug: step.debug,
            ..Default::default()
        })
        .option("--timeout", &step.timeout)
        .build()
}

/// Arguments for a free-form step: positionals, then flags sorted by name.
///
/// One-letter flags render as `-o value`, longer ones as `--name value`. A
/// flag with several values repeats, a flag without one is bare.
pub fn execute_args(step: &ExecuteArguments) -> Vec<String> {
    let mut builder = ArgsBuilder::default();
    for arg in &step.arguments {
        builder.push(arg);
    }

    for (name, values) in step.flags.iter() {
        let flag = if name.chars().count() == 1 {
            format!("-{}", name)
        } else {
            format!("--{}", name)
        };

        if values.is_empty() {
            builder.push(flag);
            continue;
        }
        for value in values {
            builder.push(flag.clone()).push(value);
        }
    }
    builder.build()
}

/// Escape dots inside double-quoted segments of a `--set` key.
///
/// `prop."key1.key2"` becomes `prop."key1\.key2"`. Dots that are already
/// escaped stay as they are, and a key with an unbalanced quote is returned
/// unchanged.
pub fn escape_set_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    let mut quoted = false;
    let mut previous = None;

    for c in key.chars() {
        match c {
            '"' => quoted = !quoted,
            '.' if quoted && previous != Some('\\') => escaped.push('\\'),
            _ => {}
        }
        escaped.push(c);
        previous = Some(c);
    }

    if quoted {
        return key.to_string();
    }
    escaped
}
