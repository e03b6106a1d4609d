use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

const APP_DIR: &str = "plan-console";
const LOG_FILE: &str = "plan-console.log";

/// Interactive terminal for streaming planning sessions.
#[derive(Debug, Parser)]
#[command(name = "plan-console", version, about)]
pub struct Args {
    /// Subprocess provider as NAME=COMMAND (repeatable). COMMAND runs under
    /// `sh -c` and speaks newline-delimited JSON.
    #[arg(long = "provider", value_name = "NAME=COMMAND")]
    pub providers: Vec<ProviderSpec>,

    /// Use the built-in scripted provider.
    #[arg(long)]
    pub demo: bool,

    /// Directory the session file is written to on exit.
    #[arg(long, env = "PLAN_CONSOLE_SESSION_DIR", value_name = "PATH")]
    pub session_dir: Option<PathBuf>,

    #[arg(long, env = "PLAN_CONSOLE_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Milliseconds between SIGTERM and SIGKILL when cancelling a provider.
    #[arg(long, env = "PLAN_CONSOLE_GRACE_MS", default_value_t = 2000)]
    pub grace_ms: u64,

    /// Session label; defaults to the first message.
    #[arg(long, env = "PLAN_CONSOLE_LABEL")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub command: String,
}

impl FromStr for ProviderSpec {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let (name, command) = value
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=COMMAND, got {value:?}"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("provider name is empty in {value:?}"));
        }
        Ok(Self {
            name: name.to_string(),
            command: command.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub providers: Vec<ProviderSpec>,
    pub demo: bool,
    pub session_dir: PathBuf,
    pub log_file: PathBuf,
    pub grace: Duration,
    pub label: Option<String>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let data_dir = || -> Result<PathBuf> {
            let base = dirs::data_dir()
                .context("no data directory for this platform; pass --session-dir and --log-file")?;
            Ok(base.join(APP_DIR))
        };
        let session_dir = match args.session_dir {
            Some(dir) => dir,
            None => data_dir()?,
        };
        let log_file = match args.log_file {
            Some(path) => path,
            None => data_dir()?.join(LOG_FILE),
        };
        let label = args
            .label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());

        Ok(Self {
            providers: args.providers,
            demo: args.demo,
            session_dir,
            log_file,
            grace: Duration::from_millis(args.grace_ms),
            label,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.providers {
            if spec.command.is_empty() {
                bail!("provider `{}` has an empty command", spec.name);
            }
            if !seen.insert(spec.name.as_str()) {
                bail!("provider `{}` is configured more than once", spec.name);
            }
        }
        if self.providers.is_empty() && !self.demo {
            bail!("no provider configured; pass --provider NAME=COMMAND or --demo");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("plan-console").chain(argv.iter().copied()))
            .unwrap()
    }

    fn config(argv: &[&str]) -> Config {
        let mut full = vec!["--session-dir", "/tmp/s", "--log-file", "/tmp/l.log"];
        full.extend_from_slice(argv);
        Config::from_args(parse(&full)).unwrap()
    }

    #[test]
    fn provider_spec_parsing() {
        let spec: ProviderSpec = "local = ./bin/agent --json".parse().unwrap();
        assert_eq!(spec.name, "local");
        assert_eq!(spec.command, "./bin/agent --json");
        // Only the first '=' separates name from command.
        let spec: ProviderSpec = "env=FOO=1 agent".parse().unwrap();
        assert_eq!(spec.command, "FOO=1 agent");
        assert!("no-separator".parse::<ProviderSpec>().is_err());
        assert!("=cmd".parse::<ProviderSpec>().is_err());
    }

    #[test]
    fn repeatable_provider_flag() {
        let config = config(&["--provider", "a=run-a", "--provider", "b=run-b"]);
        assert_eq!(config.providers.len(), 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.grace, Duration::from_millis(2000));
    }

    #[test]
    fn validate_rejects_bad_provider_sets() {
        let err = config(&["--provider", "a="]).validate().unwrap_err();
        assert!(err.to_string().contains("empty command"));

        let err = config(&["--provider", "a=x", "--provider", "a=y"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));

        assert!(config(&[]).validate().is_err());
        assert!(config(&["--demo"]).validate().is_ok());
    }

    #[test]
    fn blank_label_is_ignored() {
        assert_eq!(config(&["--demo", "--label", "  "]).label, None);
        assert_eq!(
            config(&["--demo", "--label", " roadmap "]).label.as_deref(),
            Some("roadmap")
        );
    }

    #[test]
    fn grace_is_configurable() {
        assert_eq!(
            config(&["--demo", "--grace-ms", "150"]).grace,
            Duration::from_millis(150)
        );
    }
}
