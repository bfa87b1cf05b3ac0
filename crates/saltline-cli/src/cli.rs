//! Command-line arguments and their translation into a lowstate command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use serde_json::Value;

use saltline_core::api::DEFAULT_TIMEOUT_SECS;
use saltline_core::{ClientKind, Config, HttpOptions, LowState, TargetType};

/// Extra time the HTTP layer waits beyond the salt-side timeout, so salt's
/// own timeout answers first
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Run salt functions through a remote salt-api
///
/// Authentication credentials can also be supplied via the environment
/// variables SALTAPI_URL, SALTAPI_USER, SALTAPI_PASS and SALTAPI_EAUTH, or the
/// [main] section of ~/.saltlinerc.
#[derive(Parser, Debug)]
#[command(name = "saltline", version)]
pub struct Args {
    /// Configuration file location (default: $SALTLINE_CONFIG or ~/.saltlinerc)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity; may be given multiple times
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Seconds salt waits for minions before returning
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// salt-api client to use (local, local_async, local_batch, runner, wheel)
    #[arg(long, default_value = "local")]
    pub client: ClientKind,

    /// Raw lowstate JSON to post; positional arguments are ignored
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,

    #[command(flatten)]
    pub targeting: TargetArgs,

    /// Batch size for the local_batch client (count or percentage)
    #[arg(long)]
    pub batch: Option<String>,

    #[command(flatten)]
    pub auth: AuthArgs,

    /// [TARGET] FUNCTION [ARGS...]; args of the form key=value are keyword
    /// arguments, values are parsed as JSON when possible
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Targeting options: how TARGET is matched
#[derive(clap::Args, Debug, Default)]
#[group(multiple = false)]
pub struct TargetArgs {
    /// Match targets with a PCRE regular expression
    #[arg(short = 'E', long)]
    pub pcre: bool,

    /// Target a comma or space delimited list of minions
    #[arg(short = 'L', long)]
    pub list: bool,

    /// Match a grain glob, e.g. "os:Arch*"
    #[arg(short = 'G', long)]
    pub grain: bool,

    /// Match a grain PCRE, e.g. "os:Arch.*"
    #[arg(short = 'P', long)]
    pub grain_pcre: bool,

    /// Target a predefined nodegroup
    #[arg(short = 'N', long)]
    pub nodegroup: bool,

    /// Target a range expression, e.g. %cluster
    #[arg(short = 'R', long)]
    pub range: bool,

    /// Compound target, e.g. 'G@os:RedHat and webser* or E@database.*'
    #[arg(short = 'C', long)]
    pub compound: bool,

    /// Match a pillar glob, e.g. "role:production*"
    #[arg(short = 'I', long)]
    pub pillar: bool,

    /// Match a pillar PCRE, e.g. "role:prod.*"
    #[arg(short = 'J', long)]
    pub pillar_pcre: bool,

    /// Match a subnet (CIDR notation) or IP address
    #[arg(short = 'S', long)]
    pub ipcidr: bool,
}

impl TargetArgs {
    /// Selected target type, `None` for the server's default glob matching
    pub fn target_type(&self) -> Option<TargetType> {
        [
            (self.pcre, TargetType::Pcre),
            (self.list, TargetType::List),
            (self.grain, TargetType::Grain),
            (self.grain_pcre, TargetType::GrainPcre),
            (self.nodegroup, TargetType::Nodegroup),
            (self.range, TargetType::Range),
            (self.compound, TargetType::Compound),
            (self.pillar, TargetType::Pillar),
            (self.pillar_pcre, TargetType::PillarPcre),
            (self.ipcidr, TargetType::Ipcidr),
        ]
        .into_iter()
        .find_map(|(set, kind)| set.then_some(kind))
    }
}

/// Authentication options
#[derive(clap::Args, Debug, Default)]
pub struct AuthArgs {
    /// salt-api URL (default https://localhost:8000/)
    #[arg(short = 'u', long = "saltapi-url", value_name = "URL")]
    pub url: Option<String>,

    /// External auth backend to authenticate against
    #[arg(short = 'a', long, visible_aliases = ["auth", "extended-auth"])]
    pub eauth: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Fail instead of prompting for missing credentials
    #[arg(long)]
    pub non_interactive: bool,

    /// Do not verify the server's TLS certificate
    #[arg(short = 'k', long)]
    pub ignore_ssl_errors: bool,
}

impl Args {
    /// Settings given on the command line, highest priority layer
    pub fn config_overrides(&self) -> Config {
        Config {
            url: self.auth.url.clone(),
            user: self.auth.username.clone(),
            password: self.auth.password.clone(),
            eauth: self.auth.eauth.clone(),
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        let secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS) + HTTP_TIMEOUT_MARGIN_SECS;
        HttpOptions {
            timeout: Duration::from_secs(secs),
            accept_invalid_certs: self.auth.ignore_ssl_errors,
        }
    }

    /// Build the lowstate for the positional command
    pub fn lowstate(&self) -> Result<LowState> {
        let mut words = self.command.iter();

        let tgt = if self.client.requires_target() {
            match words.next() {
                Some(tgt) => Some(tgt.clone()),
                None => bail!("the {} client requires a TARGET and a FUNCTION", self.client),
            }
        } else {
            None
        };
        let Some(fun) = words.next() else {
            bail!("missing FUNCTION to run");
        };

        let mut low = LowState::new(self.client, fun.clone());
        low.tgt = tgt;
        if low.tgt.is_some() {
            low.tgt_type = self.targeting.target_type();
            low.timeout = self.timeout;
        }
        low.batch = self.batch.clone();

        for word in words {
            low = match split_kwarg(word) {
                Some((name, value)) => low.kwarg(name, parse_value(value)),
                None => low.arg(parse_value(word)),
            };
        }
        Ok(low)
    }
}

/// Interpret a command-line value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Split `name=value` when `name` is an identifier; anything else is positional
pub fn split_kwarg(raw: &str) -> Option<(&str, &str)> {
    let (name, value) = raw.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    let is_ident = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_ident.then_some((name, value))
}
