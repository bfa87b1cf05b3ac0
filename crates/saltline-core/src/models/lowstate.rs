//! Lowstate command structures.
//!
//! A lowstate is a single JSON object describing one salt-api command:
//! which salt client runs it, the function name, its arguments and (for
//! minion-side clients) the target expression. Optional fields are left
//! out of the wire body entirely when unset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The salt client interface a command is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Local,
    LocalAsync,
    LocalBatch,
    Runner,
    Wheel,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Local => "local",
            ClientKind::LocalAsync => "local_async",
            ClientKind::LocalBatch => "local_batch",
            ClientKind::Runner => "runner",
            ClientKind::Wheel => "wheel",
        }
    }

    /// Minion-side clients need a target expression
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ClientKind::Local | ClientKind::LocalAsync | ClientKind::LocalBatch
        )
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ClientKind::Local),
            "local_async" => Ok(ClientKind::LocalAsync),
            "local_batch" => Ok(ClientKind::LocalBatch),
            "runner" => Ok(ClientKind::Runner),
            "wheel" => Ok(ClientKind::Wheel),
            other => Err(format!(
                "unknown client '{}' (expected local, local_async, local_batch, runner or wheel)",
                other
            )),
        }
    }
}

/// How the target expression is matched against minions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Glob,
    Pcre,
    List,
    Grain,
    GrainPcre,
    Nodegroup,
    Range,
    Compound,
    Pillar,
    PillarPcre,
    Ipcidr,
}

/// One salt-api command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowState {
    pub client: ClientKind,
    pub fun: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt_type: Option<TargetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwarg: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
}

impl LowState {
    pub fn new(client: ClientKind, fun: impl Into<String>) -> Self {
        Self {
            client,
            fun: fun.into(),
            tgt: None,
            tgt_type: None,
            arg: None,
            kwarg: None,
            timeout: None,
            ret: None,
            batch: None,
        }
    }

    /// Execution function run on the minions matched by `tgt`
    pub fn local(tgt: impl Into<String>, fun: impl Into<String>) -> Self {
        Self::new(ClientKind::Local, fun).target(tgt)
    }

    /// Runner function executed on the master
    pub fn runner(fun: impl Into<String>) -> Self {
        Self::new(ClientKind::Runner, fun)
    }

    /// Wheel function executed on the master
    pub fn wheel(fun: impl Into<String>) -> Self {
        Self::new(ClientKind::Wheel, fun)
    }

    pub fn target(mut self, tgt: impl Into<String>) -> Self {
        self.tgt = Some(tgt.into());
        self
    }

    pub fn target_type(mut self, tgt_type: TargetType) -> Self {
        self.tgt_type = Some(tgt_type);
        self
    }

    /// Append one positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.arg.get_or_insert_with(Vec::new).push(value.into());
        self
    }

    /// Replace the positional arguments
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.arg = Some(args);
        self
    }

    /// Set one keyword argument, keeping insertion order
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwarg
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace the keyword arguments
    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwarg = Some(kwargs);
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn returner(mut self, ret: impl Into<String>) -> Self {
        self.ret = Some(ret.into());
        self
    }

    pub fn batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = Some(batch.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_local_body() {
        let low = LowState::local("*", "test.ping");
        assert_eq!(
            serde_json::to_value(&low).unwrap(),
            json!({"client": "local", "fun": "test.ping", "tgt": "*"})
        );
    }

    #[test]
    fn test_args_and_kwargs_are_kept_verbatim() {
        let low = LowState::local("web*", "cmd.run")
            .arg("uptime")
            .arg(json!({"nested": [1, 2.5, null]}))
            .kwarg("zeta", "0")
            .kwarg("alpha", 1)
            .kwarg("mid", json!(false));

        let body = serde_json::to_value(&low).unwrap();
        assert_eq!(body["arg"], json!(["uptime", {"nested": [1, 2.5, null]}]));
        assert_eq!(body["kwarg"], json!({"zeta": "0", "alpha": 1, "mid": false}));

        // Insertion order survives serialization
        let text = serde_json::to_string(&low).unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn test_explicit_empty_args_are_sent() {
        let low = LowState::runner("manage.status").args(vec![]).kwargs(Map::new());
        let body = serde_json::to_value(&low).unwrap();
        assert_eq!(body["arg"], json!([]));
        assert_eq!(body["kwarg"], json!({}));
        assert!(body.get("tgt").is_none());
    }

    #[test]
    fn test_optional_fields_serialize_with_salt_names() {
        let low = LowState::new(ClientKind::LocalBatch, "state.apply")
            .target("G@os:Debian")
            .target_type(TargetType::Compound)
            .batch("25%")
            .timeout(30)
            .returner("redis");

        let body = serde_json::to_value(&low).unwrap();
        assert_eq!(body["client"], "local_batch");
        assert_eq!(body["tgt_type"], "compound");
        assert_eq!(body["batch"], "25%");
        assert_eq!(body["timeout"], 30);
        assert_eq!(body["ret"], "redis");
    }

    #[test]
    fn test_client_kind_parse() {
        assert_eq!("local_async".parse::<ClientKind>(), Ok(ClientKind::LocalAsync));
        assert_eq!("wheel".parse::<ClientKind>(), Ok(ClientKind::Wheel));
        assert!("ssh".parse::<ClientKind>().is_err());
        assert_eq!(ClientKind::LocalBatch.to_string(), "local_batch");
        assert!(ClientKind::Local.requires_target());
        assert!(!ClientKind::Runner.requires_target());
    }

    #[test]
    fn test_target_type_names() {
        assert_eq!(serde_json::to_value(TargetType::GrainPcre).unwrap(), "grain_pcre");
        assert_eq!(serde_json::to_value(TargetType::Ipcidr).unwrap(), "ipcidr");
    }
}
