//! TOML-based service configuration and built-in session profiles.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level service configuration parsed from TOML.
///
/// Every section has defaults, so an empty file is a valid configuration.
/// Load with [`ServiceConfig::from_toml_file`] or start from
/// [`ServiceConfig::default`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listener and limits.
    #[serde(default)]
    pub server: ServerConfig,
    /// Where artifacts are read from and extracted to.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    /// Stepped-session profiles.
    #[serde(default)]
    pub session: SessionConfig,
    /// Real-time runner settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Listener and limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Maximum number of live sessions (`0` = unlimited).
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_sessions: 64,
        }
    }
}

impl ServerConfig {
    /// Socket address built from `host` and `port`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError {
                field: "server.host".to_string(),
                message: format!("\"{}\" is not an IP address: {e}", self.host),
            })
    }
}

/// Artifact locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsConfig {
    /// Directory holding `<name>.model.toml` artifacts.
    pub dir: PathBuf,
    /// Parent directory for extraction dirs; system temp dir when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            work_dir: None,
        }
    }
}

/// Output limit that ends a session early.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    /// Output variable to watch.
    pub variable: String,
    /// The session is done once the variable exceeds this value.
    pub limit: f64,
}

/// One stepped-session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionProfile {
    /// Artifact name in the store.
    pub artifact: String,
    /// Input variable set before every step.
    pub input: String,
    /// Output variables read after every step.
    pub outputs: Vec<String>,
    /// Fixed communication step (s).
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    /// Session is done once time reaches this value (s).
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,
    /// Optional early-stop condition.
    #[serde(default)]
    pub threshold: Option<Threshold>,
}

fn default_step_size() -> f64 {
    1e-3
}

fn default_stop_time() -> f64 {
    2.0
}

impl SessionProfile {
    /// Pump under PID flow control, stepped by the caller's setpoint.
    pub fn pump_pid() -> Self {
        Self {
            artifact: "PumpWithPIDControl".to_string(),
            input: "flowSetpoint".to_string(),
            outputs: vec!["actualFlow".to_string(), "powerConsumption".to_string()],
            step_size: 1e-3,
            stop_time: 2.0,
            threshold: None,
        }
    }

    /// Driven oscillator; stops early when its energy output runs away.
    pub fn oscillator() -> Self {
        Self {
            artifact: "RealtimeOscillator".to_string(),
            input: "inputs".to_string(),
            outputs: vec!["outputs[1]".to_string(), "outputs[4]".to_string()],
            step_size: 1e-3,
            stop_time: 2.0,
            threshold: Some(Threshold {
                variable: "outputs[4]".to_string(),
                limit: 1.0e3,
            }),
        }
    }
}

/// Stepped-session profiles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Profile used when a start request names none.
    pub default_profile: String,
    /// Profiles by name.
    pub profiles: BTreeMap<String, SessionProfile>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("pump_pid".to_string(), SessionProfile::pump_pid());
        profiles.insert("oscillator".to_string(), SessionProfile::oscillator());
        Self {
            default_profile: "pump_pid".to_string(),
            profiles,
        }
    }
}

impl SessionConfig {
    /// Resolves a profile by name, falling back to the default profile.
    pub fn profile(&self, name: Option<&str>) -> Option<(&str, &SessionProfile)> {
        let name = name.unwrap_or(self.default_profile.as_str());
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Real-time runner settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Artifact driven by the runner.
    pub artifact: String,
    /// Input variable fed with the live parameter; none for autonomous models.
    pub input: Option<String>,
    /// Output variable recorded; first output of the model when unset.
    pub output: Option<String>,
    /// Simulated seconds per step.
    pub step_size: f64,
    /// Simulated time at which the run ends or wraps.
    pub stop_time: f64,
    /// Restart from zero with a cleared trace instead of stopping.
    pub loop_at_stop: bool,
    /// Simulated seconds per wall-clock second.
    pub speedup: f64,
    /// Maximum number of samples kept in the trace.
    pub history_limit: usize,
    /// Publish a snapshot every this many steps.
    pub publish_every: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            artifact: "RealtimeOscillator".to_string(),
            input: Some("inputs".to_string()),
            output: None,
            step_size: 1e-3,
            stop_time: 60.0,
            loop_at_stop: true,
            speedup: 1.0,
            history_limit: 60_000,
            publish_every: 10,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"session.profiles.pump_pid.step_size"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ServiceConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                field: "server.port".into(),
                message: "must be > 0".into(),
            });
        }
        if let Err(e) = self.server.socket_addr() {
            errors.push(e);
        }

        let s = &self.session;
        if !s.profiles.contains_key(&s.default_profile) {
            errors.push(ConfigError {
                field: "session.default_profile".into(),
                message: format!("no profile named \"{}\"", s.default_profile),
            });
        }
        for (name, p) in &s.profiles {
            let field = |f: &str| format!("session.profiles.{name}.{f}");
            if p.artifact.trim().is_empty() {
                errors.push(ConfigError {
                    field: field("artifact"),
                    message: "must not be empty".into(),
                });
            }
            if p.outputs.is_empty() {
                errors.push(ConfigError {
                    field: field("outputs"),
                    message: "must list at least one output".into(),
                });
            }
            if !(p.step_size.is_finite() && p.step_size > 0.0) {
                errors.push(ConfigError {
                    field: field("step_size"),
                    message: "must be > 0".into(),
                });
            }
            if !(p.stop_time.is_finite() && p.stop_time > 0.0) {
                errors.push(ConfigError {
                    field: field("stop_time"),
                    message: "must be > 0".into(),
                });
            }
            if let Some(t) = &p.threshold {
                if !p.outputs.contains(&t.variable) {
                    errors.push(ConfigError {
                        field: field("threshold.variable"),
                        message: format!("\"{}\" must be one of the outputs", t.variable),
                    });
                }
            }
        }

        let rt = &self.realtime;
        if !(rt.step_size.is_finite() && rt.step_size > 0.0) {
            errors.push(ConfigError {
                field: "realtime.step_size".into(),
                message: "must be > 0".into(),
            });
        }
        if !(rt.stop_time.is_finite() && rt.stop_time > rt.step_size) {
            errors.push(ConfigError {
                field: "realtime.stop_time".into(),
                message: "must be > realtime.step_size".into(),
            });
        }
        if !(rt.speedup.is_finite() && rt.speedup > 0.0) {
            errors.push(ConfigError {
                field: "realtime.speedup".into(),
                message: "must be > 0".into(),
            });
        }
        if rt.history_limit == 0 {
            errors.push(ConfigError {
                field: "realtime.history_limit".into(),
                message: "must be > 0".into(),
            });
        }
        if rt.publish_every == 0 {
            errors.push(ConfigError {
                field: "realtime.publish_every".into(),
                message: "must be > 0".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let cfg = ServiceConfig::default();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "default should be valid: {errors:?}");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = ServiceConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.session.default_profile, "pump_pid");
        assert!(cfg.session.profiles.contains_key("oscillator"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
max_sessions = 4

[artifacts]
dir = "/srv/models"
work_dir = "/var/tmp/cosim"

[session]
default_profile = "lag"

[session.profiles.lag]
artifact = "FirstOrder"
input = "u"
outputs = ["x"]
step_size = 0.01
stop_time = 8.0
threshold = { variable = "x", limit = 0.9 }

[realtime]
artifact = "FirstOrder"
input = "u"
output = "x"
step_size = 0.01
stop_time = 8.0
loop_at_stop = false
speedup = 10.0
"#;
        let cfg = ServiceConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        let cfg = cfg.as_ref();
        assert_eq!(cfg.map(|c| c.server.port), Some(8080));
        assert_eq!(
            cfg.and_then(|c| c.session.profile(None)).map(|(n, _)| n),
            Some("lag")
        );
        assert_eq!(
            cfg.and_then(|c| c.session.profile(Some("lag")))
                .and_then(|(_, p)| p.threshold.clone()),
            Some(Threshold {
                variable: "x".to_string(),
                limit: 0.9
            })
        );
        assert!(cfg.map(|c| c.validate().is_empty()).unwrap_or(false));
    }

    #[test]
    fn profile_defaults_apply() {
        let toml = r#"
[session.profiles.lag]
artifact = "FirstOrder"
input = "u"
outputs = ["x"]
"#;
        let cfg = ServiceConfig::from_toml_str(toml).expect("parses");
        let (_, p) = cfg.session.profile(Some("lag")).expect("profile present");
        assert_eq!(p.step_size, 1e-3);
        assert_eq!(p.stop_time, 2.0);
        assert!(p.threshold.is_none());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[server]
port = 80
bogus_field = true
"#;
        assert!(ServiceConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_missing_default_profile() {
        let mut cfg = ServiceConfig::default();
        cfg.session.default_profile = "nope".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "session.default_profile"));
    }

    #[test]
    fn validation_catches_bad_step_size() {
        let mut cfg = ServiceConfig::default();
        if let Some(p) = cfg.session.profiles.get_mut("pump_pid") {
            p.step_size = 0.0;
        }
        let errors = cfg.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "session.profiles.pump_pid.step_size")
        );
    }

    #[test]
    fn validation_catches_threshold_outside_outputs() {
        let mut cfg = ServiceConfig::default();
        if let Some(p) = cfg.session.profiles.get_mut("pump_pid") {
            p.threshold = Some(Threshold {
                variable: "flowSetpoint".to_string(),
                limit: 1.0,
            });
        }
        let errors = cfg.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "session.profiles.pump_pid.threshold.variable")
        );
    }

    #[test]
    fn validation_catches_bad_host_and_realtime() {
        let mut cfg = ServiceConfig::default();
        cfg.server.host = "not a host".to_string();
        cfg.realtime.speedup = 0.0;
        cfg.realtime.history_limit = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "server.host"));
        assert!(errors.iter().any(|e| e.field == "realtime.speedup"));
        assert!(errors.iter().any(|e| e.field == "realtime.history_limit"));
    }

    #[test]
    fn unknown_profile_resolves_to_none() {
        let cfg = ServiceConfig::default();
        assert!(cfg.session.profile(Some("missing")).is_none());
        assert_eq!(cfg.session.profile(None).map(|(n, _)| n), Some("pump_pid"));
    }
}
