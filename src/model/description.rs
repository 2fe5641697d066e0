//! Model description metadata stored inside a simulation artifact.
//!
//! The layout follows the FMI `modelDescription` shape: general model
//! information, a default experiment, and a flat list of scalar variables
//! addressed by value reference.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ModelError, ModelResult};

/// Number of output variables listed by [`ModelDescription::dump`].
const DUMP_OUTPUT_LIMIT: usize = 20;

/// Role of a variable in the model interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Causality {
    Parameter,
    CalculatedParameter,
    Input,
    Output,
    Local,
    Independent,
}

impl Causality {
    /// Lowercase name as written in model descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::CalculatedParameter => "calculatedParameter",
            Self::Input => "input",
            Self::Output => "output",
            Self::Local => "local",
            Self::Independent => "independent",
        }
    }
}

impl fmt::Display for Causality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scalar variable of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarVariable {
    /// Unique variable name (e.g. `"outputs[4]"`).
    pub name: String,
    /// Handle used by the runtime to address this variable.
    pub value_reference: u32,
    /// Role of the variable.
    pub causality: Causality,
    /// Start value, if the description provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Physical unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Suggested experiment settings shipped with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultExperiment {
    pub start_time: f64,
    pub stop_time: f64,
    pub step_size: f64,
}

impl Default for DefaultExperiment {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: 10.0,
            step_size: 1e-2,
        }
    }
}

/// Parsed model description of a simulation artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescription {
    #[serde(default = "default_fmi_version")]
    pub fmi_version: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub guid: String,
    /// Built-in model kind the runtime instantiates (e.g. `"first_order"`).
    pub kind: String,
    #[serde(default)]
    pub number_of_continuous_states: usize,
    #[serde(default)]
    pub number_of_event_indicators: usize,
    #[serde(default)]
    pub default_experiment: DefaultExperiment,
    #[serde(default)]
    pub variables: Vec<ScalarVariable>,
}

fn default_fmi_version() -> String {
    "2.0".to_string()
}

impl ModelDescription {
    /// Parses and validates a description from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Parse`] for malformed TOML and
    /// [`ModelError::Invalid`] when names or value references collide or
    /// the default experiment is unusable.
    pub fn from_toml_str(s: &str) -> ModelResult<Self> {
        let description: Self = toml::from_str(s).map_err(|e| ModelError::Parse(e.to_string()))?;
        description.validate()?;
        Ok(description)
    }

    fn validate(&self) -> ModelResult<()> {
        if self.model_name.trim().is_empty() {
            return Err(ModelError::Invalid("model_name must not be empty".into()));
        }

        let mut names = HashSet::new();
        let mut refs = HashSet::new();
        for v in &self.variables {
            if !names.insert(v.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate variable name \"{}\"",
                    v.name
                )));
            }
            if !refs.insert(v.value_reference) {
                return Err(ModelError::Invalid(format!(
                    "duplicate value reference {}",
                    v.value_reference
                )));
            }
        }

        let exp = &self.default_experiment;
        if !(exp.step_size.is_finite() && exp.step_size > 0.0) {
            return Err(ModelError::Invalid(
                "default_experiment.step_size must be > 0".into(),
            ));
        }
        if !(exp.stop_time.is_finite() && exp.stop_time > exp.start_time) {
            return Err(ModelError::Invalid(
                "default_experiment.stop_time must be > start_time".into(),
            ));
        }
        Ok(())
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&ScalarVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Looks up a variable by value reference.
    pub fn variable_by_ref(&self, vr: u32) -> Option<&ScalarVariable> {
        self.variables.iter().find(|v| v.value_reference == vr)
    }

    /// Resolves a variable name to its value reference.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownVariable`] when no variable has this name.
    pub fn value_reference(&self, name: &str) -> ModelResult<u32> {
        self.variable(name)
            .map(|v| v.value_reference)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }

    /// Start value of a named variable, if declared.
    pub fn start_of(&self, name: &str) -> Option<f64> {
        self.variable(name).and_then(|v| v.start)
    }

    /// Variables with the given causality, in declaration order.
    pub fn with_causality(&self, causality: Causality) -> impl Iterator<Item = &ScalarVariable> {
        self.variables
            .iter()
            .filter(move |v| v.causality == causality)
    }

    /// Names of every variable, in declaration order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Renders a plain-text report of the model: header, default
    /// experiment, and a table of the first output variables.
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }
}

/// [`ModelDescription::dump`] layout.
struct Dump<'a>(&'a ModelDescription);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let md = self.0;
        let exp = &md.default_experiment;

        writeln!(f, "Model Info")?;
        writeln!(f, "----------")?;
        writeln!(f, "FMI Version       {}", md.fmi_version)?;
        writeln!(f, "Model Name        {}", md.model_name)?;
        writeln!(
            f,
            "Description       {}",
            md.description.as_deref().unwrap_or("")
        )?;
        writeln!(f, "Continuous States {}", md.number_of_continuous_states)?;
        writeln!(f, "Event Indicators  {}", md.number_of_event_indicators)?;
        writeln!(f)?;
        writeln!(f, "Default Experiment")?;
        writeln!(f, "------------------")?;
        writeln!(f, "Start Time        {}", exp.start_time)?;
        writeln!(f, "Stop Time         {}", exp.stop_time)?;
        writeln!(f, "Step Size         {}", exp.step_size)?;
        writeln!(f)?;
        writeln!(f, "Variables (first {DUMP_OUTPUT_LIMIT} outputs)")?;
        writeln!(
            f,
            "Name                 Causality   Start Value    Unit   Description"
        )?;
        writeln!(
            f,
            "-------------------- ---------- -------------- ------ ---------------------------"
        )?;

        for v in md.with_causality(Causality::Output).take(DUMP_OUTPUT_LIMIT) {
            let start = v.start.map(|s| s.to_string()).unwrap_or_default();
            let unit = v.unit.as_deref().unwrap_or("");
            let desc = v.description.as_deref().unwrap_or("");
            writeln!(f, "{:20} output     {start:>14} {unit:6} {desc}", v.name)?;
        }
        Ok(())
    }
}
