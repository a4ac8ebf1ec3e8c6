//! `Trigger` and `Gate`.

use imgscan_core::errors::GateError;
use imgscan_core::types::Finding;

use super::script::ScriptGate;
use super::types::{FactView, ParamSpec, TriggerParams};

/// One named condition inside a gate.
pub trait Trigger: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn params(&self) -> &[ParamSpec] {
        &[]
    }

    /// Fact categories the trigger reads. When any is absent the trigger
    /// does not fire.
    fn requires(&self) -> &[&'static str];

    /// Finding details, one per hit. Empty when not triggered.
    fn check(&self, facts: &FactView<'_>, params: &TriggerParams) -> Vec<String>;
}

/// Named, ordered bundle of triggers. A gate backed by a script gets its
/// findings from the script; its triggers only declare names and parameters.
pub struct Gate {
    name: String,
    description: String,
    triggers: Vec<Box<dyn Trigger>>,
    script: Option<ScriptGate>,
}

impl Gate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            triggers: Vec::new(),
            script: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Trigger + 'static) -> Self {
        self.triggers.push(Box::new(trigger));
        self
    }

    pub fn with_script(mut self, script: ScriptGate) -> Self {
        self.script = Some(script);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn triggers(&self) -> impl Iterator<Item = &dyn Trigger> {
        self.triggers.iter().map(|t| t.as_ref())
    }

    pub fn script(&self) -> Option<&ScriptGate> {
        self.script.as_ref()
    }

    /// Rejects parameters no trigger declares. A missing required parameter
    /// only disables the trigger that needs it, unless no trigger is left to
    /// run.
    pub fn validate_params(&self, params: &TriggerParams) -> Result<(), GateError> {
        for key in params.keys() {
            let known = self
                .triggers
                .iter()
                .any(|t| t.params().iter().any(|s| s.name.eq_ignore_ascii_case(key)));
            if !known {
                return Err(GateError::InvalidParameter {
                    gate: self.name.clone(),
                    trigger: String::new(),
                    message: format!("unknown parameter {key}"),
                });
            }
        }

        let mut first_blocked = None;
        for trigger in &self.triggers {
            match missing_param(trigger.as_ref(), params) {
                None => return Ok(()),
                Some(param) => {
                    first_blocked.get_or_insert((trigger.name(), param));
                }
            }
        }
        match first_blocked {
            Some((trigger, param)) => Err(GateError::InvalidParameter {
                gate: self.name.clone(),
                trigger: trigger.to_string(),
                message: format!("missing required parameter {param}"),
            }),
            None => Ok(()),
        }
    }

    fn should_run(&self, trigger: &dyn Trigger, facts: &FactView<'_>, params: &TriggerParams) -> bool {
        if let Some(missing) = trigger.requires().iter().find(|c| !facts.has(c)) {
            tracing::debug!(
                gate = %self.name,
                trigger = trigger.name(),
                category = *missing,
                "required category absent, trigger not evaluated"
            );
            return false;
        }
        if let Some(param) = missing_param(trigger, params) {
            tracing::debug!(
                gate = %self.name,
                trigger = trigger.name(),
                param,
                "required parameter absent, trigger not evaluated"
            );
            return false;
        }
        true
    }

    /// Run triggers in declaration order. Parameters must already be valid.
    pub fn evaluate(&self, facts: &FactView<'_>, params: &TriggerParams) -> Result<Vec<Finding>, GateError> {
        let runnable: Vec<usize> = (0..self.triggers.len())
            .filter(|&i| self.should_run(self.triggers[i].as_ref(), facts, params))
            .collect();

        let Some(script) = &self.script else {
            return Ok(runnable
                .iter()
                .map(|&i| self.triggers[i].as_ref())
                .flat_map(|trigger| {
                    trigger
                        .check(facts, params)
                        .into_iter()
                        .map(move |detail| Finding::new(trigger.name(), detail))
                })
                .collect());
        };
        if runnable.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for (reported, detail) in script.run(facts, params)? {
            let Some(index) = self
                .triggers
                .iter()
                .position(|t| t.name().eq_ignore_ascii_case(&reported))
            else {
                return Err(GateError::ScriptFailed {
                    gate: self.name.clone(),
                    message: format!("reported undeclared trigger {reported}"),
                });
            };
            if !runnable.contains(&index) {
                tracing::debug!(gate = %self.name, trigger = %reported, "dropping finding of disabled trigger");
                continue;
            }
            hits.push((index, Finding::new(self.triggers[index].name(), detail)));
        }
        // Declaration order first, script output order within a trigger.
        hits.sort_by_key(|(index, _)| *index);
        Ok(hits.into_iter().map(|(_, finding)| finding).collect())
    }
}

/// First required parameter of `trigger` absent from `params`.
fn missing_param<'t>(trigger: &'t dyn Trigger, params: &TriggerParams) -> Option<&'t str> {
    trigger
        .params()
        .iter()
        .find(|s| s.required && params.get(&s.name).is_none())
        .map(|s| &*s.name)
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("triggers", &self.triggers.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("script", &self.script.as_ref().map(|s| s.path()))
            .finish()
    }
}
