//! Gate engine: loads facts once, runs a gate's triggers, stores the result.

use std::sync::Arc;

use imgscan_core::config::GateConfig;
use imgscan_core::errors::GateError;
use imgscan_core::events::GateEvaluatedEvent;
use imgscan_core::traits::ImageStore;
use imgscan_core::types::{FactMap, GateResult, ImageId};
use imgscan_core::EventDispatcher;

use super::registry::GateRegistry;
use super::trigger::Gate;
use super::types::{FactView, TriggerParams};

pub struct GateEngine {
    store: Arc<dyn ImageStore>,
    registry: GateRegistry,
    config: GateConfig,
    events: EventDispatcher,
}

impl GateEngine {
    pub fn new(store: Arc<dyn ImageStore>, registry: GateRegistry, config: GateConfig) -> Self {
        Self {
            store,
            registry,
            config,
            events: EventDispatcher::new(),
        }
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    fn gate(&self, name: &str) -> Result<&Arc<Gate>, GateError> {
        self.registry.get(name).ok_or_else(|| GateError::GateNotFound {
            name: name.to_string(),
        })
    }

    fn load_facts(&self, id: &ImageId) -> Result<FactMap, GateError> {
        let facts = self.store.load_facts(id)?;
        if facts.is_empty() {
            return Err(GateError::ImageNotAnalyzed {
                image_id: id.to_string(),
            });
        }
        Ok(facts)
    }

    /// Evaluate one gate and overwrite its stored result.
    ///
    /// `params` uses the `KEY=value KEY2=v1,v2` form.
    pub fn evaluate(&self, id: &ImageId, gate_name: &str, params: &str) -> Result<GateResult, GateError> {
        let gate = self.gate(gate_name)?;
        let params = TriggerParams::parse(gate_name, params)?;
        gate.validate_params(&params)?;
        let facts = self.load_facts(id)?;
        let result = self.evaluate_view(gate, &FactView::new(id, &facts), &params)?;
        self.record(id, &result)?;
        Ok(result)
    }

    /// Evaluation against an already loaded view. Nothing is stored; only a
    /// script-backed gate can fail here.
    pub fn evaluate_view(
        &self,
        gate: &Gate,
        facts: &FactView<'_>,
        params: &TriggerParams,
    ) -> Result<GateResult, GateError> {
        Ok(GateResult {
            gate: gate.name().to_string(),
            findings: gate.evaluate(facts, params)?,
            evaluated_at: crate::now_secs(),
        })
    }

    /// Evaluate every enabled gate with its configured parameters.
    ///
    /// Facts are loaded once. A gate with bad parameters or a failing script
    /// reports its error without stopping the others.
    pub fn evaluate_all(
        &self,
        id: &ImageId,
    ) -> Result<Vec<(String, Result<GateResult, GateError>)>, GateError> {
        let facts = self.load_facts(id)?;
        let view = FactView::new(id, &facts);
        let mut results = Vec::new();
        for name in self.registry.names().filter(|n| self.config.is_gate_enabled(n)) {
            let outcome = self.gate(name).and_then(|gate| {
                let params = TriggerParams::parse(name, self.config.gate_params(name))?;
                gate.validate_params(&params)?;
                let result = self.evaluate_view(gate, &view, &params)?;
                self.record(id, &result)?;
                Ok(result)
            });
            if let Err(err) = &outcome {
                tracing::warn!(image_id = %id, gate = name, error = %err, "gate evaluation failed");
            }
            results.push((name.to_string(), outcome));
        }
        Ok(results)
    }

    fn record(&self, id: &ImageId, result: &GateResult) -> Result<(), GateError> {
        self.store.save_gate_result(id, result)?;
        tracing::info!(
            image_id = %id,
            gate = %result.gate,
            findings = result.findings.len(),
            "gate evaluated"
        );
        self.events.emit_gate_evaluated(&GateEvaluatedEvent {
            image_id: id.clone(),
            gate: result.gate.clone(),
            findings: result.findings.len(),
        });
        Ok(())
    }
}
