use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ChatResult;
use crate::models::event::{ToolCallStatus, ToolStatus};
use crate::surface::Surface;

/// Output marker shown on a step whose tool failed
pub const FAILED_OUTPUT: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStepState {
    Started,
    Running,
    Finished,
    Failed,
}

impl ToolStepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolStepState::Finished | ToolStepState::Failed)
    }
}

/// Progress indicator for one tool invocation within a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStep {
    pub identifier: String,
    pub name: String,
    pub state: ToolStepState,
    pub progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ToolStep {
    fn new(identifier: &str, name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            state: ToolStepState::Started,
            progress: String::new(),
            output: None,
        }
    }
}

/// Keeps one step per tool invocation identifier for a single response.
#[derive(Debug, Default)]
pub struct ToolStepTracker {
    steps: HashMap<String, ToolStep>,
    order: Vec<String>,
}

impl ToolStepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status event, updating the display for every transition.
    ///
    /// An unseen identifier is always created and sent as started first, then
    /// the declared status is applied in the same call. Events for a finished
    /// or failed step are ignored.
    pub async fn apply(&mut self, status: &ToolStatus, surface: &dyn Surface) -> ChatResult<()> {
        tracing::debug!(
            identifier = %status.identifier,
            tool = %status.tool,
            status = ?status.status,
            "received tool status"
        );

        if !self.steps.contains_key(&status.identifier) {
            let step = ToolStep::new(&status.identifier, &status.tool);
            surface.send_step(&step).await?;
            self.order.push(status.identifier.clone());
            self.steps.insert(status.identifier.clone(), step);
            if status.status == ToolCallStatus::Started {
                return Ok(());
            }
        }

        let Some(step) = self.steps.get_mut(&status.identifier) else {
            return Ok(());
        };

        if step.state.is_terminal() {
            tracing::debug!(
                identifier = %status.identifier,
                "ignoring status for a completed tool step"
            );
            return Ok(());
        }

        match status.status {
            ToolCallStatus::Started => {}
            ToolCallStatus::Running => {
                step.state = ToolStepState::Running;
                if let Some(content) = status.content.as_deref().filter(|c| !c.is_empty()) {
                    step.progress.push_str(content);
                    surface.stream_step_token(step, content).await?;
                }
            }
            ToolCallStatus::Finished => {
                step.state = ToolStepState::Finished;
                surface.update_step(step).await?;
            }
            ToolCallStatus::Failed => {
                step.state = ToolStepState::Failed;
                step.output = Some(FAILED_OUTPUT.to_string());
                surface.update_step(step).await?;
            }
        }
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Option<&ToolStep> {
        self.steps.get(identifier)
    }

    /// Steps in creation order
    pub fn steps(&self) -> Vec<&ToolStep> {
        self.order
            .iter()
            .filter_map(|identifier| self.steps.get(identifier))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
