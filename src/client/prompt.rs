use crate::config::Instructions;
use crate::pipeline::types::Unit;

use super::ClassificationRequest;

/// Builds the user message for a unit.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    instructions: Instructions,
    include_body: bool,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>, instructions: Instructions, include_body: bool) -> Self {
        Self {
            model: model.into(),
            instructions,
            include_body,
        }
    }

    /// Body block (optional), task instructions, then one enumerated line
    /// per sentence.
    pub fn user_content(&self, unit: &Unit) -> String {
        let mut lines: Vec<String> = Vec::new();

        if self.include_body {
            lines.push(format!("Unit ID: {}", unit.unit_id));
            lines.push("Body:".to_string());
            lines.push(unit.body.clone());
            lines.push(String::new());
        }

        lines.push(self.instructions.task_instructions.clone());
        lines.push(String::new());

        lines.push(format!("Unit ID: {}", unit.unit_id));
        for sentence in &unit.sentences {
            lines.push(format!("{}. \"{}\"", sentence.sentence_id, sentence.text));
        }
        lines.push(String::new());

        lines.join("\n")
    }

    pub fn request(&self, request_id: usize, unit: &Unit) -> ClassificationRequest {
        ClassificationRequest {
            request_id,
            unit_id: unit.unit_id.clone(),
            model: self.model.clone(),
            system: self.instructions.system_message.clone(),
            user: self.user_content(unit),
        }
    }
}
