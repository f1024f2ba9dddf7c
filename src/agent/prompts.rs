//! Prompt assembly for the agent iteration loop.
//!
//! The loop speaks a small JSON protocol with the model: every response is a
//! single object carrying one of `finalAnswer`, `action`/`actionInput`,
//! `selfQuestion`, or `observation`. These templates teach the protocol,
//! frame the task, and provide the corrective and final-answer nudges.

use crate::agent::Agent;
use crate::task::TaskFeedback;
use crate::tools::ToolDefinition;

/// Prompt templates for the ReAct loop.
pub struct LoopPrompts;

impl LoopPrompts {
    /// System prompt: persona plus the response protocol and the tool list.
    pub fn system(agent: &Agent) -> String {
        let tool_section = Self::tool_section(
            &agent.tools.iter().map(|t| t.definition()).collect::<Vec<_>>(),
        );
        let background = if agent.background.is_empty() {
            String::new()
        } else {
            format!("\nBackground: {}\n", agent.background)
        };

        format!(
            r#"You are {name}.

Role: {role}
Goal: {goal}
{background}
{tools}
## Response format

Respond with a single JSON object, one of:
- {{"finalAnswer": <your complete answer>}} when the task is done.
- {{"thought": "<reasoning>", "action": "<tool name>", "actionInput": <JSON input>}} to use a tool.
- {{"selfQuestion": "<a question to yourself>"}} to reason further.
- {{"observation": "<what you learned>"}} to record an intermediate finding.

Do not include any text outside the JSON object."#,
            name = agent.name,
            role = agent.role,
            goal = agent.goal,
            background = background,
            tools = tool_section,
        )
    }

    fn tool_section(tools: &[ToolDefinition]) -> String {
        if tools.is_empty() {
            return "You have no tools. Work from your own knowledge and the provided context.\n".to_string();
        }
        let mut section = String::from("## Tools\n\n");
        for tool in tools {
            section.push_str(&format!(
                "- {}: {} (input schema: {})\n",
                tool.name, tool.description, tool.input_schema
            ));
        }
        section
    }

    /// First user turn: the task framing plus prior-task context.
    pub fn task(description: &str, expected_output: &str, context: &str) -> String {
        let context_section = if context.is_empty() {
            String::new()
        } else {
            format!("\n## Results from earlier tasks\n\n{context}")
        };
        format!(
            r#"## Your task

{description}

Expected output: {expected_output}
{context_section}"#,
        )
    }

    /// Preamble prepended when the task re-runs as a revision.
    pub fn feedback(feedback: &[&TaskFeedback], previous_result: Option<&serde_json::Value>) -> String {
        let mut section = String::from(
            "You previously worked on this task. A reviewer asked for a revision.\n\n## Feedback\n\n",
        );
        for entry in feedback {
            section.push_str(&format!("- {}\n", entry.content));
        }
        if let Some(result) = previous_result {
            section.push_str(&format!("\n## Your previous result\n\n{result}\n"));
        }
        section.push_str("\nRevise your work to address the feedback.\n");
        section
    }

    /// Nudge used on the last allowed iteration.
    pub fn force_final_answer() -> &'static str {
        "IMPORTANT: this is your final opportunity to respond. Reply now with \
         {\"finalAnswer\": ...} containing your best complete answer. Do not \
         request tools or ask further questions."
    }

    /// Nudge appended after an unparseable response.
    pub fn corrective() -> &'static str {
        "Your previous response could not be parsed. Reply with exactly one \
         JSON object using the documented keys (finalAnswer, or \
         thought/action/actionInput, or selfQuestion, or observation) and no \
         surrounding text."
    }
}
