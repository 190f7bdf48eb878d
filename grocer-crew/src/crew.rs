//! Crew - runs tasks in order, passing outputs along as context

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use grocer_error::{Error, ErrorKind, Result};
use grocer_llm::{ChatMessage, LlmProvider, UsageTracker};

use crate::agent::AgentSettings;
use crate::human::HumanInput;
use crate::output::write_json;
use crate::task::{Task, TaskOutput};

#[derive(Debug, Clone)]
pub struct CrewSettings {
    pub agent: AgentSettings,
    /// Re-prompts allowed per task when the answer is not usable JSON
    pub max_output_repairs: usize,
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self {
            agent: AgentSettings::default(),
            max_output_repairs: 1,
        }
    }
}

/// Everything a kickoff produced
#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
    pub usage: UsageTracker,
}

impl CrewOutput {
    pub fn get(&self, task: &str) -> Option<&TaskOutput> {
        self.tasks.iter().find(|t| t.task == task)
    }

    /// Output of `task`, or an error if it never ran
    pub fn require(&self, task: &str) -> Result<&TaskOutput> {
        self.get(task).ok_or_else(|| {
            Error::unexpected(format!("task '{}' produced no output", task))
                .with_operation("crew::require")
        })
    }
}

/// A sequential crew of tasks
#[derive(Debug, Clone, Default)]
pub struct Crew {
    tasks: Vec<Task>,
    settings: CrewSettings,
}

impl Crew {
    pub fn new(settings: CrewSettings) -> Self {
        Self {
            tasks: Vec::new(),
            settings,
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task names are unique and context only points backwards.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::invalid_argument("crew has no tasks").with_operation("crew::validate"));
        }

        let mut earlier = HashSet::new();
        for task in &self.tasks {
            for dep in &task.context {
                if !earlier.contains(dep.as_str()) {
                    return Err(Error::invalid_argument(format!(
                        "task '{}' takes context from '{}', which does not run before it",
                        task.name, dep
                    ))
                    .with_operation("crew::validate"));
                }
            }
            if !earlier.insert(task.name.as_str()) {
                return Err(Error::invalid_argument(format!("duplicate task name '{}'", task.name))
                    .with_operation("crew::validate"));
            }
        }
        Ok(())
    }

    /// Run every task in order. The first failure stops the crew.
    #[instrument(skip_all, fields(tasks = self.tasks.len()))]
    pub async fn kickoff<P: LlmProvider>(&self, provider: &P, human: &dyn HumanInput) -> Result<CrewOutput> {
        self.validate()?;

        let mut usage = UsageTracker::new();
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.iter().enumerate() {
            info!(step = index + 1, task = %task.name, agent = %task.agent.role, "starting task");
            let output = self
                .run_task(provider, task, &outputs, human, &mut usage)
                .await
                .map_err(|e| e.with_context("task", task.name.clone()))?;
            outputs.push(output);
        }

        info!(
            calls = usage.total_calls,
            tokens = usage.total_tokens(),
            "crew finished"
        );
        Ok(CrewOutput {
            tasks: outputs,
            usage,
        })
    }

    async fn run_task<P: LlmProvider>(
        &self,
        provider: &P,
        task: &Task,
        done: &[TaskOutput],
        human: &dyn HumanInput,
        usage: &mut UsageTracker,
    ) -> Result<TaskOutput> {
        let human_answer = match &task.human_input {
            Some(question) => Some(human.ask(question)?),
            None => None,
        };

        let context: Vec<&TaskOutput> = task
            .context
            .iter()
            .filter_map(|name| done.iter().find(|o| &o.task == name))
            .collect();

        let mut messages = vec![ChatMessage::user(task_prompt(task, &context, human_answer.as_deref()))];
        let mut repairs = 0;

        loop {
            let run = task
                .agent
                .execute(provider, &self.settings.agent, messages, usage)
                .await?;

            match task.accept(&run.answer) {
                Ok(json) => {
                    if let Some(path) = &task.output_file {
                        write_json(path, &json)?;
                    }
                    info!(task = %task.name, repairs, "task complete");
                    return Ok(TaskOutput {
                        task: task.name.clone(),
                        agent: task.agent.role.clone(),
                        raw: run.answer,
                        json,
                        human_input: human_answer,
                        output_file: task.output_file.clone(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::ParseFailed && repairs < self.settings.max_output_repairs => {
                    repairs += 1;
                    warn!(task = %task.name, error = %e, repairs, "answer unusable, asking again");
                    // The agent prepends its own system prompt.
                    messages = run.transcript.into_iter().skip(1).collect();
                    messages.push(ChatMessage::user(repair_prompt(task, &e)));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// The user message that opens a task.
pub fn task_prompt(task: &Task, context: &[&TaskOutput], human_answer: Option<&str>) -> String {
    let mut prompt = format!(
        "{}\n\nThis is the expected criteria for your final answer: a JSON object shaped like this example.\n```json\n{}\n```\n\
         Use exactly these field names. Reply with the complete JSON object only, not a summary of it.",
        task.description.trim(),
        task.expected_output.render()
    );

    if !context.is_empty() {
        prompt.push_str("\n\n# Context\nThis is the output of earlier tasks for you to work from.\n");
        for output in context {
            let json = serde_json::to_string_pretty(&output.json).unwrap_or_else(|_| output.json.to_string());
            prompt.push_str(&format!("\n## {} (by {})\n```json\n{}\n```\n", output.task, output.agent, json));
        }
    }

    if let (Some(question), Some(answer)) = (&task.human_input, human_answer) {
        let answer = if answer.trim().is_empty() {
            "(no answer given)"
        } else {
            answer.trim()
        };
        prompt.push_str(&format!("\n\n# Input from the user\nQuestion: {}\nAnswer: {}\n", question, answer));
    }

    prompt
}

fn repair_prompt(task: &Task, err: &Error) -> String {
    format!(
        "Your last answer could not be used: {}\n\
         Reply again with only a JSON object shaped like this example:\n```json\n{}\n```",
        err.message(),
        task.expected_output.render()
    )
}
