//! Loads a LinkedIn-style workflow from JSON and binds it to registered actions.

use async_trait::async_trait;
use tadori::prelude::*;

/// A mocked action that emits a fixed outcome.
#[derive(Debug)]
struct Reply(&'static str);

#[async_trait]
impl Step for Reply {
    async fn execute(&self, _ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
        outcomes.emit(self.0);
        Ok(())
    }

    fn name(&self) -> StepName {
        StepName::new(self.0)
    }
}

const WORKFLOW: &str = r#"{
    "workflow_meta": {
        "title": "LinkedIn",
        "description": "Search and apply on LinkedIn Jobs",
        "start_step": "open_jobs_page"
    },
    "steps_config": {
        "open_jobs_page": {
            "step": 1,
            "func": "open_jobs_page",
            "transitions": {
                "jobs page loaded": "set_search_keywords",
                "failed opening jobs page": "open_jobs_page"
            },
            "timeout": 20,
            "on_timeout_event": "failed opening jobs page"
        },
        "set_search_keywords": {
            "step": 2,
            "func": "set_search_keywords",
            "transitions": {
                "search keywords set": "done",
                "*": "open_jobs_page"
            },
            "timeout": 20,
            "on_timeout_event": "keywords input not found"
        }
    }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let declaration: WorkflowDeclaration = serde_json::from_str(WORKFLOW)?;
    let registry = ActionRegistry::new()
        .with("open_jobs_page", Reply("jobs page loaded"))
        .with("set_search_keywords", Reply("search keywords set"));

    let workflow = declaration.load(&registry)?;
    println!("Loaded '{}' with {} steps", workflow.title(), workflow.step_count());

    let result = workflow.run(Context::new()).await?;
    for (step, outcome) in result.outcome_pairs() {
        println!("{step}: {outcome}");
    }

    Ok(())
}
