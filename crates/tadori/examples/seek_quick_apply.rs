//! A Seek-style quick-apply run with mocked browser actions.
//!
//! Run with `RUST_LOG=debug cargo run --example seek_quick_apply` to see
//! every outcome the steps emit.

use async_trait::async_trait;
use std::time::Duration;
use tadori::prelude::*;

tadori::define_outcomes! {
    enum Search {
        Submitted => "search_submitted",
        NoResults => "search_no_results",
    }
}

#[derive(Debug)]
struct OpenHomepage;

#[async_trait]
impl Step for OpenHomepage {
    async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
        ctx.insert("page", "https://www.seek.com.au".to_string());
        outcomes.emit("homepage_opened");
        Ok(())
    }

    fn name(&self) -> StepName {
        StepName::new("OpenHomepage")
    }
}

#[derive(Debug)]
struct SubmitSearch;

#[async_trait]
impl Step for SubmitSearch {
    async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
        let keywords = ctx
            .get::<String>("keywords")
            .cloned()
            .ok_or_else(|| StepFailure::new("no search keywords configured"))?;
        println!("Searching for '{keywords}'");

        let cards: Vec<String> = (1..=3).map(|n| format!("{keywords} #{n}")).collect();
        if cards.is_empty() {
            outcomes.emit(Search::NoResults);
        } else {
            ctx.insert("job_cards", cards);
            outcomes.emit(Search::Submitted);
        }
        Ok(())
    }

    fn name(&self) -> StepName {
        StepName::new("SubmitSearch")
    }
}

impl DeclaredOutcomes for SubmitSearch {
    fn outcomes(&self) -> Vec<Outcome> {
        Search::all()
    }
}

/// Applies to the next collected job card, narrating progress as it goes.
#[derive(Debug)]
struct QuickApply;

#[async_trait]
impl Step for QuickApply {
    async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
        let next = ctx
            .get_mut::<Vec<String>>("job_cards")
            .and_then(|cards| cards.pop());

        let Some(job) = next else {
            outcomes.emit("all_jobs_applied");
            return Ok(());
        };

        outcomes.emit("quick_apply_opened");
        tokio::time::sleep(Duration::from_millis(20)).await;
        if outcomes.is_cancelled() {
            return Ok(());
        }
        println!("Applied to {job}");
        *ctx.get_or_insert_with("applied", || 0u32) += 1;
        outcomes.emit("application_submitted");
        Ok(())
    }

    fn name(&self) -> StepName {
        StepName::new("QuickApply")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let workflow = WorkflowDefinition::builder()
        .title("Seek")
        .description("Search and quick-apply on Seek")
        .step(
            StepDefinition::new("open_homepage", OpenHomepage)
                .on("homepage_opened", "submit_search")
                .on("homepage_timeout", "open_homepage")
                .with_timeout(Duration::from_secs(10), "homepage_timeout")
                .ordinal(1.0),
        )
        .step(
            StepDefinition::declared("submit_search", SubmitSearch)
                .on(Search::Submitted, "quick_apply")
                .end_on(Search::NoResults)
                .on("engine_error", "open_homepage")
                .with_timeout(Duration::from_secs(10), Search::NoResults)
                .ordinal(2.0),
        )
        .step(
            StepDefinition::new("quick_apply", QuickApply)
                .on("application_submitted", "quick_apply")
                .on("quick_apply_opened", "quick_apply")
                .end_on("all_jobs_applied")
                .with_timeout(Duration::from_secs(5), "quick_apply_opened")
                .ordinal(3.0),
        )
        .build()?;

    let ctx = Context::new().with("keywords", "rust developer".to_string());
    let engine = Engine::new(EngineConfig::default().with_max_steps(50));
    let result = engine.run(&workflow, ctx).await?;

    for record in &result.history {
        println!("{record}");
    }
    println!(
        "Applied to {} jobs in {} steps ({:?})",
        result.context.get::<u32>("applied").copied().unwrap_or(0),
        result.steps_taken(),
        result.elapsed
    );

    Ok(())
}
