//! # Fact Pattern Skill
//!
//! First completion call of every run: narrative in, normalized [`FactPattern`] out.

use crate::legal::FactPattern;
use crate::skills::llm_helpers::{generate, instructions_with_schema, CompletionError, CompletionService};
use crate::skills::prompts;
use std::sync::Arc;

const MAX_TOKENS: u32 = 2048;

pub struct FactPatternSkill {
    llm: Arc<dyn CompletionService>,
}

impl FactPatternSkill {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn run(&self, narrative: &str) -> Result<FactPattern, CompletionError> {
        let system = instructions_with_schema::<FactPattern>(prompts::FACT_PATTERN);
        let user = format!("Analyze this case narrative and extract the fact pattern:\n\n{}", narrative);
        let fact_pattern: FactPattern = generate(self.llm.as_ref(), &system, &user, MAX_TOKENS).await?;
        let fact_pattern = fact_pattern.normalized();
        tracing::info!(
            issues = fact_pattern.issues.len(),
            parties = fact_pattern.parties.len(),
            "Fact pattern extracted"
        );
        Ok(fact_pattern)
    }
}
