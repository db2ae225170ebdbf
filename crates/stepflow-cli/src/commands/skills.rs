//! `stepflow skills` — Inspect skills available to `skill` steps.

use stepflow_core::skills::SkillDefinition;
use stepflow_core::state::AppState;

use super::{print_json, truncate};

pub fn list(state: &AppState) -> Vec<SkillDefinition> {
    let skills = state.skill_registry.list_skills();
    if skills.is_empty() {
        println!("No skills found.");
        return skills;
    }
    println!("{:<28} {}", "NAME", "DESCRIPTION");
    for skill in &skills {
        println!("{:<28} {}", truncate(&skill.name, 28), truncate(&skill.description, 60));
    }
    skills
}

pub fn show(state: &AppState, name: &str) -> Result<SkillDefinition, String> {
    let skill = state
        .skill_registry
        .get_skill(name)
        .ok_or_else(|| format!("Skill {} not found", name))?;
    print_json(&skill);
    Ok(skill)
}
