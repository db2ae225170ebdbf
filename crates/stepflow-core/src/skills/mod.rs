//! Skill catalog used to resolve `skill` steps.
//!
//! Skills are discovered from `SKILL.md` files in well-known directories
//! (relative to a working directory and to the home directory). Each file may
//! carry YAML front-matter:
//!
//! ```markdown
//! ---
//! name: release-notes
//! description: Draft release notes from merged changes.
//! ---
//!
//! Instructions for the agent...
//! ```
//!
//! The engine only asks whether a name resolves; content stays here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::workflow::collaborators::SkillResolver;

#[derive(Debug, Deserialize)]
struct SkillFrontmatter {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// A discovered skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
    pub source: String,
}

const SKILL_DIRS: &[&str] = &[".stepflow/skills", ".claude/skills", ".agents/skills"];

const SKILL_FILENAME: &str = "SKILL.md";

/// In-memory registry of skills.
pub struct SkillRegistry {
    skills: RwLock<HashMap<String, SkillDefinition>>,
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the registry contents with skills discovered under `cwd` and `$HOME`.
    pub fn reload(&self, cwd: &str) -> usize {
        let mut discovered = HashMap::new();

        let mut roots = vec![Path::new(cwd).to_path_buf()];
        if let Some(home) = dirs::home_dir() {
            roots.push(home);
        }
        for root in &roots {
            for dir_pattern in SKILL_DIRS {
                let skill_dir = root.join(dir_pattern);
                if skill_dir.is_dir() {
                    discover_skills(&skill_dir, &mut discovered, 0);
                }
            }
        }

        let count = discovered.len();
        if let Ok(mut skills) = self.skills.write() {
            *skills = discovered;
        }
        tracing::info!("Discovered {} skills", count);
        count
    }

    pub fn get_skill(&self, name: &str) -> Option<SkillDefinition> {
        self.skills.read().ok().and_then(|s| s.get(name).cloned())
    }

    /// All skills, sorted by name.
    pub fn list_skills(&self) -> Vec<SkillDefinition> {
        let mut list: Vec<SkillDefinition> = self
            .skills
            .read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

#[async_trait]
impl SkillResolver for SkillRegistry {
    async fn resolve(&self, name: &str) -> bool {
        self.skills
            .read()
            .map(|s| s.contains_key(name))
            .unwrap_or(false)
    }
}

const MAX_DEPTH: usize = 2;

fn discover_skills(dir: &Path, out: &mut HashMap<String, SkillDefinition>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            discover_skills(&path, out, depth + 1);
        } else if path.file_name().map(|f| f == SKILL_FILENAME).unwrap_or(false) {
            if let Some(skill) = parse_skill_file(&path) {
                out.insert(skill.name.clone(), skill);
            }
        }
    }
}

/// Split `---` delimited front-matter from the body.
fn extract_frontmatter(contents: &str) -> Option<(String, String)> {
    let rest = contents.trim_start().strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let frontmatter = rest[..end].trim().to_string();
    let body = rest[end + 4..].trim().to_string();
    if frontmatter.is_empty() {
        return None;
    }
    Some((frontmatter, body))
}

/// Parse a SKILL.md file. Without front-matter the parent directory names the skill.
fn parse_skill_file(path: &Path) -> Option<SkillDefinition> {
    let raw = std::fs::read_to_string(path).ok()?;
    let source = path.to_string_lossy().to_string();

    if let Some((frontmatter, body)) = extract_frontmatter(&raw) {
        match serde_yaml::from_str::<SkillFrontmatter>(&frontmatter) {
            Ok(fm) => {
                return Some(SkillDefinition {
                    name: fm.name,
                    description: fm.description,
                    tags: fm.tags,
                    content: body,
                    source,
                })
            }
            Err(e) => tracing::warn!("Ignoring bad front-matter in {}: {}", source, e),
        }
    }

    let name = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())?;
    let description = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("---"))
        .unwrap_or("No description")
        .to_string();

    Some(SkillDefinition {
        name,
        description,
        tags: Vec::new(),
        content: raw,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_replaces_previous_skills() {
        let first = tempfile::tempdir().unwrap();
        let lint = first.path().join(".stepflow/skills/stepflow-test-lint");
        std::fs::create_dir_all(&lint).unwrap();
        std::fs::write(lint.join("SKILL.md"), "Run the linter.\n").unwrap();

        let registry = SkillRegistry::new();
        assert!(!registry.resolve("stepflow-test-lint").await);
        registry.reload(first.path().to_str().unwrap());
        assert!(registry.resolve("stepflow-test-lint").await);

        let second = tempfile::tempdir().unwrap();
        registry.reload(second.path().to_str().unwrap());
        assert!(!registry.resolve("stepflow-test-lint").await);
        assert!(registry.get_skill("stepflow-test-lint").is_none());
    }

    #[tokio::test]
    async fn test_reload_discovers_skill_files() {
        let tmp = tempfile::tempdir().unwrap();
        let with_fm = tmp.path().join(".stepflow/skills/release");
        std::fs::create_dir_all(&with_fm).unwrap();
        std::fs::write(
            with_fm.join("SKILL.md"),
            "---\nname: release-notes\ndescription: Draft release notes\ntags: [docs]\n---\n\nWrite them.\n",
        )
        .unwrap();
        let plain = tmp.path().join(".agents/skills/triage");
        std::fs::create_dir_all(&plain).unwrap();
        std::fs::write(plain.join("SKILL.md"), "# Triage\n\nSort incoming issues.\n").unwrap();

        let registry = SkillRegistry::new();
        registry.reload(tmp.path().to_str().unwrap());

        let notes = registry.get_skill("release-notes").unwrap();
        assert_eq!(notes.description, "Draft release notes");
        assert_eq!(notes.tags, vec!["docs".to_string()]);
        assert_eq!(notes.content, "Write them.");

        let triage = registry.get_skill("triage").unwrap();
        assert_eq!(triage.description, "Sort incoming issues.");
        assert!(registry.resolve("triage").await);
    }
}
