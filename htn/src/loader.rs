use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::domain::{Domain, Method, Operator, Task};
use crate::error::HtnError;

#[derive(Debug, Deserialize)]
struct DomainFile {
    domain: DomainDef,
}

#[derive(Debug, Deserialize)]
struct DomainDef {
    id: String,
    #[serde(default)]
    description: String,
    tasks: Vec<Task>,
    methods: Vec<Method>,
    operators: Vec<Operator>,
}

/// Parse and validate a domain file's TOML contents.
pub fn parse_domain(toml_source: &str) -> Result<Domain, HtnError> {
    let file: DomainFile = toml::from_str(toml_source)?;
    Domain::new(
        file.domain.id,
        file.domain.description,
        file.domain.tasks,
        file.domain.methods,
        file.domain.operators,
    )
}

pub fn load_domain_file(path: impl AsRef<Path>) -> Result<Domain, HtnError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let domain = parse_domain(&source)?;
    info!(path = %path.display(), domain = %domain.id, "loaded htn domain file");
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [domain]
        id = "ganger_combat"
        description = "basic melee ganger"

        [[domain.tasks]]
        id = "behave"

        [[domain.tasks]]
        id = "fight"

        [[domain.methods]]
        id = "combat_mode"
        task = "behave"
        precondition = "has_enemy"
        subtasks = ["fight"]

        [[domain.methods]]
        id = "attack_any"
        task = "fight"
        subtasks = ["attack_enemy"]

        [[domain.operators]]
        id = "attack_enemy"
        action = "attack"
        target = "nearest_enemy"
    "#;

    #[test]
    fn parses_and_validates_sample_domain() {
        let domain = parse_domain(SAMPLE).unwrap();
        assert_eq!(domain.id, "ganger_combat");
        assert!(domain.operator_by_id("attack_enemy").is_some());
    }

    #[test]
    fn invalid_domain_fails_validation() {
        let broken = SAMPLE.replace("task = \"behave\"", "task = \"ghost\"");
        assert!(parse_domain(&broken).is_err());
    }
}
