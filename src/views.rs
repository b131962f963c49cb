//! Scenario groupings computed from a repository snapshot.

use crate::model::{Character, ScenarioGroup};

/// Label used for characters that were saved without a scenario.
pub const UNASSIGNED_SCENARIO: &str = "Characters without a scenario";

pub fn scenario_label(character: &Character) -> &str {
    if character.scenario.is_empty() {
        UNASSIGNED_SCENARIO
    } else {
        &character.scenario
    }
}

/// Groups in order of each label's first appearance; members keep stored order.
pub fn group_by_scenario(snapshot: &[Character]) -> Vec<ScenarioGroup> {
    let mut groups: Vec<ScenarioGroup> = Vec::new();
    for character in snapshot {
        let label = scenario_label(character);
        match groups.iter_mut().find(|group| group.name == label) {
            Some(group) => {
                group.characters.push(character.clone());
                group.count += 1;
            }
            None => groups.push(ScenarioGroup {
                name: label.to_string(),
                characters: vec![character.clone()],
                count: 1,
            }),
        }
    }
    groups
}

pub fn filter_by_scenario(snapshot: &[Character], label: &str) -> Vec<Character> {
    snapshot
        .iter()
        .filter(|character| scenario_label(character) == label)
        .cloned()
        .collect()
}
