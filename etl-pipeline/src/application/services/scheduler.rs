// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pure, synchronous scheduling: Kahn's algorithm over the platform
//! dependency graph, producing ordered execution groups. No I/O; the
//! orchestrator is the only caller and owns all the async/concurrency
//! machinery built on top of this.

use etl_domain::{EtlError, PlatformConfig};
use std::collections::{HashMap, HashSet};

/// Builds execution groups: `result[i]` may only depend on platforms in
/// `result[0..i]`. If `platforms` declares a manual `parallel_groups`
/// partition, it is validated as a refinement of the natural topological
/// frontier order and used verbatim; otherwise the natural frontier groups
/// (Kahn's algorithm, one group per frontier) are returned.
pub fn build_groups(platforms: &[PlatformConfig], manual_groups: Option<&[Vec<String>]>) -> Result<Vec<Vec<String>>, EtlError> {
    let natural = natural_frontier_groups(platforms)?;
    match manual_groups {
        Some(manual) => {
            validate_manual_groups(platforms, manual)?;
            Ok(manual.to_vec())
        }
        None => Ok(natural),
    }
}

fn natural_frontier_groups(platforms: &[PlatformConfig]) -> Result<Vec<Vec<String>>, EtlError> {
    let names: HashSet<&str> = platforms.iter().map(|p| p.name.as_str()).collect();
    for platform in platforms {
        for dep in &platform.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(EtlError::Config(format!(
                    "platform '{}' depends on undeclared platform '{}'",
                    platform.name, dep
                )));
            }
        }
    }

    let mut remaining: Vec<&PlatformConfig> = platforms.iter().collect();
    let mut groups = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|p| p.depends_on.iter().all(|d| done.contains(d.as_str())));
        if ready.is_empty() {
            let cycle = not_ready.iter().map(|p| p.name.clone()).collect();
            return Err(EtlError::CircularDependency(cycle));
        }
        let mut group: Vec<String> = ready.iter().map(|p| p.name.clone()).collect();
        group.sort();
        for name in &group {
            done.insert(platforms.iter().find(|p| &p.name == name).unwrap().name.as_str());
        }
        groups.push(group);
        remaining = not_ready;
    }
    Ok(groups)
}

/// A manual partition is a valid refinement when every platform appears in
/// exactly one group and every dependency's group index is strictly less
/// than its dependent's group index.
fn validate_manual_groups(platforms: &[PlatformConfig], manual: &[Vec<String>]) -> Result<(), EtlError> {
    let mut group_index: HashMap<&str, usize> = HashMap::new();
    for (i, group) in manual.iter().enumerate() {
        for name in group {
            if group_index.insert(name.as_str(), i).is_some() {
                return Err(EtlError::Config(format!(
                    "platform '{name}' appears in more than one parallel_groups entry"
                )));
            }
        }
    }
    if group_index.len() != platforms.len() {
        return Err(EtlError::Config(
            "parallel_groups does not cover exactly the declared platform set".into(),
        ));
    }

    for platform in platforms {
        let my_index = *group_index.get(platform.name.as_str()).ok_or_else(|| {
            EtlError::Config(format!("platform '{}' missing from parallel_groups", platform.name))
        })?;
        for dep in &platform.depends_on {
            let dep_index = *group_index
                .get(dep.as_str())
                .ok_or_else(|| EtlError::Config(format!("unknown dependency '{dep}' in parallel_groups")))?;
            if dep_index >= my_index {
                return Err(EtlError::Config(format!(
                    "parallel_groups conflicts with depends_on: '{}' must be scheduled after its dependency '{}'",
                    platform.name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Whether `platform` may start given the set of platforms that have
/// already completed successfully. Supports event-driven scheduling in
/// addition to the static group plan.
pub fn can_execute(platform: &PlatformConfig, completed: &HashSet<String>) -> bool {
    platform.depends_on.iter().all(|d| completed.contains(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_domain::RetryPolicy;

    fn platform(name: &str, depends_on: Vec<&str>) -> PlatformConfig {
        PlatformConfig {
            name: name.into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: depends_on.into_iter().map(String::from).collect(),
            retry: RetryPolicy::default(),
            tables: vec![],
        }
    }

    #[test]
    fn independent_platforms_share_one_group() {
        let platforms = vec![platform("linkedin", vec![]), platform("facebook", vec![])];
        let groups = build_groups(&platforms, None).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn dependent_platform_lands_in_a_later_group() {
        let platforms = vec![
            platform("mixed_media", vec!["linkedin"]),
            platform("linkedin", vec![]),
            platform("facebook", vec![]),
        ];
        let groups = build_groups(&platforms, None).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups[0].contains(&"linkedin".to_string()));
        assert!(groups[0].contains(&"facebook".to_string()));
        assert_eq!(groups[1], vec!["mixed_media".to_string()]);
    }

    #[test]
    fn cycle_is_rejected() {
        let platforms = vec![platform("a", vec!["b"]), platform("b", vec!["a"])];
        assert!(matches!(build_groups(&platforms, None), Err(EtlError::CircularDependency(_))));
    }

    #[test]
    fn manual_groups_conflicting_with_depends_on_are_rejected() {
        let platforms = vec![platform("a", vec!["b"]), platform("b", vec![])];
        let manual = vec![vec!["a".to_string(), "b".to_string()]];
        assert!(build_groups(&platforms, Some(&manual)).is_err());
    }

    #[test]
    fn manual_groups_respecting_the_dag_are_accepted() {
        let platforms = vec![platform("a", vec!["b"]), platform("b", vec![])];
        let manual = vec![vec!["b".to_string()], vec!["a".to_string()]];
        let groups = build_groups(&platforms, Some(&manual)).unwrap();
        assert_eq!(groups, manual);
    }

    #[test]
    fn can_execute_checks_dependency_completion() {
        let p = platform("mixed_media", vec!["linkedin"]);
        let mut completed = HashSet::new();
        assert!(!can_execute(&p, &completed));
        completed.insert("linkedin".to_string());
        assert!(can_execute(&p, &completed));
    }
}
