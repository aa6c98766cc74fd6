// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hierarchical report layouts.
//!
//! Tree, NestedText, and JSON reports all group rows by host, then by user,
//! then by config. Groups appear in the order their first row appeared.

use crate::report::ReportError;

use ptree::{write_tree_with, PrintConfig, Style, TreeItem};
use serde_json::{Map, Value};
use std::{borrow::Cow, io::Write};

const NESTEDTEXT_INDENT: &str = "    ";

/// Leaf of a drawn tree report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    /// Config and its value folded into one label.
    Squeezed(String),

    /// Config with one child per field.
    Fields(Vec<(String, String)>),
}

/// Host to user to config grouping of leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy<T> {
    hosts: Vec<(String, Vec<(String, Vec<(String, T)>)>)>,
}

impl<T> Default for Hierarchy<T> {
    fn default() -> Self {
        Self { hosts: Vec::new() }
    }
}

impl<T> Hierarchy<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place leaf under host and user.
    pub fn insert(&mut self, host: &str, user: &str, config: &str, leaf: T) {
        let users = group(&mut self.hosts, host);
        let configs = group(users, user);
        configs.push((config.into(), leaf));
    }
}

impl Hierarchy<Value> {
    /// Nest leaves into JSON objects.
    pub fn into_json(self) -> Value {
        let hosts = self
            .hosts
            .into_iter()
            .map(|(host, users)| {
                let users = users
                    .into_iter()
                    .map(|(user, configs)| (user, Value::Object(configs.into_iter().collect())))
                    .collect::<Map<_, _>>();
                (host, Value::Object(users))
            })
            .collect::<Map<_, _>>();

        Value::Object(hosts)
    }
}

fn group<'a, V: Default>(groups: &'a mut Vec<(String, V)>, key: &str) -> &'a mut V {
    let index = match groups.iter().position(|(name, _)| name == key) {
        Some(index) => index,
        None => {
            groups.push((key.into(), V::default()));
            groups.len() - 1
        }
    };

    &mut groups[index].1
}

/// Draw hierarchy as one tree per host.
///
/// # Errors
///
/// - Return [`ReportError::Tree`] if tree cannot be drawn.
pub fn render_tree(hierarchy: &Hierarchy<Leaf>) -> Result<String> {
    let config = PrintConfig::default();
    let mut out = Vec::new();
    for (host, users) in &hierarchy.hosts {
        let node = TreeNode {
            label: host.clone(),
            children: users
                .iter()
                .map(|(user, configs)| TreeNode {
                    label: user.clone(),
                    children: configs.iter().map(|(config, leaf)| leaf_node(config, leaf)).collect(),
                })
                .collect(),
        };
        write_tree_with(&node, &mut out, &config)?;
    }

    Ok(String::from_utf8_lossy(&out).trim_end().to_string())
}

fn leaf_node(config: &str, leaf: &Leaf) -> TreeNode {
    match leaf {
        Leaf::Squeezed(label) => TreeNode {
            label: label.clone(),
            children: Vec::new(),
        },
        Leaf::Fields(fields) => TreeNode {
            label: config.into(),
            children: fields
                .iter()
                .map(|(field, value)| TreeNode {
                    label: format!("{field}: {value}"),
                    children: Vec::new(),
                })
                .collect(),
        },
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: Write>(&self, f: &mut W, _style: &Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

/// Write hierarchy as NestedText document.
pub fn render_nestedtext(hierarchy: &Hierarchy<Vec<(String, String)>>) -> String {
    let mut lines = Vec::new();
    for (host, users) in &hierarchy.hosts {
        lines.push(format!("{host}:"));
        for (user, configs) in users {
            lines.push(format!("{NESTEDTEXT_INDENT}{user}:"));
            for (config, fields) in configs {
                lines.push(format!("{}{config}:", NESTEDTEXT_INDENT.repeat(2)));
                for (field, value) in fields {
                    nestedtext_entry(&mut lines, 3, field, value);
                }
            }
        }
    }

    lines.join("\n")
}

// INVARIANT: Multi-line values become indented multi-line strings.
fn nestedtext_entry(lines: &mut Vec<String>, depth: usize, key: &str, value: &str) {
    let indent = NESTEDTEXT_INDENT.repeat(depth);
    if !value.contains('\n') {
        lines.push(format!("{indent}{key}: {value}").trim_end().to_string());
        return;
    }

    lines.push(format!("{indent}{key}:"));
    for line in value.lines() {
        lines.push(format!("{indent}{NESTEDTEXT_INDENT}> {line}").trim_end().to_string());
    }
}

/// Friendly result alias :3
type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn group_in_first_seen_order() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert("earth", "ada", "home", 1);
        hierarchy.insert("mars", "root", "offsite", 2);
        hierarchy.insert("earth", "ada", "cache", 3);
        hierarchy.insert("earth", "root", "system", 4);

        let expect = Hierarchy {
            hosts: vec![
                (
                    "earth".to_string(),
                    vec![
                        ("ada".to_string(), vec![("home".to_string(), 1), ("cache".to_string(), 3)]),
                        ("root".to_string(), vec![("system".to_string(), 4)]),
                    ],
                ),
                (
                    "mars".to_string(),
                    vec![("root".to_string(), vec![("offsite".to_string(), 2)])],
                ),
            ],
        };
        assert_eq!(hierarchy, expect);
    }

    #[test]
    fn nestedtext_multiline_values() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert(
            "mars",
            "root",
            "offsite",
            fields(&[("error", "connection refused\nhost unreachable"), ("note", "")]),
        );

        let expect = indoc! {"
            mars:
                root:
                    offsite:
                        error:
                            > connection refused
                            > host unreachable
                        note:"};
        assert_eq!(render_nestedtext(&hierarchy), expect);
    }

    #[test]
    fn json_nests_hosts_users_configs() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert("earth", "ada", "home", Value::from(3));
        hierarchy.insert("earth", "ada", "cache", Value::Null);

        let json = hierarchy.into_json();
        assert_eq!(json["earth"]["ada"]["home"], Value::from(3));
        assert_eq!(json["earth"]["ada"]["cache"], Value::Null);
        let configs = json["earth"]["ada"].as_object().unwrap();
        assert_eq!(configs.keys().collect::<Vec<_>>(), vec!["home", "cache"]);
    }

    #[test]
    fn tree_draws_each_host() -> anyhow::Result<()> {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert("earth", "ada", "home", Leaf::Squeezed("home: 3.00 MiB".into()));
        hierarchy.insert(
            "mars",
            "root",
            "offsite",
            Leaf::Fields(fields(&[("size", "2.00 GiB"), ("last_create", "never")])),
        );

        let result = render_tree(&hierarchy)?;
        let labels = ["earth", "ada", "home: 3.00 MiB", "mars", "root", "offsite", "size: 2.00 GiB", "last_create: never"];
        let lines = result.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), labels.len());
        for (line, label) in lines.iter().zip(labels) {
            assert!(line.ends_with(label), "{line:?} should end with {label:?}");
        }

        Ok(())
    }
}
