//! In-memory stack graph.
//!
//! Nodes are kept in insertion order. A node can only reference nodes that
//! were added before it, so insertion order is always a valid dependency
//! order and every edge is checked when it is created.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::Environment;
use crate::error::{TopologyError, TopologyResult};
use crate::model::{ComputePool, Listener, Network, Resource, ResourceKind, TargetGroup};

const STACK_NAME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9-]*$";
const CONSTRUCT_ID_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_-]*$";
const MAX_STACK_NAME_LEN: usize = 128;

static STACK_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(STACK_NAME_PATTERN).expect("stack name pattern is valid"));
static CONSTRUCT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(CONSTRUCT_ID_PATTERN).expect("construct id pattern is valid"));

/// Check a stack name against the deployable naming rules.
pub fn validate_stack_name(name: &str) -> TopologyResult<()> {
    if name.len() > MAX_STACK_NAME_LEN {
        return Err(TopologyError::InvalidStackName(format!(
            "{} exceeds {} characters",
            name, MAX_STACK_NAME_LEN
        )));
    }
    if !STACK_NAME_RE.is_match(name) {
        return Err(TopologyError::InvalidStackName(format!(
            "'{}' must start with a letter and contain only letters, digits and hyphens",
            name
        )));
    }
    Ok(())
}

/// Stack-unique name of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructId(String);

impl ConstructId {
    pub fn new(id: impl Into<String>) -> TopologyResult<Self> {
        let id = id.into();
        if !CONSTRUCT_ID_RE.is_match(&id) {
            return Err(TopologyError::InvalidConfig(vec![format!(
                "construct id '{}' must start with a letter and contain only letters, digits, '_' or '-'",
                id
            )]));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: ConstructId,
    pub resource: Resource,
}

/// The declared resources of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackGraph {
    stack_name: String,
    environment: Environment,
    nodes: Vec<Node>,
}

impl StackGraph {
    pub fn new(stack_name: impl Into<String>, environment: Environment) -> TopologyResult<Self> {
        let stack_name = stack_name.into();
        validate_stack_name(&stack_name)?;
        Ok(Self {
            stack_name,
            environment,
            nodes: Vec::new(),
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a resource after checking its id and every reference it holds.
    pub fn add(&mut self, id: ConstructId, resource: Resource) -> TopologyResult<ConstructId> {
        if self.get(&id).is_some() {
            return Err(TopologyError::DuplicateId(id.to_string()));
        }
        for (target, expected) in resource.references() {
            self.check_reference(&id, target, expected)?;
        }

        debug!("Adding {} {}", resource.kind(), id);
        self.nodes.push(Node {
            id: id.clone(),
            resource,
        });
        Ok(id)
    }

    /// Route a listener to an existing target group.
    pub fn attach_target_group(
        &mut self,
        listener: &ConstructId,
        target_group: &ConstructId,
    ) -> TopologyResult<()> {
        self.check_reference(listener, target_group, ResourceKind::TargetGroup)?;

        let node = self
            .nodes
            .iter_mut()
            .find(|n| &n.id == listener)
            .ok_or_else(|| TopologyError::DanglingReference {
                from: target_group.to_string(),
                to: listener.to_string(),
            })?;

        match &mut node.resource {
            Resource::Listener(l) => {
                if !l.target_groups.contains(target_group) {
                    l.target_groups.push(target_group.clone());
                }
                debug!("Listener {} routes to {}", listener, target_group);
                Ok(())
            }
            other => Err(TopologyError::WrongReferenceKind {
                from: target_group.to_string(),
                to: listener.to_string(),
                expected: ResourceKind::Listener.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    fn check_reference(
        &self,
        from: &ConstructId,
        to: &ConstructId,
        expected: ResourceKind,
    ) -> TopologyResult<()> {
        let found = self
            .get(to)
            .ok_or_else(|| TopologyError::DanglingReference {
                from: from.to_string(),
                to: to.to_string(),
            })?
            .kind();

        if found != expected {
            return Err(TopologyError::WrongReferenceKind {
                from: from.to_string(),
                to: to.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, id: &ConstructId) -> Option<&Resource> {
        self.nodes.iter().find(|n| &n.id == id).map(|n| &n.resource)
    }

    pub fn network(&self, id: &ConstructId) -> Option<&Network> {
        match self.get(id) {
            Some(Resource::Network(n)) => Some(n),
            _ => None,
        }
    }

    pub fn compute_pool(&self, id: &ConstructId) -> Option<&ComputePool> {
        match self.get(id) {
            Some(Resource::ComputePool(p)) => Some(p),
            _ => None,
        }
    }

    pub fn listener(&self, id: &ConstructId) -> Option<&Listener> {
        match self.get(id) {
            Some(Resource::Listener(l)) => Some(l),
            _ => None,
        }
    }

    pub fn target_group(&self, id: &ConstructId) -> Option<&TargetGroup> {
        match self.get(id) {
            Some(Resource::TargetGroup(t)) => Some(t),
            _ => None,
        }
    }

    /// Number of nodes of the given kind.
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.resource.kind() == kind)
            .count()
    }

    /// Ids of nodes of the given kind, in insertion order.
    pub fn ids_of(&self, kind: ResourceKind) -> Vec<&ConstructId> {
        self.nodes
            .iter()
            .filter(|n| n.resource.kind() == kind)
            .map(|n| &n.id)
            .collect()
    }

    /// Nodes the given node references.
    pub fn dependencies(&self, id: &ConstructId) -> Vec<&ConstructId> {
        self.get(id)
            .map(|r| r.references().into_iter().map(|(to, _)| to).collect())
            .unwrap_or_default()
    }

    /// Nodes referencing the given node.
    pub fn dependents(&self, id: &ConstructId) -> Vec<&ConstructId> {
        self.nodes
            .iter()
            .filter(|n| n.resource.references().iter().any(|(to, _)| *to == id))
            .map(|n| &n.id)
            .collect()
    }

    /// Every `(from, to)` reference in the graph.
    pub fn edges(&self) -> Vec<(&ConstructId, &ConstructId)> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.resource
                    .references()
                    .into_iter()
                    .map(move |(to, _)| (&n.id, to))
            })
            .collect()
    }

    /// Hierarchical path of a construct, e.g. `MyStack/MyVPC`.
    pub fn construct_path(&self, id: &ConstructId) -> String {
        format!("{}/{}", self.stack_name, id)
    }
}
