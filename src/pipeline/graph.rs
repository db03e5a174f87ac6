use crate::error::{PipelineError, Result};
use crate::pipeline::stage::Stage;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct StageNode {
    pub stage: Box<dyn Stage>,
    pub depends_on: Vec<&'static str>,
}

impl StageNode {
    pub fn name(&self) -> &'static str {
        self.stage.name()
    }
}

/// Named stages with explicit dependencies, ordered into levels once at build time.
///
/// Stages in the same level have no dependency on each other.
pub struct PipelineGraph {
    nodes: Vec<StageNode>,
    levels: Vec<Vec<usize>>,
}

#[derive(Default)]
pub struct PipelineGraphBuilder {
    nodes: Vec<StageNode>,
}

impl PipelineGraphBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static, depends_on: &[&'static str]) -> Self {
        self.nodes.push(StageNode {
            stage: Box::new(stage),
            depends_on: depends_on.to_vec(),
        });
        self
    }

    pub fn build(self) -> Result<PipelineGraph> {
        PipelineGraph::new(self.nodes)
    }
}

impl PipelineGraph {
    pub fn builder() -> PipelineGraphBuilder {
        PipelineGraphBuilder::default()
    }

    /// Validates names and dependencies and computes the topological levels
    /// (Kahn's algorithm, names sorted within a level).
    pub fn new(nodes: Vec<StageNode>) -> Result<Self> {
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.name(), i).is_some() {
                return Err(PipelineError::Graph(format!(
                    "duplicate stage '{}'",
                    node.name()
                )));
            }
        }

        let mut indegree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for dep in &node.depends_on {
                let &d = index.get(dep).ok_or_else(|| {
                    PipelineError::Graph(format!(
                        "stage '{}' depends on unknown stage '{}'",
                        node.name(),
                        dep
                    ))
                })?;
                indegree[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut levels = Vec::new();
        let mut ready: BTreeMap<&'static str, usize> = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| indegree[*i] == 0)
            .map(|(i, node)| (node.name(), i))
            .collect();
        let mut placed = 0;

        while !ready.is_empty() {
            let level: Vec<usize> = ready.values().copied().collect();
            ready.clear();
            for &i in &level {
                for &next in &dependents[i] {
                    indegree[next] -= 1;
                    if indegree[next] == 0 {
                        ready.insert(nodes[next].name(), next);
                    }
                }
            }
            placed += level.len();
            levels.push(level);
        }

        if placed != nodes.len() {
            let stuck: BTreeSet<&str> = nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, node)| node.name())
                .collect();
            return Err(PipelineError::Graph(format!(
                "dependency cycle among stages: {}",
                stuck.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        Ok(Self { nodes, levels })
    }

    pub fn levels(&self) -> impl Iterator<Item = Vec<&StageNode>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| &self.nodes[i]).collect())
    }

    /// Stage names in execution order.
    pub fn order(&self) -> Vec<&'static str> {
        self.levels()
            .flat_map(|level| level.into_iter().map(StageNode::name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
