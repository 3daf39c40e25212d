use crate::model::Scenario;
use crate::{Error, Result};
use std::collections::HashSet;

impl Scenario {
    /// Checks the structural invariants every consumer relies on: unique node ids, edge
    /// endpoints that exist, and row-alignment / trigger references that exist.
    ///
    /// Acyclicity is left to the layout, which reports cycles as a precondition failure.
    pub fn validate(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(Error::DuplicateNode {
                    scenario: self.id.clone(),
                    id: node.id.clone(),
                });
            }
        }

        for edge in &self.links {
            for endpoint in [edge.source(), edge.target()] {
                if !ids.contains(endpoint) {
                    return Err(Error::UnknownEdgeEndpoint {
                        scenario: self.id.clone(),
                        from: edge.source().to_string(),
                        to: edge.target().to_string(),
                        id: endpoint.to_string(),
                    });
                }
            }
        }

        let unknown = |field: &'static str, id: &str| Error::UnknownReference {
            scenario: self.id.clone(),
            field,
            id: id.to_string(),
        };

        if let Some(align) = &self.align_row {
            for id in &align.nodes {
                if !ids.contains(id.as_str()) {
                    return Err(unknown("align_row.nodes", id));
                }
            }
            if let Some(id) = &align.annotation {
                if !ids.contains(id.as_str()) {
                    return Err(unknown("align_row.annotation", id));
                }
            }
        }

        if let Some(trigger) = &self.trigger {
            for id in &trigger.nodes {
                if !ids.contains(id.as_str()) {
                    return Err(unknown("trigger.nodes", id));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Edge, Layer, Node, Scenario, Status};
    use crate::Error;

    fn scenario(nodes: &[&str], links: &[(&str, &str)]) -> Scenario {
        Scenario {
            id: "s".to_string(),
            title: "S".to_string(),
            description: String::new(),
            trigger: None,
            nodes: nodes
                .iter()
                .map(|id| Node::new(*id, Layer::Staging, Status::Built))
                .collect(),
            links: links.iter().map(|(a, b)| Edge::new(*a, *b)).collect(),
            align_row: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_scenario() {
        scenario(&["a", "b"], &[("a", "b"), ("a", "b")])
            .validate()
            .expect("duplicate edges are redundant, not invalid");
    }

    #[test]
    fn rejects_duplicate_nodes() {
        let err = scenario(&["a", "a"], &[]).validate().unwrap_err();
        assert!(matches!(err, Error::DuplicateNode { .. }));
    }

    #[test]
    fn rejects_dangling_edges() {
        let err = scenario(&["a"], &[("a", "missing")]).validate().unwrap_err();
        match err {
            Error::UnknownEdgeEndpoint { id, .. } => assert_eq!(id, "missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unknown_alignment_annotation() {
        let mut s = scenario(&["a"], &[]);
        s.align_row = Some(crate::RowAlignment {
            annotation: Some("ghost".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            s.validate(),
            Err(Error::UnknownReference {
                field: "align_row.annotation",
                ..
            })
        ));
    }
}
