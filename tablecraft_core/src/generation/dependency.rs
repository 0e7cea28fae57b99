use crate::schema::SchemaStore;
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Order table ids so referenced tables come before the tables holding the
/// foreign keys. Tables in a reference cycle are emitted together, sorted by id.
pub fn sort_tables_by_dependencies(store: &SchemaStore, table_ids: &[String]) -> Vec<String> {
    let selected: BTreeSet<&str> = table_ids
        .iter()
        .map(String::as_str)
        .filter(|id| store.table(id).is_some())
        .collect();

    // Edge parent -> child: the child's foreign key points at the parent
    let mut graph = DiGraphMap::<&str, ()>::new();
    for id in &selected {
        graph.add_node(*id);
    }

    let mut relations: Vec<_> = store.relations().values().collect();
    relations.sort_by(|a, b| a.id.cmp(&b.id));
    for relation in relations {
        let parent = relation.from_table.as_str();
        let child = relation.to_table.as_str();
        if parent != child && selected.contains(parent) && selected.contains(child) {
            graph.add_edge(parent, child, ());
        }
    }

    let sccs = kosaraju_scc(&graph);
    let mut scc_of: HashMap<&str, usize> = HashMap::new();
    for (idx, scc) in sccs.iter().enumerate() {
        for node in scc {
            scc_of.insert(*node, idx);
        }
    }

    let mut condensation = DiGraphMap::<usize, ()>::new();
    for idx in 0..sccs.len() {
        condensation.add_node(idx);
    }
    for (parent, child, _) in graph.all_edges() {
        let (from, to) = (scc_of[parent], scc_of[child]);
        if from != to {
            condensation.add_edge(from, to, ());
        }
    }

    let order = match toposort(&condensation, None) {
        Ok(order) => order,
        Err(_) => {
            // Cannot happen on a condensation; keep a usable order anyway
            warn!("Cycle detected in table dependency condensation");
            (0..sccs.len()).collect()
        }
    };

    let mut result = Vec::with_capacity(selected.len());
    for idx in order {
        let mut members: Vec<String> = sccs[idx].iter().map(|s| s.to_string()).collect();
        members.sort();
        if members.len() > 1 {
            debug!(tables = ?members, "Circular references between tables");
        }
        result.extend(members);
    }

    debug!(order = ?result, "Sorted tables by dependencies");
    result
}
