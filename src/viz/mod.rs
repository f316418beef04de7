//! Diagnostic exports for rendering outside the core

use anyhow::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::cluster::hierarchical::MergeTree;

/// Dendrogram node payload
#[derive(Debug, Clone, PartialEq)]
pub struct DendrogramNode {
    pub label: String,
    /// Merge height, 0 for leaves
    pub height: f64,
    pub size: usize,
}

/// Merge tree as a directed graph, edges pointing from a merged node to its
/// two children. Graph node `i` is tree node `i`.
pub fn dendrogram_graph(tree: &MergeTree, leaf_ids: &[String]) -> DiGraph<DendrogramNode, f64> {
    let mut graph = DiGraph::with_capacity(tree.node_count(), 2 * tree.merges().len());

    for id in leaf_ids.iter().take(tree.leaf_count()) {
        graph.add_node(DendrogramNode {
            label: id.clone(),
            height: 0.0,
            size: 1,
        });
    }

    for (step, merge) in tree.merges().iter().enumerate() {
        let node = graph.add_node(DendrogramNode {
            label: format!("m{}", step),
            height: merge.distance,
            size: merge.size,
        });
        graph.add_edge(node, NodeIndex::new(merge.left), merge.distance);
        graph.add_edge(node, NodeIndex::new(merge.right), merge.distance);
    }

    graph
}

/// Write the dendrogram as GraphML
pub fn write_dendrogram_graphml(tree: &MergeTree, leaf_ids: &[String], path: &Path) -> Result<()> {
    log::info!("Writing dendrogram to {}", path.display());

    let graph = dendrogram_graph(tree, leaf_ids);
    let mut file = File::create(path)?;

    writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
    writeln!(file, "  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"height\" for=\"node\" attr.name=\"height\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"size\" for=\"node\" attr.name=\"size\" attr.type=\"int\"/>")?;
    writeln!(file, "  <graph id=\"dendrogram\" edgedefault=\"directed\">")?;

    for index in graph.node_indices() {
        let node = &graph[index];
        writeln!(
            file,
            "    <node id=\"n{}\">\n      <data key=\"label\">{}</data>\n      <data key=\"height\">{}</data>\n      <data key=\"size\">{}</data>\n    </node>",
            index.index(),
            escape_xml(&node.label),
            node.height,
            node.size
        )?;
    }

    for (edge_id, edge) in graph.edge_references().enumerate() {
        writeln!(
            file,
            "    <edge id=\"e{}\" source=\"n{}\" target=\"n{}\"/>",
            edge_id,
            edge.source().index(),
            edge.target().index()
        )?;
    }

    writeln!(file, "  </graph>")?;
    writeln!(file, "</graphml>")?;

    Ok(())
}

/// Write `k,distortion` rows for an elbow plot
pub fn write_distortion_csv(distortion: &BTreeMap<usize, f64>, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "k,distortion")?;
    for (k, value) in distortion {
        writeln!(file, "{},{}", k, value)?;
    }
    Ok(())
}

/// Export whichever diagnostics the run produced
pub fn generate_visualizations(
    tree: Option<&MergeTree>,
    distortion: &BTreeMap<usize, f64>,
    leaf_ids: &[String],
    output_dir: &str,
) -> Result<()> {
    let viz_dir = Path::new(output_dir).join("visualizations");
    fs::create_dir_all(&viz_dir)?;

    if let Some(tree) = tree {
        write_dendrogram_graphml(tree, leaf_ids, &viz_dir.join("dendrogram.graphml"))?;
    }
    if !distortion.is_empty() {
        write_distortion_csv(distortion, &viz_dir.join("distortion.csv"))?;
    }

    log::info!("Visualizations generated successfully");
    Ok(())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
