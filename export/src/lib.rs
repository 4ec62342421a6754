//! Turns a trained policy into deployable inference artifacts: a traced operation graph and
//! a static table of C arrays, both checked against the policy they came from.

pub mod error;
mod graph;
mod parity;
mod table;

use policy::Extractor;
use serde::{Deserialize, Serialize};

pub use error::{ExportErr, Result};
pub use graph::{GRAPH_MAGIC, GRAPH_VERSION, GraphArtifact, Node};
pub use parity::{TOLERANCE, max_abs_diff, verify_parity};
pub use table::{TableArray, TableArtifact, literal, runtime_names};

/// The serialization backends an export can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    GraphTrace,
    StaticTable,
}

impl Backend {
    /// The file the backend's artifact is written to.
    pub fn file_name(&self) -> &'static str {
        match self {
            Backend::GraphTrace => "policy.graph",
            Backend::StaticTable => "network.h",
        }
    }

    /// Runs the backend on `extractor`, verifying the artifact on `example`.
    pub fn export(&self, extractor: &Extractor, example: &[f32]) -> Result<ExportArtifact> {
        match self {
            Backend::GraphTrace => {
                GraphArtifact::trace(extractor, example).map(ExportArtifact::Graph)
            }
            Backend::StaticTable => {
                let table = TableArtifact::from_extractor(extractor)?;
                let expected = extractor.forward(example)?;
                parity::check("table", &expected, &table.evaluate(extractor.arch(), example)?)?;

                let reparsed = TableArtifact::parse(&table.to_string())?;
                parity::check("table", &expected, &reparsed.evaluate(extractor.arch(), example)?)?;

                Ok(ExportArtifact::Table(table))
            }
        }
    }
}

/// A finished, verified export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportArtifact {
    Graph(GraphArtifact),
    Table(TableArtifact),
}

impl ExportArtifact {
    pub fn backend(&self) -> Backend {
        match self {
            ExportArtifact::Graph(_) => Backend::GraphTrace,
            ExportArtifact::Table(_) => Backend::StaticTable,
        }
    }

    /// The artifact's on-disk contents.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            ExportArtifact::Graph(graph) => graph.to_bytes(),
            ExportArtifact::Table(table) => Ok(table.to_string().into_bytes()),
        }
    }
}
