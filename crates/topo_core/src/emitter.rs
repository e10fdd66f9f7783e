//! Graph emitters.
//!
//! An emitter receives a finished [`StackGraph`] and turns it into
//! something a provisioning engine can consume. The builder only knows the
//! [`GraphEmitter`] trait, so tests swap in a capturing fake.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TopologyError, TopologyResult};
use crate::graph::StackGraph;
use crate::template::{render, render_to_string, TemplateFormat};

/// Default cloud assembly directory.
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

/// Cloud assembly schema version written to the manifest.
pub const ASSEMBLY_VERSION: &str = "36.0.0";

/// Artifact type of a deployable stack.
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Something that accepts a completed stack graph.
pub trait GraphEmitter {
    fn emit(&self, graph: &StackGraph) -> TopologyResult<()>;
}

/// Manifest describing the artifacts in a cloud assembly directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub version: String,
    pub artifacts: BTreeMap<String, ArtifactManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub display_name: String,
    pub properties: ArtifactProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    pub template_file: String,
}

impl AssemblyManifest {
    pub const FILE_NAME: &'static str = "manifest.json";

    /// Read the manifest of an assembly directory.
    pub fn read(dir: &Path) -> TopologyResult<Self> {
        let content = fs::read_to_string(dir.join(Self::FILE_NAME))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Writes a cloud assembly: one template per stack plus `manifest.json`.
pub struct AssemblyEmitter {
    out_dir: PathBuf,
}

impl AssemblyEmitter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// File name of the template written for a stack.
    pub fn template_file(stack_name: &str) -> String {
        format!("{}.template.json", stack_name)
    }

    fn write(&self, path: &Path, content: &str) -> TopologyResult<()> {
        fs::write(path, content)
            .map_err(|e| TopologyError::Emit(format!("writing {:?}: {}", path, e)))?;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

impl Default for AssemblyEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_OUT_DIR)
    }
}

impl GraphEmitter for AssemblyEmitter {
    fn emit(&self, graph: &StackGraph) -> TopologyResult<()> {
        info!("Synthesizing {} into {:?}", graph.stack_name(), self.out_dir);

        // Both documents are rendered before anything touches the directory.
        let template_file = Self::template_file(graph.stack_name());
        let template = serde_json::to_string_pretty(&render(graph)?)?;

        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            graph.stack_name().to_string(),
            ArtifactManifest {
                artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                environment: graph.environment().uri(),
                display_name: graph.stack_name().to_string(),
                properties: ArtifactProperties {
                    template_file: template_file.clone(),
                },
            },
        );
        let manifest = serde_json::to_string_pretty(&AssemblyManifest {
            version: ASSEMBLY_VERSION.to_string(),
            artifacts,
        })?;

        fs::create_dir_all(&self.out_dir).map_err(|e| {
            TopologyError::Emit(format!("creating {:?}: {}", self.out_dir, e))
        })?;
        self.write(&self.out_dir.join(&template_file), &template)?;
        self.write(&self.out_dir.join(AssemblyManifest::FILE_NAME), &manifest)?;

        Ok(())
    }
}

/// Renders the template into any writer, e.g. stdout.
pub struct WriterEmitter<W: Write> {
    writer: Mutex<W>,
    format: TemplateFormat,
}

impl<W: Write> WriterEmitter<W> {
    pub fn new(writer: W, format: TemplateFormat) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> GraphEmitter for WriterEmitter<W> {
    fn emit(&self, graph: &StackGraph) -> TopologyResult<()> {
        let text = render_to_string(graph, self.format)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", text.trim_end())
            .and_then(|_| writer.flush())
            .map_err(|e| TopologyError::Emit(e.to_string()))
    }
}
