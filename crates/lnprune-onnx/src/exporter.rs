//! Export drivers producing ONNX graphs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use lnprune_ir::{ExportError, ExportedGraph, Exporter};

use crate::decode::{decode_model, load_model};

/// Placeholder replaced by the temporary output path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Placeholder replaced by the comma-separated input shape.
pub const SHAPE_PLACEHOLDER: &str = "{shape}";

/// An ONNX file that was exported ahead of time.
#[derive(Clone, Debug)]
pub struct OnnxFile {
    path: PathBuf,
}

impl OnnxFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for OnnxFile {
    fn export_graph(&self, input_shape: &[usize]) -> Result<ExportedGraph, ExportError> {
        log::debug!(
            "loading pre-exported graph {} (requested input shape {input_shape:?})",
            self.path.display()
        );
        Ok(load_model(&self.path)?)
    }
}

/// Runs an external exporter program that writes an ONNX model.
///
/// The program receives the path of a fresh temporary file through the
/// `{output}` placeholder (appended as the last argument when no argument
/// mentions it) and the input shape through `{shape}`, e.g.
/// `python export.py --shape {shape} --out {output}`. The temporary file is
/// removed when the export returns, whether it succeeded or not.
#[derive(Clone, Debug)]
pub struct CommandExporter {
    program: OsString,
    args: Vec<String>,
}

impl CommandExporter {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument; may contain placeholders.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The argument list after placeholder substitution.
    pub fn expand_args(&self, output: &Path, input_shape: &[usize]) -> Vec<String> {
        let output = output.to_string_lossy();
        let shape = input_shape
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(SHAPE_PLACEHOLDER, &shape)
            })
            .collect();
        if !self.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            args.push(output.into_owned());
        }
        args
    }
}

impl Exporter for CommandExporter {
    fn export_graph(&self, input_shape: &[usize]) -> Result<ExportedGraph, ExportError> {
        let artifact = tempfile::Builder::new()
            .prefix("lnprune-")
            .suffix(".onnx")
            .tempfile()?;
        let args = self.expand_args(artifact.path(), input_shape);
        log::info!(
            "exporting graph: {} {}",
            self.program.to_string_lossy(),
            args.join(" ")
        );

        let output = Command::new(&self.program).args(&args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Untraceable(format!(
                "exporter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(artifact.path())?;
        if bytes.is_empty() {
            return Err(ExportError::Malformed(
                "exporter wrote an empty file".into(),
            ));
        }
        Ok(decode_model(&bytes)?)
    }
}
