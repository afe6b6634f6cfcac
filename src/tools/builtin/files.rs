//! Local filesystem tools: `FILE_READER`, `FILE_WRITER`, `FILE_TREE`.
//!
//! Relative paths resolve against the configured workspace directory; `~`
//! is expanded.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::tools::spec::{ParamType, ParamValue, ParameterSpec, SpecError, ToolArgs, ToolSpec};
use crate::tools::traits::{Tool, ToolError};

/// Files larger than this are truncated in the observation.
const MAX_READ_BYTES: usize = 64 * 1024;

/// Entries listed per tree before the listing is cut short.
const MAX_TREE_ENTRIES: usize = 500;

fn resolve(workspace: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ToolError::InvalidInput("path cannot be empty".into()));
    }
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(workspace.join(expanded))
    }
}

// ---------------------------------------------------------------------------
// FILE_READER
// ---------------------------------------------------------------------------

pub struct FileReaderTool {
    spec: ToolSpec,
    workspace: PathBuf,
}

impl FileReaderTool {
    pub fn new(workspace: PathBuf) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "FILE_READER",
            "Read the contents of a text file and return them.",
            vec![ParameterSpec::required(
                "file_path",
                ParamType::String,
                "The path to the file to read.",
            )],
        )?;
        Ok(Self { spec, workspace })
    }
}

#[async_trait]
impl Tool for FileReaderTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path = resolve(&self.workspace, args.str("file_path")?)?;

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ToolError::Failed(format!("File '{}' does not exist.", path.display())))?;
        if !meta.is_file() {
            return Err(ToolError::Failed(format!(
                "Path '{}' is not a file.",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        let mut content = String::from_utf8(bytes)
            .map_err(|_| ToolError::Failed(format!("File '{}' is not valid UTF-8.", path.display())))?;

        if content.len() > MAX_READ_BYTES {
            let mut cut = MAX_READ_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("\n...[truncated]");
        }

        info!("Read file: {}", path.display());
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// FILE_WRITER
// ---------------------------------------------------------------------------

pub struct FileWriterTool {
    spec: ToolSpec,
    workspace: PathBuf,
}

impl FileWriterTool {
    pub fn new(workspace: PathBuf) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "FILE_WRITER",
            "Write content to a file, creating the file and parent directories if needed.",
            vec![
                ParameterSpec::required(
                    "file_path",
                    ParamType::String,
                    "Where to write. Missing directories are created.",
                ),
                ParameterSpec::required("content", ParamType::String, "The text to write. Must not be empty."),
                ParameterSpec::optional(
                    "mode",
                    ParamType::String,
                    "'w' to overwrite existing content, 'a' to append.",
                )
                .with_default(ParamValue::String("w".into())),
            ],
        )?;
        Ok(Self { spec, workspace })
    }
}

#[async_trait]
impl Tool for FileWriterTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path = resolve(&self.workspace, args.str("file_path")?)?;
        let content = args.str("content")?;
        let append = match args.str("mode")? {
            "w" => false,
            "a" => true,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "invalid mode '{}': use 'w' to write or 'a' to append",
                    other
                )))
            }
        };
        if content.trim().is_empty() {
            return Err(ToolError::InvalidInput("content cannot be empty".into()));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        info!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(format!(
            "{} {} bytes to {}",
            if append { "Appended" } else { "Written" },
            content.len(),
            path.display()
        ))
    }
}

// ---------------------------------------------------------------------------
// FILE_TREE
// ---------------------------------------------------------------------------

pub struct FileTreeTool {
    spec: ToolSpec,
    workspace: PathBuf,
}

impl FileTreeTool {
    pub fn new(workspace: PathBuf) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "FILE_TREE",
            "List files in a directory as a tree, with type and size of each entry.",
            vec![
                ParameterSpec::required("directory", ParamType::String, "The directory to list."),
                ParameterSpec::optional(
                    "depth",
                    ParamType::Integer,
                    "How many levels to descend (0 for all levels).",
                )
                .with_default(ParamValue::Integer(1)),
            ],
        )?;
        Ok(Self { spec, workspace })
    }
}

#[async_trait]
impl Tool for FileTreeTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let dir = resolve(&self.workspace, args.str("directory")?)?;
        let depth = args.int("depth")?;
        if depth < 0 {
            return Err(ToolError::InvalidInput("depth must be a non-negative integer".into()));
        }
        if !dir.is_dir() {
            return Err(ToolError::Failed(format!(
                "Path '{}' is not a directory.",
                dir.display()
            )));
        }

        // Directory walking is blocking std::fs work.
        let listing = tokio::task::spawn_blocking(move || {
            let mut out = format!("{}/\n", dir.display());
            let mut count = 0;
            walk(&dir, depth as usize, 0, &mut out, &mut count)?;
            if count >= MAX_TREE_ENTRIES {
                out.push_str("...[listing truncated]\n");
            }
            Ok::<_, std::io::Error>(out)
        })
        .await
        .map_err(|e| ToolError::Failed(format!("directory walk aborted: {}", e)))??;

        Ok(listing)
    }
}

fn walk(
    dir: &Path,
    max_depth: usize,
    level: usize,
    out: &mut String,
    count: &mut usize,
) -> std::io::Result<()> {
    if max_depth != 0 && level >= max_depth {
        return Ok(());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if *count >= MAX_TREE_ENTRIES {
            return Ok(());
        }
        *count += 1;

        let indent = "  ".repeat(level + 1);
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            let _ = writeln!(out, "{}{}/ [dir]", indent, name);
            walk(&entry.path(), max_depth, level + 1, out, count)?;
        } else {
            let _ = writeln!(out, "{}{} [file, {} bytes]", indent, name, meta.len());
        }
    }
    Ok(())
}
