//! File tool: sandboxed file system operations
//!
//! | Operation | Tag | Notes |
//! |-----------|-----|-------|
//! | `read_file` | `read_file` | size checked by stat before reading |
//! | `write_file` | `write_file` | extension allow-list |
//! | `list_files` | | glob filter, optional recursion |
//! | `delete_file` | | the root itself is protected |
//! | `move_file` | | destination extension checked |
//! | `get_file_info` | | optional SHA-256 |
//!
//! All paths are relative to [`FileToolConfig::sandbox_root`]. See
//! [`sandbox`] for how a path is resolved.

pub mod sandbox;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use suna_domain::{
    OperationSchema, ParamSpec, TagSpec, Tool, ToolContext, ToolError, ToolLifecycleError,
    ToolResult,
};
use tracing::{debug, info};

pub use sandbox::{FsMetadata, LocalFs, Sandbox, SandboxFs};

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_FILES: &str = "list_files";
pub const DELETE_FILE: &str = "delete_file";
pub const MOVE_FILE: &str = "move_file";
pub const GET_FILE_INFO: &str = "get_file_info";

/// Entries returned by one `list_files` call at most
const MAX_LIST_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolConfig {
    pub sandbox_root: PathBuf,
    /// Hard ceiling for reads, whatever the caller asks for
    pub max_file_size: u64,
    /// `max_size` applied when the caller gives none
    pub default_read_size: u64,
    /// Lower-case, with the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for FileToolConfig {
    fn default() -> Self {
        Self {
            sandbox_root: PathBuf::from("/tmp/suna-sandbox"),
            max_file_size: 10 * 1024 * 1024,
            default_read_size: 1024 * 1024,
            allowed_extensions: [
                ".txt", ".md", ".json", ".yaml", ".yml", ".xml", ".csv", ".log", ".js", ".ts",
                ".jsx", ".tsx", ".py", ".java", ".cpp", ".c", ".h", ".html", ".css", ".scss",
                ".sass", ".less", ".sql", ".sh", ".bat", ".dockerfile", ".gitignore", ".env",
                ".config", ".ini", ".toml", ".rs",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Encoding {
    Utf8,
    Base64,
}

impl Encoding {
    fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Base64 => "base64",
        }
    }
}

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
    encoding: Encoding,
    max_size: u64,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
    encoding: Encoding,
    create_dirs: bool,
}

#[derive(Deserialize)]
struct ListArgs {
    path: String,
    recursive: bool,
    include_hidden: bool,
    pattern: Option<String>,
}

#[derive(Deserialize)]
struct DeleteArgs {
    path: String,
    recursive: bool,
}

#[derive(Deserialize)]
struct MoveArgs {
    source: String,
    destination: String,
    overwrite: bool,
}

#[derive(Deserialize)]
struct InfoArgs {
    path: String,
    include_hash: bool,
}

#[derive(Debug, Serialize)]
struct ListedEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: &'static str,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

pub struct FileTool {
    config: FileToolConfig,
    fs: Arc<dyn SandboxFs>,
    /// Set by `init` once the root exists and is canonical
    sandbox: Option<Sandbox>,
}

impl FileTool {
    pub fn new(config: FileToolConfig) -> Self {
        Self::with_fs(config, Arc::new(LocalFs))
    }

    pub fn with_fs(config: FileToolConfig, fs: Arc<dyn SandboxFs>) -> Self {
        Self {
            config,
            fs,
            sandbox: None,
        }
    }

    fn sandbox(&self) -> Result<&Sandbox, ToolError> {
        self.sandbox
            .as_ref()
            .ok_or_else(|| ToolError::internal("file tool used before init"))
    }

    fn check_extension(&self, path: &Path) -> Result<(), ToolError> {
        let Some(ext) = path.extension() else {
            return Ok(());
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        if self.config.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(())
        } else {
            Err(ToolError::permission_denied(format!(
                "File extension '{ext}' not allowed"
            )))
        }
    }

    async fn stat(&self, path: &Path, shown: &str) -> Result<FsMetadata, ToolError> {
        self.fs
            .metadata(path)
            .await
            .map_err(|e| io_error("stat", shown, e))
    }

    async fn exists(&self, path: &Path) -> Result<bool, ToolError> {
        match self.fs.metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("stat", &path.to_string_lossy(), e)),
        }
    }

    async fn read_file(&self, args: ReadArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let path = sandbox.resolve(self.fs.as_ref(), &args.path).await?;

        let meta = self.stat(&path, &args.path).await?;
        if meta.is_dir {
            return Err(ToolError::invalid_argument(format!(
                "Path is a directory: {}",
                args.path
            )));
        }
        let limit = args.max_size.min(self.config.max_file_size);
        if meta.len > limit {
            return Err(ToolError::invalid_argument(format!(
                "File too large: {} bytes (max: {limit})",
                meta.len
            )));
        }

        let bytes = self
            .fs
            .read(&path)
            .await
            .map_err(|e| io_error("read file", &args.path, e))?;
        let content = match args.encoding {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|_| {
                ToolError::invalid_argument("File is not valid UTF-8; read it with base64 encoding")
            })?,
            Encoding::Base64 => BASE64.encode(bytes),
        };

        debug!(path = %args.path, size = meta.len, encoding = args.encoding.as_str(), "File read");
        Ok(json!({
            "content": content,
            "size": meta.len,
            "encoding": args.encoding.as_str(),
            "path": args.path,
        }))
    }

    async fn write_file(&self, args: WriteArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let path = sandbox.resolve_lexical(&args.path)?;
        self.check_extension(&path)?;
        let bytes = match args.encoding {
            Encoding::Utf8 => args.content.into_bytes(),
            Encoding::Base64 => BASE64
                .decode(args.content.as_bytes())
                .map_err(|e| ToolError::invalid_argument(format!("content is not valid base64: {e}")))?,
        };
        let path = sandbox.resolve(self.fs.as_ref(), &args.path).await?;

        if args.create_dirs {
            if let Some(parent) = path.parent() {
                self.fs
                    .create_dir_all(parent)
                    .await
                    .map_err(|e| io_error("create directories for", &args.path, e))?;
            }
        }
        self.fs
            .write(&path, &bytes)
            .await
            .map_err(|e| io_error("write file", &args.path, e))?;

        debug!(path = %args.path, size = bytes.len(), "File written");
        Ok(json!({
            "path": args.path,
            "size": bytes.len(),
            "encoding": args.encoding.as_str(),
        }))
    }

    async fn list_files(&self, args: ListArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let pattern = args
            .pattern
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| ToolError::invalid_argument(format!("Invalid glob pattern: {e}")))?;
        let dir = sandbox.resolve(self.fs.as_ref(), &args.path).await?;
        if !self.stat(&dir, &args.path).await?.is_dir {
            return Err(ToolError::invalid_argument(format!(
                "Not a directory: {}",
                args.path
            )));
        }

        let mut files = Vec::new();
        let mut truncated = false;
        let mut pending = vec![dir];
        'walk: while let Some(current) = pending.pop() {
            let mut names = self
                .fs
                .read_dir(&current)
                .await
                .map_err(|e| io_error("list directory", &args.path, e))?;
            names.sort();

            for name in names {
                if !args.include_hidden && name.starts_with('.') {
                    continue;
                }
                let full = current.join(&name);
                let Ok(meta) = self.fs.metadata(&full).await else {
                    continue;
                };
                if args.recursive && meta.is_dir && !meta.is_symlink {
                    pending.push(full.clone());
                }
                if pattern.as_ref().is_some_and(|p| !p.matches(&name)) {
                    continue;
                }
                if files.len() == MAX_LIST_ENTRIES {
                    truncated = true;
                    break 'walk;
                }
                files.push(ListedEntry {
                    path: sandbox.relative(&full),
                    name,
                    kind: if meta.is_dir { "directory" } else { "file" },
                    size: meta.len,
                    modified: meta.modified.map(|m| m.to_rfc3339()),
                });
            }
        }

        debug!(path = %args.path, count = files.len(), recursive = args.recursive, "Directory listed");
        Ok(json!({
            "path": args.path,
            "count": files.len(),
            "files": files,
            "truncated": truncated,
        }))
    }

    async fn delete_file(&self, args: DeleteArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let path = sandbox.resolve(self.fs.as_ref(), &args.path).await?;
        if path == sandbox.root() {
            return Err(ToolError::permission_denied("Refusing to delete the sandbox root"));
        }

        let meta = self.stat(&path, &args.path).await?;
        let kind = if meta.is_dir && !meta.is_symlink {
            self.fs
                .remove_dir(&path, args.recursive)
                .await
                .map_err(|e| io_error("delete directory", &args.path, e))?;
            "directory"
        } else {
            self.fs
                .remove_file(&path)
                .await
                .map_err(|e| io_error("delete file", &args.path, e))?;
            "file"
        };

        info!(path = %args.path, kind, "Deleted");
        Ok(json!({ "path": args.path, "deleted": true, "type": kind }))
    }

    async fn move_file(&self, args: MoveArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let source = sandbox.resolve_lexical(&args.source)?;
        let destination = sandbox.resolve_lexical(&args.destination)?;
        self.check_extension(&destination)?;
        if source == sandbox.root() {
            return Err(ToolError::permission_denied("Refusing to move the sandbox root"));
        }

        let source = sandbox.resolve(self.fs.as_ref(), &args.source).await?;
        let destination = sandbox.resolve(self.fs.as_ref(), &args.destination).await?;

        self.stat(&source, &args.source).await?;
        if !args.overwrite && self.exists(&destination).await? {
            return Err(ToolError::invalid_argument(format!(
                "Destination already exists: {}",
                args.destination
            )));
        }
        if let Some(parent) = destination.parent() {
            self.fs
                .create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directories for", &args.destination, e))?;
        }
        self.fs
            .rename(&source, &destination)
            .await
            .map_err(|e| io_error("move file", &args.source, e))?;

        info!(source = %args.source, destination = %args.destination, "Moved");
        Ok(json!({ "source": args.source, "destination": args.destination }))
    }

    async fn get_file_info(&self, args: InfoArgs) -> Result<Value, ToolError> {
        let sandbox = self.sandbox()?;
        let path = sandbox.resolve(self.fs.as_ref(), &args.path).await?;
        let meta = self.stat(&path, &args.path).await?;

        let mut info = json!({
            "path": args.path,
            "type": if meta.is_dir { "directory" } else { "file" },
            "size": meta.len,
            "readonly": meta.readonly,
            "symlink": meta.is_symlink,
            "modified": meta.modified.map(|m| m.to_rfc3339()),
            "created": meta.created.map(|m| m.to_rfc3339()),
        });

        if args.include_hash && !meta.is_dir {
            if meta.len > self.config.max_file_size {
                return Err(ToolError::invalid_argument(format!(
                    "File too large to hash: {} bytes (max: {})",
                    meta.len, self.config.max_file_size
                )));
            }
            let bytes = self
                .fs
                .read(&path)
                .await
                .map_err(|e| io_error("read file", &args.path, e))?;
            info["hash"] = Value::from(hex::encode(Sha256::digest(&bytes)));
            info["hash_algorithm"] = Value::from("sha256");
        }
        Ok(info)
    }
}

fn io_error(action: &str, shown: &str, err: io::Error) -> ToolError {
    match err.kind() {
        io::ErrorKind::NotFound => ToolError::not_found(format!("File not found: {shown}")),
        io::ErrorKind::PermissionDenied => {
            ToolError::permission_denied(format!("Permission denied: {shown}"))
        }
        _ => ToolError::execution_failed(format!("Failed to {action} {shown}: {err}")),
    }
}

fn encoding_param() -> ParamSpec {
    ParamSpec::one_of("encoding", ["utf8", "base64"], "File encoding").with_default("utf8")
}

fn operation_schemas(config: &FileToolConfig) -> Vec<OperationSchema> {
    vec![
        OperationSchema::new(READ_FILE, "Read the contents of a file")
            .param(ParamSpec::string("path", "Path to the file to read").required())
            .param(encoding_param())
            .param(
                ParamSpec::integer("max_size", "Maximum file size in bytes")
                    .with_default(config.default_read_size),
            )
            .example(json!({"path": "example.txt"}))
            .example(json!({"path": "data.json", "encoding": "utf8"}))
            .with_tag(TagSpec::new(READ_FILE).with_description("Read file contents")),
        OperationSchema::new(WRITE_FILE, "Write content to a file")
            .param(ParamSpec::string("path", "Path to the file to write").required())
            .param(ParamSpec::string("content", "Content to write to the file").required())
            .param(encoding_param())
            .param(
                ParamSpec::boolean("create_dirs", "Create parent directories if they don't exist")
                    .with_default(true),
            )
            .example(json!({"path": "output.txt", "content": "Hello World"}))
            .with_tag(TagSpec::new(WRITE_FILE).with_description("Write content to file")),
        OperationSchema::new(LIST_FILES, "List files and directories")
            .param(ParamSpec::string("path", "Directory path to list").with_default("."))
            .param(ParamSpec::boolean("recursive", "List files recursively").with_default(false))
            .param(
                ParamSpec::boolean("include_hidden", "Include hidden files").with_default(false),
            )
            .param(ParamSpec::string("pattern", "Glob pattern to filter file names"))
            .example(json!({"path": "."}))
            .example(json!({"path": "src", "recursive": true})),
        OperationSchema::new(DELETE_FILE, "Delete a file or directory")
            .param(ParamSpec::string("path", "Path to the file or directory to delete").required())
            .param(
                ParamSpec::boolean("recursive", "Delete directories recursively").with_default(false),
            )
            .example(json!({"path": "temp.txt"})),
        OperationSchema::new(MOVE_FILE, "Move or rename a file")
            .param(ParamSpec::string("source", "Source file path").required())
            .param(ParamSpec::string("destination", "Destination file path").required())
            .param(
                ParamSpec::boolean("overwrite", "Overwrite destination if it exists")
                    .with_default(false),
            )
            .example(json!({"source": "old.txt", "destination": "new.txt"})),
        OperationSchema::new(GET_FILE_INFO, "Get file or directory information")
            .param(ParamSpec::string("path", "Path to the file or directory").required())
            .param(
                ParamSpec::boolean("include_hash", "Include a SHA-256 hash of the file")
                    .with_default(false),
            )
            .example(json!({"path": "example.txt", "include_hash": true})),
    ]
}

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &str {
        "file_operations"
    }

    fn description(&self) -> &str {
        "Perform file system operations like read, write, list, delete, and move files"
    }

    async fn init(&mut self) -> Result<(), ToolLifecycleError> {
        let root = &self.config.sandbox_root;
        if !root.is_absolute() {
            return Err(ToolLifecycleError::Other(format!(
                "sandbox root must be absolute: {}",
                root.display()
            )));
        }
        let io_err = |source| ToolLifecycleError::Io {
            path: root.display().to_string(),
            source,
        };
        self.fs.create_dir_all(root).await.map_err(io_err)?;
        let canonical = self.fs.canonicalize(root).await.map_err(io_err)?;

        info!(
            sandbox_root = %canonical.display(),
            allowed_extensions = self.config.allowed_extensions.len(),
            "File tool initialized"
        );
        self.sandbox = Some(Sandbox::new(canonical));
        Ok(())
    }

    fn schemas(&self) -> Vec<OperationSchema> {
        operation_schemas(&self.config)
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Value,
        _context: Option<&ToolContext>,
    ) -> ToolResult {
        let schemas = operation_schemas(&self.config);
        let Some(schema) = suna_domain::tool::find_operation(&schemas, operation) else {
            return ToolResult::unknown_operation(self.name(), operation);
        };

        let outcome = match operation {
            READ_FILE => match schema.parse(params) {
                Ok(args) => self.read_file(args).await,
                Err(e) => Err(e.into()),
            },
            WRITE_FILE => match schema.parse(params) {
                Ok(args) => self.write_file(args).await,
                Err(e) => Err(e.into()),
            },
            LIST_FILES => match schema.parse(params) {
                Ok(args) => self.list_files(args).await,
                Err(e) => Err(e.into()),
            },
            DELETE_FILE => match schema.parse(params) {
                Ok(args) => self.delete_file(args).await,
                Err(e) => Err(e.into()),
            },
            MOVE_FILE => match schema.parse(params) {
                Ok(args) => self.move_file(args).await,
                Err(e) => Err(e.into()),
            },
            GET_FILE_INFO => match schema.parse(params) {
                Ok(args) => self.get_file_info(args).await,
                Err(e) => Err(e.into()),
            },
            other => return ToolResult::unknown_operation(self.name(), other),
        };

        match outcome {
            Ok(data) => ToolResult::success(data),
            Err(e) => {
                debug!(operation, error = %e, "File operation failed");
                ToolResult::failure(e)
            }
        }
    }
}
