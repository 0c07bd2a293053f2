use std::io;
use std::path::PathBuf;

/// Errors that can occur during orbit operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Couldn't find any package.json in {} or its parents", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Plugin {0} is already in the registry")]
    DuplicatePlugin(String),

    #[error("Couldn't find plugin {0}")]
    PluginNotFound(String),

    #[error("Failed to load plugin {id}: {message}")]
    PluginLoad { id: String, message: String },

    #[error("Hook `{hook}` of plugin {id} failed: {message}")]
    PluginHook {
        id: String,
        hook: String,
        message: String,
    },

    #[error("Configuration chain of plugin {id} failed: {message}")]
    ConfigurationMerge { id: String, message: String },

    #[error("Command `{command}` exited with {}: {stderr}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    CommandExecution {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Template path not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for orbit operations
pub type Result<T> = std::result::Result<T, Error>;
