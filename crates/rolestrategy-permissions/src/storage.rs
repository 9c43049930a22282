//! Storage integration for role strategy configuration
//!
//! This module provides persistence for the declarative role document.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::StrategyDocument;
use crate::error::{Error, Result};

/// Configuration file format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Detect the format of a path
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::UnsupportedFormat(format!(
                "'{}' (use .yaml, .yml, or .json)",
                other
            ))),
        }
    }

    fn parse(self, content: &str) -> Result<StrategyDocument> {
        match self {
            Self::Yaml => StrategyDocument::from_yaml_str(content),
            Self::Json => StrategyDocument::from_json_str(content),
        }
    }

    fn render(self, document: &StrategyDocument) -> Result<String> {
        match self {
            Self::Yaml => document.to_yaml_string(),
            Self::Json => document.to_json_string(),
        }
    }
}

/// Repository trait for storing and retrieving the role document
pub trait RoleStrategyRepository: Send + Sync {
    /// Load the role document from storage
    fn load_document(&self) -> Result<StrategyDocument>;

    /// Save the role document to storage
    fn save_document(&self, document: &StrategyDocument) -> Result<()>;
}

/// File-based role strategy repository
#[derive(Debug, Clone)]
pub struct FileRoleStrategyRepository {
    path: PathBuf,
    format: DocumentFormat,
}

impl FileRoleStrategyRepository {
    /// Create a repository for a `.yaml`, `.yml` or `.json` file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = DocumentFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    /// Create a repository using `role-strategy.yaml` under a directory
    pub fn with_defaults<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            path: base_path.as_ref().join("role-strategy.yaml"),
            format: DocumentFormat::Yaml,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format of the backing file
    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

impl RoleStrategyRepository for FileRoleStrategyRepository {
    fn load_document(&self) -> Result<StrategyDocument> {
        if !self.path.exists() {
            return Ok(StrategyDocument::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        self.format.parse(&content)
    }

    fn save_document(&self, document: &StrategyDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = self.format.render(document)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory role strategy repository (for testing)
#[derive(Debug, Default)]
pub struct InMemoryRoleStrategyRepository {
    document: RwLock<StrategyDocument>,
}

impl InMemoryRoleStrategyRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding `document`
    pub fn with_document(document: StrategyDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }
}

impl RoleStrategyRepository for InMemoryRoleStrategyRepository {
    fn load_document(&self) -> Result<StrategyDocument> {
        Ok(self.document.read().clone())
    }

    fn save_document(&self, document: &StrategyDocument) -> Result<()> {
        *self.document.write() = document.canonical();
        Ok(())
    }
}
