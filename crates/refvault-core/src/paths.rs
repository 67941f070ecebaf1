//! Standard paths used by refvault

use std::path::{Path, PathBuf};

/// Standard refvault paths
pub struct Paths {
    /// Data directory (~/.local/share/refvault)
    pub data: PathBuf,
    /// Config directory (~/.config/refvault)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("refvault");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("refvault");

        Self { data, config }
    }

    /// Default location of the encrypted store
    pub fn store(&self) -> PathBuf {
        self.data.join("secrets.dat")
    }

    /// Default location of the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("refvault.yaml")
    }
}

/// Path of a file that lives beside `path`, named `<file name><suffix>`.
///
/// `secrets.dat` with suffix `.key` becomes `secrets.dat.key`.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", file_name, suffix))
}
