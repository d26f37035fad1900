//! Downstream ingestion port (driven/secondary port)

use anyhow::Result;

use crate::domain::ImportType;

/// Imports the content of one classified file
#[async_trait::async_trait]
pub trait IFileImporter: Send + Sync {
    /// Imports `content` as a file of `import_type`
    ///
    /// # Returns
    ///
    /// The number of data rows processed.
    ///
    /// # Errors
    ///
    /// Any failure; the dispatcher logs it and moves on to the next file.
    async fn import_file(
        &self,
        file_name: &str,
        import_type: &'static ImportType,
        content: Vec<u8>,
    ) -> Result<u64>;
}
