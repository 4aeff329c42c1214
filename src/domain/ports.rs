use crate::domain::model::GeographyNames;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location the operator sees for `path`.
    fn locate(&self, path: &str) -> PathBuf;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Longitude/latitude of a one-line address, if the service matched it.
    async fn coordinates(&self, address: &str) -> Result<Option<(f64, f64)>>;

    async fn geographies(&self, lon: f64, lat: f64) -> Result<GeographyNames>;
}

/// Operator interaction. Answers come back without the trailing newline.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<String>;

    fn say(&mut self, message: &str);
}

pub trait Printer: Send + Sync {
    fn print(&self, path: &std::path::Path) -> Result<()>;
}
