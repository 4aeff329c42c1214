use crate::domain::model::normalize_township;
use crate::utils::error::{PermitError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub geocoder: GeocoderConfig,
    pub boundaries: Vec<BoundaryEntry>,
    pub reminders: Vec<Reminder>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub customer_file: PathBuf,
    pub fee_table: PathBuf,
    pub template_dir: PathBuf,
    pub output_dir: PathBuf,
    pub layouts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyPreference {
    CountySubdivision,
    Place,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub benchmark: String,
    pub vintage: String,
    pub timeout_seconds: u64,
    pub prefer: GeographyPreference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryEntry {
    pub name: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub townships: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Split like a shell command line; `{path}` is replaced by the PDF path,
    /// which is also exported as `PERMIT_DESK_FILE`.
    pub print_command: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            geocoder: GeocoderConfig::default(),
            boundaries: default_boundaries(),
            reminders: default_reminders(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            customer_file: PathBuf::from("Customer_data.txt"),
            fee_table: PathBuf::from("Permit_fee_check.txt"),
            template_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            layouts_dir: None,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://geocoding.geo.census.gov/geocoder".to_string(),
            benchmark: "Public_AR_Current".to_string(),
            vintage: "Current_Current".to_string(),
            timeout_seconds: 10,
            prefer: GeographyPreference::CountySubdivision,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let print_command = if cfg!(windows) {
            r#"powershell -NoProfile -Command "Start-Process -FilePath $env:PERMIT_DESK_FILE -Verb Print""#
        } else {
            "lp {path}"
        };
        Self {
            print_command: print_command.to_string(),
        }
    }
}

fn default_boundaries() -> Vec<BoundaryEntry> {
    [
        ("Williamsville", "williamsville.geojson"),
        ("Sloan", "sloan.geojson"),
        ("Pendleton", "pendleton.geojson"),
        ("Kenmore", "kenmore.geojson"),
        ("Depew", "depew.geojson"),
        ("Orchard Park village", "orchard_park.geojson"),
        ("Akron", "akron.geojson"),
        ("Sanborn", "sanborn.geojson"),
        ("Angola", "angola.geojson"),
        ("Derby", "derby.geojson"),
        ("Youngstown", "youngstown.geojson"),
    ]
    .into_iter()
    .map(|(name, file)| BoundaryEntry {
        name: name.to_string(),
        file: PathBuf::from(file),
    })
    .collect()
}

fn default_reminders() -> Vec<Reminder> {
    vec![
        Reminder {
            townships: vec!["clarence".to_string(), "orchard park town".to_string()],
            message: "print signed estimate invoice".to_string(),
        },
        Reminder {
            townships: vec!["north tonawanda city".to_string()],
            message: "inspection: send job info to the city inspector".to_string(),
        },
        Reminder {
            townships: vec!["niagara falls city".to_string()],
            message: "inspection: send pictures".to_string(),
        },
    ]
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PermitError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Falls back to the built-in defaults when `path` does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::info!(
                "No configuration at {}, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| PermitError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    pub fn customer_file(&self) -> PathBuf {
        self.resolve(&self.paths.customer_file)
    }

    pub fn fee_table(&self) -> PathBuf {
        self.resolve(&self.paths.fee_table)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.resolve(&self.paths.template_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    pub fn layouts_dir(&self) -> Option<PathBuf> {
        self.paths.layouts_dir.as_deref().map(|p| self.resolve(p))
    }

    pub fn boundary_files(&self) -> impl Iterator<Item = (&str, PathBuf)> {
        self.boundaries
            .iter()
            .map(|entry| (entry.name.as_str(), self.resolve(&entry.file)))
    }

    pub fn reminders_for(&self, township: &str) -> Vec<&str> {
        let key = normalize_township(township);
        self.reminders
            .iter()
            .filter(|r| r.townships.iter().any(|t| normalize_township(t) == key))
            .map(|r| r.message.as_str())
            .collect()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("geocoder.base_url", &self.geocoder.base_url)?;
        validation::validate_non_empty_string("geocoder.benchmark", &self.geocoder.benchmark)?;
        validation::validate_non_empty_string("geocoder.vintage", &self.geocoder.vintage)?;
        validation::validate_range(
            "geocoder.timeout_seconds",
            self.geocoder.timeout_seconds,
            1,
            120,
        )?;

        validation::validate_path("paths.base_dir", &self.paths.base_dir)?;
        validation::validate_path("paths.customer_file", &self.paths.customer_file)?;
        validation::validate_path("paths.fee_table", &self.paths.fee_table)?;
        validation::validate_path("paths.template_dir", &self.paths.template_dir)?;
        validation::validate_path("paths.output_dir", &self.paths.output_dir)?;

        for entry in &self.boundaries {
            validation::validate_non_empty_string("boundaries.name", &entry.name)?;
        }
        let files: Vec<&Path> = self.boundaries.iter().map(|b| b.file.as_path()).collect();
        validation::validate_file_extensions("boundaries.file", &files, &["geojson", "json"])?;

        validation::validate_non_empty_string("output.print_command", &self.output.print_command)?;
        if shell_words::split(&self.output.print_command).is_err() {
            return Err(PermitError::InvalidConfigValueError {
                field: "output.print_command".to_string(),
                value: self.output.print_command.clone(),
                reason: "Unbalanced quotes".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
