use crate::config::toml_config::AppConfig;
use crate::core::customer::CustomerRecord;
use crate::core::layout::{FormLayout, Values};
use crate::core::overlay::OverlayRenderer;
use crate::domain::ports::{Printer, Prompter, Storage};
use crate::utils::error::{PermitError, Result};
use crate::utils::prompt::ask_yes_no;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Where the engine reads customers and templates and writes filled forms.
#[derive(Debug, Clone)]
pub struct FormPaths {
    pub customer_file: PathBuf,
    pub template_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl FormPaths {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            customer_file: config.customer_file(),
            template_dir: config.template_dir(),
            output_dir: config.output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOutcome {
    pub path: PathBuf,
    pub printed: bool,
    pub deleted: bool,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct FormEngine<S: Storage, R: Printer> {
    storage: S,
    printer: R,
    paths: FormPaths,
    renderer: OverlayRenderer,
}

impl<S: Storage, R: Printer> FormEngine<S, R> {
    pub fn new(storage: S, printer: R, paths: FormPaths) -> Self {
        let renderer = OverlayRenderer::new(paths.template_dir.clone());
        Self {
            storage,
            printer,
            paths,
            renderer,
        }
    }

    pub async fn run<P: Prompter + ?Sized>(
        &self,
        layout: &FormLayout,
        today: NaiveDate,
        prompter: &mut P,
    ) -> Result<FormOutcome> {
        tracing::info!("Filling form '{}'", layout.form.id);

        // Extract
        let values = self.extract(layout, today, prompter).await?;

        // Transform
        let (name, pdf) = self.transform(layout, &values).await?;
        tracing::debug!("Rendered {} ({} bytes)", name, pdf.len());

        // Load
        self.load(layout, &name, &pdf, prompter).await
    }

    async fn extract<P: Prompter + ?Sized>(
        &self,
        layout: &FormLayout,
        today: NaiveDate,
        prompter: &mut P,
    ) -> Result<Values> {
        let raw = self
            .storage
            .read_file(&key(&self.paths.customer_file))
            .await?;
        let customer = CustomerRecord::parse(&String::from_utf8_lossy(&raw));
        if customer.name().is_empty() {
            return Err(PermitError::EmptyCustomerFile {
                path: self.paths.customer_file.display().to_string(),
            });
        }
        tracing::debug!("Loaded customer with {} lines", customer.lines().len());

        let mut values = customer.values(today);
        layout.collect_answers(&mut values, prompter)?;
        Ok(values)
    }

    async fn transform(&self, layout: &FormLayout, values: &Values) -> Result<(String, Vec<u8>)> {
        let name = layout.output_name(values)?;
        if name.is_empty() || name.starts_with('.') {
            return Err(PermitError::render(format!(
                "Output name for '{}' came out as '{}'",
                layout.form.id, name
            )));
        }

        let template_path = self.paths.template_dir.join(&layout.form.template);
        let template = self.storage.read_file(&key(&template_path)).await?;
        let plan = layout.plan(values)?;
        tracing::debug!(
            "Overlay has {} texts and {} marks",
            plan.texts.len(),
            plan.marks.len()
        );

        let pdf = self.renderer.render(&template, &plan, layout.form.flatten)?;
        Ok((name, pdf))
    }

    async fn load<P: Prompter + ?Sized>(
        &self,
        layout: &FormLayout,
        name: &str,
        pdf: &[u8],
        prompter: &mut P,
    ) -> Result<FormOutcome> {
        let output = key(&self.paths.output_dir.join(name));
        self.storage.write_file(&output, pdf).await?;
        let path = self.storage.locate(&output);
        prompter.say(&format!("PDF created and saved as '{}'", path.display()));

        let mut printed = false;
        if layout.form.offer_print {
            if ask_yes_no(prompter, "Do you want to print this PDF? (y/n): ")? {
                match self.printer.print(&path) {
                    Ok(()) => {
                        printed = true;
                        prompter.say("Sent to printer.");
                    }
                    Err(e) => {
                        tracing::warn!("Printing {} failed: {}", path.display(), e);
                        prompter.say(&format!("Could not print file: {}", e));
                    }
                }
            } else {
                prompter.say("Printing skipped.");
            }
        }

        let mut deleted = false;
        if ask_yes_no(prompter, &format!("Do you want to delete '{}'? (y/n): ", name))? {
            match self.storage.remove_file(&output).await {
                Ok(()) => {
                    deleted = true;
                    prompter.say(&format!("'{}' deleted.", name));
                }
                Err(e) => {
                    tracing::warn!("Deleting {} failed: {}", path.display(), e);
                    prompter.say(&format!("Could not delete file: {}", e));
                }
            }
        } else {
            prompter.say(&format!("'{}' kept.", name));
        }

        Ok(FormOutcome {
            path,
            printed,
            deleted,
        })
    }
}
