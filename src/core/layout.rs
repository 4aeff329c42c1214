//! Permit form layouts.
//!
//! A layout names a PDF template, the questions to ask the operator, and
//! where each piece of text or check mark lands on the first page. Positions
//! are in inches measured from the top-left corner of the page.

use crate::core::customer::VALUE_KEYS;
use crate::domain::ports::Prompter;
use crate::utils::error::{PermitError, Result};
use crate::utils::prompt::{ask_choice, is_yes};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

const BUILTIN_LAYOUTS: &[(&str, &str)] = &[
    ("amherst", include_str!("../../layouts/amherst.toml")),
    ("cheektowaga", include_str!("../../layouts/cheektowaga.toml")),
    ("clarence", include_str!("../../layouts/clarence.toml")),
    ("lockport", include_str!("../../layouts/lockport.toml")),
    ("niagara_falls", include_str!("../../layouts/niagara_falls.toml")),
    ("orchard_park", include_str!("../../layouts/orchard_park.toml")),
    ("williamsville", include_str!("../../layouts/williamsville.toml")),
    ("cover_sheet", include_str!("../../layouts/cover_sheet.toml")),
];

fn default_font_size() -> f32 {
    10.0
}

fn default_mark_size() -> f32 {
    8.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormLayout {
    pub form: FormSection,
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub marks: Vec<MarkSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSection {
    pub id: String,
    pub title: String,
    pub template: String,
    pub output_name: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_true")]
    pub offer_print: bool,
    #[serde(default)]
    pub flatten: bool,
    pub signature: Option<SignatureSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSpec {
    pub image: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    #[default]
    Text,
    YesNo,
    Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub key: String,
    pub question: String,
    #[serde(default)]
    pub kind: PromptKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub when: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: Option<f32>,
    pub when: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStyle {
    #[default]
    Box,
    Check,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkSpec {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_mark_size")]
    pub size: f32,
    #[serde(default)]
    pub style: MarkStyle,
    pub gray: Option<f32>,
    pub when: Option<String>,
}

/// Answers and customer values available to templates and conditions.
pub type Values = HashMap<String, String>;

/// Empty and "no" count as false.
pub fn truthy(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !v.eq_ignore_ascii_case("no"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Set(String),
    Unset(String),
    Equals(String, String),
    NotEquals(String, String),
}

/// `key`, `!key`, `key=value` or `key!=value`, joined with `&&`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    tests: Vec<Test>,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self> {
        let mut tests = Vec::new();
        for part in source.split("&&").map(str::trim) {
            let test = if let Some((key, value)) = part.split_once("!=") {
                Test::NotEquals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = part.split_once('=') {
                Test::Equals(key.trim().to_string(), value.trim().to_string())
            } else if let Some(key) = part.strip_prefix('!') {
                Test::Unset(key.trim().to_string())
            } else {
                Test::Set(part.to_string())
            };
            let key = match &test {
                Test::Set(k) | Test::Unset(k) | Test::Equals(k, _) | Test::NotEquals(k, _) => k,
            };
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(PermitError::config(
                    "layout",
                    format!("Malformed condition '{}'", source),
                ));
            }
            tests.push(test);
        }
        Ok(Self { tests })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|test| match test {
            Test::Set(k) | Test::Unset(k) | Test::Equals(k, _) | Test::NotEquals(k, _) => {
                k.as_str()
            }
        })
    }

    pub fn holds(&self, values: &Values) -> bool {
        self.tests.iter().all(|test| match test {
            Test::Set(key) => truthy(values.get(key).map(String::as_str)),
            Test::Unset(key) => !truthy(values.get(key).map(String::as_str)),
            Test::Equals(key, expected) => values
                .get(key)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected)),
            Test::NotEquals(key, expected) => !values
                .get(key)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected)),
        })
    }
}

fn condition_holds(when: Option<&str>, values: &Values) -> Result<bool> {
    match when {
        Some(source) => Ok(Condition::parse(source)?.holds(values)),
        None => Ok(true),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Alternatives; the first non-empty value wins.
    Value(Vec<String>),
}

/// Text with `{key}` and `{first|fallback}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let malformed =
            || PermitError::config("layout", format!("Malformed template '{}'", source));

        let mut segments = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(malformed)?;
            let keys: Vec<String> = after[..close]
                .split('|')
                .map(|k| k.trim().to_string())
                .collect();
            if keys.iter().any(|k| k.is_empty() || k.contains('{')) {
                return Err(malformed());
            }
            segments.push(Segment::Value(keys));
            rest = &after[close + 1..];
        }
        if rest.contains('}') {
            return Err(malformed());
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flat_map(|segment| match segment {
            Segment::Value(keys) => keys.iter().map(String::as_str).collect::<Vec<_>>(),
            Segment::Literal(_) => Vec::new(),
        })
    }

    pub fn render(&self, values: &Values) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value(keys) => {
                    if let Some(value) = keys
                        .iter()
                        .filter_map(|k| values.get(k))
                        .map(|v| v.trim())
                        .find(|v| !v.is_empty())
                    {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    /// True when every placeholder came out empty.
    fn renders_empty(&self, values: &Values) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Literal(_) => true,
            Segment::Value(keys) => keys
                .iter()
                .filter_map(|k| values.get(k))
                .all(|v| v.trim().is_empty()),
        }) && self
            .segments
            .iter()
            .any(|segment| matches!(segment, Segment::Value(_)))
    }
}

/// Text placed on the page, positions still in inches from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMark {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub style: MarkStyle,
    pub gray: Option<f32>,
}

/// Everything the overlay renderer needs for one form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPlan {
    pub texts: Vec<PlacedText>,
    pub marks: Vec<PlacedMark>,
    pub signature: Option<SignatureSpec>,
}

impl FormLayout {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let layout: FormLayout = toml::from_str(content)
            .map_err(|e| PermitError::config("layout", format!("Invalid layout: {}", e)))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            PermitError::ConfigValidationError { message, .. } => {
                PermitError::config(path.display().to_string(), message)
            }
            other => other,
        })
    }

    /// Ask each prompt in order. A prompt whose condition does not hold takes
    /// its default, or the empty string.
    pub fn collect_answers<P: Prompter + ?Sized>(
        &self,
        values: &mut Values,
        prompter: &mut P,
    ) -> Result<()> {
        for (key, value) in &self.constants {
            values.insert(key.clone(), value.clone());
        }

        for prompt in &self.prompts {
            if !condition_holds(prompt.when.as_deref(), values)? {
                let fallback = prompt.default.clone().unwrap_or_default();
                tracing::debug!("Skipping prompt '{}', using '{}'", prompt.key, fallback);
                values.insert(prompt.key.clone(), fallback);
                continue;
            }

            let answer = match prompt.kind {
                PromptKind::Text => prompter.ask(&prompt.question)?.trim().to_string(),
                PromptKind::YesNo => {
                    let answer = prompter.ask(&prompt.question)?;
                    let flag = if is_yes(&answer) { "yes" } else { "no" };
                    flag.to_string()
                }
                PromptKind::Choice => ask_choice(prompter, &prompt.question, &prompt.options)?,
            };
            values.insert(prompt.key.clone(), answer);
        }
        Ok(())
    }

    pub fn plan(&self, values: &Values) -> Result<OverlayPlan> {
        let mut plan = OverlayPlan {
            signature: self.form.signature.clone(),
            ..OverlayPlan::default()
        };

        for field in &self.fields {
            if !condition_holds(field.when.as_deref(), values)? {
                continue;
            }
            let template = Template::parse(&field.text)?;
            if template.renders_empty(values) {
                continue;
            }
            plan.texts.push(PlacedText {
                x: field.x,
                y: field.y,
                font_size: field.font_size.unwrap_or(self.form.font_size),
                text: template.render(values),
            });
        }

        for mark in &self.marks {
            if condition_holds(mark.when.as_deref(), values)? {
                plan.marks.push(PlacedMark {
                    x: mark.x,
                    y: mark.y,
                    size: mark.size,
                    style: mark.style,
                    gray: mark.gray,
                });
            }
        }
        Ok(plan)
    }

    /// Output file name with path separators replaced.
    pub fn output_name(&self, values: &Values) -> Result<String> {
        let name = Template::parse(&self.form.output_name)?.render(values);
        let name: String = name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
            .collect();
        Ok(name.trim().to_string())
    }

    fn known_keys(&self) -> HashSet<&str> {
        VALUE_KEYS
            .iter()
            .copied()
            .chain(self.constants.keys().map(String::as_str))
            .chain(self.prompts.iter().map(|p| p.key.as_str()))
            .collect()
    }

    fn check_keys<'a>(
        &self,
        known: &HashSet<&str>,
        keys: impl Iterator<Item = &'a str>,
        place: &str,
    ) -> Result<()> {
        for key in keys {
            if !known.contains(key) {
                return Err(PermitError::config(
                    &format!("{}.{}", self.form.id, place),
                    &format!("Unknown value '{}'", key),
                ));
            }
        }
        Ok(())
    }
}

impl Validate for FormLayout {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("form.id", &self.form.id)?;
        validate_non_empty_string("form.template", &self.form.template)?;
        validate_non_empty_string("form.output_name", &self.form.output_name)?;
        validate_range("form.font_size", self.form.font_size as f64, 4.0, 72.0)?;

        let known = self.known_keys();
        self.check_keys(&known, Template::parse(&self.form.output_name)?.keys(), "output_name")?;

        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            if !seen.insert(prompt.key.as_str()) {
                return Err(PermitError::config(
                    &format!("{}.prompts", self.form.id),
                    &format!("Duplicate prompt key '{}'", prompt.key),
                ));
            }
            if prompt.kind == PromptKind::Choice && prompt.options.is_empty() {
                return Err(PermitError::config(
                    &format!("{}.prompts.{}", self.form.id, prompt.key),
                    "Choice prompts need options",
                ));
            }
            if let Some(when) = &prompt.when {
                self.check_keys(&known, Condition::parse(when)?.keys(), "prompts")?;
            }
        }

        for field in &self.fields {
            self.check_keys(&known, Template::parse(&field.text)?.keys(), "fields")?;
            if let Some(when) = &field.when {
                self.check_keys(&known, Condition::parse(when)?.keys(), "fields")?;
            }
        }

        for mark in &self.marks {
            validate_range("marks.size", mark.size as f64, 1.0, 72.0)?;
            if let Some(gray) = mark.gray {
                validate_range("marks.gray", gray as f64, 0.0, 1.0)?;
            }
            if let Some(when) = &mark.when {
                self.check_keys(&known, Condition::parse(when)?.keys(), "marks")?;
            }
        }
        Ok(())
    }
}

/// Built-in layouts, replaced by any file in the layouts directory that
/// declares the same form id.
#[derive(Debug, Clone, Default)]
pub struct LayoutCatalog {
    layouts: BTreeMap<String, FormLayout>,
}

impl LayoutCatalog {
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::default();
        for (name, source) in BUILTIN_LAYOUTS {
            let layout = FormLayout::from_toml_str(source).map_err(|e| {
                PermitError::render(&format!("Built-in layout {} is broken: {}", name, e))
            })?;
            catalog.insert(layout);
        }
        Ok(catalog)
    }

    pub fn load(layouts_dir: Option<&Path>) -> Result<Self> {
        let mut catalog = Self::builtin()?;
        let Some(dir) = layouts_dir else {
            return Ok(catalog);
        };
        if !dir.is_dir() {
            tracing::warn!("Layouts directory {} does not exist", dir.display());
            return Ok(catalog);
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
            })
            .collect();
        paths.sort();

        for path in paths {
            let layout = FormLayout::from_file(&path)?;
            tracing::info!("Loaded layout '{}' from {}", layout.form.id, path.display());
            catalog.insert(layout);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, layout: FormLayout) {
        self.layouts.insert(layout.form.id.clone(), layout);
    }

    pub fn get(&self, id: &str) -> Result<&FormLayout> {
        let wanted = id.trim().to_lowercase().replace([' ', '-'], "_");
        self.layouts
            .get(&wanted)
            .ok_or_else(|| PermitError::LayoutNotFound { id: id.to_string() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormLayout> {
        self.layouts.values()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
