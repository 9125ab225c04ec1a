//! Model files.
//!
//! A region model is stored as TOML:
//!
//! ```toml
//! region = "eu"
//! root = "Car"
//!
//! [features]
//! Car = "bool"
//! x = { min = 0, max = 3 }
//!
//! [[constraints]]
//! expr = "x != 3"
//!
//! [[constraints]]
//! expr = "group Car [1..1] (Diesel, Petrol)"
//! kind = "structural"
//! ```
//!
//! Constraints written by the merger may also carry
//! `context = { indicator = "region", value = 0 }` and `negated = true`.
//! [`to_toml_string`] emits the same format, so merged models can be read
//! back with [`parse_model`].

pub mod expr;

use std::collections::BTreeMap;
use std::path::Path;

use regionmerge_oracle::{Constraint, ConstraintKind, Domain, FeatureName, Guard};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{Model, RegionId};

pub use expr::parse_condition;

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<String>,
    #[serde(default)]
    features: BTreeMap<String, DomainSpec>,
    #[serde(default)]
    constraints: Vec<ConstraintSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum DomainSpec {
    Named(String),
    Range(RangeSpec),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeSpec {
    min: i64,
    max: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstraintSpec {
    expr: String,
    #[serde(default, skip_serializing_if = "is_ordinary")]
    kind: ConstraintKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    negated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Guard>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_ordinary(kind: &ConstraintKind) -> bool {
    *kind == ConstraintKind::Ordinary
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a model from TOML text and validate its references.
///
/// # Errors
/// Returns [`ModelError::Format`] for malformed TOML, unknown keys, bad
/// domains or unparsable expressions (the message names the line or the
/// constraint), and the validation errors of [`Model::validate`].
pub fn parse_model(text: &str) -> Result<Model, ModelError> {
    let file: ModelFile = toml::from_str(text).map_err(|e| ModelError::Format {
        path: None,
        message: toml_message(text, &e),
    })?;

    let mut model = Model::new(RegionId::new(&file.region)?);
    if let Some(root) = &file.root {
        model.root = Some(FeatureName::new(root)?);
    }
    for (name, spec) in &file.features {
        let feature = FeatureName::new(name)?;
        let domain = domain_from_spec(&feature, spec)?;
        model.features.insert(feature, domain);
    }
    for (index, spec) in file.constraints.into_iter().enumerate() {
        let condition = parse_condition(&spec.expr).map_err(|e| ModelError::Format {
            path: None,
            message: format!("constraint #{index} (`{}`): {e}", spec.expr),
        })?;
        model.constraints.push(Constraint {
            condition,
            kind: spec.kind,
            context: spec.context,
            negated: spec.negated,
        });
    }
    model.validate()?;
    Ok(model)
}

/// Read and parse a model file.
///
/// Unlike configuration, a missing model file is an error.
///
/// # Errors
/// Returns [`ModelError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_model`] with the path attached.
pub fn load_model(path: &Path) -> Result<Model, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_model(&text).map_err(|e| match e {
        ModelError::Format { path: None, message } => ModelError::Format {
            path: Some(path.to_owned()),
            message,
        },
        other => other,
    })
}

fn domain_from_spec(feature: &FeatureName, spec: &DomainSpec) -> Result<Domain, ModelError> {
    match spec {
        DomainSpec::Named(name) if name == "bool" => Ok(Domain::Bool),
        DomainSpec::Named(name) => Err(ModelError::Format {
            path: None,
            message: format!(
                "feature `{feature}` has unknown domain \"{name}\"; use \"bool\" or {{ min = .., max = .. }}"
            ),
        }),
        DomainSpec::Range(RangeSpec { min, max }) => {
            Domain::range(*min, *max).ok_or_else(|| ModelError::EmptyDomain {
                feature: feature.clone(),
                min: *min,
                max: *max,
            })
        }
    }
}

/// Prefix a TOML error with the line it points at.
pub(crate) fn toml_message(text: &str, err: &toml::de::Error) -> String {
    let message = err.message().to_owned();
    match err.span() {
        Some(span) => {
            let line = text[..span.start].chars().filter(|&c| c == '\n').count() + 1;
            format!("line {line}: {message}")
        }
        None => message,
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Render a model in the model-file format.
///
/// # Errors
/// Returns [`ModelError::Format`] if TOML serialization fails.
pub fn to_toml_string(model: &Model) -> Result<String, ModelError> {
    let file = ModelFile {
        region: model.region.to_string(),
        root: model.root.as_ref().map(ToString::to_string),
        features: model
            .features
            .iter()
            .map(|(name, domain)| {
                let spec = match domain {
                    Domain::Bool => DomainSpec::Named("bool".to_owned()),
                    Domain::Int { min, max } => DomainSpec::Range(RangeSpec {
                        min: *min,
                        max: *max,
                    }),
                };
                (name.to_string(), spec)
            })
            .collect(),
        constraints: model
            .constraints
            .iter()
            .map(|c| ConstraintSpec {
                expr: c.condition.to_string(),
                kind: c.kind,
                negated: c.negated,
                context: c.context.clone(),
            })
            .collect(),
    };
    toml::to_string(&file).map_err(|e| ModelError::Format {
        path: None,
        message: format!("could not serialize model: {e}"),
    })
}

/// Write a model file, replacing any existing file.
///
/// # Errors
/// Returns [`ModelError::Io`] on write failure.
pub fn write_model(model: &Model, path: &Path) -> Result<(), ModelError> {
    let text = to_toml_string(model)?;
    std::fs::write(path, text).map_err(|source| ModelError::Io {
        path: path.to_owned(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use regionmerge_oracle::{CmpOp, Condition};

    use super::*;

    const EU: &str = r#"
region = "eu"
root = "Car"

[features]
Car = "bool"
Diesel = "bool"
Petrol = "bool"
x = { min = 0, max = 3 }

[[constraints]]
expr = "group Car [1..1] (Diesel, Petrol)"
kind = "structural"

[[constraints]]
expr = "x != 3"

[[constraints]]
expr = "Diesel => x >= 1"
context = { indicator = "x", value = 2 }
negated = true
"#;

    fn name(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    #[test]
    fn parse_full_model() {
        let model = parse_model(EU).unwrap();
        assert_eq!(model.region.as_str(), "eu");
        assert_eq!(model.root, Some(name("Car")));
        assert_eq!(model.features.len(), 4);
        assert_eq!(model.features[&name("x")], Domain::Int { min: 0, max: 3 });
        assert_eq!(model.features[&name("Car")], Domain::Bool);
        assert_eq!(model.constraints.len(), 3);
        assert_eq!(model.constraints[0].kind, ConstraintKind::Structural);
        assert_eq!(
            model.constraints[1].condition,
            Condition::compare(name("x"), CmpOp::Ne, 3)
        );
        let last = &model.constraints[2];
        assert_eq!(last.context, Some(Guard::new(name("x"), 2)));
        assert!(last.negated);
    }

    #[test]
    fn written_model_reads_back() {
        let model = parse_model(EU).unwrap();
        let text = to_toml_string(&model).unwrap();
        let reread = parse_model(&text).unwrap();
        assert_eq!(reread, model);
    }

    #[test]
    fn minimal_model() {
        let model = parse_model("region = \"us\"\n").unwrap();
        assert!(model.is_empty());
        assert!(model.features.is_empty());
        assert_eq!(model.root, None);
    }

    #[test]
    fn unknown_key_reports_line() {
        let err = parse_model("\nregion = 1\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{msg}");
    }

    #[test]
    fn bad_expression_names_constraint() {
        let text = "region = \"eu\"\n[features]\nx = \"bool\"\n[[constraints]]\nexpr = \"x =\"\n";
        let err = parse_model(text).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("constraint #0"), "{msg}");
        assert!(msg.contains("expected an integer"), "{msg}");
    }

    #[test]
    fn undeclared_feature_is_a_reference_error() {
        let text = "region = \"eu\"\n[[constraints]]\nexpr = \"ghost\"\n";
        assert!(matches!(
            parse_model(text),
            Err(ModelError::UnknownFeature { index: 0, .. })
        ));
    }

    #[test]
    fn bad_domains() {
        let text = "region = \"eu\"\n[features]\nx = \"int\"\n";
        assert!(matches!(parse_model(text), Err(ModelError::Format { .. })));

        let text = "region = \"eu\"\n[features]\nx = { min = 3, max = 1 }\n";
        assert!(matches!(parse_model(text), Err(ModelError::EmptyDomain { .. })));
    }

    #[test]
    fn bad_region_is_rejected() {
        assert!(matches!(
            parse_model("region = \"Europe\"\n"),
            Err(ModelError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn load_attaches_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        match load_model(&path).unwrap_err() {
            ModelError::Format { path: Some(p), .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = load_model(Path::new("/nonexistent/model.toml")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eu.toml");
        let model = parse_model(EU).unwrap();
        write_model(&model, &path).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
    }
}
