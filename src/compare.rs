//! Cross-persona comparison of collected records
//!
//! The verifier runs one operation per persona, each in a freshly opened
//! session, then checks every field of every persona pair against a
//! [`ComparisonPolicy`]. Quirk-specific expectations live in the policy as
//! overrides keyed by [`QuirkKind`], so the verifier itself never branches on
//! persona identity.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::pages::{InventoryPage, LoginPage};
use crate::persona::{Persona, QuirkKind};
use crate::product::{CartLineItem, ProductRecord};
use crate::session::{Session, SessionFactory};

/// A row whose fields can be compared by name
pub trait Record {
    /// Field names, identical for every row of the type
    const FIELDS: &'static [&'static str];

    /// Value of a field rendered as text, `None` for unknown names
    fn field(&self, name: &str) -> Option<String>;
}

impl Record for ProductRecord {
    const FIELDS: &'static [&'static str] = &["name", "description", "price", "image_reference"];

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "description" => Some(self.description.clone()),
            "price" => Some(self.price.to_string()),
            "image_reference" => Some(self.image_reference.clone()),
            _ => None,
        }
    }
}

impl Record for CartLineItem {
    const FIELDS: &'static [&'static str] = &["name", "price"];

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "price" => Some(self.price.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldPolicy {
    MustMatch,
    MustDiffer,
    MayDiffer,
}

impl fmt::Display for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldPolicy::MustMatch => "MUST_MATCH",
            FieldPolicy::MustDiffer => "MUST_DIFFER",
            FieldPolicy::MayDiffer => "MAY_DIFFER",
        })
    }
}

/// Per-field expectations for a persona pair
#[derive(Debug, Clone)]
pub struct ComparisonPolicy {
    default: FieldPolicy,
    fields: BTreeMap<&'static str, FieldPolicy>,
    overrides: Vec<(QuirkKind, &'static str, FieldPolicy)>,
    allow_uniform: BTreeSet<&'static str>,
}

impl ComparisonPolicy {
    pub fn new(default: FieldPolicy) -> Self {
        Self {
            default,
            fields: BTreeMap::new(),
            overrides: Vec::new(),
            allow_uniform: BTreeSet::new(),
        }
    }

    pub fn field(mut self, name: &'static str, policy: FieldPolicy) -> Self {
        self.fields.insert(name, policy);
        self
    }

    /// Use `policy` for `field` whenever either persona of a pair has `quirk`
    pub fn when_quirk(mut self, quirk: QuirkKind, field: &'static str, policy: FieldPolicy) -> Self {
        self.overrides.push((quirk, field, policy));
        self
    }

    /// Accept a MUST_DIFFER field whose differing values collapse to one
    /// constant, within a persona's rows or across several personas
    pub fn allow_uniform(mut self, field: &'static str) -> Self {
        self.allow_uniform.insert(field);
        self
    }

    /// Inventory listing: everything matches, except that images may differ
    /// for visually corrupted personas. How they differ is still classified
    /// and shows up in the report.
    pub fn products() -> Self {
        Self::new(FieldPolicy::MustMatch).when_quirk(
            QuirkKind::VisualCorruption,
            "image_reference",
            FieldPolicy::MayDiffer,
        )
    }

    pub fn policy_for(&self, field: &str, left: &Persona, right: &Persona) -> FieldPolicy {
        self.overrides
            .iter()
            .rev()
            .find(|(quirk, name, _)| *name == field && (left.has(*quirk) || right.has(*quirk)))
            .map(|(_, _, policy)| *policy)
            .or_else(|| self.fields.get(field).copied())
            .unwrap_or(self.default)
    }

    pub fn uniform_allowed(&self, field: &str) -> bool {
        self.allow_uniform.contains(field)
    }
}

/// How one field's values differ between two personas' rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    Identical,
    /// Rows differ individually
    PerItem { differing: usize, total: usize },
    /// Every row differs and the compared persona's rows share one value
    Uniform {
        value: String,
        differing: usize,
        total: usize,
    },
}

impl Divergence {
    /// Classify `right` against the reference column `left`
    pub fn classify(left: &[String], right: &[String]) -> Self {
        let total = left.len().min(right.len());
        let differing: Vec<usize> = (0..total).filter(|&i| left[i] != right[i]).collect();
        if differing.is_empty() {
            return Divergence::Identical;
        }
        if differing.len() == total && total > 1 {
            let first = &right[0];
            if right[..total].iter().all(|v| v == first) {
                return Divergence::Uniform {
                    value: first.clone(),
                    differing: differing.len(),
                    total,
                };
            }
        }
        Divergence::PerItem {
            differing: differing.len(),
            total,
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Identical => f.write_str("identical"),
            Divergence::PerItem { differing, total } => {
                write!(f, "per-item divergence ({differing}/{total} rows)")
            }
            Divergence::Uniform {
                value,
                differing,
                total,
            } => write!(
                f,
                "uniform corruption ({differing}/{total} rows = {value:?})"
            ),
        }
    }
}

/// Outcome for one field of one persona pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldComparison {
    pub left: &'static str,
    pub right: &'static str,
    pub field: &'static str,
    pub policy: FieldPolicy,
    pub divergence: Divergence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// MUST_MATCH field differed
    Mismatch { divergence: Divergence },
    /// MUST_DIFFER field was identical
    NotDifferent,
    /// MUST_DIFFER field collapsed to one constant without permission
    UniformCollapse { value: String },
    /// Several MUST_DIFFER personas diverged from the baseline identically
    CrossPersonaCollapse { personas: Vec<&'static str> },
    /// The personas produced different numbers of rows
    RowCount { left: usize, right: usize },
}

/// A policy breach for one persona pair. For a cross-persona collapse `left`
/// is the baseline and `right` the first collapsed persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub left: &'static str,
    pub right: &'static str,
    pub field: Option<&'static str>,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::CrossPersonaCollapse { personas } => {
                f.write_str(&personas.join(", "))?
            }
            _ => write!(f, "{} vs {}", self.left, self.right)?,
        }
        if let Some(field) = self.field {
            write!(f, " `{field}`")?;
        }
        match &self.kind {
            ViolationKind::Mismatch { divergence } => {
                write!(f, ": must match, found {divergence}")
            }
            ViolationKind::NotDifferent => f.write_str(": must differ, found identical"),
            ViolationKind::UniformCollapse { value } => {
                write!(f, ": must differ, but collapsed to {value:?}")
            }
            ViolationKind::CrossPersonaCollapse { .. } => write!(
                f,
                ": must differ from {}, but all show the same values",
                self.left
            ),
            ViolationKind::RowCount { left, right } => {
                write!(f, ": row count {left} != {right}")
            }
        }
    }
}

/// MUST_DIFFER personas whose values differ from the baseline but are
/// identical to each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedDivergence {
    pub field: &'static str,
    pub baseline: &'static str,
    pub personas: Vec<&'static str>,
}

/// Every field comparison of a passing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub operation: String,
    pub personas: Vec<&'static str>,
    pub comparisons: Vec<FieldComparison>,
    /// Permitted cross-persona collapses
    pub shared: Vec<SharedDivergence>,
}

impl ComparisonReport {
    pub fn divergent(&self) -> impl Iterator<Item = &FieldComparison> {
        self.comparisons
            .iter()
            .filter(|c| c.divergence != Divergence::Identical)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} across {}", self.operation, self.personas.join(", "))?;
        for c in &self.comparisons {
            writeln!(
                f,
                "  {} vs {} `{}` {}: {}",
                c.left, c.right, c.field, c.policy, c.divergence
            )?;
        }
        for shared in &self.shared {
            writeln!(
                f,
                "  {} `{}`: same divergence from {}",
                shared.personas.join(", "),
                shared.field,
                shared.baseline
            )?;
        }
        Ok(())
    }
}

fn column<R: Record>(rows: &[R], field: &str) -> Vec<String> {
    rows.iter()
        .map(|row| row.field(field).unwrap_or_default())
        .collect()
}

/// Personas after the first (the baseline) held to MUST_DIFFER on `field`
/// whose values all differ from the baseline yet match each other. Needs at
/// least two such personas.
fn shared_divergence<R: Record>(
    field: &'static str,
    policy: &ComparisonPolicy,
    runs: &[(&Persona, Vec<R>)],
) -> Option<SharedDivergence> {
    let ((baseline, baseline_rows), rest) = runs.split_first()?;
    let reference = column(baseline_rows, field);
    let mut shared: Option<Vec<String>> = None;
    let mut personas = Vec::new();

    for (persona, rows) in rest {
        if policy.policy_for(field, baseline, persona) != FieldPolicy::MustDiffer {
            continue;
        }
        let values = column(rows, field);
        if values.len() != reference.len() || values == reference {
            return None;
        }
        match &shared {
            None => shared = Some(values),
            Some(first) if *first == values => {}
            Some(_) => return None,
        }
        personas.push(persona.id);
    }

    (personas.len() > 1).then(|| SharedDivergence {
        field,
        baseline: baseline.id,
        personas,
    })
}

/// Check collected rows against `policy` for every persona pair.
///
/// The first run is the baseline. Besides the pairwise checks, MUST_DIFFER
/// personas that diverge from it identically are reported as one
/// cross-persona collapse instead of as identical pairs.
pub fn compare<R: Record>(
    operation: &str,
    policy: &ComparisonPolicy,
    runs: &[(&Persona, Vec<R>)],
) -> HarnessResult<ComparisonReport> {
    let mut comparisons = Vec::new();
    let mut violations = Vec::new();
    let shared: Vec<SharedDivergence> = R::FIELDS
        .iter()
        .filter_map(|&field| shared_divergence(field, policy, runs))
        .collect();
    let in_shared = |field: &str, left: &str, right: &str| {
        shared.iter().any(|s| {
            s.field == field
                && s.personas.iter().any(|p| *p == left)
                && s.personas.iter().any(|p| *p == right)
        })
    };

    for (i, (left, left_rows)) in runs.iter().enumerate() {
        for (right, right_rows) in &runs[i + 1..] {
            if left_rows.len() != right_rows.len() {
                violations.push(Violation {
                    left: left.id,
                    right: right.id,
                    field: None,
                    kind: ViolationKind::RowCount {
                        left: left_rows.len(),
                        right: right_rows.len(),
                    },
                });
                continue;
            }

            for &field in R::FIELDS {
                let divergence =
                    Divergence::classify(&column(left_rows, field), &column(right_rows, field));
                let policy_here = policy.policy_for(field, left, right);

                let kind = match (policy_here, &divergence) {
                    (FieldPolicy::MustMatch, Divergence::Identical) => None,
                    (FieldPolicy::MustMatch, d) => Some(ViolationKind::Mismatch {
                        divergence: d.clone(),
                    }),
                    (FieldPolicy::MustDiffer, Divergence::Identical)
                        if in_shared(field, left.id, right.id) =>
                    {
                        None
                    }
                    (FieldPolicy::MustDiffer, Divergence::Identical) => {
                        Some(ViolationKind::NotDifferent)
                    }
                    (FieldPolicy::MustDiffer, Divergence::Uniform { value, .. })
                        if !policy.uniform_allowed(field) =>
                    {
                        Some(ViolationKind::UniformCollapse {
                            value: value.clone(),
                        })
                    }
                    _ => None,
                };
                if let Some(kind) = kind {
                    violations.push(Violation {
                        left: left.id,
                        right: right.id,
                        field: Some(field),
                        kind,
                    });
                }
                comparisons.push(FieldComparison {
                    left: left.id,
                    right: right.id,
                    field,
                    policy: policy_here,
                    divergence,
                });
            }
        }
    }

    for collapse in shared.iter().filter(|s| !policy.uniform_allowed(s.field)) {
        violations.push(Violation {
            left: collapse.baseline,
            right: collapse.personas[0],
            field: Some(collapse.field),
            kind: ViolationKind::CrossPersonaCollapse {
                personas: collapse.personas.clone(),
            },
        });
    }

    if !violations.is_empty() {
        return Err(HarnessError::PolicyViolation(violations));
    }
    Ok(ComparisonReport {
        operation: operation.to_string(),
        personas: runs.iter().map(|(p, _)| p.id).collect(),
        comparisons,
        shared,
    })
}

/// Something to run once per persona inside its own session
#[async_trait]
pub trait PersonaOperation<S: Session>: Send + Sync {
    type Output: Record + Send;

    fn name(&self) -> &'static str;

    async fn run(
        &self,
        session: &S,
        config: &HarnessConfig,
        persona: &Persona,
    ) -> HarnessResult<Vec<Self::Output>>;
}

/// Log in and read the inventory listing
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectInventory;

#[async_trait]
impl<S: Session> PersonaOperation<S> for CollectInventory {
    type Output = ProductRecord;

    fn name(&self) -> &'static str {
        "inventory listing"
    }

    async fn run(
        &self,
        session: &S,
        config: &HarnessConfig,
        persona: &Persona,
    ) -> HarnessResult<Vec<ProductRecord>> {
        let login = LoginPage::new(session, config);
        login.navigate().await?;
        login.login(persona.credentials()).await?;
        let state = InventoryPage::new(session, config).read_state().await?;
        Ok(state.products)
    }
}

/// Runs an operation across personas and applies a comparison policy
pub struct ComparativeVerifier<'a, F: SessionFactory> {
    factory: &'a F,
    config: &'a HarnessConfig,
    limit: Option<(Instant, Duration)>,
}

impl<'a, F: SessionFactory> ComparativeVerifier<'a, F> {
    pub fn new(factory: &'a F, config: &'a HarnessConfig) -> Self {
        Self {
            factory,
            config,
            limit: None,
        }
    }

    /// Bound the whole verification. Persona runs still in progress when it
    /// expires are stopped and their sessions released.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.limit = Some((Instant::now() + limit, limit));
        self
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        work: impl Future<Output = HarnessResult<T>>,
    ) -> HarnessResult<T> {
        let Some((deadline, limit)) = self.limit else {
            return work.await;
        };
        match tokio::time::timeout_at(deadline, work).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::ScenarioTimeout {
                scenario: operation.to_string(),
                limit,
            }),
        }
    }

    /// Collect rows for each persona in turn, then compare all pairs
    pub async fn verify<O>(
        &self,
        operation: &O,
        personas: &[&Persona],
        policy: &ComparisonPolicy,
    ) -> HarnessResult<ComparisonReport>
    where
        O: PersonaOperation<F::Session>,
    {
        let mut runs = Vec::with_capacity(personas.len());
        for &persona in personas {
            let span = info_span!("persona_run", persona = persona.id, backend = self.factory.backend());
            let rows = async {
                let session = self
                    .bounded(operation.name(), async {
                        self.factory.open().await.map_err(HarnessError::from)
                    })
                    .await?;
                let rows = self
                    .bounded(operation.name(), operation.run(&session, self.config, persona))
                    .await;
                if let Err(err) = self.factory.release(session).await {
                    warn!(error = %err, "session did not close cleanly");
                }
                rows
            }
            .instrument(span)
            .await?;
            debug!(persona = persona.id, rows = rows.len(), "collected");
            runs.push((persona, rows));
        }

        let report = compare(operation.name(), policy, &runs)?;
        info!(
            operation = operation.name(),
            personas = personas.len(),
            divergent = report.divergent().count(),
            "cross-persona comparison passed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRegistry;
    use crate::product::Price;

    fn product(name: &str, image: &str) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            description: format!("about {name}"),
            price: Price::from_cents(999),
            image_reference: image.to_string(),
        }
    }

    fn listing(images: &[&str]) -> Vec<ProductRecord> {
        images
            .iter()
            .enumerate()
            .map(|(i, image)| product(&format!("item {i}"), image))
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn classify_distinguishes_uniform_from_per_item() {
        let base = strings(&["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(Divergence::classify(&base, &base), Divergence::Identical);
        assert_eq!(
            Divergence::classify(&base, &strings(&["404.jpg", "404.jpg", "404.jpg"])),
            Divergence::Uniform {
                value: "404.jpg".to_string(),
                differing: 3,
                total: 3
            }
        );
        assert_eq!(
            Divergence::classify(&base, &strings(&["a.jpg", "x.jpg", "y.jpg"])),
            Divergence::PerItem {
                differing: 2,
                total: 3
            }
        );
    }

    #[test]
    fn constant_baseline_is_not_uniform_corruption() {
        let placeholder = strings(&["blank.jpg", "blank.jpg", "blank.jpg"]);
        assert_eq!(
            Divergence::classify(&placeholder, &strings(&["a.jpg", "b.jpg", "c.jpg"])),
            Divergence::PerItem {
                differing: 3,
                total: 3
            }
        );
    }

    #[test]
    fn quirk_override_applies_when_either_side_has_it() {
        let registry = PersonaRegistry::seeded();
        let standard = registry.lookup("standard").unwrap();
        let problem = registry.lookup("problem").unwrap();
        let performance = registry.lookup("performance").unwrap();
        let policy = ComparisonPolicy::products();

        assert_eq!(
            policy.policy_for("image_reference", standard, problem),
            FieldPolicy::MayDiffer
        );
        assert_eq!(
            policy.policy_for("image_reference", problem, standard),
            FieldPolicy::MayDiffer
        );
        assert_eq!(
            policy.policy_for("image_reference", standard, performance),
            FieldPolicy::MustMatch
        );
        assert_eq!(
            policy.policy_for("name", standard, problem),
            FieldPolicy::MustMatch
        );
    }

    #[test]
    fn uniform_corruption_is_reported_for_product_images() {
        let registry = PersonaRegistry::seeded();
        let runs = vec![
            (
                registry.lookup("standard").unwrap(),
                listing(&["backpack.jpg", "bike.jpg"]),
            ),
            (
                registry.lookup("problem").unwrap(),
                listing(&["404.jpg", "404.jpg"]),
            ),
        ];

        let report = compare("inventory listing", &ComparisonPolicy::products(), &runs).unwrap();
        insta::assert_snapshot!(report.to_string(), @r#"
        inventory listing across standard, problem
          standard vs problem `name` MUST_MATCH: identical
          standard vs problem `description` MUST_MATCH: identical
          standard vs problem `price` MUST_MATCH: identical
          standard vs problem `image_reference` MAY_DIFFER: uniform corruption (2/2 rows = "404.jpg")
        "#);
    }

    #[test]
    fn per_item_divergence_is_reported_separately() {
        let registry = PersonaRegistry::seeded();
        let runs = vec![
            (
                registry.lookup("standard").unwrap(),
                listing(&["backpack.jpg", "bike.jpg"]),
            ),
            (
                registry.lookup("problem").unwrap(),
                listing(&["backpack.jpg", "broken.jpg"]),
            ),
        ];

        let report = compare("inventory listing", &ComparisonPolicy::products(), &runs).unwrap();
        let divergent: Vec<String> = report.divergent().map(|c| c.divergence.to_string()).collect();
        assert_eq!(divergent, vec!["per-item divergence (1/2 rows)"]);
    }

    #[test]
    fn uniform_collapse_violates_when_not_allowed() {
        let registry = PersonaRegistry::seeded();
        let policy = ComparisonPolicy::new(FieldPolicy::MustMatch).when_quirk(
            QuirkKind::VisualCorruption,
            "image_reference",
            FieldPolicy::MustDiffer,
        );
        let runs = vec![
            (
                registry.lookup("standard").unwrap(),
                listing(&["backpack.jpg", "bike.jpg"]),
            ),
            (
                registry.lookup("problem").unwrap(),
                listing(&["404.jpg", "404.jpg"]),
            ),
        ];

        match compare("inventory listing", &policy, &runs) {
            Err(HarnessError::PolicyViolation(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(
                    violations[0].to_string(),
                    "standard vs problem `image_reference`: must differ, but collapsed to \"404.jpg\""
                );
            }
            other => panic!("Expected PolicyViolation, got {other:?}"),
        }

        let permissive = policy.allow_uniform("image_reference");
        let report = compare("inventory listing", &permissive, &runs).unwrap();
        assert_eq!(report.divergent().count(), 1);
    }

    #[test]
    fn personas_diverging_identically_are_a_cross_persona_collapse() {
        let registry = PersonaRegistry::seeded();
        let policy = ComparisonPolicy::new(FieldPolicy::MustMatch)
            .field("image_reference", FieldPolicy::MustDiffer);
        let runs = vec![
            (registry.lookup("standard").unwrap(), listing(&["a.jpg", "b.jpg"])),
            (registry.lookup("problem").unwrap(), listing(&["x.jpg", "y.jpg"])),
            (registry.lookup("performance").unwrap(), listing(&["x.jpg", "y.jpg"])),
        ];

        let err = compare("inventory listing", &policy, &runs).unwrap_err();
        let HarnessError::PolicyViolation(violations) = err else {
            panic!("Expected PolicyViolation");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            ViolationKind::CrossPersonaCollapse {
                personas: vec!["problem", "performance"]
            }
        );
        assert_eq!(
            violations[0].to_string(),
            "problem, performance `image_reference`: must differ from standard, but all show the same values"
        );

        let report = compare("inventory listing", &policy.allow_uniform("image_reference"), &runs)
            .unwrap();
        assert_eq!(
            report.shared,
            vec![SharedDivergence {
                field: "image_reference",
                baseline: "standard",
                personas: vec!["problem", "performance"],
            }]
        );
        insta::assert_snapshot!(report.to_string(), @r"
        inventory listing across standard, problem, performance
          standard vs problem `name` MUST_MATCH: identical
          standard vs problem `description` MUST_MATCH: identical
          standard vs problem `price` MUST_MATCH: identical
          standard vs problem `image_reference` MUST_DIFFER: per-item divergence (2/2 rows)
          standard vs performance `name` MUST_MATCH: identical
          standard vs performance `description` MUST_MATCH: identical
          standard vs performance `price` MUST_MATCH: identical
          standard vs performance `image_reference` MUST_DIFFER: per-item divergence (2/2 rows)
          problem vs performance `name` MUST_MATCH: identical
          problem vs performance `description` MUST_MATCH: identical
          problem vs performance `price` MUST_MATCH: identical
          problem vs performance `image_reference` MUST_DIFFER: identical
          problem, performance `image_reference`: same divergence from standard
        ");
    }

    #[test]
    fn distinct_divergences_are_not_a_collapse() {
        let registry = PersonaRegistry::seeded();
        let policy = ComparisonPolicy::new(FieldPolicy::MustMatch)
            .field("image_reference", FieldPolicy::MustDiffer);
        let runs = vec![
            (registry.lookup("standard").unwrap(), listing(&["a.jpg", "b.jpg"])),
            (registry.lookup("problem").unwrap(), listing(&["x.jpg", "y.jpg"])),
            (registry.lookup("performance").unwrap(), listing(&["p.jpg", "q.jpg"])),
        ];

        let report = compare("inventory listing", &policy, &runs).unwrap();
        assert!(report.shared.is_empty());
        assert_eq!(report.divergent().count(), 3);
    }

    #[test]
    fn must_differ_identical_and_row_counts_are_violations() {
        let registry = PersonaRegistry::seeded();
        let runs = vec![
            (registry.lookup("standard").unwrap(), listing(&["a.jpg", "b.jpg"])),
            (registry.lookup("problem").unwrap(), listing(&["a.jpg", "b.jpg"])),
            (registry.lookup("performance").unwrap(), listing(&["a.jpg"])),
        ];

        let policy = ComparisonPolicy::new(FieldPolicy::MustMatch).when_quirk(
            QuirkKind::VisualCorruption,
            "image_reference",
            FieldPolicy::MustDiffer,
        );
        let err = compare("inventory listing", &policy, &runs).unwrap_err();
        let HarnessError::PolicyViolation(violations) = err else {
            panic!("Expected PolicyViolation");
        };
        let kinds: Vec<&ViolationKind> = violations.iter().map(|v| &v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &ViolationKind::NotDifferent,
                &ViolationKind::RowCount { left: 2, right: 1 },
                &ViolationKind::RowCount { left: 2, right: 1 },
            ]
        );
    }
}
