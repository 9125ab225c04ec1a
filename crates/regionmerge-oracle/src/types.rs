//! Value types for the constraint language.
//!
//! A [`Constraint`] is a [`Condition`] plus three orthogonal pieces of
//! metadata: its [`ConstraintKind`], an optional contextual [`Guard`] and a
//! `negated` flag. All of them are plain values; derived variants (the
//! negated test copy, the decontextualized form) are produced by copying, never by
//! toggling a flag on a shared instance.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NameError;

/// A complete or partial valuation of features.
pub type Assignment = BTreeMap<FeatureName, i64>;

// ---------------------------------------------------------------------------
// FeatureName
// ---------------------------------------------------------------------------

/// A validated feature (configuration variable) name.
///
/// Names start with an ASCII letter or `_` and continue with ASCII
/// alphanumerics, `_` or `-`. The words used as keywords by the expression
/// syntax (`group`, `true`, `false`) are rejected.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureName(String);

impl FeatureName {
    /// The maximum length of a feature name.
    pub const MAX_LEN: usize = 128;

    /// Keywords of the expression syntax that cannot name a feature.
    pub const RESERVED: [&'static str; 3] = ["group", "true", "false"];

    /// Create a new `FeatureName`, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, reserved, or contains
    /// invalid characters.
    pub fn new(s: &str) -> Result<Self, NameError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `c` may appear after the first character of a name.
    #[must_use]
    pub const fn is_name_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-'
    }

    fn validate(s: &str) -> Result<(), NameError> {
        let fail = |reason: &str| {
            Err(NameError {
                value: s.to_owned(),
                reason: reason.to_owned(),
            })
        };
        let Some(first) = s.chars().next() else {
            return fail("feature name must not be empty");
        };
        if s.len() > Self::MAX_LEN {
            return fail("feature name must be at most 128 characters");
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return fail("feature name must start with a letter or underscore");
        }
        if !s.chars().all(Self::is_name_char) {
            return fail(
                "feature name must contain only letters, digits, underscores (_) and hyphens (-)",
            );
        }
        if Self::RESERVED.contains(&s) {
            return fail("feature name is a reserved keyword");
        }
        Ok(())
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeatureName {
    type Err = NameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FeatureName {
    type Error = NameError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<FeatureName> for String {
    fn from(name: FeatureName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// The finite set of values a feature may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Presence/absence flag: `0` (deselected) or `1` (selected).
    Bool,
    /// Inclusive integer range. Empty when `min > max`.
    Int {
        /// Smallest allowed value.
        min: i64,
        /// Largest allowed value.
        max: i64,
    },
}

impl Domain {
    /// Build an integer range, returning `None` when it would be empty.
    #[must_use]
    pub const fn range(min: i64, max: i64) -> Option<Self> {
        if min > max {
            None
        } else {
            Some(Self::Int { min, max })
        }
    }

    /// Inclusive `(min, max)` bounds.
    #[must_use]
    pub const fn bounds(&self) -> (i64, i64) {
        match *self {
            Self::Bool => (0, 1),
            Self::Int { min, max } => (min, max),
        }
    }

    /// All values of the domain in ascending order.
    #[must_use]
    pub const fn values(&self) -> RangeInclusive<i64> {
        let (min, max) = self.bounds();
        min..=max
    }

    /// Number of values in the domain (`0` for an empty range).
    #[must_use]
    pub fn size(&self) -> u128 {
        let (min, max) = self.bounds();
        u128::try_from(i128::from(max) - i128::from(min) + 1).unwrap_or(0)
    }

    /// Returns `true` if the domain has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns `true` if `value` belongs to the domain.
    #[must_use]
    pub const fn contains(&self, value: i64) -> bool {
        let (min, max) = self.bounds();
        min <= value && value <= max
    }

    /// Returns `true` for the boolean domain.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int { min, max } => write!(f, "[{min}..{max}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// CmpOp
// ---------------------------------------------------------------------------

/// Comparison operator of a `feature OP value` condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl CmpOp {
    /// Every operator, longest symbols first (the order a tokenizer must try them in).
    pub const ALL: [Self; 6] = [Self::Ne, Self::Le, Self::Ge, Self::Eq, Self::Lt, Self::Gt];

    /// The textual symbol of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    /// Evaluate `lhs OP rhs`.
    #[must_use]
    pub const fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// The logical content of a constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `feature OP value`.
    Compare {
        /// The compared feature.
        feature: FeatureName,
        /// The comparison operator.
        op: CmpOp,
        /// The constant right-hand side.
        value: i64,
    },
    /// Bare feature reference: holds when the feature's value is non-zero.
    Selected(FeatureName),
    /// `antecedent => consequent`.
    Implies(Box<Condition>, Box<Condition>),
    /// Cardinality group: when `parent` is selected, between `min` and `max`
    /// of `children` are selected; when it is not, none of them is.
    Group {
        /// The parent feature.
        parent: FeatureName,
        /// The grouped child features, in declaration order.
        children: Vec<FeatureName>,
        /// Lower cardinality bound.
        min: u32,
        /// Upper cardinality bound.
        max: u32,
    },
    /// Logical negation.
    Not(Box<Condition>),
    /// Conjunction. Empty conjunction is `true`.
    And(Vec<Condition>),
    /// Disjunction. Empty disjunction is `false`.
    Or(Vec<Condition>),
}

impl Condition {
    /// `feature OP value`.
    #[must_use]
    pub const fn compare(feature: FeatureName, op: CmpOp, value: i64) -> Self {
        Self::Compare { feature, op, value }
    }

    /// `antecedent => consequent`.
    #[must_use]
    pub fn implies(antecedent: Self, consequent: Self) -> Self {
        Self::Implies(Box::new(antecedent), Box::new(consequent))
    }

    /// `!inner`.
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Cardinality group `parent [min..max] (children)`.
    #[must_use]
    pub const fn group(parent: FeatureName, children: Vec<FeatureName>, min: u32, max: u32) -> Self {
        Self::Group {
            parent,
            children,
            min,
            max,
        }
    }

    /// Mandatory group: exactly one of `children` whenever `parent` is selected.
    #[must_use]
    pub const fn mandatory(parent: FeatureName, children: Vec<FeatureName>) -> Self {
        Self::group(parent, children, 1, 1)
    }

    /// Evaluate the condition. `value` looks up a feature's current value;
    /// returns `None` when a feature needed for the decision is unassigned.
    pub fn holds<F>(&self, value: &F) -> Option<bool>
    where
        F: Fn(&FeatureName) -> Option<i64>,
    {
        match self {
            Self::Compare { feature, op, value: rhs } => Some(op.apply(value(feature)?, *rhs)),
            Self::Selected(feature) => Some(value(feature)? != 0),
            Self::Implies(antecedent, consequent) => {
                if antecedent.holds(value)? {
                    consequent.holds(value)
                } else {
                    Some(true)
                }
            }
            Self::Group {
                parent,
                children,
                min,
                max,
            } => {
                let mut selected: u32 = 0;
                for child in children {
                    if value(child)? != 0 {
                        selected = selected.saturating_add(1);
                    }
                }
                if value(parent)? == 0 {
                    Some(selected == 0)
                } else {
                    Some(*min <= selected && selected <= *max)
                }
            }
            Self::Not(inner) => inner.holds(value).map(|b| !b),
            Self::And(items) => {
                for item in items {
                    if !item.holds(value)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            Self::Or(items) => {
                for item in items {
                    if item.holds(value)? {
                        return Some(true);
                    }
                }
                Some(false)
            }
        }
    }

    /// Every feature referenced by the condition, deduplicated, in first
    /// occurrence order.
    #[must_use]
    pub fn features(&self) -> Vec<&FeatureName> {
        let mut out = Vec::new();
        self.collect_features(&mut out);
        out
    }

    fn collect_features<'a>(&'a self, out: &mut Vec<&'a FeatureName>) {
        match self {
            Self::Compare { feature, .. } | Self::Selected(feature) => push_unique(out, feature),
            Self::Implies(a, b) => {
                a.collect_features(out);
                b.collect_features(out);
            }
            Self::Group {
                parent, children, ..
            } => {
                push_unique(out, parent);
                for child in children {
                    push_unique(out, child);
                }
            }
            Self::Not(inner) => inner.collect_features(out),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_features(out);
                }
            }
        }
    }

    /// Binding strength used when rendering; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Self::Implies(..) => 1,
            Self::Or(items) if items.len() > 1 => 2,
            Self::And(items) if items.len() > 1 => 3,
            Self::Not(_) => 4,
            _ => 5,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        let parens = self.precedence() < min_prec;
        if parens {
            f.write_str("(")?;
        }
        match self {
            Self::Compare { feature, op, value } => write!(f, "{feature} {op} {value}")?,
            Self::Selected(feature) => write!(f, "{feature}")?,
            Self::Implies(a, b) => {
                a.fmt_at(f, 2)?;
                f.write_str(" => ")?;
                b.fmt_at(f, 1)?;
            }
            Self::Group {
                parent,
                children,
                min,
                max,
            } => {
                write!(f, "group {parent} [{min}..{max}] (")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")?;
            }
            Self::Not(inner) => {
                f.write_str("!")?;
                if matches!(**inner, Self::Selected(_)) {
                    inner.fmt_at(f, 5)?;
                } else {
                    f.write_str("(")?;
                    inner.fmt_at(f, 0)?;
                    f.write_str(")")?;
                }
            }
            Self::And(items) => fmt_joined(f, items, " & ", "true", 4)?,
            Self::Or(items) => fmt_joined(f, items, " | ", "false", 3)?,
        }
        if parens {
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn push_unique<'a>(out: &mut Vec<&'a FeatureName>, feature: &'a FeatureName) {
    if !out.contains(&feature) {
        out.push(feature);
    }
}

fn fmt_joined(
    f: &mut fmt::Formatter<'_>,
    items: &[Condition],
    sep: &str,
    empty: &str,
    item_prec: u8,
) -> fmt::Result {
    match items {
        [] => f.write_str(empty),
        [single] => single.fmt_at(f, 5),
        _ => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                item.fmt_at(f, item_prec)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// A contextual guard: the guarded condition only applies while
/// `indicator = value`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guard {
    /// The region indicator feature.
    pub indicator: FeatureName,
    /// The indicator value identifying the region.
    pub value: i64,
}

impl Guard {
    /// Create a guard `indicator = value`.
    #[must_use]
    pub const fn new(indicator: FeatureName, value: i64) -> Self {
        Self { indicator, value }
    }
}

impl Guard {
    /// The guard as a condition, `indicator = value`.
    #[must_use]
    pub fn condition(&self) -> Condition {
        Condition::compare(self.indicator.clone(), CmpOp::Eq, self.value)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.indicator, self.value)
    }
}

// ---------------------------------------------------------------------------
// ConstraintKind
// ---------------------------------------------------------------------------

/// Where a constraint comes from.
///
/// Structural and custom constraints are never contextualized and never
/// removed by cleanup; only ordinary constraints take part in merging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// A cross-tree constraint authored in a source model.
    #[default]
    Ordinary,
    /// Feature-tree / group constraint encoding the variable hierarchy.
    Structural,
    /// Synthetic constraint injected by the merge machinery.
    Custom,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinary => write!(f, "ordinary"),
            Self::Structural => write!(f, "structural"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// The atomic unit the merge pipeline operates on.
///
/// Semantics: let `base` be `condition`, or `true` when a [`Guard`] is present
/// and its indicator does not have the guard's value. The constraint holds
/// iff `base XOR negated`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constraint {
    /// The underlying condition.
    pub condition: Condition,
    /// Origin of the constraint.
    pub kind: ConstraintKind,
    /// Contextual guard, if the constraint is contextualized.
    pub context: Option<Guard>,
    /// Evaluate the negation of the (guarded) condition.
    pub negated: bool,
}

impl Constraint {
    /// An ordinary, unguarded constraint.
    #[must_use]
    pub const fn new(condition: Condition) -> Self {
        Self::with_kind(condition, ConstraintKind::Ordinary)
    }

    /// A structural constraint.
    #[must_use]
    pub const fn structural(condition: Condition) -> Self {
        Self::with_kind(condition, ConstraintKind::Structural)
    }

    /// A custom (merge-injected) constraint.
    #[must_use]
    pub const fn custom(condition: Condition) -> Self {
        Self::with_kind(condition, ConstraintKind::Custom)
    }

    /// An unguarded constraint of the given kind.
    #[must_use]
    pub const fn with_kind(condition: Condition, kind: ConstraintKind) -> Self {
        Self {
            condition,
            kind,
            context: None,
            negated: false,
        }
    }

    /// Returns `true` if the constraint carries a contextual guard.
    #[must_use]
    pub const fn is_contextualized(&self) -> bool {
        self.context.is_some()
    }

    /// Returns `true` if the constraint takes part in contextualization and
    /// cleanup (i.e. it is neither structural nor custom).
    #[must_use]
    pub const fn is_mergeable(&self) -> bool {
        matches!(self.kind, ConstraintKind::Ordinary)
    }

    /// A copy guarded by `guard`.
    ///
    /// A constraint already guarded by `guard` (and not negated) is copied
    /// unchanged. Any other guard or negation is folded into the condition
    /// first, so the result always reads `guard => meaning(self)`.
    #[must_use]
    pub fn contextualized(&self, guard: Guard) -> Self {
        if !self.negated && self.context.as_ref() == Some(&guard) {
            return self.clone();
        }
        let mut copy = self.folded();
        copy.context = Some(guard);
        copy
    }

    /// An unguarded, non-negated copy with the same solutions.
    ///
    /// `[g] φ` becomes `g => φ`; `not c` becomes `!c`.
    #[must_use]
    pub fn folded(&self) -> Self {
        let mut condition = match &self.context {
            Some(guard) => Condition::implies(guard.condition(), self.condition.clone()),
            None => self.condition.clone(),
        };
        if self.negated {
            condition = Condition::not(condition);
        }
        Self::with_kind(condition, self.kind)
    }

    /// A copy with the guard removed and `negated` cleared.
    #[must_use]
    pub fn decontextualized(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            kind: self.kind,
            context: None,
            negated: false,
        }
    }

    /// A copy asserting the negation of this constraint.
    #[must_use]
    pub fn negated_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.negated = !copy.negated;
        copy
    }

    /// Evaluate the constraint; `None` if a needed feature is unassigned.
    pub fn holds<F>(&self, value: &F) -> Option<bool>
    where
        F: Fn(&FeatureName) -> Option<i64>,
    {
        let active = match &self.context {
            Some(guard) => value(&guard.indicator)? == guard.value,
            None => true,
        };
        let base = if active {
            self.condition.holds(value)?
        } else {
            true
        };
        Some(base != self.negated)
    }

    /// Evaluate the constraint against an [`Assignment`].
    #[must_use]
    pub fn holds_in(&self, assignment: &Assignment) -> Option<bool> {
        self.holds(&|f: &FeatureName| assignment.get(f).copied())
    }

    /// Every feature the constraint depends on, guard indicator included.
    #[must_use]
    pub fn features(&self) -> Vec<&FeatureName> {
        let mut out = self.condition.features();
        if let Some(guard) = &self.context
            && !out.contains(&&guard.indicator)
        {
            out.push(&guard.indicator);
        }
        out
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("not ")?;
        }
        match &self.context {
            Some(guard) => write!(f, "[{guard}] {}", self.condition),
            None => write!(f, "{}", self.condition),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
