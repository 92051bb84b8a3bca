//! Entity diffs
//!
//! An `EntityDiff` is the result of comparing two entities. It carries at
//! most one statement. Transformations that need several statements are
//! expressed as a chain: each diff owns its subsequent diff, so a chain can
//! neither loop nor dangle.

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::hints::{DiffHints, SubsequentDiffStrategy};
use crate::schema::annotations::{annotate, TextualAnnotations};
use crate::schema::entity::{Entity, EntityKind};
use crate::schema::instant::{classify, InstantDdlCapability};
use crate::schema::statement::Statement;

/// The entities a diff relates. There is always at least one.
#[derive(Debug, Clone, PartialEq)]
enum Subject {
    Created(Entity),
    Dropped(Entity),
    Changed { from: Entity, to: Entity },
}

/// The diff between two entities, from `from` to `to`
#[derive(Debug, Clone)]
pub struct EntityDiff {
    subject: Subject,
    statement: Option<Statement>,
    hints: DiffHints,
    subsequent: Option<Box<EntityDiff>>,
    instant_ddl: OnceCell<InstantDdlCapability>,
}

impl EntityDiff {
    pub(crate) fn created(to: Entity, statement: Statement, hints: &DiffHints) -> Self {
        Self::new(Subject::Created(to), Some(statement), hints)
    }

    pub(crate) fn dropped(from: Entity, statement: Statement, hints: &DiffHints) -> Self {
        Self::new(Subject::Dropped(from), Some(statement), hints)
    }

    pub(crate) fn changed(
        from: Entity,
        to: Entity,
        statement: Option<Statement>,
        hints: &DiffHints,
    ) -> Self {
        Self::new(Subject::Changed { from, to }, statement, hints)
    }

    fn new(subject: Subject, statement: Option<Statement>, hints: &DiffHints) -> Self {
        Self {
            subject,
            statement,
            hints: *hints,
            subsequent: None,
            instant_ddl: OnceCell::new(),
        }
    }

    /// True when the two entities are considered identical
    pub fn is_empty(&self) -> bool {
        self.statement.is_none()
    }

    /// The source entity, or the created one
    fn primary(&self) -> &Entity {
        match &self.subject {
            Subject::Created(entity) | Subject::Dropped(entity) => entity,
            Subject::Changed { from, .. } => from,
        }
    }

    /// Kind of the affected entity
    pub fn kind(&self) -> EntityKind {
        self.primary().kind()
    }

    /// Name of the affected entity. A rename reports its source name.
    pub fn entity_name(&self) -> &str {
        self.primary().name()
    }

    /// The two diffed entities, `from` and `to`
    pub fn entities(&self) -> (Option<&Entity>, Option<&Entity>) {
        match &self.subject {
            Subject::Created(to) => (None, Some(to)),
            Subject::Dropped(from) => (Some(from), None),
            Subject::Changed { from, to } => (Some(from), Some(to)),
        }
    }

    /// The hints this diff was computed under
    pub fn hints(&self) -> &DiffHints {
        &self.hints
    }

    /// The statement applying this diff, absent when the diff is empty
    pub fn statement(&self) -> Option<&Statement> {
        self.statement.as_ref()
    }

    /// Human-friendly SQL, empty when the diff is empty
    pub fn statement_string(&self) -> String {
        self.statement
            .as_ref()
            .map(Statement::to_sql)
            .unwrap_or_default()
    }

    /// Canonical SQL, empty when the diff is empty
    pub fn canonical_statement_string(&self) -> String {
        self.statement
            .as_ref()
            .map(Statement::to_canonical_sql)
            .unwrap_or_default()
    }

    /// The diff following this one, if any
    pub fn subsequent_diff(&self) -> Option<&EntityDiff> {
        self.subsequent.as_deref()
    }

    /// Replace the diff following this one. Anything previously linked is dropped.
    pub fn set_subsequent_diff(&mut self, diff: Option<EntityDiff>) {
        self.subsequent = diff.map(Box::new);
    }

    /// Append a diff at the tail of the chain
    pub fn append_diff(&mut self, diff: EntityDiff) {
        if self.subsequent.is_none() {
            self.subsequent = Some(Box::new(diff));
            return;
        }
        if let Some(next) = self.subsequent.as_mut() {
            next.append_diff(diff);
        }
    }

    /// This diff followed by every subsequent diff
    pub fn chain(&self) -> impl Iterator<Item = &EntityDiff> {
        std::iter::successors(Some(self), |diff| diff.subsequent_diff())
    }

    /// Number of non-empty statements along the chain
    pub fn chain_len(&self) -> usize {
        self.chain().filter(|diff| !diff.is_empty()).count()
    }

    /// Statements of the whole chain, in order
    pub fn statement_strings(&self) -> Vec<String> {
        self.chain()
            .filter(|diff| !diff.is_empty())
            .map(EntityDiff::statement_string)
            .collect()
    }

    /// Fail if the chain holds more than one statement and the hints reject that
    pub(crate) fn enforce_subsequent_strategy(self) -> Result<Self> {
        let statements = self.chain_len();
        if self.hints.subsequent_diff == SubsequentDiffStrategy::Reject && statements > 1 {
            return Err(Error::SubsequentDiffRejected {
                entity: self.entity_name().to_string(),
                statements,
            });
        }
        Ok(self)
    }

    /// Whether this diff's statement can run with `ALGORITHM=INSTANT`
    pub fn instant_ddl_capability(&self) -> InstantDdlCapability {
        *self.instant_ddl.get_or_init(|| {
            let capability = classify(self.statement.as_ref(), self.entities().0, &self.hints);
            tracing::trace!(
                entity = self.entity_name(),
                capability = %capability,
                "Classified instant DDL capability"
            );
            capability
        })
    }

    /// The capability if it was already evaluated, `Unknown` otherwise
    pub fn evaluated_instant_ddl_capability(&self) -> InstantDdlCapability {
        self.instant_ddl.get().copied().unwrap_or_default()
    }

    /// Line annotations of the `from` and `to` definitions, and a unified view
    pub fn annotated(&self) -> (TextualAnnotations, TextualAnnotations, TextualAnnotations) {
        let render = |entity: Option<&Entity>| {
            entity
                .map(|e| e.create_with_hints(&self.hints).statement_string())
                .unwrap_or_default()
        };
        let (from, to) = self.entities();
        annotate(&render(from), &render(to))
    }
}

// The instant DDL cache is derived state and takes no part in equality
impl PartialEq for EntityDiff {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.statement == other.statement
            && self.hints == other.hints
            && self.subsequent == other.subsequent
    }
}
