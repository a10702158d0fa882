//! Workload filters.
//!
//! A filter looks at a [`WorkloadUpdate`] and either lets it through
//! (returns a selected verdict) or rejects it with a reason. Filters run in
//! the order given and the first rejection wins; later filters are not
//! consulted.

use std::collections::BTreeSet;

use tidewater_core::{ImageRef, ResourceId};

use crate::types::{SkipReason, WorkloadResult, WorkloadUpdate};

/// A predicate over workload updates.
pub trait WorkloadFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult;
}

impl<F> WorkloadFilter for F
where
    F: Fn(&WorkloadUpdate) -> WorkloadResult,
{
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        self(update)
    }
}

/// Run `filters` in order, stopping at the first rejection.
///
/// When nothing rejects, the last approval given by a filter is the verdict.
/// An empty list, or filters that only pass, yield the pending verdict.
pub fn apply_filters(update: &WorkloadUpdate, filters: &[&dyn WorkloadFilter]) -> WorkloadResult {
    let mut verdict = WorkloadResult::Pending;
    for filter in filters {
        match filter.filter(update) {
            rejection if rejection.is_rejection() => return rejection,
            approval @ WorkloadResult::Success { .. } => verdict = approval,
            _ => {}
        }
    }
    verdict
}

/// Only let through the listed workloads.
#[derive(Debug, Clone, Default)]
pub struct IncludeFilter {
    pub ids: BTreeSet<ResourceId>,
}

impl IncludeFilter {
    pub fn new(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl WorkloadFilter for IncludeFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        if self.ids.contains(&update.resource_id) {
            WorkloadResult::Pending
        } else {
            WorkloadResult::skipped(SkipReason::NotIncluded)
        }
    }
}

/// Skip the listed workloads.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    pub ids: BTreeSet<ResourceId>,
}

impl ExcludeFilter {
    pub fn new(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl WorkloadFilter for ExcludeFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        if self.ids.contains(&update.resource_id) {
            WorkloadResult::skipped(SkipReason::Excluded)
        } else {
            WorkloadResult::Pending
        }
    }
}

/// Skip workloads whose manifest is locked.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockedFilter;

impl WorkloadFilter for LockedFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        if update.resource.meta.is_locked() {
            WorkloadResult::skipped(SkipReason::Locked)
        } else {
            WorkloadResult::Pending
        }
    }
}

/// Leave alone workloads whose manifest says to ignore them.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreFilter;

impl WorkloadFilter for IgnoreFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        if update.resource.meta.is_ignored() {
            WorkloadResult::ignored(SkipReason::Ignored)
        } else {
            WorkloadResult::Pending
        }
    }
}

/// Skip running workloads that do not use `image` in any container.
///
/// Needs the running workload, so it belongs after the cluster query.
#[derive(Debug, Clone)]
pub struct SpecificImageFilter {
    pub image: ImageRef,
}

impl SpecificImageFilter {
    pub const fn new(image: ImageRef) -> Self {
        Self { image }
    }
}

impl WorkloadFilter for SpecificImageFilter {
    fn filter(&self, update: &WorkloadUpdate) -> WorkloadResult {
        let Some(workload) = &update.workload else {
            return WorkloadResult::skipped(SkipReason::NotInCluster);
        };
        if workload
            .containers
            .iter()
            .any(|c| c.image.same_image(&self.image))
        {
            WorkloadResult::Pending
        } else {
            WorkloadResult::skipped(SkipReason::DifferentImage)
        }
    }
}
