//! Per-branch comparison of two snapshots.

use crate::types::{AggregateSnapshot, BranchPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Absent from the prior state.
    New,
    /// Present in the prior state with a different descriptor.
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchChange {
    pub branch_path: BranchPath,
    pub kind: ChangeKind,
}

/// Branches of `current` whose Commit Descriptor differs from `prior`.
///
/// Descriptors are compared whole, so a commit re-pushed under the same id
/// with a different message or timestamp counts as changed. Branches only in
/// `prior` are ignored. The summary entry is never a branch. Output is in
/// branch path order.
pub fn changed_branches(current: &AggregateSnapshot, prior: &AggregateSnapshot) -> Vec<BranchChange> {
    current
        .branches
        .iter()
        .filter_map(|(branch_path, descriptor)| {
            let kind = match prior.branches.get(branch_path) {
                None => ChangeKind::New,
                Some(previous) if previous != descriptor => ChangeKind::Updated,
                Some(_) => return None,
            };
            Some(BranchChange {
                branch_path: branch_path.clone(),
                kind,
            })
        })
        .collect()
}
