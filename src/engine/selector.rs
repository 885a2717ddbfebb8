//! Quota selector

use super::scanner::CandidateFolder;

/// Candidates split at the daily budget
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Uploaded this run, in scan order
    pub selected: Vec<CandidateFolder>,
    /// Left for a later run, starting with the one that did not fit
    pub deferred: Vec<CandidateFolder>,
    pub total_bytes: u64,
}

/// Take the longest prefix of `candidates` that fits in `budget_bytes`.
///
/// Stops at the first folder that would overflow the budget even if a later,
/// smaller folder would still fit. Age order wins over packing.
pub fn select(candidates: Vec<CandidateFolder>, budget_bytes: u64) -> Selection {
    let mut total: u64 = 0;
    let mut cut = candidates.len();

    for (i, candidate) in candidates.iter().enumerate() {
        match total.checked_add(candidate.size_bytes) {
            Some(next) if next <= budget_bytes => total = next,
            _ => {
                log::debug!(
                    "Budget reached at {} ({} + {} > {})",
                    candidate.path.display(),
                    total,
                    candidate.size_bytes,
                    budget_bytes
                );
                cut = i;
                break;
            }
        }
    }

    let mut selected = candidates;
    let deferred = selected.split_off(cut);
    Selection {
        selected,
        deferred,
        total_bytes: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::path::PathBuf;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn candidates(sizes: &[(&str, u64)]) -> Vec<CandidateFolder> {
        sizes
            .iter()
            .map(|(name, size)| CandidateFolder {
                path: PathBuf::from("/media").join(name),
                size_bytes: *size,
                created_at: Local::now(),
            })
            .collect()
    }

    fn names(folders: &[CandidateFolder]) -> Vec<String> {
        folders
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_greedy_prefix() {
        let selection = select(
            candidates(&[("A", 30 * GIB), ("B", 40 * GIB), ("C", 50 * GIB)]),
            100 * GIB,
        );
        assert_eq!(names(&selection.selected), vec!["A", "B"]);
        assert_eq!(names(&selection.deferred), vec!["C"]);
        assert_eq!(selection.total_bytes, 70 * GIB);
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // C would fit after B is skipped, but age order forbids skipping
        let selection = select(
            candidates(&[("A", 60), ("B", 50), ("C", 10)]),
            100,
        );
        assert_eq!(names(&selection.selected), vec!["A"]);
        assert_eq!(names(&selection.deferred), vec!["B", "C"]);
    }

    #[test]
    fn test_exact_fit_is_included() {
        let selection = select(candidates(&[("A", 40), ("B", 60)]), 100);
        assert_eq!(names(&selection.selected), vec!["A", "B"]);
        assert!(selection.deferred.is_empty());
    }

    #[test]
    fn test_oversized_first_selects_nothing() {
        let selection = select(candidates(&[("huge", 200), ("small", 1)]), 100);
        assert!(selection.selected.is_empty());
        assert_eq!(selection.deferred.len(), 2);
        assert_eq!(selection.total_bytes, 0);
    }

    #[test]
    fn test_zero_sized_folders_always_fit() {
        let selection = select(candidates(&[("empty", 0), ("also-empty", 0)]), 0);
        assert_eq!(selection.selected.len(), 2);
    }

    #[test]
    fn test_no_overflow_on_huge_sizes() {
        let selection = select(candidates(&[("A", u64::MAX), ("B", 1)]), u64::MAX);
        assert_eq!(names(&selection.selected), vec!["A"]);
        assert_eq!(names(&selection.deferred), vec!["B"]);
    }

    #[test]
    fn test_empty_input() {
        let selection = select(Vec::new(), 100);
        assert_eq!(selection, Selection::default());
    }
}
