/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Injective assignment of requested slots to catalog candidates.
//!
//! Input: `all_matches[i]` lists the catalog indices usable for slot `i`, in
//! preference order.  Output: one index per slot, pairwise distinct.
//!
//! The search is a depth-first walk over partial assignments, kept on an
//! explicit stack of per-slot cursors instead of the call stack.  Candidates
//! are tried in the given order and the first complete assignment wins, so the
//! result is deterministic: earlier catalog entries are preferred.
//!
//! Greedy first-fit is not enough: for `[[0, 1], [0]]` it gives slot 0 index
//! `0` and leaves slot 1 with nothing, while `[1, 0]` is a valid answer.
//!
//! Worst case is exponential.  Slot counts are in the single or double digits
//! in practice; an augmenting-path matcher (Hopcroft–Karp) would bound it at
//! `O(E·√V)` if pools ever grow large.

use std::collections::HashSet;

use thiserror::Error;

/// No injective assignment exists for the given candidate lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no injective assignment exists for the requested slots")]
pub struct NotSolvable;

/// Find the first injective assignment in depth-first order.
///
/// An empty request is trivially solved by an empty assignment.
pub fn solve(all_matches: &[Vec<usize>]) -> Result<Vec<usize>, NotSolvable> {
    let slots = all_matches.len();
    if slots == 0 {
        return Ok(Vec::new());
    }

    // Invariant: cursors.len() == picked.len() + 1.  The last cursor is the
    // next position to try in the candidate list of slot `picked.len()`.
    let mut cursors: Vec<usize> = vec![0];
    let mut picked: Vec<usize> = Vec::with_capacity(slots);
    let mut used: HashSet<usize> = HashSet::with_capacity(slots);

    loop {
        let slot = picked.len();
        let candidates = &all_matches[slot];
        let cursor = &mut cursors[slot];

        let mut next = None;
        while *cursor < candidates.len() {
            let candidate = candidates[*cursor];
            *cursor += 1;
            if !used.contains(&candidate) {
                next = Some(candidate);
                break;
            }
        }

        match next {
            Some(candidate) => {
                picked.push(candidate);
                used.insert(candidate);
                if picked.len() == slots {
                    return Ok(picked);
                }
                cursors.push(0);
            }
            None => {
                // Slot exhausted: undo the previous slot's choice and let it
                // try its next candidate.
                cursors.pop();
                match picked.pop() {
                    Some(undone) => {
                        used.remove(&undone);
                    }
                    None => return Err(NotSolvable),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn is_injective(solution: &[usize]) -> bool {
        let set: HashSet<_> = solution.iter().collect();
        set.len() == solution.len()
    }

    #[test]
    fn single_slot_picks_first_candidate() {
        assert_eq!(solve(&[vec![3, 1]]), Ok(vec![3]));
    }

    #[test]
    fn second_slot_takes_remaining_candidate() {
        assert_eq!(solve(&[vec![0], vec![0, 1]]), Ok(vec![0, 1]));
    }

    #[test]
    fn backtracks_when_greedy_choice_blocks_later_slot() {
        assert_eq!(solve(&[vec![0, 1], vec![0]]), Ok(vec![1, 0]));
    }

    #[test]
    fn backtracks_across_several_levels() {
        let matches = vec![vec![0, 1, 2], vec![0, 1], vec![0]];
        assert_eq!(solve(&matches), Ok(vec![2, 1, 0]));
    }

    #[test]
    fn two_slots_one_candidate_is_not_solvable() {
        assert_eq!(solve(&[vec![0], vec![0]]), Err(NotSolvable));
    }

    #[test]
    fn unsolvable_despite_every_slot_having_candidates() {
        let matches = vec![vec![0, 1], vec![0, 1], vec![1, 0]];
        assert_eq!(solve(&matches), Err(NotSolvable));
    }

    #[test]
    fn empty_candidate_list_is_not_solvable() {
        assert_eq!(solve(&[vec![0], vec![]]), Err(NotSolvable));
    }

    #[test]
    fn empty_request_is_trivially_solved() {
        assert_eq!(solve(&[]), Ok(vec![]));
    }

    #[test]
    fn solutions_are_injective() {
        let matches = vec![
            vec![0, 1, 2, 3],
            vec![1, 2],
            vec![0, 2],
            vec![2, 3],
            vec![0, 1, 3],
        ];
        // 5 slots over 4 candidates cannot be injective.
        assert_eq!(solve(&matches), Err(NotSolvable));

        let solvable = &matches[..4];
        let solution = solve(solvable).unwrap();
        assert_eq!(solution.len(), 4);
        assert!(is_injective(&solution));
        for (slot, idx) in solution.iter().enumerate() {
            assert!(solvable[slot].contains(idx));
        }
    }
}
