//! Myers line diff.

use std::ops::Range;

/// One step of an edit script, with indices into the old and new line lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Equal { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

/// Compute a shortest edit script turning `old` into `new`.
///
/// Runs in O((N+M)D) time and O(N+M) memory: each range is split at its
/// middle snake and both halves are diffed in turn. Within a run of changes
/// deletions come before insertions.
pub fn diff_lines<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    conquer(old, 0..old.len(), new, 0..new.len(), &mut edits);
    for run in edits.split_mut(|edit| matches!(edit, Edit::Equal { .. })) {
        run.sort_by_key(|edit| matches!(edit, Edit::Insert { .. }));
    }
    edits
}

fn conquer<T: PartialEq>(
    old: &[T],
    mut old_range: Range<usize>,
    new: &[T],
    mut new_range: Range<usize>,
    edits: &mut Vec<Edit>,
) {
    let prefix = old[old_range.clone()]
        .iter()
        .zip(&new[new_range.clone()])
        .take_while(|(a, b)| a == b)
        .count();
    edits.extend((0..prefix).map(|i| Edit::Equal {
        old: old_range.start + i,
        new: new_range.start + i,
    }));
    old_range.start += prefix;
    new_range.start += prefix;

    let suffix = old[old_range.clone()]
        .iter()
        .rev()
        .zip(new[new_range.clone()].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    old_range.end -= suffix;
    new_range.end -= suffix;

    if old_range.is_empty() {
        edits.extend(new_range.clone().map(|new| Edit::Insert { new }));
    } else if new_range.is_empty() {
        edits.extend(old_range.clone().map(|old| Edit::Delete { old }));
    } else if let Some((x, y)) = middle_snake(&old[old_range.clone()], &new[new_range.clone()]) {
        let (x, y) = (old_range.start + x, new_range.start + y);
        conquer(old, old_range.start..x, new, new_range.start..y, edits);
        conquer(old, x..old_range.end, new, y..new_range.end, edits);
    } else {
        edits.extend(old_range.clone().map(|old| Edit::Delete { old }));
        edits.extend(new_range.clone().map(|new| Edit::Insert { new }));
    }

    edits.extend((0..suffix).map(|i| Edit::Equal {
        old: old_range.end + i,
        new: new_range.end + i,
    }));
}

/// Search from both corners at once and return the point where the forward
/// and reverse paths meet. Diagonals that leave the grid are dropped from the
/// search window.
fn middle_snake<T: PartialEq>(a: &[T], b: &[T]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let len = 2 * max_d + 2;

    // Furthest x reached per diagonal; -1 where a diagonal was never reached.
    let mut forward = vec![-1isize; len as usize];
    let mut reverse = vec![-1isize; len as usize];
    forward[(offset + 1) as usize] = 0;
    reverse[(offset + 1) as usize] = 0;

    let delta = n - m;
    let odd = delta % 2 != 0;
    let (mut f_start, mut f_end, mut r_start, mut r_end) = (0, 0, 0, 0);

    for d in 0..max_d {
        let mut k = -d + f_start;
        while k <= d - f_end {
            let i = (offset + k) as usize;
            let mut x = if k == -d || (k != d && forward[i - 1] < forward[i + 1]) {
                forward[i + 1]
            } else {
                forward[i - 1] + 1
            };
            let mut y = x - k;
            while (0..n).contains(&x) && (0..m).contains(&y) && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            forward[i] = x;
            if x > n {
                f_end += 2;
            } else if y > m {
                f_start += 2;
            } else if odd && x >= 0 && y >= 0 {
                let j = offset + delta - k;
                if (0..len).contains(&j) {
                    let back = reverse[j as usize];
                    if back != -1 && x >= n - back {
                        return Some((x as usize, y as usize));
                    }
                }
            }
            k += 2;
        }

        let mut k = -d + r_start;
        while k <= d - r_end {
            let i = (offset + k) as usize;
            let mut x = if k == -d || (k != d && reverse[i - 1] < reverse[i + 1]) {
                reverse[i + 1]
            } else {
                reverse[i - 1] + 1
            };
            let mut y = x - k;
            while (0..n).contains(&x)
                && (0..m).contains(&y)
                && a[(n - x - 1) as usize] == b[(m - y - 1) as usize]
            {
                x += 1;
                y += 1;
            }
            reverse[i] = x;
            if x > n {
                r_end += 2;
            } else if y > m {
                r_start += 2;
            } else if !odd && x >= 0 && y >= 0 {
                let j = offset + delta - k;
                if (0..len).contains(&j) {
                    let fx = forward[j as usize];
                    let fy = fx - (delta - k);
                    if fx >= 0 && fy >= 0 && fx >= n - x {
                        return Some((fx as usize, fy as usize));
                    }
                }
            }
            k += 2;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(old: &[&str], new: &[&str], edits: &[Edit]) -> Vec<String> {
        let mut out = Vec::new();
        for edit in edits {
            match *edit {
                Edit::Equal { old: o, .. } => out.push(old[o].to_string()),
                Edit::Insert { new: n } => out.push(new[n].to_string()),
                Edit::Delete { .. } => {}
            }
        }
        out
    }

    #[test]
    fn test_identical() {
        let lines = ["a", "b", "c"];
        let edits = diff_lines(&lines, &lines);
        assert!(edits.iter().all(|e| matches!(e, Edit::Equal { .. })));
    }

    #[test]
    fn test_single_change() {
        let old = ["a", "b", "c"];
        let new = ["a", "x", "c"];
        let edits = diff_lines(&old, &new);
        assert_eq!(
            edits,
            vec![
                Edit::Equal { old: 0, new: 0 },
                Edit::Delete { old: 1 },
                Edit::Insert { new: 1 },
                Edit::Equal { old: 2, new: 2 },
            ]
        );
    }

    #[test]
    fn test_minimal_script_reconstructs_new() {
        let old = ["a", "b", "c", "a", "b", "b", "a"];
        let new = ["c", "b", "a", "b", "a", "c"];
        let edits = diff_lines(&old, &new);
        assert_eq!(apply(&old, &new, &edits), new);

        let changes = edits
            .iter()
            .filter(|e| !matches!(e, Edit::Equal { .. }))
            .count();
        assert_eq!(changes, 5);
    }

    #[test]
    fn test_thousands_of_replaced_lines() {
        let old: Vec<String> = (0..4000).map(|i| format!("old {}", i)).collect();
        let new: Vec<String> = (0..4000)
            .map(|i| {
                if i % 500 == 0 {
                    format!("old {}", i)
                } else {
                    format!("new {}", i)
                }
            })
            .collect();

        let edits = diff_lines(&old, &new);
        let mut rebuilt = Vec::new();
        for edit in &edits {
            match *edit {
                Edit::Equal { old: o, .. } => rebuilt.push(old[o].clone()),
                Edit::Insert { new: n } => rebuilt.push(new[n].clone()),
                Edit::Delete { .. } => {}
            }
        }
        assert_eq!(rebuilt, new);

        let equal = edits
            .iter()
            .filter(|e| matches!(e, Edit::Equal { .. }))
            .count();
        assert_eq!(equal, 8);
        assert_eq!(edits.len(), 8 + 2 * 3992);
    }

    #[test]
    fn test_shifted_block() {
        let old = ["h", "a", "b", "c", "t"];
        let new = ["a", "b", "c", "x", "t"];
        let edits = diff_lines(&old, &new);
        assert_eq!(apply(&old, &new, &edits), new);
        assert_eq!(
            edits,
            vec![
                Edit::Delete { old: 0 },
                Edit::Equal { old: 1, new: 0 },
                Edit::Equal { old: 2, new: 1 },
                Edit::Equal { old: 3, new: 2 },
                Edit::Insert { new: 3 },
                Edit::Equal { old: 4, new: 4 },
            ]
        );
    }

    #[test]
    fn test_empty_sides() {
        let edits = diff_lines::<&str>(&[], &["a", "b"]);
        assert_eq!(edits.len(), 2);
        let edits = diff_lines::<&str>(&["a"], &[]);
        assert_eq!(edits, vec![Edit::Delete { old: 0 }]);
    }
}
