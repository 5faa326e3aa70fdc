//! This module contains the minimal-cost alignment of two sequences, used to
//! describe how the members of an enum were edited.

/// The cost of replacing an element at a position with a different one.
const SUBSTITUTION_COST: usize = 3;

/// The cost of inserting or deleting a single element.
const INSERTION_COST: usize = 2;

/// One step of an edit script turning an original sequence into an updated
/// one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edit<'a, T> {
    /// The element is unchanged.
    Keep { original: &'a T, updated: &'a T },

    /// The element at this position was replaced.
    Substitute { original: &'a T, updated: &'a T },

    /// An element was inserted. `append` is true if it comes after every
    /// original element.
    Insert { updated: &'a T, append: bool },

    /// The element was removed.
    Delete { original: &'a T },
}

/// Computes a minimal-cost edit script from `original` to `updated`.
///
/// Substitutions are more expensive than either insertions or deletions, but
/// cheaper than the two together, so a changed element at the same position is
/// reported as a substitution. Where several scripts have the same cost, the
/// one that substitutes is chosen.
#[must_use]
pub fn edit_script<'a, T: PartialEq>(original: &'a [T], updated: &'a [T]) -> Vec<Edit<'a, T>> {
    let (n, m) = (original.len(), updated.len());

    // `cost[i][j]` is the cost of turning `original[..i]` into `updated[..j]`.
    let mut cost = vec![vec![0_usize; m + 1]; n + 1];
    for (i, row) in cost.iter_mut().enumerate() {
        row[0] = i * INSERTION_COST;
    }
    for j in 0..=m {
        cost[0][j] = j * INSERTION_COST;
    }
    for i in 1..=n {
        for j in 1..=m {
            let diagonal = cost[i - 1][j - 1] + substitution(&original[i - 1], &updated[j - 1]);
            let delete = cost[i - 1][j] + INSERTION_COST;
            let insert = cost[i][j - 1] + INSERTION_COST;
            cost[i][j] = diagonal.min(delete).min(insert);
        }
    }

    let mut script = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0
            && j > 0
            && cost[i][j] == cost[i - 1][j - 1] + substitution(&original[i - 1], &updated[j - 1])
        {
            let (original, updated) = (&original[i - 1], &updated[j - 1]);
            script.push(if original == updated {
                Edit::Keep { original, updated }
            } else {
                Edit::Substitute { original, updated }
            });
            i -= 1;
            j -= 1;
        } else if j > 0 && cost[i][j] == cost[i][j - 1] + INSERTION_COST {
            script.push(Edit::Insert {
                updated: &updated[j - 1],
                append:  i == n,
            });
            j -= 1;
        } else {
            script.push(Edit::Delete {
                original: &original[i - 1],
            });
            i -= 1;
        }
    }

    script.reverse();
    script
}

fn substitution<T: PartialEq>(original: &T, updated: &T) -> usize {
    if original == updated {
        0
    } else {
        SUBSTITUTION_COST
    }
}
