//! Skin weights: one vertex group per joint.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use dson_math::DVec3;

use crate::document::Joint;

/// Merge two weight lists sorted by vertex index. A vertex present in both
/// gets the mean of its two weights.
pub fn merge_weights(first: &[(usize, f64)], second: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let mut out = Vec::with_capacity(first.len() + second.len());
    let (mut a, mut b) = (first.iter().peekable(), second.iter().peekable());
    loop {
        match (a.peek(), b.peek()) {
            (Some(&&(ia, wa)), Some(&&(ib, wb))) => match ia.cmp(&ib) {
                Ordering::Less => {
                    out.push((ia, wa));
                    a.next();
                }
                Ordering::Greater => {
                    out.push((ib, wb));
                    b.next();
                }
                Ordering::Equal => {
                    out.push((ia, (wa + wb) / 2.0));
                    a.next();
                    b.next();
                }
            },
            (Some(&&entry), None) => {
                out.push(entry);
                a.next();
            }
            (None, Some(&&entry)) => {
                out.push(entry);
                b.next();
            }
            (None, None) => break,
        }
    }
    out
}

/// Weights of a joint for a bone running from `head` to `tail` (output
/// space).
///
/// With local weights, the lists of every axis except the one(s) the bone
/// extends furthest along are merged. Otherwise the node weights are used
/// as they are.
pub fn joint_weights(joint: &Joint, head: DVec3, tail: DVec3) -> Vec<(usize, f64)> {
    let Some(local) = &joint.local_weights else {
        return joint.node_weights.clone().unwrap_or_default();
    };

    let delta = (head - tail).abs();
    let longest = delta.max_element();
    let lists: Vec<&[(usize, f64)]> = (0..3)
        .filter(|&i| delta[i] < longest)
        .map(|i| local.axis(i))
        .collect();

    match lists.as_slice() {
        [] => Vec::new(),
        [only] => only.to_vec(),
        [first, rest @ ..] => rest
            .iter()
            .fold(first.to_vec(), |merged, list| merge_weights(&merged, list)),
    }
}

/// Weights of a joint as a vertex group, dropping those below `min_weight`.
pub fn weight_group(joint: &Joint, head: DVec3, tail: DVec3, min_weight: f64) -> BTreeMap<usize, f64> {
    joint_weights(joint, head, tail)
        .into_iter()
        .filter(|&(_, w)| w >= min_weight)
        .collect()
}
