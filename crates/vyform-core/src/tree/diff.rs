// ── Diff engine ──
//
// Compares a desired tree against a live tree and returns what must be
// set and what must be deleted. Children are matched by key; leaf-list
// values are matched as a multiset.

use super::{Block, TypedValue};

/// Output of [`diff`]: `changed` is to be SET, `missing` is to be DELETEd.
///
/// Both trees are rooted at the input's key. `None` means nothing to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDiff {
    pub changed: Option<Block>,
    pub missing: Option<Block>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_none() && self.missing.is_none()
    }
}

/// Diff `desired` against `live`.
pub fn diff(desired: Option<&Block>, live: Option<&Block>) -> TreeDiff {
    match (desired, live) {
        (None, None) => TreeDiff::default(),
        (Some(desired), None) => TreeDiff {
            changed: non_empty(desired.clone()),
            missing: None,
        },
        (None, Some(live)) => TreeDiff {
            changed: None,
            missing: non_empty(live.clone()),
        },
        (Some(desired), Some(live)) => {
            let (changed, missing) = diff_block(desired, live);
            TreeDiff {
                changed: non_empty(changed),
                missing: non_empty(missing),
            }
        }
    }
}

fn non_empty(block: Block) -> Option<Block> {
    (!block.is_empty()).then_some(block)
}

fn diff_block(desired: &Block, live: &Block) -> (Block, Block) {
    let mut changed = desired.shell();
    let mut missing = live.shell();

    diff_values(desired.values(), live.values(), &mut changed, &mut missing);

    for child in live.children() {
        if desired.child(child.key()).is_none() {
            missing.attach(child.clone());
        }
    }
    for child in desired.children() {
        match live.child(child.key()) {
            None => {
                changed.attach(child.clone());
            }
            Some(live_child) => {
                let (c, m) = diff_block(child, live_child);
                if !c.is_empty() {
                    changed.attach(c);
                }
                if !m.is_empty() {
                    missing.attach(m);
                }
            }
        }
    }

    (changed, missing)
}

fn diff_values(desired: &[TypedValue], live: &[TypedValue], changed: &mut Block, missing: &mut Block) {
    if desired.len() <= 1 && live.len() <= 1 {
        match (desired.first(), live.first()) {
            (Some(d), Some(l)) if d.matches(l) => {}
            // The device needs the prior value to scope the delete.
            (Some(d), Some(l)) => {
                changed.push_value(d.clone());
                missing.push_value(l.clone());
            }
            (Some(d), None) => changed.push_value(d.clone()),
            (None, Some(l)) => missing.push_value(l.clone()),
            (None, None) => {}
        }
        return;
    }

    let mut desired_matched = vec![false; desired.len()];
    let mut live_matched = vec![false; live.len()];
    for (li, l) in live.iter().enumerate() {
        let hit = desired
            .iter()
            .enumerate()
            .find(|(di, d)| !desired_matched[*di] && d.matches(l))
            .map(|(di, _)| di);
        if let Some(di) = hit {
            desired_matched[di] = true;
            live_matched[li] = true;
        }
    }

    for (value, _) in live.iter().zip(&live_matched).filter(|(_, m)| !**m) {
        missing.push_value(value.clone());
    }
    for (value, _) in desired.iter().zip(&desired_matched).filter(|(_, m)| !**m) {
        changed.push_value(value.clone());
    }
}
