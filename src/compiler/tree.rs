// This module turns the flat, level-annotated rule list of one page into a forest
// of rule trees. It keeps a stack of "last node seen at each level": a rule at
// level L is attached as the next child of the node at level L-1 (or as a new root
// when L is 0), the stack is truncated to L entries, and the new node is pushed at
// index L. A rule whose level exceeds the stack depth skipped past its parent and
// is a database defect. Node identifiers are the rule's position in the page,
// assigned in construction order, so tree node i always describes rule i and the
// tree's preorder walk visits rules in source order. Nodes live in the compile
// session's arena and are dropped wholesale when compilation finishes.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use super::error::{CompileError, CompileResult};
use crate::book::Rule;

/// One rule plus its ordered children. A node's identifier is its position
/// in the page, which is also its index in the tree's node vector.
#[derive(Debug)]
pub struct RuleNode<'arena> {
    pub children: BumpVec<'arena, u32>,
}

/// The rule forest of one page. `nodes[i]` describes `rules[i]`.
#[derive(Debug)]
pub struct RuleTree<'arena> {
    pub nodes: BumpVec<'arena, RuleNode<'arena>>,
    pub roots: BumpVec<'arena, u32>,
}

impl<'arena> RuleTree<'arena> {
    pub fn node(&self, id: u32) -> &RuleNode<'arena> {
        &self.nodes[id as usize]
    }
}

/// Build the rule forest for one page.
pub fn treeify<'arena>(
    arena: &'arena Bump,
    page: &str,
    rules: &[Rule],
) -> CompileResult<RuleTree<'arena>> {
    let mut tree = RuleTree {
        nodes: BumpVec::with_capacity_in(rules.len(), arena),
        roots: BumpVec::new_in(arena),
    };
    let mut stack: Vec<u32> = Vec::new();

    for (i, rule) in rules.iter().enumerate() {
        let id = i as u32;
        let level = rule.level as usize;
        if level > stack.len() {
            return Err(CompileError::LevelSkip {
                page: page.to_string(),
                level: rule.level,
                line: rule.line.clone(),
            });
        }

        tree.nodes.push(RuleNode {
            children: BumpVec::new_in(arena),
        });

        if level > 0 {
            let parent = stack[level - 1];
            tree.nodes[parent as usize].children.push(id);
        } else {
            tree.roots.push(id);
        }

        stack.truncate(level);
        stack.push(id);
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Kind, Offset};

    fn rule_at(level: u32) -> Rule {
        Rule {
            level,
            offset: Offset::Direct {
                offset: 0,
                relative: false,
            },
            kind: Kind::Name,
            description: String::new(),
            line: format!(">{level} test"),
        }
    }

    fn rules_at(levels: &[u32]) -> Vec<Rule> {
        levels.iter().copied().map(rule_at).collect()
    }

    /// Preorder walk emitting each node's depth.
    fn flatten(tree: &RuleTree<'_>) -> Vec<u32> {
        fn walk(tree: &RuleTree<'_>, id: u32, depth: u32, out: &mut Vec<u32>) {
            out.push(depth);
            for &child in &tree.node(id).children {
                walk(tree, child, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        for &root in &tree.roots {
            walk(tree, root, 0, &mut out);
        }
        out
    }

    #[test]
    fn round_trips_level_sequences() {
        let sequences: &[&[u32]] = &[
            &[],
            &[0],
            &[0, 0, 0],
            &[0, 1, 1, 0, 1, 2, 2, 1, 0],
            &[0, 1, 2, 3, 2, 1, 0, 1],
            &[0, 1, 2, 0, 1, 2],
        ];
        for levels in sequences {
            let arena = Bump::new();
            let tree = treeify(&arena, "page", &rules_at(levels)).expect("valid level sequence");
            assert_eq!(&flatten(&tree), levels, "sequence {levels:?}");
        }
    }

    #[test]
    fn preorder_matches_source_order() {
        let arena = Bump::new();
        let tree = treeify(&arena, "page", &rules_at(&[0, 1, 2, 1, 0, 1])).unwrap();
        assert_eq!(tree.roots.to_vec(), vec![0, 4]);
        assert_eq!(tree.node(0).children.to_vec(), vec![1, 3]);
        assert_eq!(tree.node(1).children.to_vec(), vec![2]);
        assert_eq!(tree.node(4).children.to_vec(), vec![5]);
    }

    #[test]
    fn level_skips_are_defects() {
        let arena = Bump::new();
        let err = treeify(&arena, "broken", &rules_at(&[0, 2])).unwrap_err();
        match err {
            CompileError::LevelSkip { page, level, .. } => {
                assert_eq!(page, "broken");
                assert_eq!(level, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let arena = Bump::new();
        assert!(treeify(&arena, "broken", &rules_at(&[1])).is_err());
    }

    #[test]
    fn ascending_reopens_the_right_sibling_list() {
        let arena = Bump::new();
        let tree = treeify(&arena, "page", &rules_at(&[0, 1, 2, 2, 1, 2, 0])).unwrap();
        assert_eq!(tree.roots.to_vec(), vec![0, 6]);
        assert_eq!(tree.node(0).children.to_vec(), vec![1, 4]);
        assert_eq!(tree.node(1).children.to_vec(), vec![2, 3]);
        assert_eq!(tree.node(4).children.to_vec(), vec![5]);
    }
}
