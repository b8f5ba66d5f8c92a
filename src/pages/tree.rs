//! Materialized-path page tree.
//!
//! Every page stores the concatenation of its ancestors' four-character
//! base-36 segments, so `0001` is the root, `00010001` its first child and so on.
//! Depth is the path length divided by the segment width.

use std::collections::HashMap;
use thiserror::Error;

pub const STEP: usize = 4;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_SEGMENT: u64 = 36u64.pow(STEP as u32) - 1;

pub const ROOT_PATH: &str = "0001";
pub const ROOT_URL_PATH: &str = "/";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid tree path '{0}'")]
    InvalidPath(String),

    #[error("No room for more children under '{0}'")]
    PathOverflow(String),

    #[error("The tree has no root page")]
    MissingRoot,

    #[error("A page with slug '{slug}' already exists under this parent")]
    DuplicateSlug { slug: String },
}

/// Encode `n` (1-based) as a fixed-width segment.
pub fn encode_segment(n: u64) -> Result<String, TreeError> {
    if n == 0 || n > MAX_SEGMENT {
        return Err(TreeError::PathOverflow(n.to_string()));
    }
    let mut out = [b'0'; STEP];
    let mut rest = n;
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(rest % 36) as usize];
        rest /= 36;
    }
    Ok(out.iter().map(|b| *b as char).collect())
}

pub fn decode_segment(segment: &str) -> Result<u64, TreeError> {
    if segment.len() != STEP {
        return Err(TreeError::InvalidPath(segment.to_string()));
    }
    segment.bytes().try_fold(0u64, |acc, b| {
        let digit = ALPHABET
            .iter()
            .position(|c| *c == b)
            .ok_or_else(|| TreeError::InvalidPath(segment.to_string()))?;
        Ok(acc * 36 + digit as u64)
    })
}

pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.len() % STEP == 0
        && path.bytes().all(|b| ALPHABET.contains(&b))
}

pub fn depth_of(path: &str) -> i32 {
    (path.len() / STEP) as i32
}

pub fn parent_path(path: &str) -> Option<&str> {
    (path.len() > STEP).then(|| &path[..path.len() - STEP])
}

pub fn is_descendant_of(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() && path.starts_with(ancestor)
}

/// Path for the `n`th child (1-based) of `parent`.
pub fn child_path(parent: &str, n: u64) -> Result<String, TreeError> {
    Ok(format!("{}{}", parent, encode_segment(n)?))
}

/// Path after the last existing child, or the first child path.
pub fn next_child_path(parent: &str, last_child: Option<&str>) -> Result<String, TreeError> {
    match last_child {
        None => child_path(parent, 1),
        Some(last) => {
            let segment = last
                .strip_prefix(parent)
                .filter(|s| s.len() == STEP)
                .ok_or_else(|| TreeError::InvalidPath(last.to_string()))?;
            let n = decode_segment(segment)?;
            child_path(parent, n + 1).map_err(|_| TreeError::PathOverflow(parent.to_string()))
        }
    }
}

pub fn child_url_path(parent_url_path: &str, slug: &str) -> String {
    format!("{}{}/", parent_url_path, slug)
}

/// The columns of a page the tree cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: i64,
    pub path: String,
    pub depth: i32,
    pub numchild: i32,
    pub slug: String,
    pub url_path: String,
}

/// One correction found by [`repair_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeFix {
    Depth { id: i64, from: i32, to: i32 },
    NumChild { id: i64, from: i32, to: i32 },
    UrlPath { id: i64, from: String, to: String },
    /// Page whose parent path does not exist; reported, never deleted
    Orphan { id: i64, path: String },
}

impl TreeFix {
    pub fn page_id(&self) -> i64 {
        match self {
            TreeFix::Depth { id, .. }
            | TreeFix::NumChild { id, .. }
            | TreeFix::UrlPath { id, .. }
            | TreeFix::Orphan { id, .. } => *id,
        }
    }
}

/// Compare stored depth, numchild and url_path against what the paths imply.
pub fn repair_plan(nodes: &[TreeNode]) -> Vec<TreeFix> {
    let mut sorted: Vec<&TreeNode> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let by_path: HashMap<&str, &TreeNode> = sorted.iter().map(|n| (n.path.as_str(), *n)).collect();
    let mut children: HashMap<&str, i32> = HashMap::new();
    for node in &sorted {
        if let Some(parent) = parent_path(&node.path) {
            *children.entry(parent).or_default() += 1;
        }
    }

    let mut fixes = Vec::new();
    let mut url_paths: HashMap<&str, String> = HashMap::new();

    for node in &sorted {
        if !is_valid_path(&node.path) {
            fixes.push(TreeFix::Orphan {
                id: node.id,
                path: node.path.clone(),
            });
            continue;
        }

        let depth = depth_of(&node.path);
        if node.depth != depth {
            fixes.push(TreeFix::Depth {
                id: node.id,
                from: node.depth,
                to: depth,
            });
        }

        let numchild = children.get(node.path.as_str()).copied().unwrap_or(0);
        if node.numchild != numchild {
            fixes.push(TreeFix::NumChild {
                id: node.id,
                from: node.numchild,
                to: numchild,
            });
        }

        let expected_url = match parent_path(&node.path) {
            None => Some(ROOT_URL_PATH.to_string()),
            Some(parent) if by_path.contains_key(parent) => url_paths
                .get(parent)
                .map(|parent_url| child_url_path(parent_url, &node.slug)),
            Some(_) => {
                fixes.push(TreeFix::Orphan {
                    id: node.id,
                    path: node.path.clone(),
                });
                None
            }
        };

        if let Some(expected) = expected_url {
            if node.url_path != expected {
                fixes.push(TreeFix::UrlPath {
                    id: node.id,
                    from: node.url_path.clone(),
                    to: expected.clone(),
                });
            }
            url_paths.insert(node.path.as_str(), expected);
        }
    }

    fixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, path: &str, depth: i32, numchild: i32, slug: &str, url: &str) -> TreeNode {
        TreeNode {
            id,
            path: path.into(),
            depth,
            numchild,
            slug: slug.into(),
            url_path: url.into(),
        }
    }

    #[test]
    fn test_segments_round_trip() {
        for n in [1, 9, 10, 35, 36, 1295, 46655, MAX_SEGMENT] {
            let seg = encode_segment(n).unwrap();
            assert_eq!(seg.len(), STEP);
            assert_eq!(decode_segment(&seg).unwrap(), n);
        }
        assert_eq!(encode_segment(1).unwrap(), "0001");
        assert_eq!(encode_segment(10).unwrap(), "000A");
        assert_eq!(encode_segment(36).unwrap(), "0010");
        assert!(encode_segment(0).is_err());
        assert!(encode_segment(MAX_SEGMENT + 1).is_err());
        assert!(decode_segment("00a1").is_err());
    }

    #[test]
    fn test_child_paths_increase() {
        let mut last: Option<String> = None;
        for _ in 0..40 {
            let next = next_child_path(ROOT_PATH, last.as_deref()).unwrap();
            if let Some(prev) = &last {
                assert!(next > *prev);
            }
            assert_eq!(parent_path(&next), Some(ROOT_PATH));
            last = Some(next);
        }
        assert_eq!(last.as_deref(), Some("00010014"));
    }

    #[test]
    fn test_full_parent_overflows() {
        let last = child_path(ROOT_PATH, MAX_SEGMENT).unwrap();
        assert_eq!(
            next_child_path(ROOT_PATH, Some(&last)),
            Err(TreeError::PathOverflow(ROOT_PATH.to_string()))
        );
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(depth_of("000100020003"), 3);
        assert_eq!(parent_path("0001"), None);
        assert_eq!(parent_path("00010002"), Some("0001"));
        assert!(is_descendant_of("000100020003", "0001"));
        assert!(!is_descendant_of("0001", "0001"));
        assert!(is_valid_path("0001000A"));
        assert!(!is_valid_path("0001000"));
        assert_eq!(child_url_path("/home/", "about"), "/home/about/");
    }

    #[test]
    fn test_consistent_tree_needs_no_fixes() {
        let nodes = vec![
            node(1, "0001", 1, 1, "root", "/"),
            node(2, "00010001", 2, 2, "home", "/home/"),
            node(3, "000100010001", 3, 0, "about", "/home/about/"),
            node(4, "000100010002", 3, 0, "rules", "/home/rules/"),
        ];
        assert!(repair_plan(&nodes).is_empty());
    }

    #[test]
    fn test_repair_plan_finds_problems() {
        let nodes = vec![
            node(1, "0001", 1, 0, "root", "/"),
            node(2, "00010001", 3, 0, "home", "/home/"),
            node(3, "000100010001", 3, 0, "about", "/old-home/about/"),
            node(9, "000100050001", 3, 0, "lost", "/lost/"),
        ];
        let fixes = repair_plan(&nodes);
        assert_eq!(
            fixes,
            vec![
                TreeFix::NumChild { id: 1, from: 0, to: 1 },
                TreeFix::Depth { id: 2, from: 3, to: 2 },
                TreeFix::NumChild { id: 2, from: 0, to: 1 },
                TreeFix::UrlPath {
                    id: 3,
                    from: "/old-home/about/".into(),
                    to: "/home/about/".into()
                },
                TreeFix::Orphan {
                    id: 9,
                    path: "000100050001".into()
                },
            ]
        );
    }

    #[test]
    fn test_malformed_path_is_reported() {
        let nodes = vec![
            node(1, "0001", 1, 0, "root", "/"),
            node(7, "0001xyz", 2, 0, "bad", "/bad/"),
        ];
        assert_eq!(
            repair_plan(&nodes),
            vec![TreeFix::Orphan {
                id: 7,
                path: "0001xyz".into()
            }]
        );
    }
}
