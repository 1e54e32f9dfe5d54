//! Address parsing, node-name sanitising and node lookup.
//!
//! Addresses are slash-delimited paths such as `/mixer/gain`. A leading
//! `device:` prefix is accepted and ignored, as is a missing leading slash.
//!
//! Lookup by pattern is delegated to a [`NodeResolver`]. Two resolvers ship
//! with the crate:
//!
//! - [`ExactResolver`]: the address names exactly one node
//! - [`WildcardResolver`]: `*` matches one segment, `**` any number of
//!   segments (including none)

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::Node;

const RESERVED: &[char] = &[' ', '#', '*', ',', '/', '?', '[', ']', '{', '}', '$', ':', '"', '\\'];

fn is_reserved(c: char) -> bool {
    c.is_control() || RESERVED.contains(&c)
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(is_reserved)
}

/// Replaces every reserved character with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .collect()
}

/// Splits an address into its segments. The root address (`/` or empty)
/// has none.
pub fn split_address(address: &str) -> Result<Vec<&str>> {
    let path = match address.split_once(':') {
        Some((device, rest)) if !device.contains('/') => rest,
        _ => address,
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.iter().find(|s| !is_valid_name(s)) {
        Some(_) => Err(Error::InvalidAddress(address.to_owned())),
        None => Ok(segments),
    }
}

/// Walks exact segments from `root`.
pub fn find_node(root: &Arc<Node>, address: &str) -> Option<Arc<Node>> {
    let segments = split_address(address).ok()?;
    let mut node = Arc::clone(root);
    for segment in segments {
        node = node.find_child(segment)?;
    }
    Some(node)
}

/// Resolves an address or pattern to the nodes it designates.
pub trait NodeResolver: Send + Sync {
    fn resolve(&self, root: &Arc<Node>, pattern: &str) -> Vec<Arc<Node>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactResolver;

impl NodeResolver for ExactResolver {
    fn resolve(&self, root: &Arc<Node>, pattern: &str) -> Vec<Arc<Node>> {
        find_node(root, pattern).into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardResolver;

impl NodeResolver for WildcardResolver {
    fn resolve(&self, root: &Arc<Node>, pattern: &str) -> Vec<Arc<Node>> {
        let pattern = match pattern.split_once(':') {
            Some((device, rest)) if !device.contains('/') => rest,
            _ => pattern,
        };
        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut out = Vec::new();
        match_segments(root, &segments, &mut out);
        // `**` can reach the same node along several paths
        let mut seen = std::collections::HashSet::new();
        out.retain(|n| seen.insert(Arc::as_ptr(n)));
        out
    }
}

fn match_segments(node: &Arc<Node>, segments: &[&str], out: &mut Vec<Arc<Node>>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(Arc::clone(node));
        return;
    };
    match *head {
        "**" => {
            match_segments(node, rest, out);
            for child in node.children() {
                match_segments(&child, segments, out);
            }
        }
        "*" => {
            for child in node.children() {
                match_segments(&child, rest, out);
            }
        }
        name => {
            if let Some(child) = node.find_child(name) {
                match_segments(&child, rest, out);
            }
        }
    }
}

/// Whether `address` falls under a preset-style selector: `/**` and `**`
/// match everything, `/a/**` the subtree at `/a`, `/a/*` its direct
/// children, anything else is an exact match.
pub fn selector_matches(selector: &str, address: &str) -> bool {
    if selector == "/**" || selector == "**" {
        return true;
    }
    if let Some(prefix) = selector.strip_suffix("/**") {
        return address == prefix
            || address
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
    }
    if let Some(prefix) = selector.strip_suffix("/*") {
        let rest = address.strip_prefix(prefix).unwrap_or("");
        let rest = rest.strip_prefix('/').unwrap_or("");
        return !rest.is_empty() && !rest.contains('/');
    }
    selector == address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split() {
        assert_eq!(split_address("/a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(split_address("a//b/").unwrap(), vec!["a", "b"]);
        assert_eq!(split_address("synth:/osc/freq").unwrap(), vec!["osc", "freq"]);
        assert!(split_address("/").unwrap().is_empty());
        assert!(split_address("/a/b*c").is_err());
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_name("my gain?"), "my_gain_");
        assert_eq!(sanitize_name("freq.1"), "freq.1");
        assert!(is_valid_name("gain"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn selectors() {
        assert!(selector_matches("/**", "/x/y"));
        assert!(selector_matches("/mixer/**", "/mixer"));
        assert!(selector_matches("/mixer/**", "/mixer/ch/1"));
        assert!(!selector_matches("/mixer/**", "/mixerx"));
        assert!(selector_matches("/mixer/*", "/mixer/gain"));
        assert!(!selector_matches("/mixer/*", "/mixer/ch/1"));
        assert!(selector_matches("/a", "/a"));
    }
}
