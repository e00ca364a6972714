use std::fmt;

use ratcompose_content::generate_boundary;
use ratcompose_core::{BodyNode, BodyPart, ContentKind, Disposition};

use crate::error_mod::ComposeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Alternative,
    Multilingual,
}

impl GroupKind {
    pub fn subtype(self) -> &'static str {
        match self {
            GroupKind::Alternative => "alternative",
            GroupKind::Multilingual => "multilingual",
        }
    }

    fn description(self, member: Option<&str>) -> String {
        match (self, member) {
            (GroupKind::Alternative, Some(name)) => format!("Alternatives for \"{}\"", name),
            (GroupKind::Alternative, None) => "unknown alternative group".to_string(),
            (GroupKind::Multilingual, Some(name)) => format!("Multilingual part for \"{}\"", name),
            (GroupKind::Multilingual, None) => "unknown multilingual group".to_string(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Alternative => write!(f, "alternatives"),
            GroupKind::Multilingual => write!(f, "multilingual"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentNode {
    pub body: BodyPart,
    pub level: usize,
    pub parent_type: Option<ContentKind>,
    pub tagged: bool,
    /// The backing file belongs to the user and must survive an abort.
    pub unowned: bool,
    pub collapsed: bool,
    pub num: usize,
    next: Option<usize>,
    prev: Option<usize>,
    parent: Option<usize>,
    first_child: Option<usize>,
}

impl AttachmentNode {
    pub fn new(body: BodyPart) -> Self {
        Self {
            body,
            level: 0,
            parent_type: None,
            tagged: false,
            unowned: false,
            collapsed: false,
            num: 0,
            next: None,
            prev: None,
            parent: None,
            first_child: None,
        }
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }
}

/// Attachments in display order. Sibling, parent and child links are derived
/// from the levels after every structural change.
#[derive(Debug, Clone, Default)]
pub struct AttachmentTree {
    nodes: Vec<AttachmentNode>,
    visible: Vec<usize>,
}

impl AttachmentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a nested body into display order. Multipart containers that
    /// carry parts are transparent: their children take the container's level.
    pub fn from_bodies(bodies: Vec<BodyNode>) -> Self {
        let mut tree = Self::new();
        let mut work: Vec<(BodyNode, usize, Option<ContentKind>)> =
            bodies.into_iter().rev().map(|body| (body, 0, None)).collect();
        while let Some((node, level, parent_type)) = work.pop() {
            let BodyNode { part, parts } = node;
            let opaque = part.subtype == "encrypted";
            if part.is_container() && !opaque && !parts.is_empty() {
                let kind = part.kind;
                for child in parts.into_iter().rev() {
                    work.push((child, level, Some(kind)));
                }
                continue;
            }
            let mut entry = AttachmentNode::new(part).with_level(level);
            entry.parent_type = parent_type;
            tree.nodes.push(entry);
        }
        tree.relink();
        tree
    }

    /// Rebuilds the nested body structure from levels.
    pub fn into_bodies(self) -> Vec<BodyNode> {
        fn close(stack: &mut Vec<(usize, BodyNode)>, roots: &mut Vec<BodyNode>) {
            if let Some((_, done)) = stack.pop() {
                match stack.last_mut() {
                    Some((_, parent)) => parent.parts.push(done),
                    None => roots.push(done),
                }
            }
        }

        let mut roots = Vec::new();
        let mut stack: Vec<(usize, BodyNode)> = Vec::new();
        for node in self.nodes {
            while stack.last().map(|(level, _)| *level >= node.level).unwrap_or(false) {
                close(&mut stack, &mut roots);
            }
            stack.push((node.level, BodyNode::leaf(node.body)));
        }
        while !stack.is_empty() {
            close(&mut stack, &mut roots);
        }
        roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AttachmentNode> {
        self.nodes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut AttachmentNode> {
        self.nodes.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachmentNode> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AttachmentNode> {
        self.nodes.iter_mut()
    }

    pub fn next_of(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|node| node.next)
    }

    pub fn prev_of(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|node| node.prev)
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|node| node.parent)
    }

    pub fn first_child(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|node| node.first_child)
    }

    pub fn children(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = self.first_child(index);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.next_of(child);
        }
        out
    }

    /// Top-level traversal order, starting at the fundamental part.
    pub fn chain(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = if self.nodes.is_empty() { None } else { Some(0) };
        while let Some(index) = cursor {
            out.push(index);
            cursor = self.next_of(index);
        }
        out
    }

    /// One past the last descendant of `index`.
    pub fn subtree_end(&self, index: usize) -> usize {
        let Some(node) = self.nodes.get(index) else {
            return index;
        };
        let mut end = index + 1;
        while end < self.nodes.len() && self.nodes[end].level > node.level {
            end += 1;
        }
        end
    }

    pub fn tagged(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.tagged)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn visible_to_index(&self, visible: usize) -> Option<usize> {
        self.visible.get(visible).copied()
    }

    pub fn index_to_visible(&self, index: usize) -> Option<usize> {
        self.visible.iter().position(|&idx| idx == index)
    }

    /// Appends after the last node, at that node's level.
    pub fn add(&mut self, mut node: AttachmentNode) {
        match self.nodes.last() {
            Some(last) => {
                node.level = last.level;
                node.parent_type = last.parent_type;
            }
            None => node.level = 0,
        }
        self.nodes.push(node);
        self.relink();
    }

    pub fn insert_at(&mut self, node: AttachmentNode, index: usize) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
        self.relink();
    }

    /// Removes the node and its descendants, returning them for release.
    pub fn delete(&mut self, index: usize) -> Result<Vec<AttachmentNode>, ComposeError> {
        if index >= self.nodes.len() {
            return Err(ComposeError::NoAttachments);
        }
        if index == 0 {
            return Err(if self.nodes.len() == 1 {
                ComposeError::CannotDeleteLastAttachment
            } else {
                ComposeError::AttachmentPinned
            });
        }
        let end = self.subtree_end(index);
        let removed: Vec<AttachmentNode> = self.nodes.drain(index..end).collect();
        self.relink();
        Ok(removed)
    }

    /// Exchanges the subtree at `index` with its following sibling's subtree.
    /// For two leaves this is a plain swap of `index` and `index + 1`.
    pub fn swap_adjacent(&mut self, index: usize) -> Result<(), ComposeError> {
        if index == 0 {
            return Err(ComposeError::AttachmentPinned);
        }
        let Some(sibling) = self.next_of(index) else {
            return Err(ComposeError::AlreadyAtBottom);
        };
        let end = self.subtree_end(sibling);
        self.nodes[index..end].rotate_left(sibling - index);
        self.relink();
        Ok(())
    }

    /// Returns the node's new index.
    pub fn move_up(&mut self, index: usize) -> Result<usize, ComposeError> {
        if index == 0 {
            return Err(ComposeError::AttachmentPinned);
        }
        let Some(prev) = self.prev_of(index) else {
            return Err(ComposeError::AlreadyAtTop);
        };
        self.swap_adjacent(prev)?;
        Ok(prev)
    }

    /// Returns the node's new index.
    pub fn move_down(&mut self, index: usize) -> Result<usize, ComposeError> {
        if index == 0 {
            return Err(ComposeError::AttachmentPinned);
        }
        let Some(next) = self.next_of(index) else {
            return Err(ComposeError::AlreadyAtBottom);
        };
        let moved = self.subtree_end(next) - next;
        self.swap_adjacent(index)?;
        Ok(index + moved)
    }

    /// Wraps `members` in a new container placed where the first member was.
    /// Members keep their relative order and move with their subtrees.
    pub fn group(&mut self, kind: GroupKind, members: &[usize]) -> Result<usize, ComposeError> {
        let mut picked: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&idx| idx < self.nodes.len())
            .collect();
        picked.sort_unstable();
        picked.dedup();
        let roots: Vec<usize> = picked
            .iter()
            .copied()
            .filter(|&idx| {
                !picked
                    .iter()
                    .any(|&other| other < idx && idx < self.subtree_end(other))
            })
            .collect();
        if roots.len() < 2 {
            return Err(ComposeError::InsufficientTaggedItems { kind });
        }
        let parent = self.nodes[roots[0]].parent;
        if roots.iter().any(|&idx| self.nodes[idx].parent != parent) {
            return Err(ComposeError::MixedGroupParents);
        }

        let boundary =
            generate_boundary().map_err(|e| ComposeError::io("boundary", e.to_string()))?;
        let first = roots[0];
        let level = self.nodes[first].level;
        let mut extracted: Vec<Vec<AttachmentNode>> = Vec::with_capacity(roots.len());
        for &idx in roots.iter().rev() {
            let end = self.subtree_end(idx);
            extracted.push(self.nodes.drain(idx..end).collect());
        }
        extracted.reverse();

        let lead = &extracted[0][0].body;
        let lead_name = lead
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| Some(lead.label()).filter(|l| !l.is_empty()));
        let mut body = BodyPart::container(kind.subtype());
        body.description = Some(kind.description(lead_name.as_deref()));
        body.boundary = Some(boundary);
        let mut container = AttachmentNode::new(body).with_level(level);
        container.parent_type = extracted[0][0].parent_type;

        let mut spliced = vec![container];
        for subtree in extracted {
            for (pos, mut node) in subtree.into_iter().enumerate() {
                if pos == 0 {
                    node.tagged = false;
                    node.body.disposition = Disposition::Inline;
                    node.parent_type = Some(ContentKind::Multipart);
                }
                node.level += 1;
                spliced.push(node);
            }
        }
        self.nodes.splice(first..first, spliced);
        self.relink();
        Ok(first)
    }

    pub fn toggle_collapse(&mut self, index: usize) -> bool {
        if self.first_child(index).is_none() {
            return false;
        }
        if let Some(node) = self.nodes.get_mut(index) {
            node.collapsed = !node.collapsed;
        }
        self.relink();
        true
    }

    pub fn clear(&mut self) -> Vec<AttachmentNode> {
        let drained = std::mem::take(&mut self.nodes);
        self.visible.clear();
        drained
    }

    /// Recomputes sibling, parent and child indices plus the visible map.
    fn relink(&mut self) {
        let mut open: Vec<usize> = Vec::new();
        for idx in 0..self.nodes.len() {
            let level = self.nodes[idx].level.min(open.len());
            let node = &mut self.nodes[idx];
            node.level = level;
            node.num = idx;
            node.next = None;
            node.prev = None;
            node.parent = None;
            node.first_child = None;

            if let Some(&prev) = open.get(level) {
                self.nodes[prev].next = Some(idx);
                self.nodes[idx].prev = Some(prev);
            }
            open.truncate(level);
            if let Some(&parent) = open.last() {
                self.nodes[idx].parent = Some(parent);
                if self.nodes[parent].first_child.is_none() {
                    self.nodes[parent].first_child = Some(idx);
                }
            }
            open.push(idx);
        }

        self.visible.clear();
        let mut hidden_below: Option<usize> = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some(level) = hidden_below {
                if node.level > level {
                    continue;
                }
                hidden_below = None;
            }
            self.visible.push(idx);
            if node.collapsed {
                hidden_below = Some(node.level);
            }
        }
    }

    /// Verifies that the derived links agree with display order.
    pub fn check_consistency(&self) -> Result<(), String> {
        let top: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.nodes[idx].level == 0)
            .collect();
        if self.chain() != top {
            return Err(format!("chain {:?} != top level {:?}", self.chain(), top));
        }
        let mut owner: Vec<Option<usize>> = vec![None; self.nodes.len()];
        for idx in 0..self.nodes.len() {
            let level = self.nodes[idx].level;
            let end = self.subtree_end(idx);
            let expected: Vec<usize> = (idx + 1..end)
                .filter(|&child| self.nodes[child].level == level + 1)
                .collect();
            let children = self.children(idx);
            if children != expected {
                return Err(format!(
                    "children of {} are {:?}, expected {:?}",
                    idx, children, expected
                ));
            }
            if let Some(&first) = children.first() {
                if first != idx + 1 {
                    return Err(format!("first child of {} is {}", idx, first));
                }
            }
            for child in children {
                if let Some(other) = owner[child] {
                    return Err(format!("{} reachable from {} and {}", child, other, idx));
                }
                owner[child] = Some(idx);
                if self.parent_of(child) != Some(idx) {
                    return Err(format!("parent of {} is not {}", child, idx));
                }
            }
        }
        Ok(())
    }
}
