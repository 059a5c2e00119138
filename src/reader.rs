//! A forward pull cursor over a parse index.
//!
//! The reader is the primary consumption interface for extractors: it
//! exposes the current node, the path to it, and three ways to move
//! forward.  `next_token` steps one node, `next_structure` skips a whole
//! container in one bound (openers know where their closers are), and
//! `next_key` hops between the keys of one object without descending into
//! the values.
//!
//! The current node and path are cached and rebuilt lazily; any
//! advancement invalidates both.  Path reconstruction replays the index
//! from the start up to the cursor, so it costs O(cursor) on the first
//! ask after a move.

use std::cell::{Cell, RefCell};

use crate::errors::{ExtractionError, ReaderError};
use crate::index::{decode_node, word_type, AstNode, AstNodeType};
use crate::path::{Path, PathElement};

/// A pull cursor borrowing a [`ParseIndex`](crate::index::ParseIndex).
pub struct Reader<'i> {
    source: &'i str,
    codes: &'i [u64],
    cursor: usize,
    current: Cell<Option<AstNode<'i>>>,
    current_path: RefCell<Option<Path>>,
}

impl<'i> Reader<'i> {
    pub(crate) fn over(source: &'i str, codes: &'i [u64]) -> Reader<'i> {
        Reader {
            source,
            codes,
            cursor: 0,
            current: Cell::new(None),
            current_path: RefCell::new(None),
        }
    }

    /// Whether the cursor still points at a node.
    pub fn good(&self) -> bool {
        self.cursor < self.codes.len()
    }

    fn invalidate(&mut self) {
        self.current.set(None);
        *self.current_path.borrow_mut() = None;
    }

    /// The node at the cursor.
    pub fn current(&self) -> Result<AstNode<'i>, ReaderError> {
        if let Some(node) = self.current.get() {
            return Ok(node);
        }
        match decode_node(self.source, self.codes, self.cursor) {
            Some(node) => {
                self.current.set(Some(node));
                Ok(node)
            }
            None => Err(ReaderError::PastEnd),
        }
    }

    /// The byte offset of the current node's token in the source text.
    pub fn current_offset(&self) -> Result<usize, ReaderError> {
        match self.codes.get(self.cursor) {
            Some(word) => Ok((*word >> 8) as usize),
            None => Err(ReaderError::PastEnd),
        }
    }

    /// The path to the current node.
    ///
    /// A key and the value that follows it share the key's path; an array
    /// opener's path is the array itself until the first element is
    /// reached.
    pub fn current_path(&self) -> Result<Path, ReaderError> {
        if !self.good() {
            return Err(ReaderError::PastEnd);
        }
        if let Some(path) = self.current_path.borrow().as_ref() {
            return Ok(path.clone());
        }
        let path = self.build_path();
        *self.current_path.borrow_mut() = Some(path.clone());
        Ok(path)
    }

    /// Advance one node.  Returns false once the cursor passes the final
    /// node; further calls keep returning false.
    pub fn next_token(&mut self) -> bool {
        if self.cursor >= self.codes.len() {
            return false;
        }
        self.cursor += word_type(self.codes[self.cursor]).code_size();
        self.invalidate();
        self.cursor < self.codes.len()
    }

    /// Skip past the structure the cursor is in: advance until the
    /// current structure closes, landing on the token after the matching
    /// closer.  On a closer, behaves like `next_token`.  A document whose
    /// root is not a container terminates at `document_end`.
    pub fn next_structure(&mut self) -> bool {
        match self.current() {
            Ok(node)
                if matches!(
                    node.node_type(),
                    AstNodeType::ObjectEnd | AstNodeType::ArrayEnd
                ) =>
            {
                return self.next_token();
            }
            Ok(_) => {}
            Err(_) => return false,
        }

        let mut depth = 1usize;
        while self.next_token() {
            let node_type = match self.current() {
                Ok(node) => node.node_type(),
                Err(_) => return false,
            };
            match node_type {
                AstNodeType::ObjectEnd | AstNodeType::ArrayEnd => {
                    depth -= 1;
                    if depth == 0 {
                        return self.next_token();
                    }
                }
                AstNodeType::ObjectBegin | AstNodeType::ArrayBegin => depth += 1,
                AstNodeType::DocumentEnd if depth == 1 => return true,
                _ => {}
            }
        }
        false
    }

    /// From a key or an object opener, advance to the object's next key,
    /// or to its `object_end` when no keys remain.
    pub fn next_key(&mut self) -> Result<bool, ReaderError> {
        let current_type = self.current()?.node_type();
        if !matches!(
            current_type,
            AstNodeType::KeyCanonical | AstNodeType::KeyEscaped | AstNodeType::ObjectBegin
        ) {
            return Err(ReaderError::NotAKey(current_type));
        }

        if !self.next_token() {
            return Ok(false);
        }
        if matches!(
            self.current()?.node_type(),
            AstNodeType::KeyCanonical | AstNodeType::KeyEscaped | AstNodeType::ObjectEnd
        ) {
            return Ok(true);
        }

        // The cursor is on the key's value.  Track depth so nested
        // structures are crossed in full, then land on whatever follows.
        let mut depth = 0isize;
        loop {
            match self.current()?.node_type() {
                AstNodeType::ObjectEnd | AstNodeType::ArrayEnd | AstNodeType::DocumentEnd => {
                    depth -= 1;
                }
                AstNodeType::ObjectBegin | AstNodeType::ArrayBegin => depth += 1,
                _ => {}
            }
            if depth == 0 {
                return Ok(self.next_token());
            }
            if !self.next_token() {
                return Ok(false);
            }
        }
    }

    /// Fail with an [`ExtractionError`] at the current path unless the
    /// current node has the given type.
    pub fn expect(&self, node_type: AstNodeType) -> Result<(), ExtractionError> {
        match self.current() {
            Ok(node) if node.node_type() == node_type => Ok(()),
            Ok(node) => Err(ExtractionError::single(
                self.current_path().unwrap_or_default(),
                format!(
                    "read node of type {} when expecting {}",
                    node.node_type(),
                    node_type
                ),
            )),
            Err(_) => Err(ExtractionError::single(
                Path::root(),
                format!("reader is past the end of the index, expecting {node_type}"),
            )),
        }
    }

    /// Fail unless the current node's type is one of `types`.
    pub fn expect_one_of(&self, types: &[AstNodeType]) -> Result<(), ExtractionError> {
        match self.current() {
            Ok(node) if types.contains(&node.node_type()) => Ok(()),
            Ok(node) => {
                let mut expected = String::new();
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        expected.push_str(", ");
                    }
                    expected.push_str(&t.to_string());
                }
                Err(ExtractionError::single(
                    self.current_path().unwrap_or_default(),
                    format!(
                        "read node of type {} when expecting one of {expected}",
                        node.node_type()
                    ),
                ))
            }
            Err(_) => Err(ExtractionError::single(
                Path::root(),
                "reader is past the end of the index",
            )),
        }
    }

    // ── Path reconstruction ──────────────────────────────────

    fn build_path(&self) -> Path {
        enum FrameNode<'i> {
            Array,
            Object,
            Key { token: &'i str, escaped: bool },
        }
        // The counter starts below zero so an array opener's own node
        // does not count as its first element.
        let mut stack: Vec<(FrameNode<'i>, i64)> = Vec::new();

        let mut at = 0usize;
        while at <= self.cursor {
            let node = match decode_node(self.source, self.codes, at) {
                Some(node) => node,
                None => break,
            };

            if let Some((frame_node, index)) = stack.last_mut() {
                if matches!(frame_node, FrameNode::Array) {
                    *index += 1;
                }
            }

            match node {
                AstNode::ObjectBegin { .. } => stack.push((FrameNode::Object, -1)),
                AstNode::ArrayBegin { .. } => stack.push((FrameNode::Array, -1)),
                AstNode::ObjectEnd | AstNode::ArrayEnd => {
                    stack.pop();
                }
                AstNode::Key { token, escaped } => {
                    if let Some(top) = stack.last_mut() {
                        top.0 = FrameNode::Key { token, escaped };
                    }
                }
                _ => {}
            }

            at += node.node_type().code_size();
        }

        let mut elements = Vec::with_capacity(stack.len());
        for (node, index) in stack {
            match node {
                FrameNode::Key { token, escaped } => {
                    let key = crate::index::decode_string_token(token, escaped)
                        .map(|key| key.into_owned())
                        .unwrap_or_else(|_| token.to_owned());
                    elements.push(PathElement::Key(key));
                }
                FrameNode::Array => {
                    // Still below zero means no element has been visited;
                    // the path names the array itself, not a slot in it.
                    if index >= 0 {
                        elements.push(PathElement::Index(index as usize));
                    }
                }
                FrameNode::Object => {}
            }
        }
        Path::new(elements)
    }
}
