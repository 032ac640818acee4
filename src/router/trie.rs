//! Segment trie used by the router.
//!
//! Each node holds one `/`-separated segment of a route pattern. Siblings are
//! kept ordered static first, then `:name`, then `*name`; search walks
//! children in that order and returns the first registered node it reaches,
//! which is what gives exact segments precedence over parameters and
//! parameters precedence over catch-alls.

#[derive(Debug, Default)]
pub(crate) struct Node {
    /// Full pattern, set only on nodes that terminate a registered route.
    pattern: Option<String>,
    part: String,
    children: Vec<Node>,
    is_wild: bool,
}

impl Node {
    fn new(part: &str) -> Node {
        Node {
            pattern: None,
            part: part.to_string(),
            children: Vec::new(),
            is_wild: part.starts_with(':') || part.starts_with('*'),
        }
    }

    /// Sibling ordering key: static, then named parameter, then catch-all.
    fn rank(&self) -> u8 {
        if self.part.starts_with('*') {
            2
        } else if self.part.starts_with(':') {
            1
        } else {
            0
        }
    }

    pub(crate) fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub(crate) fn insert(&mut self, pattern: &str, parts: &[&str], height: usize) {
        if parts.len() == height {
            self.pattern = Some(pattern.to_string());
            return;
        }

        let part = parts[height];
        // Children are matched on the literal segment only, so `:id` and
        // `:name` at the same depth are distinct siblings.
        let index = match self.children.iter().position(|child| child.part == part) {
            Some(index) => index,
            None => {
                let child = Node::new(part);
                let at = self
                    .children
                    .iter()
                    .position(|sibling| sibling.rank() > child.rank())
                    .unwrap_or(self.children.len());
                self.children.insert(at, child);
                at
            }
        };
        self.children[index].insert(pattern, parts, height + 1);
    }

    pub(crate) fn search(&self, parts: &[&str], height: usize) -> Option<&Node> {
        if parts.len() == height || self.part.starts_with('*') {
            return self.pattern.as_ref().map(|_| self);
        }

        let part = parts[height];
        self.children
            .iter()
            .filter(|child| child.part == part || child.is_wild)
            .find_map(|child| child.search(parts, height + 1))
    }

    /// Collects every node that terminates a registered route, depth first.
    pub(crate) fn travel<'a>(&'a self, list: &mut Vec<&'a Node>) {
        if self.pattern.is_some() {
            list.push(self);
        }
        for child in &self.children {
            child.travel(list);
        }
    }
}
