use std::cmp::Ordering;

/// Handle to a node in the tree's arena. Valid until that node is detached.
pub type NodeId = usize;

struct AvlNode<T> {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    height: u32,
    subtree: u32,
    item: T,
}

/// Balanced ordered tree with parent links, ordered by an external
/// comparator. Every node carries its height and subtree size, so rank
/// queries (`find_by_rank`, `rank`) run in O(log n).
///
/// Nodes live in an index arena; the structural links are indices, which
/// keeps the parent back-pointer an ordinary field instead of a shared
/// reference. Duplicate keys (comparator says `Equal`) are routed to the
/// right subtree on insertion.
pub struct AvlTree<T> {
    slots: Vec<Option<AvlNode<T>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.size(self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.node(id).item
    }

    /// Insert `item`, keeping the tree ordered by `cmp`.
    pub fn insert<F>(&mut self, item: T, cmp: F) -> NodeId
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let id = self.alloc(item);
        let Some(mut cur) = self.root else {
            self.root = Some(id);
            return id;
        };
        loop {
            let go_left = cmp(&self.node(id).item, &self.node(cur).item) == Ordering::Less;
            if go_left {
                match self.node(cur).left {
                    Some(left) => cur = left,
                    None => {
                        self.node_mut(cur).left = Some(id);
                        break;
                    }
                }
            } else {
                match self.node(cur).right {
                    Some(right) => cur = right,
                    None => {
                        self.node_mut(cur).right = Some(id);
                        break;
                    }
                }
            }
        }
        self.node_mut(id).parent = Some(cur);
        self.fix_up(id);
        id
    }

    /// Classic BST search. `cmp` reports how the sought key compares to the
    /// probed item (`Less` descends left).
    pub fn find<F>(&self, cmp: F) -> Option<NodeId>
    where
        F: Fn(&T) -> Ordering,
    {
        let mut cur = self.root;
        while let Some(id) = cur {
            match cmp(&self.node(id).item) {
                Ordering::Equal => return Some(id),
                Ordering::Less => cur = self.node(id).left,
                Ordering::Greater => cur = self.node(id).right,
            }
        }
        None
    }

    /// Unlink the node and return its item. The tree is rebalanced along the
    /// whole path to the root; every other node id stays valid.
    pub fn detach(&mut self, id: NodeId) -> T {
        let (left, right) = {
            let node = self.node(id);
            (node.left, node.right)
        };
        if left.is_none() || right.is_none() {
            self.splice_out(id);
        } else {
            // Two children: splice out the in-order successor, then move it
            // into the victim's structural position.
            let mut succ = right.expect("right child present");
            while let Some(next) = self.node(succ).left {
                succ = next;
            }
            self.splice_out(succ);

            // Re-read the victim's links: the rebalance above may have
            // rotated around it.
            let (parent, left, right, height, subtree) = {
                let node = self.node(id);
                (node.parent, node.left, node.right, node.height, node.subtree)
            };
            {
                let s = self.node_mut(succ);
                s.parent = parent;
                s.left = left;
                s.right = right;
                s.height = height;
                s.subtree = subtree;
            }
            if let Some(child) = left {
                self.node_mut(child).parent = Some(succ);
            }
            if let Some(child) = right {
                self.node_mut(child).parent = Some(succ);
            }
            match parent {
                None => self.root = Some(succ),
                Some(p) => {
                    if self.node(p).left == Some(id) {
                        self.node_mut(p).left = Some(succ);
                    } else {
                        self.node_mut(p).right = Some(succ);
                    }
                }
            }
        }
        let node = self.slots[id].take().expect("detached node occupies its slot");
        self.free.push(id);
        node.item
    }

    /// Zero-based in-order position lookup.
    pub fn find_by_rank(&self, rank: usize) -> Option<NodeId> {
        if rank >= self.len() {
            return None;
        }
        let mut rank = rank;
        let mut cur = self.root.expect("non-empty tree has a root");
        loop {
            let left = self.node(cur).left;
            let left_size = self.size(left) as usize;
            match rank.cmp(&left_size) {
                Ordering::Equal => return Some(cur),
                Ordering::Less => cur = left.expect("rank inside left subtree"),
                Ordering::Greater => {
                    rank -= left_size + 1;
                    cur = self.node(cur).right.expect("rank inside right subtree");
                }
            }
        }
    }

    /// In-order position of a live node.
    pub fn rank(&self, id: NodeId) -> usize {
        let mut rank = self.size(self.node(id).left) as usize;
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            if self.node(parent).right == Some(cur) {
                rank += self.size(self.node(parent).left) as usize + 1;
            }
            cur = parent;
        }
        rank
    }

    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.node(id).right {
            let mut cur = right;
            while let Some(left) = self.node(cur).left {
                cur = left;
            }
            return Some(cur);
        }
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            if self.node(parent).left == Some(cur) {
                return Some(parent);
            }
            cur = parent;
        }
        None
    }

    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(left) = self.node(id).left {
            let mut cur = left;
            while let Some(right) = self.node(cur).right {
                cur = right;
            }
            return Some(cur);
        }
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            if self.node(parent).right == Some(cur) {
                return Some(parent);
            }
            cur = parent;
        }
        None
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
    }

    fn node(&self, id: NodeId) -> &AvlNode<T> {
        self.slots[id].as_ref().expect("live node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut AvlNode<T> {
        self.slots[id].as_mut().expect("live node id")
    }

    fn height(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |i| self.node(i).height)
    }

    fn size(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |i| self.node(i).subtree)
    }

    fn alloc(&mut self, item: T) -> NodeId {
        let node = AvlNode {
            parent: None,
            left: None,
            right: None,
            height: 1,
            subtree: 1,
            item,
        };
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn update(&mut self, id: NodeId) {
        let (left, right) = {
            let node = self.node(id);
            (node.left, node.right)
        };
        let height = 1 + self.height(left).max(self.height(right));
        let subtree = 1 + self.size(left) + self.size(right);
        let node = self.node_mut(id);
        node.height = height;
        node.subtree = subtree;
    }

    /// Rotations reparent the pivot but leave the old parent's child link to
    /// the caller ([`fix_up`] reattaches on its way to the root).
    fn rot_left(&mut self, x: NodeId) -> NodeId {
        let parent = self.node(x).parent;
        let y = self.node(x).right.expect("left rotation needs a right child");
        let inner = self.node(y).left;

        self.node_mut(x).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(x);
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(y).parent = parent;
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    fn rot_right(&mut self, x: NodeId) -> NodeId {
        let parent = self.node(x).parent;
        let y = self.node(x).left.expect("right rotation needs a left child");
        let inner = self.node(y).right;

        self.node_mut(x).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(x);
        }
        self.node_mut(y).right = Some(x);
        self.node_mut(y).parent = parent;
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    fn fix_left(&mut self, x: NodeId) -> NodeId {
        let left = self.node(x).left.expect("left-heavy node has a left child");
        if self.height(self.node(left).left) < self.height(self.node(left).right) {
            let new_left = self.rot_left(left);
            self.node_mut(x).left = Some(new_left);
        }
        self.rot_right(x)
    }

    fn fix_right(&mut self, x: NodeId) -> NodeId {
        let right = self.node(x).right.expect("right-heavy node has a right child");
        if self.height(self.node(right).right) < self.height(self.node(right).left) {
            let new_right = self.rot_right(right);
            self.node_mut(x).right = Some(new_right);
        }
        self.rot_left(x)
    }

    /// Walk from `start` to the root, refreshing height/size and rotating
    /// wherever the balance factor exceeds one.
    fn fix_up(&mut self, start: NodeId) {
        let mut cur = start;
        loop {
            self.update(cur);
            let left_height = self.height(self.node(cur).left);
            let right_height = self.height(self.node(cur).right);
            let parent = self.node(cur).parent;

            let mut fixed = cur;
            if left_height > right_height + 1 {
                fixed = self.fix_left(cur);
            } else if right_height > left_height + 1 {
                fixed = self.fix_right(cur);
            }

            match parent {
                Some(p) => {
                    if fixed != cur {
                        if self.node(p).left == Some(cur) {
                            self.node_mut(p).left = Some(fixed);
                        } else {
                            self.node_mut(p).right = Some(fixed);
                        }
                    }
                    cur = p;
                }
                None => {
                    self.root = Some(fixed);
                    return;
                }
            }
        }
    }

    /// Splice a node with at most one child out of the tree and rebalance
    /// upward from its parent. The slot itself stays occupied.
    fn splice_out(&mut self, id: NodeId) {
        let (left, right, parent) = {
            let node = self.node(id);
            (node.left, node.right, node.parent)
        };
        debug_assert!(left.is_none() || right.is_none());
        let child = left.or(right);
        if let Some(child) = child {
            self.node_mut(child).parent = parent;
        }
        match parent {
            None => self.root = child,
            Some(p) => {
                if self.node(p).left == Some(id) {
                    self.node_mut(p).left = child;
                } else {
                    self.node_mut(p).right = child;
                }
                self.fix_up(p);
            }
        }
    }
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
