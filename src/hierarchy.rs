use std::fmt;

use serde::Serialize;

/// workspace階層のノード種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Space,
    Folder,
    List,
    Task,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Space => "space",
            Self::Folder => "folder",
            Self::List => "list",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// arena内のノード位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIndex(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    children: Vec<NodeIndex>,
}

/// space → folder → list → task のworkspace階層のスナップショット。
///
/// ノードはarenaに保持し、子は追加した順に並ぶ。探索はスタックを使った
/// 深さ優先の行きがけ順で行い、再帰はしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy {
    /// 合成されたrootだけを持つ階層を返す。
    pub fn new() -> Self {
        Self {
            nodes: vec![HierarchyNode {
                id: String::new(),
                name: String::new(),
                kind: NodeKind::Root,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// `parent`の最後の子としてノードを追加する。
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(HierarchyNode {
            id: id.into(),
            name: name.into(),
            kind,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(index);
        index
    }

    pub fn node(&self, index: NodeIndex) -> &HierarchyNode {
        &self.nodes[index.0]
    }

    /// rootを除いたノード数。
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 行きがけ順でノードを列挙する。rootは含まない。
    pub fn iter(&self) -> Preorder<'_> {
        let mut stack = self.nodes[0].children.clone();
        stack.reverse();
        Preorder {
            hierarchy: self,
            stack,
        }
    }

    /// 指定した種別のノードを行きがけ順で列挙する。
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &HierarchyNode> {
        self.iter().filter(move |node| node.kind == kind)
    }

    /// 名前が一致する最初のノードを返す。
    ///
    /// 大文字小文字は区別しない完全一致。同名のノードが複数ある場合も
    /// 探索順で最初に見つかったものを返す。
    pub fn find_by_name(&self, name: &str, kind: NodeKind) -> Option<&HierarchyNode> {
        self.find_all_by_name(name, kind).next()
    }

    /// 名前が一致するノードを探索順ですべて返す。
    pub fn find_all_by_name<'a>(
        &'a self,
        name: &str,
        kind: NodeKind,
    ) -> impl Iterator<Item = &'a HierarchyNode> {
        let needle = name.to_lowercase();
        self.nodes_of_kind(kind)
            .filter(move |node| node.name.to_lowercase() == needle)
    }
}

/// 階層の行きがけ順イテレーター。
pub struct Preorder<'a> {
    hierarchy: &'a Hierarchy,
    stack: Vec<NodeIndex>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a HierarchyNode;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let node = self.hierarchy.node(index);
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use rstest::rstest;

    use super::{Hierarchy, NodeKind};

    /// Engineering
    ///   Backend (folder)
    ///     Sprint 1 (list)
    ///       Fix Bug (task)
    ///   Inbox (list)
    /// Marketing
    ///   Inbox (list)
    static TREE: Lazy<Hierarchy> = Lazy::new(|| {
        let mut tree = Hierarchy::new();
        let root = tree.root();
        let engineering = tree.add_child(root, "s1", "Engineering", NodeKind::Space);
        let backend = tree.add_child(engineering, "f1", "Backend", NodeKind::Folder);
        let sprint = tree.add_child(backend, "l1", "Sprint 1", NodeKind::List);
        tree.add_child(sprint, "t1", "Fix Bug", NodeKind::Task);
        tree.add_child(engineering, "l2", "Inbox", NodeKind::List);
        let marketing = tree.add_child(root, "s2", "Marketing", NodeKind::Space);
        tree.add_child(marketing, "l3", "Inbox", NodeKind::List);
        tree
    });

    #[test]
    fn test_preorder() {
        let ids: Vec<&str> = TREE.iter().map(|node| node.id.as_str()).collect();

        assert_eq!(ids, vec!["s1", "f1", "l1", "t1", "l2", "s2", "l3"]);
        assert_eq!(TREE.len(), 7);
    }

    #[rstest]
    #[case::exact("Sprint 1", NodeKind::List, Some("l1"))]
    #[case::lowercase("sprint 1", NodeKind::List, Some("l1"))]
    #[case::uppercase("ENGINEERING", NodeKind::Space, Some("s1"))]
    #[case::task("fix bug", NodeKind::Task, Some("t1"))]
    #[case::wrong_kind("Backend", NodeKind::List, None)]
    #[case::partial("Sprint", NodeKind::List, None)]
    #[case::missing("Roadmap", NodeKind::List, None)]
    fn test_find_by_name(#[case] name: &str, #[case] kind: NodeKind, #[case] expected: Option<&str>) {
        let found = TREE.find_by_name(name, kind).map(|node| node.id.as_str());

        assert_eq!(found, expected);
    }

    /// 同名のlistは探索順で最初のものが選ばれる。
    #[test]
    fn test_find_by_name_first_match() {
        let all: Vec<&str> = TREE
            .find_all_by_name("inbox", NodeKind::List)
            .map(|node| node.id.as_str())
            .collect();

        assert_eq!(all, vec!["l2", "l3"]);
        assert_eq!(TREE.find_by_name("inbox", NodeKind::List).unwrap().id, "l2");
    }

    #[test]
    fn test_empty() {
        let tree = Hierarchy::new();

        assert!(tree.is_empty());
        assert_eq!(tree.iter().count(), 0);
        assert!(tree.find_by_name("anything", NodeKind::List).is_none());
    }

    /// 深い階層でも再帰せずに探索できる。
    #[test]
    fn test_deep_tree() {
        let mut tree = Hierarchy::new();
        let mut parent = tree.root();
        for i in 0..100_000 {
            parent = tree.add_child(parent, i.to_string(), format!("folder {}", i), NodeKind::Folder);
        }
        tree.add_child(parent, "deep", "Deep List", NodeKind::List);

        assert_eq!(tree.find_by_name("deep list", NodeKind::List).unwrap().id, "deep");
    }
}
