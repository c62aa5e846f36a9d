//! 菜单索引
//!
//! 后端菜单既可能以 `children` 嵌套下发，也可能是通过 `pid` 关联的扁平列表，
//! 两种形式可以混用。这里把它们统一为一张邻接表，并以显式栈做深度优先遍历，
//! 用访问集合防止 `pid` 成环导致的死循环。

use adminkit_shared::MenuInfo;
use std::collections::{HashMap, HashSet};

pub struct MenuIndex<'a> {
    nodes: Vec<&'a MenuInfo>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a> MenuIndex<'a> {
    pub fn new(menus: &'a [MenuInfo]) -> Self {
        let mut nodes: Vec<&'a MenuInfo> = Vec::new();
        let mut nested_parent: Vec<Option<usize>> = Vec::new();

        // 展开嵌套的 children，记录嵌套父节点
        let mut stack: Vec<(&'a MenuInfo, Option<usize>)> =
            menus.iter().rev().map(|m| (m, None)).collect();
        while let Some((menu, parent)) = stack.pop() {
            let index = nodes.len();
            nodes.push(menu);
            nested_parent.push(parent);
            for child in menu.children.iter().rev() {
                stack.push((child, Some(index)));
            }
        }

        let mut first_by_id: HashMap<u64, usize> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            first_by_id.entry(node.id).or_insert(index);
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            let parent = nested_parent[index].or_else(|| {
                node.pid
                    .and_then(|pid| first_by_id.get(&pid).copied())
                    .filter(|parent| *parent != index)
            });
            match parent {
                Some(parent) => children[parent].push(index),
                None => roots.push(index),
            }
        }

        Self {
            nodes,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 先序遍历所有节点，每个节点恰好出现一次
    ///
    /// 从根节点出发遍历完后，再从尚未访问的节点出发（只有成环的节点会走到这里）。
    pub fn preorder(&self) -> Vec<&'a MenuInfo> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(|menu| {
            out.push(menu);
            false
        });
        out
    }

    pub fn find(&self, mut predicate: impl FnMut(&MenuInfo) -> bool) -> Option<&'a MenuInfo> {
        let mut found = None;
        self.walk(|menu| {
            if predicate(menu) {
                found = Some(menu);
                true
            } else {
                false
            }
        });
        found
    }

    pub fn find_by_path(&self, path: &str) -> Option<&'a MenuInfo> {
        self.find(|menu| menu.path == path)
    }

    /// `visit` 返回 true 时提前结束
    fn walk(&self, mut visit: impl FnMut(&'a MenuInfo) -> bool) {
        let mut visited: HashSet<usize> = HashSet::with_capacity(self.nodes.len());
        let starts = self.roots.iter().copied().chain(0..self.nodes.len());

        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let mut stack = vec![start];
            while let Some(index) = stack.pop() {
                if !visited.insert(index) {
                    continue;
                }
                if visit(self.nodes[index]) {
                    return;
                }
                for child in self.children[index].iter().rev() {
                    if !visited.contains(child) {
                        stack.push(*child);
                    }
                }
            }
        }
    }
}
