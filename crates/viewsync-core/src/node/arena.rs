use super::types::{NodeHandle, ViewNode};

#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: Vec<Option<ViewNode>>,
    free_list: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, node: ViewNode) -> NodeHandle {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx as usize] = Some(node);
            NodeHandle(idx)
        } else {
            let idx = self.nodes.len() as u32;
            self.nodes.push(Some(node));
            NodeHandle(idx)
        }
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&ViewNode> {
        self.nodes.get(handle.index())?.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut ViewNode> {
        self.nodes.get_mut(handle.index())?.as_mut()
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<ViewNode> {
        let node = self.nodes.get_mut(handle.index())?.take();
        if node.is_some() {
            self.free_list.push(handle.0);
            self.live -= 1;
        }
        node
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &ViewNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|node| (NodeHandle(idx as u32), node)))
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}
