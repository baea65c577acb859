//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneNode`] is either a group or a mesh ([`NodeKind`]) and exclusively owns its
//! children. The [`Scene`] holds the root nodes together with the environment used
//! for lighting and, optionally, as the visible background.

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::{instance::Instance, model::Mesh, texture::EnvironmentTexture};

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub local: Instance,
    pub visible: bool,
    /// Opt-in for the selective postprocessing passes (bloom, outline).
    pub selected: bool,
    pub kind: NodeKind,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self::with_kind(name, NodeKind::Mesh(mesh))
    }

    fn with_kind(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            local: Instance::default(),
            visible: true,
            selected: false,
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<SceneNode> {
        &mut self.children
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    /// Depth-first, parents before children.
    pub fn traverse<'a>(&'a self, f: &mut dyn FnMut(&'a SceneNode)) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    pub fn traverse_mut(&mut self, f: &mut dyn FnMut(&mut SceneNode)) {
        f(self);
        for child in self.children.iter_mut() {
            child.traverse_mut(f);
        }
    }

    /**
     * Walks the visible part of the subtree and hands every node to `f` together with
     * its world matrix. `parent` is the world matrix of this node's parent.
     */
    pub fn traverse_world<'a>(
        &'a self,
        parent: &Matrix4<f32>,
        f: &mut dyn FnMut(&'a SceneNode, &Matrix4<f32>),
    ) {
        if !self.visible {
            return;
        }
        let world = parent * self.local.to_matrix();
        f(self, &world);
        for child in &self.children {
            child.traverse_world(&world, f);
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    pub fn meshes(&self) -> Vec<&Mesh> {
        let mut meshes = Vec::new();
        self.traverse(&mut |node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                meshes.push(mesh);
            }
        });
        meshes
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// Index of a root node in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    pub environment: Option<Arc<EnvironmentTexture>>,
    pub background: Option<Arc<EnvironmentTexture>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle(self.nodes.len() - 1)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        self.nodes.get_mut(handle.0)
    }

    pub fn roots(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Number of root nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every visible mesh in draw order together with its world matrix and selection flag.
    pub fn visit_meshes<'a>(&'a self, f: &mut dyn FnMut(&'a SceneNode, &'a Mesh, &Matrix4<f32>)) {
        let identity = Matrix4::identity();
        for root in &self.nodes {
            root.traverse_world(&identity, &mut |node, world| {
                if let NodeKind::Mesh(mesh) = &node.kind {
                    f(node, mesh, world);
                }
            });
        }
    }

    /// Names of all nodes that opted into the selective passes.
    pub fn selected_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for root in &self.nodes {
            root.traverse(&mut |node| {
                if node.selected {
                    names.push(node.name.clone());
                }
            });
        }
        names
    }
}
