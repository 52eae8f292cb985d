use std::path::Path;

use super::{Collection, DatabaseCollection, Node, Resource};

/// Top of the tree: one child per configured database.
#[derive(Debug, Clone)]
pub struct RootCollection {
    pub(super) node: Node,
}

impl RootCollection {
    pub(super) fn new(node: Node) -> Self {
        Self { node }
    }

    pub fn list_children(&self) -> Vec<String> {
        self.node
            .ctx
            .databases
            .iter()
            .map(|db| db.name().to_string())
            .collect()
    }

    /// Configured databases win over host entries of the same name.
    pub fn get_child(&self, name: &str) -> Option<Resource> {
        if let Some(db) = self.node.ctx.databases.iter().find(|db| db.name() == name) {
            let collection = DatabaseCollection::new(self.node.child(name), db.clone());
            return Some(Collection::Database(collection).into());
        }
        if self.node.ctx.escape_hatch.enabled {
            return super::host::lookup(&self.node, Path::new("/"), name);
        }
        None
    }

    pub fn children(&self) -> Vec<Resource> {
        self.node
            .ctx
            .databases
            .iter()
            .map(|db| {
                let node = self.node.child(db.name());
                Collection::Database(DatabaseCollection::new(node, db.clone())).into()
            })
            .collect()
    }
}
