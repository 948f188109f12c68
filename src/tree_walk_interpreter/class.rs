use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{ClassDecl, FunctionDecl};

/// Method table built once when the class declaration is evaluated.
pub struct Class {
    pub name: String,
    pub methods: FxHashMap<String, Rc<FunctionDecl>>,
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods = self.methods.keys().collect::<Vec<_>>();
        methods.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("methods", &methods)
            .finish()
    }
}

impl Class {
    pub fn from_declaration(decl: &ClassDecl) -> Self {
        Self {
            name: decl.name.clone(),
            methods: decl
                .body
                .iter()
                .map(|method| (method.name.clone(), method.clone()))
                .collect(),
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<FunctionDecl>> {
        self.methods.get(name)
    }
}
