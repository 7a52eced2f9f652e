use crate::err::BundleError;
use crate::registry::DeclId;
use crate::registry::ModuleId;
use crate::registry::Registry;
use ahash::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

#[derive(Debug)]
pub struct Scope {
  pub parent: Option<ScopeId>,
  pub module: ModuleId,
  bindings: HashMap<String, DeclId>,
}

impl Scope {
  pub fn get(&self, name: &str) -> Option<DeclId> {
    self.bindings.get(name).copied()
  }
}

#[derive(Debug, Default)]
pub struct Scopes {
  scopes: Vec<Scope>,
}

impl Scopes {
  pub fn create(&mut self, parent: Option<ScopeId>, module: ModuleId) -> ScopeId {
    let id = ScopeId(self.scopes.len() as u32);
    self.scopes.push(Scope {
      parent,
      module,
      bindings: HashMap::default(),
    });
    id
  }

  pub fn scope(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0 as usize]
  }

  pub fn declare(
    &mut self,
    registry: &Registry,
    scope: ScopeId,
    name: &str,
    decl: DeclId,
  ) -> Result<(), BundleError> {
    let target = &mut self.scopes[scope.0 as usize];
    if target.bindings.contains_key(name) {
      return Err(BundleError::DuplicateBinding {
        module: registry.module(target.module).id.clone(),
        name: name.to_string(),
      });
    }
    target.bindings.insert(name.to_string(), decl);
    Ok(())
  }

  /// Looks `name` up through the scope chain. Names that no scope binds
  /// resolve to the registry's global declaration for that name, so this
  /// never fails.
  pub fn find_declaration(&self, registry: &mut Registry, scope: ScopeId, name: &str) -> DeclId {
    let mut current = Some(scope);
    while let Some(id) = current {
      let scope = self.scope(id);
      if let Some(decl) = scope.get(name) {
        return decl;
      }
      current = scope.parent;
    }
    registry.global(name)
  }
}
