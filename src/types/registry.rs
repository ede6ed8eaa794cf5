use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use super::rule::RuleModule;
use crate::SyntaxNode;

struct Builtin<N> {
    id: String,
    loader: Box<dyn Fn() -> RuleModule<N>>,
    module: OnceCell<RuleModule<N>>,
}

/// Resolves rule ids to rule declarations.
///
/// Built-in rules are registered as loaders and materialized on first
/// lookup. User rules shadow built-ins with the same id.
pub struct RuleRegistry<N> {
    builtins: Vec<Builtin<N>>,
    user: HashMap<String, RuleModule<N>>,
    user_order: Vec<String>,
}

impl<N> Default for RuleRegistry<N> {
    fn default() -> Self {
        Self {
            builtins: Vec::new(),
            user: HashMap::new(),
            user_order: Vec::new(),
        }
    }
}

impl<N: 'static> RuleRegistry<N> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user rule under its own name, replacing any earlier user
    /// rule of that name.
    #[must_use]
    pub fn define(mut self, module: RuleModule<N>) -> Self {
        let id = module.name().to_owned();
        if self.user.insert(id.clone(), module).is_none() {
            self.user_order.push(id);
        }
        self
    }

    /// Register a lazily loaded rule.
    #[must_use]
    pub fn define_builtin(mut self, id: &str, loader: impl Fn() -> RuleModule<N> + 'static) -> Self {
        self.builtins.retain(|b| b.id != id);
        self.builtins.push(Builtin {
            id: id.to_owned(),
            loader: Box::new(loader),
            module: OnceCell::new(),
        });
        self
    }
}

impl<N: SyntaxNode + 'static> RuleRegistry<N> {
    /// A registry holding the bundled rule pack.
    #[must_use]
    pub fn with_builtins() -> Self {
        crate::rules::builtins()
            .into_iter()
            .fold(Self::new(), |registry, (id, loader)| {
                registry.define_builtin(id, loader)
            })
    }
}

impl<N> RuleRegistry<N> {
    /// Look up a rule, loading a built-in on first access.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RuleModule<N>> {
        if let Some(module) = self.user.get(id) {
            return Some(module);
        }
        let builtin = self.builtins.iter().find(|b| b.id == id)?;
        Some(builtin.module.get_or_init(|| (builtin.loader)()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.user.contains_key(id) || self.builtins.iter().any(|b| b.id == id)
    }

    /// Whether a built-in has been materialized yet.
    #[must_use]
    pub fn is_loaded(&self, id: &str) -> bool {
        self.user.contains_key(id)
            || self
                .builtins
                .iter()
                .any(|b| b.id == id && b.module.get().is_some())
    }

    /// All known ids: built-ins in registration order, then user rules.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<&str> {
        let builtins = self.builtins.iter().map(|b| b.id.as_str());
        let user = self
            .user_order
            .iter()
            .map(String::as_str)
            .filter(|id| !self.builtins.iter().any(|b| b.id == *id));
        builtins.chain(user).collect()
    }
}

impl<N> fmt::Debug for RuleRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rule_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::BasicNode;

    #[test]
    fn builtins_load_once_on_first_lookup() {
        let loads = Rc::new(Cell::new(0));
        let counter = Rc::clone(&loads);
        let registry: RuleRegistry<BasicNode> = RuleRegistry::new().define_builtin("lazy", move || {
            counter.set(counter.get() + 1);
            RuleModule::new("lazy", || ())
        });

        assert!(registry.contains("lazy"));
        assert!(!registry.is_loaded("lazy"));
        assert_eq!(loads.get(), 0);

        assert_eq!(registry.get("lazy").map(RuleModule::name), Some("lazy"));
        assert!(registry.get("lazy").is_some());
        assert!(registry.is_loaded("lazy"));
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn user_rules_shadow_builtins() {
        let registry: RuleRegistry<BasicNode> = RuleRegistry::new()
            .define_builtin("count", || RuleModule::new("count", || 0_u8))
            .define(RuleModule::new("count", || 0_u64).depends_on("other"))
            .define(RuleModule::new("extra", || ()));

        let count = registry.get("count").unwrap();
        assert_eq!(count.dependencies(), ["other"]);
        assert_eq!(registry.rule_ids(), ["count", "extra"]);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn with_builtins_lists_the_rule_pack() {
        let registry: RuleRegistry<BasicNode> = RuleRegistry::with_builtins();
        assert_eq!(registry.rule_ids(), ["measure-count", "line-naming"]);
        assert!(!registry.is_loaded("line-naming"));
        assert_eq!(
            registry.get("line-naming").map(RuleModule::name),
            Some("line-naming")
        );
    }
}
