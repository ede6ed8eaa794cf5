use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::context::RuleContext;
use crate::error::{BoxError, EngineError};

/// A listener bound to a selector. Receives the visited node and the
/// owning rule's context.
pub type Visitor<N> = Rc<dyn Fn(&N, &mut RuleContext<'_, '_, N>) -> Result<(), EngineError>>;

type VisitorFactory<N> = Box<dyn Fn(&Value, &mut VisitorSet<N>) -> Result<(), BoxError>>;

/// Selector → visitor pairs produced for one rule instance.
pub struct VisitorSet<N> {
    entries: Vec<(String, Visitor<N>)>,
}

impl<N> VisitorSet<N> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Bind `visitor` to `selector`. A selector ending in `:exit` fires when
    /// leaving matching nodes.
    pub fn on(
        &mut self,
        selector: &str,
        visitor: impl Fn(&N, &mut RuleContext<'_, '_, N>) -> Result<(), EngineError> + 'static,
    ) -> &mut Self {
        self.entries.push((selector.to_owned(), Rc::new(visitor)));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Visitor<N>)> {
        self.entries
    }
}

/// A rule declaration: name, dependencies, default configuration, initial
/// state factory, and visitors.
///
/// # Example
///
/// ```
/// use tabvisit::{BasicNode, RuleModule};
///
/// let rule: RuleModule<BasicNode> = RuleModule::new("note-count", || 0_usize)
///     .on("Note", |_, cx| cx.set_state(|n: usize| n + 1));
/// assert_eq!(rule.name(), "note-count");
/// ```
pub struct RuleModule<N> {
    name: String,
    dependencies: Vec<String>,
    default_config: Value,
    initial_state: Box<dyn Fn() -> Box<dyn Any>>,
    visitors: Vec<(String, Visitor<N>)>,
    factory: Option<VisitorFactory<N>>,
}

impl<N: 'static> RuleModule<N> {
    /// Declare a rule whose state starts as `initial_state()`.
    #[must_use]
    pub fn new<S: Any>(name: &str, initial_state: impl Fn() -> S + 'static) -> Self {
        Self {
            name: name.to_owned(),
            dependencies: Vec::new(),
            default_config: Value::Null,
            initial_state: Box::new(move || Box::new(initial_state())),
            visitors: Vec::new(),
            factory: None,
        }
    }

    /// Declare that this rule reads `rule`'s state. Dependencies are
    /// delivered first on every visit.
    #[must_use]
    pub fn depends_on(mut self, rule: &str) -> Self {
        self.dependencies.push(rule.to_owned());
        self
    }

    #[must_use]
    pub fn default_config(mut self, config: Value) -> Self {
        self.default_config = config;
        self
    }

    /// Bind a visitor that does not depend on configuration.
    #[must_use]
    pub fn on(
        mut self,
        selector: &str,
        visitor: impl Fn(&N, &mut RuleContext<'_, '_, N>) -> Result<(), EngineError> + 'static,
    ) -> Self {
        self.visitors.push((selector.to_owned(), Rc::new(visitor)));
        self
    }

    /// Build visitors from the resolved configuration, once per state
    /// instance. Errors are reported as [`EngineError::RuleLoad`].
    #[must_use]
    pub fn create_visitors(
        mut self,
        factory: impl Fn(&Value, &mut VisitorSet<N>) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }
}

impl<N> RuleModule<N> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    #[must_use]
    pub fn declared_config(&self) -> &Value {
        &self.default_config
    }

    pub(crate) fn initial_state(&self) -> Box<dyn Any> {
        (self.initial_state)()
    }

    pub(crate) fn build_visitors(&self, config: &Value) -> Result<VisitorSet<N>, BoxError> {
        let mut set = VisitorSet::new();
        set.entries.extend(self.visitors.iter().cloned());
        if let Some(factory) = &self.factory {
            factory(config, &mut set)?;
        }
        Ok(set)
    }
}

impl<N> fmt::Debug for RuleModule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors: Vec<&str> = self.visitors.iter().map(|(s, _)| s.as_str()).collect();
        f.debug_struct("RuleModule")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("default_config", &self.default_config)
            .field("selectors", &selectors)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::BasicNode;

    #[test]
    fn builder_records_declaration() {
        let rule: RuleModule<BasicNode> = RuleModule::new("note-distance", Vec::<u32>::new)
            .depends_on("line-naming")
            .depends_on("measure-count")
            .default_config(json!({ "max": 4 }));

        assert_eq!(rule.name(), "note-distance");
        assert_eq!(rule.dependencies(), ["line-naming", "measure-count"]);
        assert_eq!(rule.declared_config(), &json!({ "max": 4 }));
        assert_eq!(
            rule.initial_state().downcast_ref::<Vec<u32>>(),
            Some(&Vec::new())
        );
    }

    #[test]
    fn static_and_factory_visitors_combine() {
        let rule: RuleModule<BasicNode> = RuleModule::new("r", || ())
            .on("Measure", |_, _| Ok(()))
            .create_visitors(|config, visitors| {
                if config["exit"] == json!(true) {
                    visitors.on("Measure:exit", |_, _| Ok(()));
                }
                Ok(())
            });

        assert_eq!(rule.build_visitors(&Value::Null).unwrap().len(), 1);
        let set = rule.build_visitors(&json!({ "exit": true })).unwrap();
        let selectors: Vec<String> = set.into_entries().into_iter().map(|(s, _)| s).collect();
        assert_eq!(selectors, ["Measure", "Measure:exit"]);
    }

    #[test]
    fn factory_errors_propagate() {
        let rule: RuleModule<BasicNode> =
            RuleModule::new("r", || ()).create_visitors(|_, _| Err("no visitors".into()));
        let err = rule.build_visitors(&Value::Null).err().unwrap();
        assert_eq!(err.to_string(), "no visitors");
    }

    #[test]
    fn each_build_is_fresh() {
        let rule: RuleModule<BasicNode> = RuleModule::new("r", || 0_u8);
        assert!(rule.build_visitors(&Value::Null).unwrap().is_empty());
        assert!(rule.initial_state().is::<u8>());
    }
}
