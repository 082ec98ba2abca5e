use std::collections::HashSet;
use std::time::Duration;

use cutesy_core::EditorError;
use cutesy_core::EditorResult;
use cutesy_vdom::Component;
use cutesy_vdom::ComponentRegistry;

/// Window of the leading-edge hover throttle.
pub const DEFAULT_HOVER_INTERVAL: Duration = Duration::from_millis(1);
/// Key under which the tree is stored in the state container.
pub const DEFAULT_STORE_KEY: &str = "dom";

/// Editor configuration.
#[derive(Debug, Clone)]
pub struct EditorOptions {
    pub custom_components: ComponentRegistry,
    pub hover_interval: Duration,
    pub store_key: String,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            custom_components: ComponentRegistry::new(),
            hover_interval: DEFAULT_HOVER_INTERVAL,
            store_key: DEFAULT_STORE_KEY.to_owned(),
        }
    }
}

impl EditorOptions {
    pub fn with_component(mut self, component: impl Component + 'static) -> Self {
        self.custom_components.register(component);
        self
    }

    pub fn with_components(mut self, registry: ComponentRegistry) -> Self {
        self.custom_components = registry;
        self
    }

    pub fn with_hover_interval(mut self, interval: Duration) -> Self {
        self.hover_interval = interval;
        self
    }

    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    /// JSON pointer of the tree inside the state container.
    pub fn store_pointer(&self) -> String {
        format!("/{}", self.store_key.replace('~', "~0"))
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.store_key.trim().is_empty() || self.store_key.contains('/') {
            return Err(EditorError::new(
                "editor.options_invalid",
                format!(
                    "store key `{}` must be non-empty and contain no `/`",
                    self.store_key
                ),
            ));
        }

        if self.hover_interval.is_zero() {
            return Err(EditorError::new(
                "editor.options_invalid",
                "hover interval must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for component in self.custom_components.iter() {
            let name = component.name();
            if name.trim().is_empty() {
                return Err(EditorError::new(
                    "editor.options_invalid",
                    "custom component names must be non-empty",
                ));
            }
            if !seen.insert(name) {
                return Err(EditorError::new(
                    "editor.options_invalid",
                    format!("custom component `{name}` is registered twice"),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::EditorOptions;
    use cutesy_dom::Document;
    use cutesy_dom::NodeId;
    use cutesy_tree::TreeNode;
    use cutesy_vdom::Component;
    use cutesy_vdom::NodeRef;
    use cutesy_vdom::RenderChild;
    use rstest::rstest;
    use std::time::Duration;

    struct Named(&'static str);

    impl Component for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn identify(&self, _data: &TreeNode, _rendered: NodeRef<'_>) -> bool {
            false
        }

        fn render(
            &self,
            _document: &mut Document,
            _data: &TreeNode,
            rendered: NodeId,
            _render_child: &mut RenderChild<'_>,
        ) -> NodeId {
            rendered
        }
    }

    #[test]
    fn defaults_are_valid() {
        let options = EditorOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.store_pointer(), "/dom");
        assert_eq!(options.hover_interval, Duration::from_millis(1));
    }

    #[rstest]
    #[case(EditorOptions::default().with_store_key(""))]
    #[case(EditorOptions::default().with_store_key("a/b"))]
    #[case(EditorOptions::default().with_hover_interval(Duration::ZERO))]
    #[case(EditorOptions::default().with_component(Named("")))]
    #[case(EditorOptions::default().with_component(Named("card")).with_component(Named("card")))]
    fn rejects_invalid_options(#[case] options: EditorOptions) {
        let Err(error) = options.validate() else {
            unreachable!("options should be rejected");
        };
        assert_eq!(error.code, "editor.options_invalid");
    }

    #[test]
    fn store_pointer_escapes_tilde() {
        let options = EditorOptions::default().with_store_key("a~1b");
        assert!(options.validate().is_ok());
        assert_eq!(options.store_pointer(), "/a~01b");
        assert_eq!(
            cutesy_store::parse_pointer(&options.store_pointer()).ok(),
            Some(vec!["a~1b".to_owned()])
        );
    }

    #[test]
    fn distinct_component_names_are_accepted() {
        let options = EditorOptions::default()
            .with_component(Named("card"))
            .with_component(Named("list"))
            .with_store_key("page");
        assert!(options.validate().is_ok());
        assert_eq!(options.store_pointer(), "/page");
    }
}
