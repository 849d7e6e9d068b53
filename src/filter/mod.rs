//! Before/after filter chains.
//!
//! # Responsibilities
//! - Hold the ordered before and after filter lists
//! - Fire path-scoped filters only when their pattern matches the request path
//! - Stop a chain as soon as the context is halted
//!
//! # Design Decisions
//! - Filters are best-effort: a failing filter is logged and the chain continues
//! - Scoped filters use the same `PathPattern` as routes
//! - A filter's path variables are merged into the request parameters

use crate::config::{ControllerRef, FilterConfig, FilterStage};
use crate::context::RequestContext;
use crate::controller::ControllerManager;
use crate::routing::{PathPattern, PatternError};

/// A single before or after filter.
#[derive(Debug, Clone)]
pub struct Filter {
    stage: FilterStage,
    pattern: Option<PathPattern>,
    controller: ControllerRef,
}

impl Filter {
    pub fn new(
        stage: FilterStage,
        path: Option<&str>,
        controller: ControllerRef,
    ) -> Result<Self, PatternError> {
        let pattern = path.map(PathPattern::parse).transpose()?;
        Ok(Self {
            stage,
            pattern,
            controller,
        })
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self, PatternError> {
        Self::new(
            config.stage,
            config.path.as_deref(),
            ControllerRef::new(&config.controller).with_options(config.options.clone()),
        )
    }

    pub fn stage(&self) -> FilterStage {
        self.stage
    }

    pub fn controller(&self) -> &ControllerRef {
        &self.controller
    }

    /// Path variables if this filter fires for `path`.
    fn fires(&self, path: &str) -> Option<Vec<(String, String)>> {
        match &self.pattern {
            Some(pattern) => pattern.captures(path),
            None => Some(Vec::new()),
        }
    }
}

/// The two ordered filter lists.
#[derive(Debug, Default)]
pub struct FilterChain {
    before: Vec<Filter>,
    after: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        let (before, after): (Vec<Filter>, Vec<Filter>) = filters
            .into_iter()
            .partition(|f| f.stage == FilterStage::Before);
        Self { before, after }
    }

    /// Build from configuration, skipping filters whose pattern fails to compile.
    pub fn from_config(configs: &[FilterConfig]) -> Self {
        let filters = configs
            .iter()
            .enumerate()
            .filter_map(|(index, config)| match Filter::from_config(config) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    tracing::warn!(
                        index,
                        controller = %config.controller,
                        error = %e,
                        "Skipping filter"
                    );
                    None
                }
            })
            .collect();
        Self::new(filters)
    }

    pub fn before(&self) -> &[Filter] {
        &self.before
    }

    pub fn after(&self) -> &[Filter] {
        &self.after
    }

    pub fn run_before(&self, controllers: &ControllerManager, ctx: &mut RequestContext) {
        run_chain(&self.before, "before", controllers, ctx);
    }

    pub fn run_after(&self, controllers: &ControllerManager, ctx: &mut RequestContext) {
        run_chain(&self.after, "after", controllers, ctx);
    }
}

fn run_chain(
    filters: &[Filter],
    stage: &'static str,
    controllers: &ControllerManager,
    ctx: &mut RequestContext,
) {
    for filter in filters {
        if ctx.is_halted() {
            break;
        }

        let Some(params) = filter.fires(ctx.path()) else {
            continue;
        };
        ctx.merge_params(params);

        let controller = &filter.controller;
        if let Err(e) = controllers.execute(&controller.name, ctx, &controller.options) {
            tracing::warn!(
                stage,
                controller = %controller.name,
                path = %ctx.path(),
                error = %e,
                "Filter failed, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_by_stage() {
        let chain = FilterChain::new(vec![
            Filter::new(FilterStage::After, None, ControllerRef::new("a")).unwrap(),
            Filter::new(
                FilterStage::Before,
                Some("/admin/{rest:.*}"),
                ControllerRef::new("b"),
            )
            .unwrap(),
            Filter::new(FilterStage::Before, None, ControllerRef::new("c")).unwrap(),
        ]);
        let before: Vec<_> = chain
            .before()
            .iter()
            .map(|f| f.controller().name.as_str())
            .collect();
        assert_eq!(before, vec!["b", "c"]);
        assert_eq!(chain.after().len(), 1);
    }

    #[test]
    fn test_scoped_filter_fires_on_match_only() {
        let filter = Filter::new(
            FilterStage::Before,
            Some("/admin/{rest:.*}"),
            ControllerRef::new("x"),
        )
        .unwrap();
        assert_eq!(
            filter.fires("/admin/users"),
            Some(vec![("rest".to_string(), "users".to_string())])
        );
        assert!(filter.fires("/public").is_none());

        let global = Filter::new(FilterStage::After, None, ControllerRef::new("x")).unwrap();
        assert_eq!(global.fires("/anything"), Some(Vec::new()));
    }

    #[test]
    fn test_bad_pattern_skipped() {
        let config = crate::config::parse_config(
            r#"
            [[filters]]
            stage = "before"
            path = "/{broken"
            controller = "x"

            [[filters]]
            stage = "after"
            controller = "y"
            "#,
        )
        .unwrap();

        let chain = FilterChain::from_config(&config.filters);
        assert!(chain.before().is_empty());
        assert_eq!(chain.after().len(), 1);
    }
}
