//! Style resolution hooks: per-node CSS flags and the CSS pass.
//!
//! The graph does not interpret styles. It tracks which nodes need styling,
//! walks only the dirty branches once per pulse, and hands each node to a
//! [`StyleResolver`] together with the context inherited from its parent.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::graph::{CssFlag, DirtyBits, NodeId, SceneGraph, SceneId};

// ---------------------------------------------------------------------------
// StyleContext
// ---------------------------------------------------------------------------

/// Computed style properties of a node, inherited by its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleContext {
    properties: BTreeMap<String, String>,
}

impl StyleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property (builder).
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(property.into(), value.into());
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// The style engine the CSS pass delegates to.
pub trait StyleResolver: Debug {
    /// Compute the styles of `node` given the context of its parent.
    fn apply_styles(&mut self, graph: &SceneGraph, node: NodeId, inherited: &StyleContext) -> StyleContext;

    /// Return `node`'s styleable properties to their initial values.
    fn reset_properties(&mut self, graph: &SceneGraph, node: NodeId) {
        let _ = (graph, node);
    }
}

/// Passes the inherited context through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStyles;

impl StyleResolver for NoStyles {
    fn apply_styles(&mut self, _graph: &SceneGraph, _node: NodeId, inherited: &StyleContext) -> StyleContext {
        inherited.clone()
    }
}

/// Simple selector for [`RuleStyles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `*`
    Universal,
    /// `#id`
    Id(String),
    /// `.class`
    Class(String),
}

impl Selector {
    /// Parse `*`, `#id` or `.class`. Anything else is treated as a class name.
    pub fn parse(text: &str) -> Self {
        if text == "*" {
            Selector::Universal
        } else if let Some(id) = text.strip_prefix('#') {
            Selector::Id(id.to_string())
        } else {
            Selector::Class(text.trim_start_matches('.').to_string())
        }
    }

    /// Ids beat classes beat the universal selector.
    fn specificity(&self) -> u8 {
        match self {
            Selector::Universal => 0,
            Selector::Class(_) => 1,
            Selector::Id(_) => 2,
        }
    }

    fn matches(&self, graph: &SceneGraph, node: NodeId) -> bool {
        let Some(data) = graph.get(node) else { return false };
        match self {
            Selector::Universal => true,
            Selector::Id(id) => data.id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => data.has_class(class),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    declarations: Vec<(String, String)>,
}

/// A flat rule list cascaded by specificity, then source order.
///
/// Matches against the node's style id and classes. Declarations of
/// matching rules are layered over the inherited context.
#[derive(Debug, Clone, Default)]
pub struct RuleStyles {
    rules: Vec<Rule>,
}

impl RuleStyles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule (builder).
    pub fn rule(mut self, selector: &str, declarations: &[(&str, &str)]) -> Self {
        self.rules.push(Rule {
            selector: Selector::parse(selector),
            declarations: declarations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl StyleResolver for RuleStyles {
    fn apply_styles(&mut self, graph: &SceneGraph, node: NodeId, inherited: &StyleContext) -> StyleContext {
        let mut matches: Vec<(u8, usize, &Rule)> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.selector.matches(graph, node))
            .map(|(order, rule)| (rule.selector.specificity(), order, rule))
            .collect();
        // Lowest first; later writes win.
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut context = inherited.clone();
        for (_, _, rule) in matches {
            for (property, value) in &rule.declarations {
                context.set(property.clone(), value.clone());
            }
        }
        context
    }
}

// ---------------------------------------------------------------------------
// CSS flags and pass
// ---------------------------------------------------------------------------

impl SceneGraph {
    /// Recompute `id`'s styles (and its children's) on the next pulse.
    pub fn request_style_update(&mut self, id: NodeId) {
        self.raise_css_flag(id, CssFlag::Update);
    }

    /// Restyle `id` and its whole subtree from scratch on the next pulse.
    pub fn request_style_reapply(&mut self, id: NodeId) {
        self.raise_css_flag(id, CssFlag::Reapply);
    }

    fn raise_css_flag(&mut self, id: NodeId, flag: CssFlag) {
        let Some(node) = self.nodes.get_mut(id) else { return };
        if node.css_flag < flag {
            node.css_flag = flag;
        }
        let mut current = node.parent;
        while let Some(p) = current {
            let Some(parent) = self.nodes.get_mut(p) else { break };
            if parent.css_flag != CssFlag::Clean {
                break;
            }
            parent.css_flag = CssFlag::DirtyBranch;
            current = parent.parent;
        }
        if self.scene_of(id).is_some() {
            self.pulse_requested = true;
        }
    }

    /// Whether the scene's tree has any pending style work.
    pub fn needs_css_pass(&self, scene: SceneId) -> bool {
        self.scenes
            .get(scene)
            .and_then(|s| s.root)
            .and_then(|root| self.nodes.get(root))
            .is_some_and(|n| n.css_flag != CssFlag::Clean)
    }

    /// Computed styles of `id` as of the last CSS pass.
    pub fn computed_style(&self, id: NodeId) -> Option<&StyleContext> {
        self.styles.get(id)
    }

    /// Style every dirty branch of `scene`. Returns whether anything ran.
    pub(crate) fn css_pass(&mut self, scene: SceneId, resolver: &mut dyn StyleResolver) -> bool {
        if !self.needs_css_pass(scene) {
            return false;
        }
        let Some(root) = self.scenes.get(scene).and_then(|s| s.root) else { return false };
        let inherited = StyleContext::default();
        self.process_css(root, &inherited, CssFlag::Clean, resolver);
        true
    }

    fn process_css(
        &mut self,
        id: NodeId,
        inherited: &StyleContext,
        forced: CssFlag,
        resolver: &mut dyn StyleResolver,
    ) {
        let Some(node) = self.nodes.get_mut(id) else { return };
        let flag = node.css_flag.max(forced);
        node.css_flag = CssFlag::Clean;
        if flag == CssFlag::Clean {
            return;
        }

        let context = if flag >= CssFlag::Update {
            if flag == CssFlag::Reapply {
                self.styles.remove(id);
            }
            let computed = resolver.apply_styles(self, id, inherited);
            if self.styles.get(id) != Some(&computed) {
                self.mark_dirty(id, DirtyBits::CSS);
            }
            self.styles.insert(id, computed.clone());
            computed
        } else {
            match self.styles.get(id) {
                Some(cached) => cached.clone(),
                None => resolver.apply_styles(self, id, inherited),
            }
        };

        // Dirty branches pass nothing down; updates and reapplies cascade.
        let child_forced = if flag == CssFlag::DirtyBranch { CssFlag::Clean } else { flag };
        let children = self.children(id).to_vec();
        for child in children {
            self.process_css(child, &context, child_forced, resolver);
        }
    }

    /// Reset every node of `scene` and schedule a full restyle, after the
    /// stylesheet it was styled with went away.
    pub(crate) fn reset_styles(&mut self, scene: SceneId, resolver: &mut dyn StyleResolver) {
        let Some(root) = self.scenes.get(scene).and_then(|s| s.root) else { return };
        for id in self.walk_depth_first(root) {
            resolver.reset_properties(self, id);
            self.styles.remove(id);
        }
        self.request_style_reapply(root);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
