//! Visibility evaluation
//!
//! Two independent axes decide whether an element is shown:
//! - the **conditional** axis (`hide` / `visible`), driven by form data.
//!   Hiding on this axis clears the element's data and skips its validation.
//! - the **access** axis (`hide_by_access` / `visible_by_access`), driven by
//!   permissions. Hiding on this axis keeps the data and keeps validating it.
//!
//! The axes combine by OR on the hidden side. When both hide an element the
//! conditional axis is reported as the cause.

use std::collections::HashMap;

use serde::Serialize;

use crate::context::FormContext;
use crate::resolve::Resolvable;

/// Visibility predicates for one element (field, row, section, tab, action)
#[derive(Debug, Clone, Default)]
pub struct VisibilityConfig {
    pub hide: Option<Resolvable<bool>>,
    pub visible: Option<Resolvable<bool>>,
    pub hide_by_access: Option<Resolvable<bool>>,
    pub visible_by_access: Option<Resolvable<bool>>,
}

impl VisibilityConfig {
    pub fn is_empty(&self) -> bool {
        self.hide.is_none()
            && self.visible.is_none()
            && self.hide_by_access.is_none()
            && self.visible_by_access.is_none()
    }
}

/// Which axis hid an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenBy {
    Conditional,
    Access,
}

/// Outcome of evaluating a [`VisibilityConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibilityResult {
    pub is_visible: bool,
    pub hidden_by: Option<HiddenBy>,
    pub should_clear_data: bool,
    pub should_skip_validation: bool,
}

impl VisibilityResult {
    pub const VISIBLE: Self = Self {
        is_visible: true,
        hidden_by: None,
        should_clear_data: false,
        should_skip_validation: false,
    };

    const CONDITIONAL: Self = Self {
        is_visible: false,
        hidden_by: Some(HiddenBy::Conditional),
        should_clear_data: true,
        should_skip_validation: true,
    };

    const ACCESS: Self = Self {
        is_visible: false,
        hidden_by: Some(HiddenBy::Access),
        should_clear_data: false,
        should_skip_validation: false,
    };

    fn from_axes(conditional_hidden: bool, access_hidden: bool) -> Self {
        if conditional_hidden {
            Self::CONDITIONAL
        } else if access_hidden {
            Self::ACCESS
        } else {
            Self::VISIBLE
        }
    }

    /// Combine with the result of an enclosing element
    ///
    /// An element inside a hidden container is hidden too. Conditional
    /// hiding anywhere in the chain wins over access hiding.
    pub fn within(self, outer: Self) -> Self {
        let conditional = self.hidden_by == Some(HiddenBy::Conditional)
            || outer.hidden_by == Some(HiddenBy::Conditional);
        let access =
            self.hidden_by == Some(HiddenBy::Access) || outer.hidden_by == Some(HiddenBy::Access);
        Self::from_axes(conditional, access)
    }
}

impl Default for VisibilityResult {
    fn default() -> Self {
        Self::VISIBLE
    }
}

/// Evaluate one axis: `hide` wins when present, otherwise `visible` decides
fn axis_hidden(
    hide: Option<&Resolvable<bool>>,
    visible: Option<&Resolvable<bool>>,
    ctx: &FormContext,
) -> bool {
    if let Some(hide) = hide {
        return hide.resolve(ctx);
    }
    if let Some(visible) = visible {
        return !visible.resolve(ctx);
    }
    false
}

/// Evaluate a visibility configuration against the context
pub fn evaluate_visibility(config: Option<&VisibilityConfig>, ctx: &FormContext) -> VisibilityResult {
    let Some(config) = config else {
        return VisibilityResult::VISIBLE;
    };

    let conditional_hidden = axis_hidden(config.hide.as_ref(), config.visible.as_ref(), ctx);
    let access_hidden = axis_hidden(
        config.hide_by_access.as_ref(),
        config.visible_by_access.as_ref(),
        ctx,
    );

    VisibilityResult::from_axes(conditional_hidden, access_hidden)
}

/// Evaluate a chain of configurations, outermost first
pub fn evaluate_chain<'a, I>(chain: I, ctx: &FormContext) -> VisibilityResult
where
    I: IntoIterator<Item = Option<&'a VisibilityConfig>>,
{
    chain
        .into_iter()
        .fold(VisibilityResult::VISIBLE, |outer, config| {
            evaluate_visibility(config, ctx).within(outer)
        })
}

/// Edge-triggered tracker for clear-eligible hiding
///
/// Remembers which fields were conditionally hidden on the previous scan so
/// data is cleared once, on the transition, not on every evaluation.
#[derive(Debug, Default)]
pub struct VisibilityTracker {
    previous: HashMap<String, bool>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state without reporting transitions
    pub fn prime<I>(&mut self, snapshot: I)
    where
        I: IntoIterator<Item = (String, VisibilityResult)>,
    {
        self.previous = snapshot
            .into_iter()
            .map(|(name, result)| (name, result.should_clear_data))
            .collect();
    }

    /// Fields that just moved into a clear-eligible hidden state
    ///
    /// Fields never seen before count as previously visible.
    pub fn transitions<I>(&mut self, snapshot: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, VisibilityResult)>,
    {
        let mut newly_hidden = Vec::new();
        let mut next = HashMap::new();

        for (name, result) in snapshot {
            let was_hidden = self.previous.get(&name).copied().unwrap_or(false);
            if result.should_clear_data && !was_hidden {
                newly_hidden.push(name.clone());
            }
            next.insert(name, result.should_clear_data);
        }

        self.previous = next;
        newly_hidden
    }

    pub fn is_tracked_hidden(&self, name: &str) -> bool {
        self.previous.get(name).copied().unwrap_or(false)
    }
}
