use cliptrack_project::Element;

/// The effects processing attached to a track.
///
/// The core treats the chain as opaque: it only saves and restores its state
/// and tells it when the track starts producing audio.
pub trait EffectChain: Send {
    /// Name of the element the chain saves itself as.
    fn node_name(&self) -> &str;
    /// Append the chain's state to `parent` as one child element.
    fn save_state(&self, parent: &mut Element);
    fn restore_state(&mut self, element: &Element);
    /// Remove all effects.
    fn clear(&mut self);
    fn start_running(&mut self);
}

/// Chain that keeps its effects as opaque elements.
#[derive(Debug, Clone, Default)]
pub struct FxChain {
    enabled: bool,
    effects: Vec<Element>,
    running: bool,
}

impl FxChain {
    pub const NODE_NAME: &'static str = "fxchain";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn effects(&self) -> &[Element] {
        &self.effects
    }

    pub fn push_effect(&mut self, effect: Element) {
        self.effects.push(effect);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl EffectChain for FxChain {
    fn node_name(&self) -> &str {
        Self::NODE_NAME
    }

    fn save_state(&self, parent: &mut Element) {
        let mut node = Element::new(Self::NODE_NAME)
            .with_attribute("enabled", self.enabled as i32)
            .with_attribute("numofeffects", self.effects.len());
        for effect in &self.effects {
            node.append_child(effect.clone());
        }
        parent.append_child(node);
    }

    fn restore_state(&mut self, element: &Element) {
        self.enabled = element.attr_bool("enabled");
        self.effects.extend(element.children().iter().cloned());
    }

    fn clear(&mut self) {
        self.enabled = false;
        self.effects.clear();
        self.running = false;
    }

    fn start_running(&mut self) {
        if self.enabled {
            self.running = true;
        }
    }
}
