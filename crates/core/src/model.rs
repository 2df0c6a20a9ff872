use cliptrack_project::Element;
use cliptrack_transport::VolumeModel;

/// Persisting a parameter as a single attribute keyed by name.
pub trait ModelSettings {
    fn save_settings(&self, element: &mut Element, name: &str);
    fn load_settings(&self, element: &Element, name: &str);
}

impl ModelSettings for VolumeModel {
    fn save_settings(&self, element: &mut Element, name: &str) {
        element.set_attribute(name, self.value());
    }

    /// A missing attribute reads as 0, which is then fitted to the range.
    fn load_settings(&self, element: &Element, name: &str) {
        self.set_value(element.attr_f32(name));
    }
}
