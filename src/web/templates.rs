use askama::Template;
use picframe::{PanelView, Rotation};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub messages: Vec<String>,
    pub images: Vec<ImageRow>,
    pub rotations: Vec<RotationOption>,
}

pub struct ImageRow {
    pub name: String,
    pub checked: bool,
}

pub struct RotationOption {
    pub degrees: u16,
    pub selected: bool,
}

impl IndexTemplate {
    pub fn new(view: PanelView, messages: Vec<String>) -> Self {
        let PanelView {
            images,
            current,
            rotation,
        } = view;
        let images = images
            .into_iter()
            .map(|name| ImageRow {
                checked: current.as_deref() == Some(name.as_str()),
                name,
            })
            .collect();
        let rotations = Rotation::ALL
            .iter()
            .map(|r| RotationOption {
                degrees: r.degrees(),
                selected: *r == rotation,
            })
            .collect();
        Self {
            messages,
            images,
            rotations,
        }
    }
}
