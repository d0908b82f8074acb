//! [`Renderer`] backed by the tera template engine.

use async_trait::async_trait;
use tera::{Context, Tera};

use super::builder::ViewData;
use super::render::Renderer;
use super::BoxError;

/// Wraps a [`Tera`] instance. Template names are the names registered with
/// tera, e.g. `orders/shipped.html`.
pub struct TeraRenderer {
    engine: Tera,
}

impl TeraRenderer {
    pub fn new(engine: Tera) -> Self {
        Self { engine }
    }

    /// Load every template matching a glob such as `templates/mail/**/*`.
    pub fn from_glob(glob: &str) -> Result<Self, tera::Error> {
        Ok(Self::new(Tera::new(glob)?))
    }

    /// Build from in-memory `(name, source)` pairs.
    pub fn from_raw<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, tera::Error> {
        let mut engine = Tera::default();
        engine.add_raw_templates(templates)?;
        Ok(Self::new(engine))
    }
}

#[async_trait]
impl Renderer for TeraRenderer {
    async fn render(&self, template: &str, data: &ViewData) -> Result<String, BoxError> {
        let context = Context::from_serialize(data)?;
        Ok(self.engine.render(template, &context)?)
    }
}
