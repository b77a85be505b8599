use crate::descriptor::Generation;

pub trait Renderer {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn render(&self, generation: &Generation) -> Result<String, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl JsonRenderer {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Renderer for JsonRenderer {
    type Error = serde_json::Error;

    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, generation: &Generation) -> Result<String, Self::Error> {
        if self.pretty {
            serde_json::to_string_pretty(generation)
        } else {
            serde_json::to_string(generation)
        }
    }
}
