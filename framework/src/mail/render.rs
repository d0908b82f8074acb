//! Template rendering off the caller's task.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use super::builder::{Content, ViewData};
use super::{BoxError, MailError};

/// Template engine collaborator.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(&self, template: &str, data: &ViewData) -> Result<String, BoxError>;
}

/// Locale collaborator.
///
/// `set_locale` is fire-and-forget. When `locale` reports a current value the
/// coordinator restores it once rendering finishes.
pub trait Translator: Send + Sync + 'static {
    fn locale(&self) -> Option<String> {
        None
    }

    fn set_locale(&self, locale: &str);
}

/// Html and text output of one render pass. Always delivered as a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: Option<String>,
    pub text: Option<String>,
}

impl Rendered {
    /// Html when present, else text.
    pub fn primary(&self) -> Option<&str> {
        self.html.as_deref().or(self.text.as_deref())
    }
}

/// What to render for one message.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub locale: Option<String>,
    pub html: Option<Content>,
    pub text: Option<Content>,
    pub data: ViewData,
}

#[derive(Clone)]
pub struct RenderCoordinator {
    renderer: Option<Arc<dyn Renderer>>,
    translator: Option<Arc<dyn Translator>>,
}

impl RenderCoordinator {
    pub fn new(
        renderer: Option<Arc<dyn Renderer>>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            renderer,
            translator,
        }
    }

    /// Render html then text on a spawned task and wait for both.
    ///
    /// The task is never cancelled. A panic inside the renderer surfaces as a
    /// render error.
    pub async fn render(&self, request: RenderRequest) -> Result<Rendered, MailError> {
        let renderer = self.renderer.clone();
        let translator = self.translator.clone();
        let span = tracing::debug_span!("render", locale = request.locale.as_deref());

        tokio::spawn(
            async move {
                let previous = match (&translator, &request.locale) {
                    (Some(translator), Some(locale)) => {
                        let previous = translator.locale();
                        translator.set_locale(locale);
                        previous
                    }
                    _ => None,
                };

                let result = resolve_pair(renderer.as_deref(), &request).await;

                if let (Some(translator), Some(previous)) = (&translator, previous) {
                    translator.set_locale(&previous);
                }
                result
            }
            .instrument(span),
        )
        .await
        .map_err(|e| MailError::Render(Box::new(e)))?
    }
}

async fn resolve_pair(
    renderer: Option<&dyn Renderer>,
    request: &RenderRequest,
) -> Result<Rendered, MailError> {
    let html = resolve(renderer, request.html.as_ref(), &request.data).await?;
    let text = resolve(renderer, request.text.as_ref(), &request.data).await?;
    Ok(Rendered { html, text })
}

async fn resolve(
    renderer: Option<&dyn Renderer>,
    content: Option<&Content>,
    data: &ViewData,
) -> Result<Option<String>, MailError> {
    match content {
        None => Ok(None),
        Some(Content::Literal(body)) => Ok(Some(body.clone())),
        Some(Content::View(template)) => {
            let renderer = renderer.ok_or_else(|| {
                MailError::MissingConfig(format!("no renderer configured for view `{template}`"))
            })?;
            tracing::trace!(%template, "rendering view");
            renderer
                .render(template, data)
                .await
                .map(Some)
                .map_err(MailError::Render)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Echo;

    #[async_trait]
    impl Renderer for Echo {
        async fn render(&self, template: &str, data: &ViewData) -> Result<String, BoxError> {
            let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("?");
            Ok(format!("{template}:{name}"))
        }
    }

    struct Failing;

    #[async_trait]
    impl Renderer for Failing {
        async fn render(&self, template: &str, _data: &ViewData) -> Result<String, BoxError> {
            Err(format!("unknown template {template}").into())
        }
    }

    #[derive(Default)]
    struct Recorder {
        current: Mutex<Option<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl Translator for Recorder {
        fn locale(&self) -> Option<String> {
            self.current.lock().unwrap().clone()
        }

        fn set_locale(&self, locale: &str) {
            *self.current.lock().unwrap() = Some(locale.to_string());
            self.calls.lock().unwrap().push(locale.to_string());
        }
    }

    fn data() -> ViewData {
        let mut data = ViewData::new();
        data.insert("name".into(), "Jane".into());
        data
    }

    #[tokio::test]
    async fn renders_views_and_literals() {
        let coordinator = RenderCoordinator::new(Some(Arc::new(Echo)), None);
        let rendered = coordinator
            .render(RenderRequest {
                html: Some(Content::View("welcome".into())),
                text: Some(Content::Literal("plain".into())),
                data: data(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(rendered.html.as_deref(), Some("welcome:Jane"));
        assert_eq!(rendered.text.as_deref(), Some("plain"));
        assert_eq!(rendered.primary(), Some("welcome:Jane"));
    }

    #[tokio::test]
    async fn unset_channels_resolve_to_none() {
        let coordinator = RenderCoordinator::new(None, None);
        let rendered = coordinator.render(RenderRequest::default()).await.unwrap();

        assert_eq!(rendered, Rendered::default());
    }

    #[tokio::test]
    async fn view_without_renderer_is_a_config_error() {
        let coordinator = RenderCoordinator::new(None, None);
        let err = coordinator
            .render(RenderRequest {
                text: Some(Content::View("welcome".into())),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MailError::MissingConfig(_)));
    }

    #[tokio::test]
    async fn renderer_errors_propagate() {
        let coordinator = RenderCoordinator::new(Some(Arc::new(Failing)), None);
        let err = coordinator
            .render(RenderRequest {
                html: Some(Content::View("missing".into())),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MailError::Render(_)));
        assert_eq!(err.to_string(), "unknown template missing");
    }

    #[tokio::test]
    async fn switches_and_restores_locale() {
        let translator = Arc::new(Recorder::default());
        translator.set_locale("en");

        let coordinator = RenderCoordinator::new(Some(Arc::new(Echo)), Some(translator.clone()));
        coordinator
            .render(RenderRequest {
                locale: Some("de".into()),
                html: Some(Content::View("welcome".into())),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(*translator.calls.lock().unwrap(), vec!["en", "de", "en"]);
    }
}
