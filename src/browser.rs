use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

use crate::config::BrowserOptions;
use crate::session::{ElementHandle, Locator, PageElement, PageSession, SessionFactory};

/// Launches Chrome on the first `open`, so runs that fetch nothing never
/// start a browser. Every session is its own tab.
pub struct ChromeSessionFactory {
    options: BrowserOptions,
    chrome: OnceCell<Chrome>,
}

struct Chrome {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl Chrome {
    async fn launch(options: &BrowserOptions) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (browser, mut handler) = Browser::launch(config).await.context("launch chrome")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "browser event loop stopped");
                    break;
                }
            }
        });
        tracing::info!(headless = options.headless, "launched chrome");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

impl ChromeSessionFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            chrome: OnceCell::new(),
        }
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let Some(chrome) = self.chrome.get() else {
            return Ok(());
        };
        let mut browser = chrome.browser.lock().await;
        browser.close().await.context("close chrome")?;
        browser.wait().await.context("wait for chrome to exit")?;
        chrome.handler.abort();
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> anyhow::Result<Box<dyn PageSession>> {
        let chrome = self
            .chrome
            .get_or_try_init(|| Chrome::launch(&self.options))
            .await?;
        let page = chrome
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("open browser tab")?;
        Ok(Box::new(ChromeSession { page }))
    }
}

pub struct ChromeSession {
    page: Page,
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("goto {url}"))?;
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> anyhow::Result<Vec<ElementHandle>> {
        // `find_xpaths` asks CDP for an empty result range on zero matches,
        // which Chrome rejects, so count first.
        let count: u64 = self
            .page
            .evaluate(xpath_count_script(locator.expr())?)
            .await
            .with_context(|| format!("count {locator}"))?
            .into_value()
            .with_context(|| format!("decode match count of {locator}"))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let elements = self
            .page
            .find_xpaths(locator.expr())
            .await
            .with_context(|| format!("query {locator}"))?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromeElement { element }) as ElementHandle)
            .collect())
    }
}

fn xpath_count_script(expr: &str) -> anyhow::Result<String> {
    let quoted = serde_json::to_string(expr).context("quote xpath")?;
    Ok(format!(
        "document.evaluate({quoted}, document, null, \
         XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength"
    ))
}

struct ChromeElement {
    element: Element,
}

#[async_trait]
impl PageElement for ChromeElement {
    async fn text(&self) -> anyhow::Result<String> {
        let text = self
            .element
            .inner_text()
            .await
            .context("read inner text")?
            .unwrap_or_default();
        if !text.is_empty() {
            return Ok(text);
        }

        // Form controls keep their contents in `value`.
        let value = self.element.property("value").await.context("read value")?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> anyhow::Result<Option<String>> {
        self.element
            .attribute(name)
            .await
            .with_context(|| format!("read attribute {name}"))
    }

    async fn hover_and_click(&self) -> anyhow::Result<()> {
        self.element.hover().await.context("hover")?;
        self.element.click().await.context("click")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_script_quotes_the_expression() -> anyhow::Result<()> {
        let script = xpath_count_script(r#"//tr[@class="evn_list"]/td[5]/a[1]"#)?;
        let quoted = r#"document.evaluate("//tr[@class=\"evn_list\"]/td[5]/a[1]", document,"#;
        assert!(script.starts_with(quoted), "{script}");
        assert!(script.ends_with(", null).snapshotLength"), "{script}");
        Ok(())
    }
}
