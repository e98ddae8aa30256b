use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde_json::Value;

use super::{Driver, DriverFactory, ElementRef, Rect};
use crate::{Error, Result};

/// A scripted element of a `MemoryDriver` page
#[derive(Debug, Clone)]
pub struct MemoryElement {
    pub text: String,
    pub displayed: bool,
    pub properties: IndexMap<String, Value>,
    pub attributes: IndexMap<String, String>,
    pub rect: Rect,
    pub screenshot: Option<Vec<u8>>,
    /// Navigates here when clicked
    pub href: Option<String>,
}

impl Default for MemoryElement {
    fn default() -> Self {
        Self {
            text: String::new(),
            displayed: true,
            properties: IndexMap::new(),
            attributes: IndexMap::new(),
            rect: Rect::default(),
            screenshot: None,
            href: None,
        }
    }
}

impl MemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn property(mut self, name: &str, value: Value) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    pub fn href(mut self, url: &str) -> Self {
        self.href = Some(url.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct Page {
    history: Vec<String>,
    position: usize,
    elements: IndexMap<String, Vec<MemoryElement>>,
    cookies: IndexMap<String, Value>,
    window: Option<(u32, u32)>,
    events: Vec<String>,
    quit: bool,
}

impl Page {
    fn url(&self) -> String {
        self.history.get(self.position).cloned().unwrap_or_default()
    }
}

/// In-memory driver with a scripted page.
///
/// Elements are keyed by the exact XPath string used to find them. Every
/// interaction is appended to an event log that tests can inspect.
#[derive(Debug)]
pub struct MemoryDriver {
    name: String,
    page: Mutex<Page>,
}

impl MemoryDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            page: Mutex::new(Page::default()),
        }
    }

    pub fn with_url(self, url: &str) -> Self {
        {
            let mut page = self.page.lock().unwrap();
            page.history = vec![url.to_string()];
            page.position = 0;
        }
        self
    }

    pub fn with_element(self, xpath: &str, element: MemoryElement) -> Self {
        self.page
            .lock()
            .unwrap()
            .elements
            .entry(xpath.to_string())
            .or_default()
            .push(element);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.page.lock().unwrap().events.clone()
    }

    pub fn cookies(&self) -> IndexMap<String, Value> {
        self.page.lock().unwrap().cookies.clone()
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.page.lock().unwrap().window
    }

    pub fn element_property(&self, xpath: &str, name: &str) -> Option<Value> {
        let page = self.page.lock().unwrap();
        page.elements
            .get(xpath)
            .and_then(|els| els.first())
            .and_then(|el| el.properties.get(name).cloned())
    }

    pub fn is_quit(&self) -> bool {
        self.page.lock().unwrap().quit
    }

    fn record(&self, page: &mut Page, event: String) {
        trace!("{}: {event}", self.name);
        page.events.push(event);
    }

    fn with_element_mut<T>(
        &self,
        element: &ElementRef,
        f: impl FnOnce(&mut MemoryElement) -> T,
    ) -> Result<T> {
        let (xpath, index) = parse_ref(element)?;
        let mut page = self.page.lock().unwrap();
        page.elements
            .get_mut(xpath)
            .and_then(|els| els.get_mut(index))
            .map(f)
            .ok_or_else(|| Error::ElementNotFound(xpath.to_string()).into())
    }

    fn navigate(&self, url: &str) {
        let mut page = self.page.lock().unwrap();
        let keep = if page.history.is_empty() {
            0
        } else {
            page.position + 1
        };
        page.history.truncate(keep);
        page.history.push(url.to_string());
        page.position = page.history.len() - 1;
        self.record(&mut page, format!("navigate {url}"));
    }
}

fn parse_ref(element: &ElementRef) -> Result<(&str, usize)> {
    element
        .0
        .rsplit_once('#')
        .and_then(|(xpath, index)| Some((xpath, index.parse().ok()?)))
        .ok_or_else(|| Error::ElementNotFound(element.0.clone()).into())
}

impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().url())
    }

    fn navigate_to(&self, url: &str) -> Result<()> {
        self.navigate(url);
        Ok(())
    }

    fn back(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.position = page.position.saturating_sub(1);
        self.record(&mut page, "back".to_string());
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        if page.position + 1 < page.history.len() {
            page.position += 1;
        }
        self.record(&mut page, "forward".to_string());
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        self.record(&mut page, "refresh".to_string());
        Ok(())
    }

    fn find_elements(&self, xpath: &str) -> Result<Vec<ElementRef>> {
        let page = self.page.lock().unwrap();
        let count = page.elements.get(xpath).map(Vec::len).unwrap_or_default();
        Ok((0..count)
            .map(|i| ElementRef(format!("{xpath}#{i}")))
            .collect())
    }

    fn click(&self, element: &ElementRef) -> Result<()> {
        let href = self.with_element_mut(element, |el| el.href.clone())?;
        {
            let mut page = self.page.lock().unwrap();
            self.record(&mut page, format!("click {}", element.0));
        }
        if let Some(url) = href {
            self.navigate(&url);
        }
        Ok(())
    }

    fn clear(&self, element: &ElementRef) -> Result<()> {
        self.with_element_mut(element, |el| {
            el.properties
                .insert("value".to_string(), Value::String(String::new()));
        })?;
        let mut page = self.page.lock().unwrap();
        self.record(&mut page, format!("clear {}", element.0));
        Ok(())
    }

    fn send_keys(&self, element: &ElementRef, keys: &str) -> Result<()> {
        self.with_element_mut(element, |el| {
            let current = el
                .properties
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            el.properties
                .insert("value".to_string(), Value::String(current + keys));
        })?;
        let mut page = self.page.lock().unwrap();
        self.record(&mut page, format!("send_keys {} {keys}", element.0));
        Ok(())
    }

    fn hover(&self, element: &ElementRef) -> Result<()> {
        self.with_element_mut(element, |_| ())?;
        let mut page = self.page.lock().unwrap();
        self.record(&mut page, format!("hover {}", element.0));
        Ok(())
    }

    fn text(&self, element: &ElementRef) -> Result<String> {
        self.with_element_mut(element, |el| el.text.clone())
    }

    fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        self.with_element_mut(element, |el| el.displayed)
    }

    fn property(&self, element: &ElementRef, name: &str) -> Result<Option<Value>> {
        self.with_element_mut(element, |el| el.properties.get(name).cloned())
    }

    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        self.with_element_mut(element, |el| el.attributes.get(name).cloned())
    }

    fn rect(&self, element: &ElementRef) -> Result<Rect> {
        self.with_element_mut(element, |el| el.rect)
    }

    fn screenshot(&self, element: &ElementRef) -> Result<Vec<u8>> {
        self.with_element_mut(element, |el| el.screenshot.clone())?
            .ok_or_else(|| eyre::eyre!("no screenshot scripted for {}", element.0))
    }

    fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.window = Some((width, height));
        self.record(&mut page, format!("window {width}x{height}"));
        Ok(())
    }

    fn add_cookie(&self, cookie: &Value) -> Result<()> {
        let name = cookie
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre::eyre!("cookie has no name: {cookie}"))?
            .to_string();
        let mut page = self.page.lock().unwrap();
        page.cookies.insert(name.clone(), cookie.clone());
        self.record(&mut page, format!("add_cookie {name}"));
        Ok(())
    }

    fn delete_cookie(&self, name: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.cookies.shift_remove(name);
        self.record(&mut page, format!("delete_cookie {name}"));
        Ok(())
    }

    fn delete_all_cookies(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.cookies.clear();
        self.record(&mut page, "delete_all_cookies".to_string());
        Ok(())
    }

    fn execute_script(&self, script: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        self.record(&mut page, format!("script {script}"));
        Ok(())
    }

    fn quit(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.quit = true;
        self.record(&mut page, "quit".to_string());
        Ok(())
    }
}

type Script = dyn Fn(&str) -> MemoryDriver + Send + Sync;

/// Builds a fresh `MemoryDriver` per target and keeps a handle to each one
pub struct MemoryDriverFactory {
    script: Box<Script>,
    opened: Mutex<Vec<Arc<MemoryDriver>>>,
}

impl MemoryDriverFactory {
    pub fn new(script: impl Fn(&str) -> MemoryDriver + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            opened: Mutex::new(vec![]),
        }
    }

    /// Drivers opened so far, in the order they were opened
    pub fn opened(&self) -> Vec<Arc<MemoryDriver>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn driver(&self, target: &str) -> Option<Arc<MemoryDriver>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.name() == target)
            .cloned()
    }
}

impl DriverFactory for MemoryDriverFactory {
    fn open(&self, target: &str) -> Result<Arc<dyn Driver>> {
        let driver = Arc::new((self.script)(target));
        self.opened.lock().unwrap().push(driver.clone());
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_history() {
        let driver = MemoryDriver::new("Chrome").with_url("http://a");
        driver.navigate_to("http://b").unwrap();
        driver.navigate_to("http://c").unwrap();
        driver.back().unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://b");
        driver.forward().unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://c");
        driver.back().unwrap();
        driver.navigate_to("http://d").unwrap();
        driver.forward().unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://d");
    }

    #[test]
    fn test_elements() {
        let driver = MemoryDriver::new("Chrome")
            .with_element("//input", MemoryElement::new())
            .with_element("//a", MemoryElement::new().text("next").href("http://next"));
        let input = driver.find_element("//input").unwrap();
        driver.send_keys(&input, "abc").unwrap();
        driver.send_keys(&input, "def").unwrap();
        assert_eq!(driver.property(&input, "value").unwrap(), Some(json!("abcdef")));
        driver.clear(&input).unwrap();
        assert_eq!(driver.property(&input, "value").unwrap(), Some(json!("")));
        let link = driver.find_element("//a").unwrap();
        driver.click(&link).unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://next");
        assert!(driver.find_element("//missing").is_err());
        assert_eq!(driver.find_elements("//missing").unwrap(), vec![]);
    }

    #[test]
    fn test_factory_opens_one_driver_per_target() {
        let factory = MemoryDriverFactory::new(|name| MemoryDriver::new(name));
        factory.open("Chrome").unwrap();
        factory.open("Firefox").unwrap();
        let names = factory
            .opened()
            .iter()
            .map(|d| d.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Chrome", "Firefox"]);
        assert!(factory.driver("Firefox").is_some());
    }
}
