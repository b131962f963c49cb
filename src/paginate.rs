/// Characters per history page.
pub const DEFAULT_PAGE_SIZE: usize = 2500;

/// Splits `text` into consecutive pages of at most `page_size` characters.
///
/// Counts `char`s rather than bytes, so multi-byte text never splits inside a
/// code point. A `page_size` of zero leaves the text on a single page.
pub fn paginate(text: &str, page_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if page_size == 0 {
        return vec![text.to_string()];
    }

    let mut pages = Vec::new();
    let mut start = 0;
    let mut chars = 0;
    for (offset, _) in text.char_indices() {
        if chars == page_size {
            pages.push(text[start..offset].to_string());
            start = offset;
            chars = 0;
        }
        chars += 1;
    }
    pages.push(text[start..].to_string());
    pages
}

/// Page-by-page reader over a character's history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryPager {
    pages: Vec<String>,
    current: usize,
}

impl HistoryPager {
    pub fn new(text: &str, page_size: usize) -> Self {
        Self {
            pages: paginate(text, page_size),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &str {
        self.pages.get(self.current).map(String::as_str).unwrap_or("")
    }

    pub fn can_go_previous(&self) -> bool {
        self.current > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.current + 1 < self.pages.len()
    }

    pub fn next(&mut self) -> bool {
        if self.can_go_next() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.can_go_previous() {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to a zero-based page, clamped to the last one.
    pub fn go_to(&mut self, index: usize) {
        self.current = index.min(self.pages.len().saturating_sub(1));
    }

    pub fn page_info(&self) -> String {
        if self.pages.is_empty() {
            return "Page 1 of 1".to_string();
        }
        format!("Page {} of {}", self.current + 1, self.pages.len())
    }
}
