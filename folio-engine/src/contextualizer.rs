//! The synchronous heuristic contextualizer: document name, page index, and
//! the first non-trivial, non-"page N" line of the page.

/// Build the heuristic prefix marker. Always begins with `[`.
pub fn heuristic_prefix(display_name: &str, page: Option<i64>, page_text: &str) -> String {
    let page_label = match page {
        Some(p) => format!(", p.{p}"),
        None => String::new(),
    };
    match first_non_trivial_line(page_text) {
        Some(line) => format!("[{display_name}{page_label}] {line} "),
        None => format!("[{display_name}{page_label}] "),
    }
}

fn first_non_trivial_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_page_marker(line))
        .map(str::to_string)
}

fn is_page_marker(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    match lower.strip_prefix("page ") {
        Some(rest) => {
            let rest = rest.trim();
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
