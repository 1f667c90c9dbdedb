//! Header/footer stripping: a simple frequency heuristic standing in for
//! a deeper text-normalization pass, which the engine does not attempt;
//! this gives it a working default.
//!
//! A line that recurs on more than half of a multi-page document's pages is
//! treated as running header/footer boilerplate (page numbers, document
//! titles printed on every page) and dropped from every page it appears on.

use std::collections::HashMap;

use folio_model::{LoadedDocument, LoadedPage};

pub fn strip_headers_and_footers(doc: &LoadedDocument) -> LoadedDocument {
    if doc.pages.len() < 2 {
        return doc.clone();
    }

    let mut line_counts: HashMap<&str, usize> = HashMap::new();
    for page in &doc.pages {
        for line in distinct_nonblank_lines(&page.text) {
            *line_counts.entry(line).or_insert(0) += 1;
        }
    }

    let threshold = doc.pages.len() / 2;
    let boilerplate: std::collections::HashSet<&str> = line_counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(line, _)| line)
        .collect();

    if boilerplate.is_empty() {
        return doc.clone();
    }

    let pages = doc
        .pages
        .iter()
        .map(|page| LoadedPage {
            index: page.index,
            text: page
                .text
                .lines()
                .filter(|line| !boilerplate.contains(line.trim()))
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect();

    LoadedDocument {
        name: doc.name.clone(),
        pages,
    }
}

fn distinct_nonblank_lines(text: &str) -> std::collections::HashSet<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
