use log::debug;
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Captures, Regex};

use crate::notebook::{Cell, Notebook};

/// Where the upstream repository serves the `images/` directory from.
pub const GITHUB_RAW_BASE: &str = "https://github.com/fastai/fastbook/blob/master/images/";

static MARKDOWN_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)              # insignificant whitespace mode
        !\[([^\]]*)\]       # alt text
        \(                  # opening paren
        (?:\.\./)?          # optional parent directory
        images/([^)]+)      # path below images/
        \)                  # closing paren",
    )
    .expect("valid markdown image regex")
});

static HTML_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)             # insignificant whitespace mode
        <img([^>]+)         # attributes before src
        src=['"]            # src attribute, either quote
        (?:\.\./)?          # optional parent directory
        images/([^'"]+)     # path below images/
        ['"]                # closing quote
        ([^>]*)>            # attributes after src"#,
    )
    .expect("valid html image regex")
});

#[derive(PartialEq, Debug, Clone, Copy)]
enum ImageSyntax {
    Markdown,
    Html,
}

impl ImageSyntax {
    fn regex(self) -> &'static Regex {
        match self {
            ImageSyntax::Markdown => &MARKDOWN_IMAGE_RE,
            ImageSyntax::Html => &HTML_IMAGE_RE,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
enum ImageLinkType<'a> {
    Markdown { alt: &'a str },
    Html { before: &'a str, after: &'a str },
}

#[derive(PartialEq, Debug, Clone)]
struct ImageLink<'a> {
    start_index: usize,
    end_index: usize,
    link_type: ImageLinkType<'a>,
    /// Path relative to the `images/` directory.
    path: &'a str,
}

impl<'a> ImageLink<'a> {
    fn from_capture(cap: Captures<'a>, syntax: ImageSyntax) -> Option<ImageLink<'a>> {
        let link_type = match (syntax, cap.get(1), cap.get(3)) {
            (ImageSyntax::Markdown, Some(alt), _) => ImageLinkType::Markdown {
                alt: alt.as_str(),
            },
            (ImageSyntax::Html, Some(before), Some(after)) => ImageLinkType::Html {
                before: before.as_str(),
                after: after.as_str(),
            },
            _ => return None,
        };

        match (cap.get(0), cap.get(2)) {
            (Some(mat), Some(path)) => Some(ImageLink {
                start_index: mat.start(),
                end_index: mat.end(),
                link_type,
                path: path.as_str(),
            }),
            _ => None,
        }
    }

    fn url(&self) -> String {
        format!("{GITHUB_RAW_BASE}{}?raw=true", self.path)
    }

    fn render(&self) -> String {
        match self.link_type {
            ImageLinkType::Markdown { alt } => format!("![{alt}]({})", self.url()),
            ImageLinkType::Html { before, after } => {
                format!("<img{before}src=\"{}\"{after}>", self.url())
            }
        }
    }
}

struct ImageLinkIter<'a> {
    captures: CaptureMatches<'a, 'a>,
    syntax: ImageSyntax,
}

impl<'a> Iterator for ImageLinkIter<'a> {
    type Item = ImageLink<'a>;
    fn next(&mut self) -> Option<ImageLink<'a>> {
        for cap in &mut self.captures {
            if let Some(link) = ImageLink::from_capture(cap, self.syntax) {
                return Some(link);
            }
        }
        None
    }
}

fn find_image_links(contents: &str, syntax: ImageSyntax) -> ImageLinkIter<'_> {
    ImageLinkIter {
        captures: syntax.regex().captures_iter(contents),
        syntax,
    }
}

fn replace_all(s: &str, syntax: ImageSyntax) -> String {
    // Replacements change the length of the text, so copy the untouched
    // stretches between matches rather than editing in place.
    let mut previous_end_index = 0;
    let mut replaced = String::with_capacity(s.len());

    for link in find_image_links(s, syntax) {
        replaced.push_str(&s[previous_end_index..link.start_index]);
        replaced.push_str(&link.render());
        previous_end_index = link.end_index;
    }

    replaced.push_str(&s[previous_end_index..]);
    replaced
}

/// Point every `images/...` reference in a markdown source at the upstream
/// raw file. Markdown images are rewritten first, then `<img>` tags.
pub fn fix_image_links(source: &str) -> String {
    let source = replace_all(source, ImageSyntax::Markdown);
    replace_all(&source, ImageSyntax::Html)
}

/// Rewrite image links in every markdown cell. Returns `true` if any cell
/// changed.
pub fn update_images(nb: &mut Notebook) -> bool {
    let mut modified = false;
    for (index, cell) in nb.cells.iter_mut().enumerate() {
        let Cell::Markdown(cell) = cell else {
            continue;
        };
        let new_source = fix_image_links(cell.source.as_str());
        if new_source != cell.source.as_str() {
            debug!("rewrote image links in cell {index}");
            cell.source = new_source.into();
            modified = true;
        }
    }
    modified
}
